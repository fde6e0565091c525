//! Grid Traffic Simulation Library
//!
//! A headless traffic simulation with AI cars, pedestrians and a
//! path-following agent on a direction-constrained road grid.

pub mod simulation;

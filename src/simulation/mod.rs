//! Grid traffic simulation
//!
//! AI cars, pedestrians and one path-following agent share a
//! direction-constrained road grid with traffic lights. Everything runs
//! headless in a fixed-timestep loop driven by [`SimWorld::tick`].

mod agent;
mod car;
mod error;
mod grid;
mod intersection;
mod movement;
mod pathfinding;
mod pedestrian;
mod stats;
mod types;
mod world;

// Re-export public types for external use
// These may not be used within this crate but are part of the public API
#[allow(unused_imports)]
pub use agent::{AgentEvent, AgentMode, ReplanRequest, SimAgent};
#[allow(unused_imports)]
pub use car::{
    boxes_overlap, collision_extent, crosswalk_light, occupied_by_other, Advance, CarSnapshot, CarState,
    CarUpdateResult, Obstacle, ObstacleKind, SimCar,
};
pub use error::SimError;
pub use grid::{GridWorld, LightState, Orientation, Tile, TrafficLight};
#[allow(unused_imports)]
pub use intersection::{
    choose_agent_direction, choose_ai_direction, open_directions, AgentTurn, TurnDecision,
};
pub use movement::{can_move, can_move_towards, move_direction, tile_allows};
#[allow(unused_imports)]
pub use pathfinding::{
    compare_strategies, Pathfinder, SearchOutcome, SearchStatus, SearchStrategy, StrategyReport,
};
#[allow(unused_imports)]
pub use pedestrian::{
    decide_to_cross, find_crossings, Crossing, Pedestrian, PedestrianManager, PedestrianPhase,
    PedestrianUpdate, CROSS_ON_GREEN, CROSS_ON_RED, INITIAL_BATCH, MAX_ACTIVE, MAX_BATCH,
    MIN_BATCH, SPAWN_INTERVAL,
};
pub use stats::SimStats;
#[allow(unused_imports)]
pub use types::{
    preferred_direction, CarId, Cell, Direction, PedestrianId, Position, SimId, CELL_SIZE,
    COLLISION_LONG_FACTOR, COLLISION_SHORT_FACTOR, GREEN_LIGHT_TICKS, LOOKAHEAD_CELLS,
    RED_LIGHT_TICKS, STRAIGHT_BIAS, STUCK_TICKS, TICKS_PER_SECOND, TICK_SECONDS, UTURN_WAIT_TICKS,
    YELLOW_LIGHT_TICKS,
};
pub use world::{SimConfig, SimWorld};

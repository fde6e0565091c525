//! Run statistics for the traffic simulation

use log::info;

use super::types::TICK_SECONDS;

/// Counters accumulated over a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimStats {
    pub ticks: u64,
    pub cars_spawned: u32,
    pub respawns: u32,
    pub stuck_recoveries: u32,
    /// AI cars that found every exit of an intersection closed
    pub forced_uturns: u32,
    pub agent_uturns: u32,
    pub pedestrians_spawned: u32,
    pub pedestrians_finished: u32,
    /// One per blocked path, a U-turn after the first notice adds nothing
    pub replans_requested: u32,
    pub replans_served: u32,
    /// Replans answered with an empty path
    pub replans_failed: u32,
    pub destinations_reached: u32,
}

impl SimStats {
    pub fn elapsed_seconds(&self) -> f32 {
        self.ticks as f32 * TICK_SECONDS
    }

    /// Write the end-of-run report to the log
    pub fn log_report(&self, active_cars: usize, active_pedestrians: usize) {
        info!("=== SIMULATION COMPLETE ===");
        info!("Elapsed time: {:.2}s", self.elapsed_seconds());
        info!("Ticks: {}", self.ticks);
        info!("Total cars spawned: {}", self.cars_spawned);
        info!("Active cars: {}", active_cars);
        info!("Respawns: {}", self.respawns);
        info!("Stuck recoveries: {}", self.stuck_recoveries);
        info!("Forced U-turns: {}", self.forced_uturns);
        info!("Agent U-turns: {}", self.agent_uturns);
        info!("Pedestrians spawned: {}", self.pedestrians_spawned);
        info!("Pedestrians finished: {}", self.pedestrians_finished);
        info!("Active pedestrians: {}", active_pedestrians);
        info!("Replans requested: {}", self.replans_requested);
        info!("Replans served: {}", self.replans_served);
        info!("Replans without route: {}", self.replans_failed);
        info!("Destinations reached: {}", self.destinations_reached);
    }
}

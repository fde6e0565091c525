//! Main simulation world that ties everything together
//!
//! Owns the grid, the AI cars, the agent, the pedestrians and the single
//! random number generator, and advances them in a fixed order every tick.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;

use super::agent::{AgentEvent, SimAgent};
use super::car::{CarSnapshot, CarUpdateResult, SimCar};
use super::error::SimError;
use super::grid::{GridWorld, Tile};
use super::pathfinding::{Pathfinder, SearchStrategy};
use super::pedestrian::PedestrianManager;
use super::stats::SimStats;
use super::types::{CarId, Cell, SimId, TICK_SECONDS};

/// Run-time settings for a simulation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    /// Number of AI cars to spawn
    pub cars: usize,
    /// Seed for reproducible runs, entropy when `None`
    pub seed: Option<u64>,
    pub pedestrians: bool,
    pub agent_start: Option<Cell>,
    pub agent_goal: Option<Cell>,
    /// Strategy used to plan and replan the agent's route
    pub strategy: SearchStrategy,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            cars: 12,
            seed: None,
            pedestrians: true,
            agent_start: None,
            agent_goal: None,
            strategy: SearchStrategy::AStar,
        }
    }
}

/// The main simulation world
pub struct SimWorld {
    pub grid: GridWorld,

    /// AI cars, updated in list order
    pub cars: Vec<SimCar>,

    /// The path-following vehicle, updated after every AI car
    pub agent: Option<SimAgent>,

    pedestrians: Option<PedestrianManager>,

    /// Next ID to assign
    next_id: usize,

    rng: StdRng,

    pub stats: SimStats,
}

impl SimWorld {
    fn new_internal(grid: GridWorld, rng: StdRng) -> Self {
        Self {
            grid,
            cars: Vec::new(),
            agent: None,
            pedestrians: None,
            next_id: 0,
            rng,
            stats: SimStats::default(),
        }
    }

    pub fn new(grid: GridWorld) -> Self {
        Self::new_internal(grid, StdRng::from_os_rng())
    }

    /// Create a new SimWorld with a seeded RNG for reproducible simulations
    pub fn new_with_seed(grid: GridWorld, seed: u64) -> Self {
        Self::new_internal(grid, StdRng::seed_from_u64(seed))
    }

    /// Build a populated world from a configuration. The agent, if any, is
    /// routed to its goal straight away.
    pub fn from_config(grid: GridWorld, config: &SimConfig) -> Result<Self> {
        let mut world = match config.seed {
            Some(seed) => Self::new_with_seed(grid, seed),
            None => Self::new(grid),
        };

        if config.pedestrians {
            world.enable_pedestrians();
        }

        if let Some(start) = config.agent_start {
            world
                .spawn_agent(start)
                .context("Failed to place the agent")?;
        }
        let spawned = world.spawn_cars(config.cars);
        if spawned < config.cars {
            warn!("Only {} of {} cars could be placed", spawned, config.cars);
        }

        if let Some(goal) = config.agent_goal {
            let pathfinder = Pathfinder::new(config.strategy);
            if !world.route_agent(goal, &pathfinder) {
                warn!("Agent has no route to {:?}", goal);
            }
        }

        Ok(world)
    }

    fn next_sim_id(&mut self) -> SimId {
        let id = SimId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Start the pedestrian model with its initial batch
    pub fn enable_pedestrians(&mut self) {
        let manager = PedestrianManager::new(&self.grid, &mut self.rng);
        self.stats.pedestrians_spawned += manager.active_count() as u32;
        self.grid.set_pedestrian_cells(manager.occupied_cells());
        self.pedestrians = Some(manager);
    }

    pub fn pedestrians(&self) -> Option<&PedestrianManager> {
        self.pedestrians.as_ref()
    }

    fn is_occupied(&self, cell: Cell) -> bool {
        self.cars.iter().any(|car| car.cell == cell)
            || self.agent.as_ref().is_some_and(|agent| agent.cell() == cell)
    }

    /// Spawn up to `count` AI cars on free lane cells. Returns how many
    /// were placed.
    pub fn spawn_cars(&mut self, count: usize) -> usize {
        let mut spawned = 0;
        for _ in 0..count {
            let free: Vec<Cell> = self
                .grid
                .lane_cells()
                .into_iter()
                .filter(|cell| !self.is_occupied(*cell))
                .collect();
            let Some(cell) = free.choose(&mut self.rng).copied() else {
                warn!("No free lane cell left to spawn a car");
                break;
            };

            let id = CarId(self.next_sim_id());
            let car = SimCar::new_ai(id, cell, &self.grid, &mut self.rng);
            debug!(
                "Spawned car {:?} at {:?} (max speed {:.2})",
                id.0, cell, car.max_speed
            );
            self.cars.push(car);
            spawned += 1;
        }
        self.stats.cars_spawned += spawned as u32;
        spawned
    }

    /// Place the agent, replacing any previous one
    pub fn spawn_agent(&mut self, cell: Cell) -> Result<CarId, SimError> {
        let id = CarId(self.next_sim_id());
        let agent = SimAgent::new(id, cell, &self.grid)?;
        info!("Agent {:?} placed at {:?}", id.0, cell);
        self.agent = Some(agent);
        Ok(id)
    }

    /// Teleport the agent. Fails without side effects on an invalid cell.
    pub fn move_agent_to(&mut self, cell: Cell) -> Result<(), SimError> {
        match &mut self.agent {
            Some(agent) => agent.set_position(&self.grid, cell),
            None => Err(SimError::invalid_position(cell, "no agent to move")),
        }
    }

    /// Plan a route for the agent to `goal` and start following it.
    /// Returns false, with the agent stopped, when there is no route.
    pub fn route_agent(&mut self, goal: Cell, pathfinder: &Pathfinder) -> bool {
        let Some(agent) = &mut self.agent else {
            return false;
        };
        let path = pathfinder.search(&self.grid, agent.cell(), goal);
        let found = !path.is_empty();
        agent.approve_replan(&self.grid, path);
        found
    }

    /// Answer the agent's outstanding replan request, if any, by running
    /// `pathfinder` from where it stands to its destination. Returns true
    /// when a request was served.
    pub fn service_replan(&mut self, pathfinder: &Pathfinder) -> bool {
        let Some(agent) = &mut self.agent else {
            return false;
        };
        let Some(request) = agent.replan_request() else {
            return false;
        };

        let outcome = pathfinder.search_with_stats(&self.grid, request.start, request.goal);
        info!(
            "Replan {:?} -> {:?} with {}: {:?} after {} expansions",
            request.start,
            request.goal,
            pathfinder.strategy(),
            outcome.status,
            outcome.expanded
        );
        self.stats.replans_served += 1;
        if outcome.path.is_empty() {
            self.stats.replans_failed += 1;
        }
        agent.approve_replan(&self.grid, outcome.path);
        true
    }

    /// Drop an obstacle onto a cell between ticks
    pub fn place_obstacle(&mut self, cell: Cell) {
        debug!("Obstacle placed at {:?}", cell);
        self.grid.set_tile(cell, Tile::Building);
    }

    /// Restore a cell to the given tile between ticks
    pub fn clear_obstacle(&mut self, cell: Cell, tile: Tile) {
        debug!("Obstacle cleared at {:?}", cell);
        self.grid.set_tile(cell, tile);
    }

    /// Views of every vehicle, AI cars first and the agent last
    pub fn snapshots(&self) -> Vec<CarSnapshot> {
        self.cars
            .iter()
            .map(SimCar::snapshot)
            .chain(self.agent.as_ref().map(SimAgent::snapshot))
            .collect()
    }

    /// Advance the simulation by one tick: lights, pedestrians, then every
    /// vehicle in order. Each vehicle sees the already-updated state of the
    /// ones before it and the previous state of the ones after it.
    pub fn tick(&mut self) {
        self.stats.ticks += 1;
        self.grid.update();

        if let Some(pedestrians) = &mut self.pedestrians {
            let update = pedestrians.update(&self.grid, TICK_SECONDS, &mut self.rng);
            self.stats.pedestrians_spawned += update.spawned as u32;
            self.stats.pedestrians_finished += update.finished as u32;
            self.grid.set_pedestrian_cells(pedestrians.occupied_cells());
        }

        let mut snapshots = self.snapshots();

        for (index, car) in self.cars.iter_mut().enumerate() {
            let result = car.update(&self.grid, &snapshots, &mut self.rng);
            snapshots[index] = car.snapshot();
            match result {
                CarUpdateResult::Continue => {}
                CarUpdateResult::Respawned => self.stats.respawns += 1,
                CarUpdateResult::RecoveredFromStuck => self.stats.stuck_recoveries += 1,
                CarUpdateResult::ForcedUTurn => self.stats.forced_uturns += 1,
            }
        }

        if let Some(agent) = &mut self.agent {
            match agent.update(&self.grid, &snapshots, &mut self.rng) {
                AgentEvent::None => {}
                AgentEvent::DestinationReached => self.stats.destinations_reached += 1,
                AgentEvent::ReplanRequested => self.stats.replans_requested += 1,
                AgentEvent::UTurnStarted => self.stats.agent_uturns += 1,
            }
        }
    }

    /// Tick `ticks` times, answering replan requests between ticks
    pub fn run(&mut self, ticks: u64, pathfinder: &Pathfinder) {
        for _ in 0..ticks {
            self.tick();
            self.service_replan(pathfinder);
        }
    }

    pub fn active_vehicles(&self) -> usize {
        self.cars.len() + usize::from(self.agent.is_some())
    }

    pub fn active_pedestrians(&self) -> usize {
        self.pedestrians
            .as_ref()
            .map_or(0, PedestrianManager::active_count)
    }

    /// Log the end-of-run statistics
    pub fn log_report(&self) {
        self.stats
            .log_report(self.active_vehicles(), self.active_pedestrians());
    }

    /// Print a summary of the world state
    pub fn print_summary(&self) {
        println!("=== Traffic Simulation Summary ===");
        println!(
            "Time: {:.2}s ({} ticks)",
            self.stats.elapsed_seconds(),
            self.stats.ticks
        );
        println!("Grid: {}x{}", self.grid.width(), self.grid.height());
        println!("Cars: {}", self.cars.len());
        println!("Pedestrians: {}", self.active_pedestrians());

        if let Some(agent) = &self.agent {
            println!("--- Agent ---");
            println!(
                "  at {:?} heading {:?}, state {:?}, mode {:?}",
                agent.cell(),
                agent.heading(),
                agent.state(),
                agent.mode()
            );
            println!(
                "  destination {:?}, waypoint {}/{}",
                agent.destination(),
                agent.path_index(),
                agent.path().len()
            );
        }

        println!("--- Cars ---");
        for car in &self.cars {
            println!(
                "  Car {:?}: {:?} heading {:?}, speed {:.2}, {:?}",
                car.id.0, car.cell, car.heading, car.speed, car.state
            );
        }
        println!();
    }

    /// Draw the grid with cars (`C`), the agent (`A`) and its destination
    /// (`D`) on top
    pub fn draw_map(&self) {
        let mut overlays: Vec<(Cell, char)> = self.cars.iter().map(|car| (car.cell, 'C')).collect();
        if let Some(agent) = &self.agent {
            if let Some(destination) = agent.destination() {
                overlays.push((destination, 'D'));
            }
            overlays.push((agent.cell(), 'A'));
        }

        println!("\n=== World Map ===");
        println!("Legend: C=Car, A=Agent, D=Destination, p=Pedestrian, +=Intersection, #=Building");
        println!();
        print!("{}", self.grid.render_ascii(&overlays));
        println!();
    }
}

//! The path-following agent vehicle
//!
//! The agent drives with the same kinematics as the AI cars but steers by a
//! list of waypoints handed to it from outside. When the route ahead turns
//! impassable it raises a replan request and, if the blocked cell is right
//! in front of it, turns around first. It never plans on its own: the
//! driver reads [`SimAgent::replan_request`] and answers through
//! [`SimAgent::approve_replan`].

use log::{debug, info, warn};
use rand::Rng;

use super::car::{occupied_by_other, Advance, CarSnapshot, CarState, SimCar};
use super::error::SimError;
use super::grid::{GridWorld, Tile};
use super::intersection::{choose_agent_direction, AgentTurn};
use super::types::{preferred_direction, CarId, Cell, Direction, UTURN_WAIT_TICKS};

const AGENT_MAX_SPEED: f32 = 3.0;
const AGENT_ACCELERATION: f32 = 0.12;
const AGENT_DECELERATION: f32 = 0.35;

/// Route the agent wants planned: from where it stands to its destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplanRequest {
    pub start: Cell,
    pub goal: Cell,
}

/// Controller state of the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentMode {
    /// No path; holds still
    Idle,
    Following,
    /// Still driving the old path, waiting for a new one
    ReplanNeeded,
    /// Stopped on an intersection with no open exit
    Blocked { replan_needed: bool },
    /// Stage 0 waits, stages 1 and 3 rotate left, stage 2 moves one cell
    UTurning { stage: u8, timer: u32 },
    /// Stopped until the driver approves a new path
    AwaitingReplan { request: ReplanRequest },
}

/// Notable things that happened during one agent update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentEvent {
    None,
    DestinationReached,
    ReplanRequested,
    UTurnStarted,
}

#[derive(Debug, Clone)]
pub struct SimAgent {
    car: SimCar,
    path: Vec<Cell>,
    path_index: usize,
    destination: Option<Cell>,
    mode: AgentMode,
    /// A ReplanRequested event went out for the current path
    request_raised: bool,
}

impl SimAgent {
    /// Place a new idle agent on a drivable cell
    pub fn new(id: CarId, cell: Cell, grid: &GridWorld) -> Result<Self, SimError> {
        validate_cell(grid, cell)?;
        let mut car = SimCar::new(
            id,
            cell,
            AGENT_MAX_SPEED,
            AGENT_ACCELERATION,
            AGENT_DECELERATION,
        );
        if let Some(direction) = grid.tile_at(cell).and_then(Tile::lane_direction) {
            car.follow_direction(direction);
        }
        Ok(Self {
            car,
            path: Vec::new(),
            path_index: 0,
            destination: None,
            mode: AgentMode::Idle,
            request_raised: false,
        })
    }

    /// Teleport onto a drivable cell. The vehicle comes to rest there, the
    /// path and mode are kept.
    pub fn set_position(&mut self, grid: &GridWorld, cell: Cell) -> Result<(), SimError> {
        validate_cell(grid, cell)?;
        self.car.teleport(cell);
        self.car.state = CarState::Stopped;
        if let Some(direction) = grid.tile_at(cell).and_then(Tile::lane_direction) {
            self.car.follow_direction(direction);
        }
        debug!("Agent placed at {:?}", cell);
        Ok(())
    }

    /// Start following `path`. A leading waypoint equal to the current cell
    /// is skipped; an empty path stops the agent.
    pub fn move_along(&mut self, grid: &GridWorld, mut path: Vec<Cell>) {
        if path.first() == Some(&self.car.cell) {
            path.remove(0);
        }
        let Some(destination) = path.last().copied() else {
            self.stop();
            return;
        };

        info!(
            "Agent following {} waypoints from {:?} to {:?}",
            path.len(),
            self.car.cell,
            destination
        );
        self.path = path;
        self.path_index = 0;
        self.destination = Some(destination);
        self.mode = AgentMode::Following;
        self.request_raised = false;
        self.car.state = CarState::Driving;

        let lane = grid.tile_at(self.car.cell).and_then(Tile::lane_direction);
        let towards_waypoint = preferred_direction(self.car.cell, self.path[0]);
        if let Some(direction) = lane.or(towards_waypoint) {
            self.car.follow_direction(direction);
        }
    }

    /// Drop the path and destination and come to a halt. Idempotent.
    pub fn stop(&mut self) {
        self.path.clear();
        self.path_index = 0;
        self.destination = None;
        self.mode = AgentMode::Idle;
        self.request_raised = false;
        self.hold();
    }

    /// Answer a replan request. An empty path means no route exists.
    pub fn approve_replan(&mut self, grid: &GridWorld, path: Vec<Cell>) {
        if path.is_empty() {
            info!("No route for agent at {:?}, stopping", self.car.cell);
            self.stop();
        } else {
            self.move_along(grid, path);
        }
    }

    pub fn id(&self) -> CarId {
        self.car.id
    }

    pub fn car(&self) -> &SimCar {
        &self.car
    }

    pub fn snapshot(&self) -> CarSnapshot {
        self.car.snapshot()
    }

    pub fn cell(&self) -> Cell {
        self.car.cell
    }

    pub fn heading(&self) -> Option<Direction> {
        self.car.heading
    }

    pub fn speed(&self) -> f32 {
        self.car.speed
    }

    pub fn state(&self) -> CarState {
        self.car.state
    }

    pub fn mode(&self) -> AgentMode {
        self.mode
    }

    pub fn path(&self) -> &[Cell] {
        &self.path
    }

    /// Index of the next waypoint to reach
    pub fn path_index(&self) -> usize {
        self.path_index
    }

    pub fn destination(&self) -> Option<Cell> {
        self.destination
    }

    pub fn is_active(&self) -> bool {
        self.mode != AgentMode::Idle
    }

    pub fn replan_needed(&self) -> bool {
        matches!(
            self.mode,
            AgentMode::ReplanNeeded
                | AgentMode::Blocked {
                    replan_needed: true
                }
                | AgentMode::AwaitingReplan { .. }
        )
    }

    /// Stopped and waiting for the driver
    pub fn awaiting_approval(&self) -> bool {
        matches!(self.mode, AgentMode::AwaitingReplan { .. })
    }

    pub fn uturn_stage(&self) -> Option<u8> {
        match self.mode {
            AgentMode::UTurning { stage, .. } => Some(stage),
            _ => None,
        }
    }

    /// The route the driver should plan, if a replan is outstanding
    pub fn replan_request(&self) -> Option<ReplanRequest> {
        match self.mode {
            AgentMode::AwaitingReplan { request } => Some(request),
            _ if self.replan_needed() => self.destination.map(|goal| ReplanRequest {
                start: self.car.cell,
                goal,
            }),
            _ => None,
        }
    }

    /// One tick of the agent controller
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        grid: &GridWorld,
        others: &[CarSnapshot],
        rng: &mut R,
    ) -> AgentEvent {
        match self.mode {
            AgentMode::Idle | AgentMode::AwaitingReplan { .. } => {
                self.hold();
                return AgentEvent::None;
            }
            AgentMode::UTurning { stage, timer } => {
                return self.step_uturn(stage, timer, grid, others);
            }
            _ => {}
        }

        let mut event = AgentEvent::None;
        if !grid.is_passable(self.car.cell) {
            warn!("Agent is off the road at {:?}", self.car.cell);
            self.halt_for_replan();
            return self.raise_request();
        }
        if let Some(blocked_at) = self.first_blocked_waypoint(grid) {
            let ahead = self.car.heading.map(|heading| self.car.cell.step(heading));
            if blocked_at == self.path_index && ahead == Some(self.path[blocked_at]) {
                self.start_uturn();
                return AgentEvent::UTurnStarted;
            }
            if !self.replan_needed() {
                info!(
                    "Agent path blocked at {:?}, requesting replan",
                    self.path[blocked_at]
                );
                self.flag_replan();
                event = self.raise_request();
            }
        }

        if let AgentMode::Blocked { replan_needed } = self.mode {
            match self.choose_turn(grid, others, rng, replan_needed) {
                AgentTurn::Go(direction) => {
                    debug!(
                        "Agent leaving intersection {:?} heading {}",
                        self.car.cell,
                        direction.symbol()
                    );
                    self.car.follow_direction(direction);
                    self.car.state = CarState::Driving;
                    self.mode = if replan_needed {
                        AgentMode::ReplanNeeded
                    } else {
                        AgentMode::Following
                    };
                }
                AgentTurn::Wait => {
                    self.hold();
                    return event;
                }
            }
        }

        let obstacle = self.car.look_ahead(grid, others);
        self.car.update_state(obstacle);
        self.car.update_speed(obstacle);
        match self.car.advance(others) {
            Advance::EnteredCell(cell) => match self.on_new_cell(cell, grid, others, rng) {
                AgentEvent::None => event,
                entered => entered,
            },
            _ => event,
        }
    }

    fn hold(&mut self) {
        self.car.speed = 0.0;
        self.car.state = CarState::Stopped;
    }

    fn first_blocked_waypoint(&self, grid: &GridWorld) -> Option<usize> {
        self.path
            .iter()
            .enumerate()
            .skip(self.path_index)
            .find(|(_, cell)| !grid.is_passable(**cell))
            .map(|(index, _)| index)
    }

    fn flag_replan(&mut self) {
        self.mode = match self.mode {
            AgentMode::Blocked { .. } => AgentMode::Blocked {
                replan_needed: true,
            },
            _ => AgentMode::ReplanNeeded,
        };
    }

    /// One event per path, however many times the agent gets stuck on it
    fn raise_request(&mut self) -> AgentEvent {
        if self.request_raised {
            return AgentEvent::None;
        }
        self.request_raised = true;
        AgentEvent::ReplanRequested
    }

    fn halt_for_replan(&mut self) {
        let start = self.car.cell;
        let goal = self.destination.unwrap_or(start);
        self.mode = AgentMode::AwaitingReplan {
            request: ReplanRequest { start, goal },
        };
        self.hold();
    }

    fn start_uturn(&mut self) {
        info!("Agent blocked directly ahead at {:?}, turning around", self.car.cell);
        self.mode = AgentMode::UTurning { stage: 0, timer: 0 };
        self.hold();
    }

    fn step_uturn(
        &mut self,
        stage: u8,
        timer: u32,
        grid: &GridWorld,
        others: &[CarSnapshot],
    ) -> AgentEvent {
        self.hold();
        match stage {
            0 => {
                let timer = timer + 1;
                let stage = if timer >= UTURN_WAIT_TICKS { 1 } else { 0 };
                self.mode = AgentMode::UTurning { stage, timer };
            }
            1 => {
                self.rotate_left();
                self.mode = AgentMode::UTurning { stage: 2, timer };
            }
            2 => {
                if let Some(heading) = self.car.heading {
                    let target = self.car.cell.step(heading);
                    if grid.is_passable(target) && !occupied_by_other(others, self.car.id, target)
                    {
                        self.car.teleport(target);
                        self.car.follow_direction(heading);
                    } else {
                        debug!("Agent U-turn could not cross into {:?}", target);
                    }
                }
                self.mode = AgentMode::UTurning { stage: 3, timer };
            }
            _ => {
                self.rotate_left();
                debug!("Agent U-turn finished at {:?}", self.car.cell);
                self.halt_for_replan();
                return self.raise_request();
            }
        }
        AgentEvent::None
    }

    fn rotate_left(&mut self) {
        if let Some(heading) = self.car.heading {
            self.car.follow_direction(heading.left());
        }
    }

    fn choose_turn<R: Rng + ?Sized>(
        &self,
        grid: &GridWorld,
        others: &[CarSnapshot],
        rng: &mut R,
        allow_uturn: bool,
    ) -> AgentTurn {
        choose_agent_direction(
            grid,
            self.car.cell,
            self.car.heading,
            self.path.get(self.path_index).copied(),
            allow_uturn,
            others,
            self.car.id,
            rng,
        )
    }

    fn on_new_cell<R: Rng + ?Sized>(
        &mut self,
        cell: Cell,
        grid: &GridWorld,
        others: &[CarSnapshot],
        rng: &mut R,
    ) -> AgentEvent {
        if self.path.get(self.path_index) == Some(&cell) {
            self.path_index += 1;
            if self.path_index >= self.path.len() {
                info!("Agent reached destination {:?}", cell);
                self.mode = AgentMode::Idle;
                self.hold();
                return AgentEvent::DestinationReached;
            }
        }

        match grid.tile_at(cell) {
            Some(tile) if tile.is_intersection() => {
                let replan_needed = self.replan_needed();
                match self.choose_turn(grid, others, rng, replan_needed) {
                    AgentTurn::Go(direction) => self.car.follow_direction(direction),
                    AgentTurn::Wait => {
                        debug!("Agent waiting at blocked intersection {:?}", cell);
                        self.mode = AgentMode::Blocked { replan_needed };
                        self.hold();
                    }
                }
                AgentEvent::None
            }
            Some(Tile::Road {
                direction: Some(direction),
                ..
            }) => {
                self.car.follow_direction(*direction);
                AgentEvent::None
            }
            Some(Tile::Crosswalk { .. }) => AgentEvent::None,
            _ => {
                warn!("Agent drove off the road into {:?}", cell);
                self.halt_for_replan();
                AgentEvent::ReplanRequested
            }
        }
    }
}

fn validate_cell(grid: &GridWorld, cell: Cell) -> Result<(), SimError> {
    if !grid.in_bounds(cell) {
        return Err(SimError::invalid_position(cell, "outside the map"));
    }
    if !grid.is_passable(cell) {
        return Err(SimError::invalid_position(cell, "not a road or crosswalk"));
    }
    Ok(())
}

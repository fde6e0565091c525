//! Vehicle motion for the traffic simulation
//!
//! A [`SimCar`] couples a discrete driving state machine (driving, braking,
//! stopping, stopped) fed by a forward obstacle scan with continuous pixel
//! kinematics and a box collision test against the other vehicles. AI cars
//! additionally pick turns at intersections, recover when stuck and respawn
//! when they leave the road; the agent reuses everything except those.

use log::{debug, warn};
use rand::seq::IndexedRandom;
use rand::Rng;

use super::grid::{GridWorld, LightState, Tile};
use super::intersection::{choose_ai_direction, TurnDecision};
use super::types::{
    CarId, Cell, Direction, Position, CELL_SIZE, COLLISION_LONG_FACTOR, COLLISION_SHORT_FACTOR,
    LOOKAHEAD_CELLS, STUCK_TICKS,
};

/// Driving state of a vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarState {
    Driving,
    /// Easing towards a distance-dependent target speed
    Braking,
    /// Hard brake to zero
    Stopping,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObstacleKind {
    Pedestrian,
    RedLight,
    CarAhead,
}

/// Nearest blocking condition found by the forward scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Obstacle {
    pub kind: ObstacleKind,
    /// Cells ahead of the vehicle, 1 is the adjacent cell
    pub distance: u32,
}

impl Obstacle {
    pub fn new(kind: ObstacleKind, distance: u32) -> Self {
        Self { kind, distance }
    }
}

/// Read-only view of a vehicle used by the others during one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarSnapshot {
    pub id: CarId,
    pub cell: Cell,
    pub position: Position,
    pub heading: Option<Direction>,
    pub moving: bool,
}

impl CarSnapshot {
    /// The cell this vehicle will enter next
    pub fn next_cell(&self) -> Option<Cell> {
        self.heading.map(|heading| self.cell.step(heading))
    }

    /// Pixel center of the vehicle
    pub fn center(&self) -> Position {
        footprint_center(self.position)
    }
}

/// Whether a vehicle other than `me` sits on `cell`
pub fn occupied_by_other(others: &[CarSnapshot], me: CarId, cell: Cell) -> bool {
    others.iter().any(|other| other.id != me && other.cell == cell)
}

/// What a position update did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// No speed or no heading
    Idle,
    /// The collision test cancelled the move
    Blocked,
    Moved,
    /// Moved across a cell boundary
    EnteredCell(Cell),
}

/// Result of an AI car update indicating what happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarUpdateResult {
    Continue,
    /// Left the road or the map and was placed on a new lane cell
    Respawned,
    /// Sat still too long and was pushed onto a new heading
    RecoveredFromStuck,
    /// Found no way out of an intersection and reversed in place
    ForcedUTurn,
}

/// A vehicle in the traffic simulation
#[derive(Debug, Clone)]
pub struct SimCar {
    pub id: CarId,
    /// Always `Cell::containing(position)`
    pub cell: Cell,
    /// Top-left pixel corner of the vehicle's cell-sized footprint
    pub position: Position,
    pub heading: Option<Direction>,
    pub speed: f32,
    pub max_speed: f32,
    pub acceleration: f32,
    pub deceleration: f32,
    pub state: CarState,
    /// Set by stuck recovery; the next intersection must not go straight
    pub needs_reroute: bool,
    stuck_ticks: u32,
    last_pixel: (i32, i32),
}

impl SimCar {
    pub fn new(
        id: CarId,
        cell: Cell,
        max_speed: f32,
        acceleration: f32,
        deceleration: f32,
    ) -> Self {
        let position = cell.origin();
        Self {
            id,
            cell,
            position,
            heading: None,
            speed: 0.0,
            max_speed,
            acceleration,
            deceleration,
            state: CarState::Stopped,
            needs_reroute: false,
            stuck_ticks: 0,
            last_pixel: pixel_key(position),
        }
    }

    /// An AI car with randomised performance, already heading down its lane
    pub fn new_ai<R: Rng + ?Sized>(id: CarId, cell: Cell, grid: &GridWorld, rng: &mut R) -> Self {
        let mut car = Self::new(
            id,
            cell,
            rng.random_range(1.5..3.0),
            rng.random_range(0.05..0.15),
            0.3,
        );
        car.set_initial_direction(grid, rng);
        car
    }

    pub fn snapshot(&self) -> CarSnapshot {
        CarSnapshot {
            id: self.id,
            cell: self.cell,
            position: self.position,
            heading: self.heading,
            moving: self.speed > 0.0,
        }
    }

    /// Pixel center of the vehicle
    pub fn center(&self) -> Position {
        footprint_center(self.position)
    }

    /// Point the vehicle in `direction` and re-center it on the lane so it
    /// does not clip the corner of the cell it is turning out of
    pub fn follow_direction(&mut self, direction: Direction) {
        self.heading = Some(direction);
        if direction.is_horizontal() {
            self.position.y = self.cell.row as f32 * CELL_SIZE;
        } else {
            self.position.x = self.cell.col as f32 * CELL_SIZE;
        }
    }

    /// Follow the lane under the vehicle, or pick any heading elsewhere
    pub fn set_initial_direction<R: Rng + ?Sized>(&mut self, grid: &GridWorld, rng: &mut R) {
        let direction = grid
            .tile_at(self.cell)
            .and_then(Tile::lane_direction)
            .or_else(|| Direction::ALL.choose(rng).copied());
        if let Some(direction) = direction {
            self.follow_direction(direction);
        }
        self.state = CarState::Driving;
    }

    /// Place the vehicle at rest on a cell
    pub fn teleport(&mut self, cell: Cell) {
        self.cell = cell;
        self.position = cell.origin();
        self.speed = 0.0;
        self.stuck_ticks = 0;
        self.last_pixel = pixel_key(self.position);
    }

    /// Scan up to [`LOOKAHEAD_CELLS`] cells ahead for the nearest reason to
    /// slow down. Pedestrians outrank red lights, which outrank vehicles.
    /// The scan stops at the map edge.
    pub fn look_ahead(&self, grid: &GridWorld, others: &[CarSnapshot]) -> Option<Obstacle> {
        let heading = self.heading?;

        for distance in 1..=LOOKAHEAD_CELLS {
            let cell = self.cell.offset(heading, distance as i32);
            let Some(tile) = grid.tile_at(cell) else {
                break;
            };

            if matches!(tile, Tile::Crosswalk { .. }) {
                if grid.has_pedestrian(cell) {
                    return Some(Obstacle::new(ObstacleKind::Pedestrian, distance));
                }
                if crosswalk_light(grid, cell, heading) == Some(LightState::Red) {
                    return Some(Obstacle::new(ObstacleKind::RedLight, distance));
                }
            }

            if occupied_by_other(others, self.id, cell) {
                return Some(Obstacle::new(ObstacleKind::CarAhead, distance));
            }

            if distance == 1 && self.must_yield(cell, others) {
                return Some(Obstacle::new(ObstacleKind::CarAhead, distance));
            }
        }

        None
    }

    /// A moving vehicle with a lower id heading into the same empty cell
    /// holds the right of way
    fn must_yield(&self, target: Cell, others: &[CarSnapshot]) -> bool {
        others.iter().any(|other| {
            other.id < self.id
                && other.moving
                && other.cell != target
                && other.next_cell() == Some(target)
        })
    }

    /// Driving state transition for this tick's scan result
    pub fn update_state(&mut self, obstacle: Option<Obstacle>) {
        match obstacle {
            None => self.state = CarState::Driving,
            Some(obstacle) if obstacle.distance <= 1 => {
                self.state = if self.speed <= 0.0 {
                    CarState::Stopped
                } else {
                    CarState::Stopping
                };
            }
            Some(_) => {
                if self.state == CarState::Driving {
                    self.state = CarState::Braking;
                }
            }
        }
    }

    /// Ease the speed one step towards what the current state asks for
    pub fn update_speed(&mut self, obstacle: Option<Obstacle>) {
        match self.state {
            CarState::Driving => {
                self.speed = (self.speed + self.acceleration).min(self.max_speed);
            }
            CarState::Braking => {
                let Some(obstacle) = obstacle else {
                    self.state = CarState::Driving;
                    return;
                };
                let target = match obstacle.distance {
                    d if d >= 4 => self.max_speed * 0.7,
                    3 => self.max_speed * 0.5,
                    2 => self.max_speed * 0.3,
                    _ => {
                        self.state = CarState::Stopping;
                        0.0
                    }
                };
                if self.speed > target {
                    self.speed = (self.speed - self.deceleration).max(target);
                } else {
                    self.speed = (self.speed + self.acceleration).min(target);
                }
            }
            CarState::Stopping => {
                self.speed = (self.speed - self.deceleration).max(0.0);
                if self.speed <= 0.0 {
                    self.state = CarState::Stopped;
                }
            }
            CarState::Stopped => self.speed = 0.0,
        }
    }

    /// Move `speed` pixels along the heading unless that would push the
    /// collision box further into another vehicle's box. Backing out of an
    /// existing overlap is always allowed.
    pub fn advance(&mut self, others: &[CarSnapshot]) -> Advance {
        let Some(heading) = self.heading else {
            return Advance::Idle;
        };
        if self.speed <= 0.0 {
            return Advance::Idle;
        }

        let next = self.position.advanced(heading.unit_vector(), self.speed);
        if self.collides_at(next, heading, others) {
            self.speed = (self.speed - 3.0 * self.deceleration).max(0.0);
            self.state = if self.speed <= 0.0 {
                CarState::Stopped
            } else {
                CarState::Stopping
            };
            return Advance::Blocked;
        }

        self.position = next;
        let cell = Cell::containing(next);
        if cell != self.cell {
            self.cell = cell;
            return Advance::EnteredCell(cell);
        }
        Advance::Moved
    }

    fn collides_at(&self, next: Position, heading: Direction, others: &[CarSnapshot]) -> bool {
        let extent = collision_extent(heading);
        let next_center = footprint_center(next);

        others
            .iter()
            .filter(|other| other.id != self.id)
            .any(|other| {
                // A vehicle without a heading is boxed like the mover
                let other_extent = collision_extent(other.heading.unwrap_or(heading));
                boxes_overlap(next_center, extent, other.center(), other_extent)
                    && next.distance_squared(&other.position)
                        <= self.position.distance_squared(&other.position)
            })
    }

    /// Count ticks without pixel movement. Returns true once the vehicle
    /// has been still for longer than [`STUCK_TICKS`].
    fn track_stuck(&mut self) -> bool {
        let current = pixel_key(self.position);
        if current != self.last_pixel {
            self.stuck_ticks = 0;
            self.last_pixel = current;
            return false;
        }
        self.stuck_ticks += 1;
        if self.stuck_ticks > STUCK_TICKS {
            self.stuck_ticks = 0;
            return true;
        }
        false
    }

    /// Turn towards any free drivable neighbour, avoiding a U-turn when
    /// there is a choice, and pull away at half speed
    pub fn force_new_direction<R: Rng + ?Sized>(
        &mut self,
        grid: &GridWorld,
        others: &[CarSnapshot],
        rng: &mut R,
    ) {
        let mut open: Vec<Direction> = Direction::ALL
            .into_iter()
            .filter(|direction| {
                let cell = self.cell.step(*direction);
                grid.is_passable(cell) && !occupied_by_other(others, self.id, cell)
            })
            .collect();

        let reverse = self.heading.map(Direction::opposite);
        if open.len() > 1 {
            open.retain(|direction| Some(*direction) != reverse);
        }

        match open.choose(rng).copied().or(reverse) {
            Some(direction) => {
                debug!(
                    "Car {:?} stuck at {:?}, forcing heading {}",
                    self.id.0,
                    self.cell,
                    direction.symbol()
                );
                self.follow_direction(direction);
            }
            None => debug!("Car {:?} stuck at {:?} with no heading", self.id.0, self.cell),
        }

        self.state = CarState::Driving;
        self.speed = self.max_speed * 0.5;
        self.needs_reroute = true;
    }

    /// Teleport to a random lane cell, preferring unoccupied ones
    pub fn respawn<R: Rng + ?Sized>(&mut self, grid: &GridWorld, others: &[CarSnapshot], rng: &mut R) {
        let lanes = grid.lane_cells();
        let free: Vec<Cell> = lanes
            .iter()
            .copied()
            .filter(|cell| !occupied_by_other(others, self.id, *cell))
            .collect();
        let candidates = if free.is_empty() { &lanes } else { &free };

        let Some(cell) = candidates.choose(rng).copied() else {
            warn!("Car {:?} cannot respawn: map has no lane cells", self.id.0);
            self.speed = 0.0;
            self.state = CarState::Stopped;
            return;
        };

        debug!("Car {:?} respawning at {:?}", self.id.0, cell);
        self.teleport(cell);
        self.state = CarState::Stopped;
        self.needs_reroute = false;
        self.set_initial_direction(grid, rng);
    }

    /// Full per-tick update of an AI car: scan, state, speed, stuck
    /// recovery, position, and the new-cell handler
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        grid: &GridWorld,
        others: &[CarSnapshot],
        rng: &mut R,
    ) -> CarUpdateResult {
        let obstacle = self.look_ahead(grid, others);
        self.update_state(obstacle);
        self.update_speed(obstacle);

        if self.track_stuck() {
            self.force_new_direction(grid, others, rng);
            return CarUpdateResult::RecoveredFromStuck;
        }

        match self.advance(others) {
            Advance::EnteredCell(cell) => self.on_new_cell(cell, grid, others, rng),
            _ => CarUpdateResult::Continue,
        }
    }

    fn on_new_cell<R: Rng + ?Sized>(
        &mut self,
        cell: Cell,
        grid: &GridWorld,
        others: &[CarSnapshot],
        rng: &mut R,
    ) -> CarUpdateResult {
        match grid.tile_at(cell) {
            Some(Tile::Road {
                direction: Some(direction),
                ..
            }) => {
                self.follow_direction(*direction);
                CarUpdateResult::Continue
            }
            Some(Tile::Road {
                direction: None, ..
            }) => self.handle_intersection(grid, others, rng),
            Some(Tile::Crosswalk { .. }) => CarUpdateResult::Continue,
            _ => {
                warn!("Car {:?} drifted off the road at {:?}", self.id.0, cell);
                self.respawn(grid, others, rng);
                CarUpdateResult::Respawned
            }
        }
    }

    fn handle_intersection<R: Rng + ?Sized>(
        &mut self,
        grid: &GridWorld,
        others: &[CarSnapshot],
        rng: &mut R,
    ) -> CarUpdateResult {
        let decision = choose_ai_direction(
            grid,
            self.cell,
            self.heading,
            self.needs_reroute,
            others,
            self.id,
            rng,
        );
        self.needs_reroute = false;

        match decision {
            TurnDecision::Go(direction) => {
                self.follow_direction(direction);
                CarUpdateResult::Continue
            }
            TurnDecision::UTurn(direction) => {
                debug!("Car {:?} boxed in at {:?}, reversing", self.id.0, self.cell);
                self.follow_direction(direction);
                CarUpdateResult::ForcedUTurn
            }
            TurnDecision::Respawn => {
                self.respawn(grid, others, rng);
                CarUpdateResult::Respawned
            }
        }
    }
}

/// Traffic light guarding a crosswalk, looked up on the kerb to the right of
/// the direction of travel
pub fn crosswalk_light(grid: &GridWorld, crosswalk: Cell, heading: Direction) -> Option<LightState> {
    grid.light_state_at(crosswalk.step(heading.right()))
}

/// (width, height) of the shrunk collision box for a heading
pub fn collision_extent(heading: Direction) -> (f32, f32) {
    let long = (CELL_SIZE * COLLISION_LONG_FACTOR).floor();
    let short = (CELL_SIZE * COLLISION_SHORT_FACTOR).floor();
    if heading.is_horizontal() {
        (long, short)
    } else {
        (short, long)
    }
}

/// Whether two axis-aligned boxes, given by center and (width, height),
/// overlap. Touching edges do not count.
pub fn boxes_overlap(a: Position, a_extent: (f32, f32), b: Position, b_extent: (f32, f32)) -> bool {
    (a.x - b.x).abs() < (a_extent.0 + b_extent.0) / 2.0
        && (a.y - b.y).abs() < (a_extent.1 + b_extent.1) / 2.0
}

fn footprint_center(position: Position) -> Position {
    Position::new(position.x + CELL_SIZE / 2.0, position.y + CELL_SIZE / 2.0)
}

fn pixel_key(position: Position) -> (i32, i32) {
    (position.x.floor() as i32, position.y.floor() as i32)
}

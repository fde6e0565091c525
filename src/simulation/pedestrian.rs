//! Pedestrians crossing at signalled crosswalks
//!
//! Crosswalk tiles are grouped into crossings once at start-up. Each
//! pedestrian is bound to one crossing and walks from its waiting point on
//! the kerb to the far side. Whether it steps out depends on the light: it
//! mostly waits for green but occasionally jaywalks on red, and never goes
//! on yellow. Pedestrians that decided to wait get a fresh draw every time
//! their crossing's light changes.

use log::debug;
use ordered_float::OrderedFloat;
use petgraph::unionfind::UnionFind;
use rand::Rng;
use std::collections::{BTreeSet, HashMap};

use super::grid::{GridWorld, LightState, Orientation, Tile};
use super::types::{Cell, PedestrianId, Position, SimId, CELL_SIZE};

/// Pedestrians spawned when the manager is created
pub const INITIAL_BATCH: usize = 15;
pub const MIN_BATCH: usize = 3;
pub const MAX_BATCH: usize = 15;
/// Population cap
pub const MAX_ACTIVE: usize = 20;
/// Seconds between spawn attempts
pub const SPAWN_INTERVAL: f32 = 1.5;

pub const CROSS_ON_RED: f64 = 0.10;
pub const CROSS_ON_GREEN: f64 = 0.90;

/// Walking speed range in pixels per second
const MIN_SPEED: f32 = CELL_SIZE * 1.2;
const MAX_SPEED: f32 = CELL_SIZE * 2.8;
/// Sideways spread of the walking line
const JITTER: f32 = 0.15 * CELL_SIZE;
/// How far the waiting point sits from the light, towards the crosswalk
const LIGHT_OFFSET: f32 = 0.30 * CELL_SIZE;
/// How far past the crosswalk edge the end points sit
const KERB_OFFSET: f32 = 0.45 * CELL_SIZE;
/// Search radius around crosswalk tiles for the controlling light
const LIGHT_SEARCH_RADIUS: i32 = 2;

/// Whether a pedestrian steps onto the crossing under `light`.
/// A crossing without a light behaves like a permanent yellow.
pub fn decide_to_cross<R: Rng + ?Sized>(light: Option<LightState>, rng: &mut R) -> bool {
    match light {
        Some(LightState::Red) => rng.random_bool(CROSS_ON_RED),
        Some(LightState::Green) => rng.random_bool(CROSS_ON_GREEN),
        Some(LightState::Yellow) | None => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PedestrianPhase {
    WalkingToEdge,
    Waiting,
    Crossing,
    Done,
}

/// A group of 4-connected crosswalk tiles crossed as one unit
#[derive(Debug, Clone)]
pub struct Crossing {
    /// Row-major
    pub cells: Vec<Cell>,
    pub orientation: Orientation,
    pub light: Option<Cell>,
    /// Waiting point on the kerb
    pub near: Position,
    /// Where the crossing ends
    pub far: Position,
    last_light: Option<LightState>,
    waiting: BTreeSet<PedestrianId>,
}

impl Crossing {
    fn new(grid: &GridWorld, cells: Vec<Cell>) -> Self {
        let orientation = match cells.first().and_then(|cell| grid.tile_at(*cell)) {
            Some(Tile::Crosswalk { orientation }) => *orientation,
            _ => Orientation::Vertical,
        };
        let mid = cells[cells.len() / 2];
        let light = nearest_light(grid, &cells, mid);

        let min_row = cells.iter().map(|cell| cell.row).min().unwrap_or(mid.row);
        let max_row = cells.iter().map(|cell| cell.row).max().unwrap_or(mid.row);
        let min_col = cells.iter().map(|cell| cell.col).min().unwrap_or(mid.col);
        let max_col = cells.iter().map(|cell| cell.col).max().unwrap_or(mid.col);
        let mid_px = mid.center();

        let near = match light {
            Some(light) => {
                let from = light.center();
                let (near, _) = from.approach(&mid_px, LIGHT_OFFSET);
                near
            }
            None => match orientation {
                Orientation::Vertical => {
                    Position::new(edge_px(min_col) - KERB_OFFSET, mid_px.y)
                }
                Orientation::Horizontal => {
                    Position::new(mid_px.x, edge_px(min_row) - KERB_OFFSET)
                }
            },
        };

        // The far point mirrors the near one across the crosswalk
        let far = match orientation {
            Orientation::Vertical if near.x > mid_px.x => {
                Position::new(edge_px(min_col) - KERB_OFFSET, mid_px.y)
            }
            Orientation::Vertical => Position::new(edge_px(max_col) + KERB_OFFSET, mid_px.y),
            Orientation::Horizontal if near.y > mid_px.y => {
                Position::new(mid_px.x, edge_px(min_row) - KERB_OFFSET)
            }
            Orientation::Horizontal => Position::new(mid_px.x, edge_px(max_row) + KERB_OFFSET),
        };

        Self {
            last_light: light.and_then(|cell| grid.light_state_at(cell)),
            cells,
            orientation,
            light,
            near,
            far,
            waiting: BTreeSet::new(),
        }
    }

    pub fn light_state(&self, grid: &GridWorld) -> Option<LightState> {
        self.light.and_then(|cell| grid.light_state_at(cell))
    }

    /// Pedestrians currently waiting for this crossing's light
    pub fn waiting(&self) -> impl Iterator<Item = &PedestrianId> {
        self.waiting.iter()
    }
}

/// Pixel center coordinate of a row or column index
fn edge_px(index: i32) -> f32 {
    (index as f32 + 0.5) * CELL_SIZE
}

/// Closest traffic light within a small window around the crossing
fn nearest_light(grid: &GridWorld, cells: &[Cell], mid: Cell) -> Option<Cell> {
    let mid_px = mid.center();
    cells
        .iter()
        .flat_map(|cell| {
            (-LIGHT_SEARCH_RADIUS..=LIGHT_SEARCH_RADIUS).flat_map(move |dr| {
                (-LIGHT_SEARCH_RADIUS..=LIGHT_SEARCH_RADIUS)
                    .map(move |dc| Cell::new(cell.row + dr, cell.col + dc))
            })
        })
        .filter(|cell| matches!(grid.tile_at(*cell), Some(Tile::TrafficLight(_))))
        .min_by_key(|cell| (OrderedFloat(cell.center().distance(&mid_px)), *cell))
}

/// Group crosswalk tiles into 4-connected crossings
pub fn find_crossings(grid: &GridWorld) -> Vec<Crossing> {
    let crosswalks: Vec<Cell> = grid
        .cells()
        .filter(|cell| matches!(grid.tile_at(*cell), Some(Tile::Crosswalk { .. })))
        .collect();
    let index: HashMap<Cell, usize> = crosswalks
        .iter()
        .enumerate()
        .map(|(i, cell)| (*cell, i))
        .collect();

    let mut sets = UnionFind::<usize>::new(crosswalks.len());
    for (i, cell) in crosswalks.iter().enumerate() {
        for neighbour in [Cell::new(cell.row + 1, cell.col), Cell::new(cell.row, cell.col + 1)] {
            if let Some(j) = index.get(&neighbour) {
                sets.union(i, *j);
            }
        }
    }

    let mut groups: Vec<Vec<Cell>> = Vec::new();
    let mut group_of_root: HashMap<usize, usize> = HashMap::new();
    for (i, label) in sets.into_labeling().into_iter().enumerate() {
        let group = *group_of_root.entry(label).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[group].push(crosswalks[i]);
    }

    groups
        .into_iter()
        .map(|cells| Crossing::new(grid, cells))
        .collect()
}

#[derive(Debug, Clone)]
pub struct Pedestrian {
    pub id: PedestrianId,
    pub position: Position,
    pub near: Position,
    pub far: Position,
    /// Pixels per second
    pub speed: f32,
    pub phase: PedestrianPhase,
    /// Index into the manager's crossings
    pub crossing: usize,
}

impl Pedestrian {
    /// Grid cell under the pedestrian
    pub fn cell(&self) -> Cell {
        Cell::containing(self.position)
    }

    /// Walk towards the current target, snapping onto it when it is within
    /// one step
    pub fn update(&mut self, dt: f32) {
        let target = match self.phase {
            PedestrianPhase::WalkingToEdge => self.near,
            PedestrianPhase::Crossing => self.far,
            PedestrianPhase::Waiting | PedestrianPhase::Done => return,
        };

        let (position, arrived) = self.position.approach(&target, self.speed * dt);
        self.position = position;
        if arrived {
            self.phase = match self.phase {
                PedestrianPhase::WalkingToEdge => PedestrianPhase::Waiting,
                _ => PedestrianPhase::Done,
            };
        }
    }
}

/// What one manager update changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PedestrianUpdate {
    pub spawned: usize,
    pub finished: usize,
}

/// Owns the crossings and every live pedestrian
#[derive(Debug, Clone)]
pub struct PedestrianManager {
    crossings: Vec<Crossing>,
    pedestrians: Vec<Pedestrian>,
    spawn_timer: f32,
    next_id: usize,
}

impl PedestrianManager {
    /// Index the crossings of `grid` without spawning anyone
    pub fn empty(grid: &GridWorld) -> Self {
        Self {
            crossings: find_crossings(grid),
            pedestrians: Vec::new(),
            spawn_timer: 0.0,
            next_id: 0,
        }
    }

    /// Index the crossings and spawn the initial batch
    pub fn new<R: Rng + ?Sized>(grid: &GridWorld, rng: &mut R) -> Self {
        let mut manager = Self::empty(grid);
        manager.spawn_batch(INITIAL_BATCH, rng);
        manager
    }

    pub fn crossings(&self) -> &[Crossing] {
        &self.crossings
    }

    pub fn pedestrians(&self) -> &[Pedestrian] {
        &self.pedestrians
    }

    pub fn active_count(&self) -> usize {
        self.pedestrians.len()
    }

    /// Cells currently occupied by pedestrians
    pub fn occupied_cells(&self) -> Vec<Cell> {
        self.pedestrians.iter().map(Pedestrian::cell).collect()
    }

    /// Spawn one pedestrian at the waiting point of a random crossing
    pub fn spawn_one<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<PedestrianId> {
        if self.crossings.is_empty() {
            return None;
        }
        let crossing_index = rng.random_range(0..self.crossings.len());
        let crossing = &self.crossings[crossing_index];

        let speed = rng.random_range(MIN_SPEED..MAX_SPEED);
        let jitter = rng.random_range(-JITTER..JITTER);
        let (near, far) = match crossing.orientation {
            Orientation::Vertical => (
                Position::new(crossing.near.x, crossing.near.y + jitter),
                Position::new(crossing.far.x, crossing.far.y + jitter),
            ),
            Orientation::Horizontal => (
                Position::new(crossing.near.x + jitter, crossing.near.y),
                Position::new(crossing.far.x + jitter, crossing.far.y),
            ),
        };

        let id = PedestrianId(SimId(self.next_id));
        self.next_id += 1;
        self.pedestrians.push(Pedestrian {
            id,
            position: near,
            near,
            far,
            speed,
            phase: PedestrianPhase::WalkingToEdge,
            crossing: crossing_index,
        });
        Some(id)
    }

    pub fn spawn_batch<R: Rng + ?Sized>(&mut self, count: usize, rng: &mut R) -> usize {
        (0..count).filter_map(|_| self.spawn_one(rng)).count()
    }

    /// Advance every pedestrian by `dt` seconds: periodic spawning, walking,
    /// crossing decisions and removal of those who made it across
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        grid: &GridWorld,
        dt: f32,
        rng: &mut R,
    ) -> PedestrianUpdate {
        let mut summary = PedestrianUpdate::default();

        self.spawn_timer += dt;
        if self.spawn_timer >= SPAWN_INTERVAL {
            self.spawn_timer = 0.0;
            let active = self.pedestrians.len();
            if active < MAX_ACTIVE {
                let batch = rng.random_range(MIN_BATCH..=MAX_BATCH).min(MAX_ACTIVE - active);
                summary.spawned = self.spawn_batch(batch, rng);
            }
        }

        for pedestrian in &mut self.pedestrians {
            let before = pedestrian.phase;
            pedestrian.update(dt);
            if before == PedestrianPhase::WalkingToEdge
                && pedestrian.phase == PedestrianPhase::Waiting
            {
                let crossing = &mut self.crossings[pedestrian.crossing];
                if decide_to_cross(crossing.light_state(grid), rng) {
                    pedestrian.phase = PedestrianPhase::Crossing;
                } else {
                    crossing.waiting.insert(pedestrian.id);
                }
            }
        }

        let before = self.pedestrians.len();
        let crossings = &mut self.crossings;
        self.pedestrians.retain(|pedestrian| {
            if pedestrian.phase == PedestrianPhase::Done {
                crossings[pedestrian.crossing].waiting.remove(&pedestrian.id);
                false
            } else {
                true
            }
        });
        summary.finished = before - self.pedestrians.len();

        self.react_to_light_changes(grid, rng);
        summary
    }

    fn react_to_light_changes<R: Rng + ?Sized>(&mut self, grid: &GridWorld, rng: &mut R) {
        for crossing in &mut self.crossings {
            let current = crossing.light_state(grid);
            if current == crossing.last_light {
                continue;
            }
            crossing.last_light = current;

            let going: Vec<PedestrianId> = crossing
                .waiting
                .iter()
                .copied()
                .filter(|_| decide_to_cross(current, rng))
                .collect();
            if going.is_empty() {
                continue;
            }
            debug!(
                "{} pedestrians start crossing at {:?} on {:?}",
                going.len(),
                crossing.cells.first(),
                current
            );
            for id in going {
                crossing.waiting.remove(&id);
                if let Some(pedestrian) = self.pedestrians.iter_mut().find(|p| p.id == id) {
                    pedestrian.phase = PedestrianPhase::Crossing;
                }
            }
        }
    }
}

//! Core types for the grid traffic simulation
//!
//! Grid cells, cardinal directions, pixel positions and the tunables shared
//! by every component.

/// A unique identifier for simulation entities
/// This is a simple wrapper around a usize for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SimId(pub usize);

/// A wrapper type for vehicle IDs
///
/// Ids are handed out in increasing order by the simulation root, so the
/// ordering doubles as the right-of-way ranking: lower ids go first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CarId(pub SimId);

/// A wrapper type for pedestrian IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PedestrianId(pub SimId);

/// A grid coordinate. Rows grow southwards, columns grow eastwards.
///
/// Ordering is row-major, which is also the tie-break order of the
/// priority-queue searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    pub row: i32,
    pub col: i32,
}

impl Cell {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// The neighbouring cell one step in `direction`
    pub fn step(self, direction: Direction) -> Cell {
        self.offset(direction, 1)
    }

    /// The cell `distance` steps away in `direction`
    pub fn offset(self, direction: Direction, distance: i32) -> Cell {
        let (dr, dc) = direction.delta();
        Cell::new(self.row + dr * distance, self.col + dc * distance)
    }

    pub fn manhattan(self, other: Cell) -> u32 {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }

    /// Top-left pixel corner of this cell
    pub fn origin(self) -> Position {
        Position::new(self.col as f32 * CELL_SIZE, self.row as f32 * CELL_SIZE)
    }

    /// Pixel center of this cell
    pub fn center(self) -> Position {
        Position::new(
            (self.col as f32 + 0.5) * CELL_SIZE,
            (self.row as f32 + 0.5) * CELL_SIZE,
        )
    }

    /// The cell containing a pixel coordinate (floor division by cell size)
    pub fn containing(position: Position) -> Cell {
        Cell::new(
            (position.y / CELL_SIZE).floor() as i32,
            (position.x / CELL_SIZE).floor() as i32,
        )
    }
}

impl From<(i32, i32)> for Cell {
    fn from((row, col): (i32, i32)) -> Self {
        Cell::new(row, col)
    }
}

/// Cardinal travel direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    /// Order used when enumerating the choices at an intersection
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    /// (row delta, column delta)
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (-1, 0),
            Direction::South => (1, 0),
            Direction::East => (0, 1),
            Direction::West => (0, -1),
        }
    }

    /// Direction of a single 4-adjacent step, `None` for anything else
    pub fn from_delta(dr: i32, dc: i32) -> Option<Direction> {
        match (dr, dc) {
            (-1, 0) => Some(Direction::North),
            (1, 0) => Some(Direction::South),
            (0, 1) => Some(Direction::East),
            (0, -1) => Some(Direction::West),
            _ => None,
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }

    /// 90 degrees counter-clockwise
    pub fn left(self) -> Direction {
        match self {
            Direction::North => Direction::West,
            Direction::West => Direction::South,
            Direction::South => Direction::East,
            Direction::East => Direction::North,
        }
    }

    /// 90 degrees clockwise
    pub fn right(self) -> Direction {
        self.left().opposite()
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::East | Direction::West)
    }

    /// Unit pixel vector (x grows east, y grows south)
    pub fn unit_vector(self) -> (f32, f32) {
        let (dr, dc) = self.delta();
        (dc as f32, dr as f32)
    }

    pub fn symbol(self) -> char {
        match self {
            Direction::North => 'N',
            Direction::South => 'S',
            Direction::East => 'E',
            Direction::West => 'W',
        }
    }
}

/// Dominant-axis cardinal direction from one cell towards another.
///
/// Column distance wins only when strictly larger, so ties go vertical.
pub fn preferred_direction(from: Cell, to: Cell) -> Option<Direction> {
    let dr = to.row - from.row;
    let dc = to.col - from.col;
    if dr == 0 && dc == 0 {
        return None;
    }
    if dc.abs() > dr.abs() {
        Some(if dc > 0 {
            Direction::East
        } else {
            Direction::West
        })
    } else {
        Some(if dr > 0 {
            Direction::South
        } else {
            Direction::North
        })
    }
}

/// A 2D pixel position in the simulation
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f32 {
        self.distance_squared(other).sqrt()
    }

    pub fn distance_squared(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Move `amount` pixels along a unit direction vector
    pub fn advanced(&self, direction: (f32, f32), amount: f32) -> Position {
        Position::new(self.x + direction.0 * amount, self.y + direction.1 * amount)
    }

    /// Move towards `target` by at most `step` pixels, snapping onto it when
    /// it is within reach. Returns the new position and whether it arrived.
    pub fn approach(&self, target: &Position, step: f32) -> (Position, bool) {
        let distance = self.distance(target);
        if distance <= step {
            return (*target, true);
        }
        let ratio = step / distance;
        (
            Position::new(
                self.x + (target.x - self.x) * ratio,
                self.y + (target.y - self.y) * ratio,
            ),
            false,
        )
    }
}

/// Edge length of a grid cell in pixels
pub const CELL_SIZE: f32 = 20.0;

/// Simulation ticks per simulated second
pub const TICKS_PER_SECOND: u32 = 60;

/// Seconds of simulated time covered by one tick
pub const TICK_SECONDS: f32 = 1.0 / TICKS_PER_SECOND as f32;

/// How many cells ahead the obstacle scan looks
pub const LOOKAHEAD_CELLS: u32 = 5;

/// Ticks without any pixel movement before an AI car forces a new heading
pub const STUCK_TICKS: u32 = 6 * TICKS_PER_SECOND;

/// Ticks the agent holds still before rotating during a U-turn
pub const UTURN_WAIT_TICKS: u32 = 3 * TICKS_PER_SECOND;

/// Collision box length along the travel axis, in cells
pub const COLLISION_LONG_FACTOR: f32 = 1.55;

/// Collision box width across the travel axis, in cells
pub const COLLISION_SHORT_FACTOR: f32 = 0.55;

/// Probability that an AI car keeps going straight at an intersection
pub const STRAIGHT_BIAS: f64 = 0.7;

/// Traffic light phase lengths in ticks
pub const RED_LIGHT_TICKS: u32 = 5 * TICKS_PER_SECOND;
pub const GREEN_LIGHT_TICKS: u32 = 5 * TICKS_PER_SECOND;
pub const YELLOW_LIGHT_TICKS: u32 = 2 * TICKS_PER_SECOND;

//! Tile grid the vehicles drive on
//!
//! The grid owns the static road layout, the traffic light timers and the
//! per-tick registry of cells occupied by pedestrians. Vehicles and the
//! pathfinder only ever read it; edits happen between ticks.

use anyhow::{bail, Context, Result};
use std::collections::HashSet;

use super::types::{
    Cell, Direction, GREEN_LIGHT_TICKS, RED_LIGHT_TICKS, YELLOW_LIGHT_TICKS,
};

/// Axis a road or crosswalk runs along
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    /// Whether travel in `direction` runs along this axis
    pub fn allows(self, direction: Direction) -> bool {
        match self {
            Orientation::Horizontal => direction.is_horizontal(),
            Orientation::Vertical => !direction.is_horizontal(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightState {
    Red,
    Yellow,
    Green,
}

/// A fixed-duration cyclic traffic light: red -> green -> yellow -> red
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficLight {
    pub state: LightState,
    pub timer: u32,
}

impl TrafficLight {
    pub fn new(state: LightState) -> Self {
        Self { state, timer: 0 }
    }

    fn phase_ticks(&self) -> u32 {
        match self.state {
            LightState::Red => RED_LIGHT_TICKS,
            LightState::Green => GREEN_LIGHT_TICKS,
            LightState::Yellow => YELLOW_LIGHT_TICKS,
        }
    }

    /// Advance the light by one tick
    pub fn update(&mut self) {
        self.timer += 1;
        if self.timer >= self.phase_ticks() {
            self.timer = 0;
            self.state = match self.state {
                LightState::Red => LightState::Green,
                LightState::Green => LightState::Yellow,
                LightState::Yellow => LightState::Red,
            };
        }
    }
}

/// One grid cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tile {
    /// A lane (`direction` set) or an intersection (`direction` is `None`)
    Road {
        orientation: Orientation,
        direction: Option<Direction>,
    },
    /// Drivable, but only along its orientation
    Crosswalk { orientation: Orientation },
    TrafficLight(TrafficLight),
    Building,
    Grass,
}

impl Tile {
    pub fn lane(direction: Direction) -> Tile {
        let orientation = if direction.is_horizontal() {
            Orientation::Horizontal
        } else {
            Orientation::Vertical
        };
        Tile::Road {
            orientation,
            direction: Some(direction),
        }
    }

    pub fn intersection() -> Tile {
        Tile::Road {
            orientation: Orientation::Horizontal,
            direction: None,
        }
    }

    /// Road and crosswalk tiles can be driven on
    pub fn is_passable(&self) -> bool {
        matches!(self, Tile::Road { .. } | Tile::Crosswalk { .. })
    }

    pub fn is_intersection(&self) -> bool {
        matches!(
            self,
            Tile::Road {
                direction: None,
                ..
            }
        )
    }

    /// Lane direction of a directional road tile
    pub fn lane_direction(&self) -> Option<Direction> {
        match self {
            Tile::Road { direction, .. } => *direction,
            _ => None,
        }
    }

    fn symbol(&self) -> char {
        match self {
            Tile::Road {
                direction: None, ..
            } => '+',
            Tile::Road {
                direction: Some(direction),
                ..
            } => match direction {
                Direction::North => '^',
                Direction::South => 'v',
                Direction::East => '>',
                Direction::West => '<',
            },
            Tile::Crosswalk {
                orientation: Orientation::Horizontal,
            } => '-',
            Tile::Crosswalk {
                orientation: Orientation::Vertical,
            } => '|',
            Tile::TrafficLight(light) => match light.state {
                LightState::Red => 'r',
                LightState::Yellow => 'y',
                LightState::Green => 'g',
            },
            Tile::Building => '#',
            Tile::Grass => '.',
        }
    }

    fn from_symbol(symbol: char) -> Option<Tile> {
        let tile = match symbol {
            '.' => Tile::Grass,
            '#' => Tile::Building,
            '>' => Tile::lane(Direction::East),
            '<' => Tile::lane(Direction::West),
            '^' => Tile::lane(Direction::North),
            'v' => Tile::lane(Direction::South),
            '+' => Tile::intersection(),
            '-' => Tile::Crosswalk {
                orientation: Orientation::Horizontal,
            },
            '|' => Tile::Crosswalk {
                orientation: Orientation::Vertical,
            },
            'r' => Tile::TrafficLight(TrafficLight::new(LightState::Red)),
            'y' => Tile::TrafficLight(TrafficLight::new(LightState::Yellow)),
            'g' => Tile::TrafficLight(TrafficLight::new(LightState::Green)),
            _ => return None,
        };
        Some(tile)
    }
}

/// The tile grid plus the pedestrian registry
#[derive(Debug, Clone)]
pub struct GridWorld {
    width: i32,
    height: i32,
    tiles: Vec<Tile>,
    pedestrian_cells: HashSet<Cell>,
}

impl GridWorld {
    /// A grid of the given size covered in grass
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Self {
            width,
            height,
            tiles: vec![Tile::Grass; (width * height) as usize],
            pedestrian_cells: HashSet::new(),
        }
    }

    /// Build a grid from an ASCII drawing, one character per cell.
    ///
    /// Legend: `.` grass, `#` building, `>` `<` `^` `v` lanes, `+`
    /// intersection, `-` crosswalk crossed east/west, `|` crosswalk crossed
    /// north/south, `r` `y` `g` traffic lights.
    pub fn from_ascii(map: &str) -> Result<Self> {
        let rows: Vec<&str> = map
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        let height = rows.len() as i32;
        let width = rows.first().context("Map has no rows")?.chars().count() as i32;

        let mut grid = GridWorld::new(width, height);
        for (row, line) in rows.iter().enumerate() {
            if line.chars().count() as i32 != width {
                bail!(
                    "Row {} has {} cells, expected {}",
                    row,
                    line.chars().count(),
                    width
                );
            }
            for (col, symbol) in line.chars().enumerate() {
                let tile = Tile::from_symbol(symbol)
                    .with_context(|| format!("Unknown tile '{}' at ({}, {})", symbol, row, col))?;
                grid.set_tile(Cell::new(row as i32, col as i32), tile);
            }
        }
        Ok(grid)
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, cell: Cell) -> bool {
        (0..self.height).contains(&cell.row) && (0..self.width).contains(&cell.col)
    }

    fn index(&self, cell: Cell) -> Option<usize> {
        self.in_bounds(cell)
            .then(|| (cell.row * self.width + cell.col) as usize)
    }

    /// Tile at a cell, `None` outside the grid
    pub fn tile_at(&self, cell: Cell) -> Option<&Tile> {
        self.index(cell).map(|index| &self.tiles[index])
    }

    /// Replace a tile. Out-of-bounds writes are ignored.
    pub fn set_tile(&mut self, cell: Cell, tile: Tile) {
        if let Some(index) = self.index(cell) {
            self.tiles[index] = tile;
        }
    }

    pub fn is_passable(&self, cell: Cell) -> bool {
        self.tile_at(cell).is_some_and(Tile::is_passable)
    }

    /// State of the traffic light at a cell, if there is one
    pub fn light_state_at(&self, cell: Cell) -> Option<LightState> {
        match self.tile_at(cell) {
            Some(Tile::TrafficLight(light)) => Some(light.state),
            _ => None,
        }
    }

    /// Advance every traffic light by one tick
    pub fn update(&mut self) {
        for tile in &mut self.tiles {
            if let Tile::TrafficLight(light) = tile {
                light.update();
            }
        }
    }

    /// All cells in row-major order
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (0..self.height).flat_map(move |row| (0..self.width).map(move |col| Cell::new(row, col)))
    }

    /// Directional lane cells, the valid spawn points for AI cars
    pub fn lane_cells(&self) -> Vec<Cell> {
        self.cells()
            .filter(|cell| {
                self.tile_at(*cell)
                    .and_then(Tile::lane_direction)
                    .is_some()
            })
            .collect()
    }

    /// Replace the pedestrian registry with the cells occupied this tick
    pub fn set_pedestrian_cells(&mut self, cells: impl IntoIterator<Item = Cell>) {
        self.pedestrian_cells.clear();
        self.pedestrian_cells.extend(cells);
    }

    pub fn has_pedestrian(&self, cell: Cell) -> bool {
        self.pedestrian_cells.contains(&cell)
    }

    pub fn pedestrian_cells(&self) -> impl Iterator<Item = &Cell> {
        self.pedestrian_cells.iter()
    }

    /// Paint a two-lane road segment between two cells on one row or column.
    ///
    /// A vertical segment occupies columns `c` (southbound) and `c + 1`
    /// (northbound); a horizontal one rows `r` (westbound) and `r + 1`
    /// (eastbound). Where it crosses a perpendicular road the cell becomes
    /// an intersection.
    pub fn paint_road(&mut self, from: Cell, to: Cell) -> Result<()> {
        if from.col == to.col {
            for row in from.row.min(to.row)..=from.row.max(to.row) {
                self.paint_lane(Cell::new(row, from.col), Direction::South);
                self.paint_lane(Cell::new(row, from.col + 1), Direction::North);
            }
        } else if from.row == to.row {
            for col in from.col.min(to.col)..=from.col.max(to.col) {
                self.paint_lane(Cell::new(from.row, col), Direction::West);
                self.paint_lane(Cell::new(from.row + 1, col), Direction::East);
            }
        } else {
            bail!("Road from {:?} to {:?} is not axis aligned", from, to);
        }
        Ok(())
    }

    fn paint_lane(&mut self, cell: Cell, direction: Direction) {
        let tile = match self.tile_at(cell) {
            None => return,
            Some(Tile::Road {
                direction: None, ..
            }) => Tile::intersection(),
            Some(Tile::Road {
                direction: Some(existing),
                ..
            }) if existing.is_horizontal() != direction.is_horizontal() => Tile::intersection(),
            Some(_) => Tile::lane(direction),
        };
        self.set_tile(cell, tile);
    }

    /// Lay a crosswalk across both lanes of a road and put its light on the
    /// kerb. Vertical crossings cover `(r, c)` and `(r, c + 1)` with the
    /// light at `(r, c + 2)`; horizontal ones cover `(r, c)` and `(r + 1, c)`
    /// with the light at `(r + 2, c)`.
    pub fn place_crosswalk_and_light(
        &mut self,
        at: Cell,
        orientation: Orientation,
        state: LightState,
    ) {
        let crosswalk = Tile::Crosswalk { orientation };
        let (second, light) = match orientation {
            Orientation::Vertical => (Cell::new(at.row, at.col + 1), Cell::new(at.row, at.col + 2)),
            Orientation::Horizontal => {
                (Cell::new(at.row + 1, at.col), Cell::new(at.row + 2, at.col))
            }
        };
        self.set_tile(at, crosswalk.clone());
        self.set_tile(second, crosswalk);
        self.set_tile(light, Tile::TrafficLight(TrafficLight::new(state)));
    }

    /// The default map used by the headless runner: a three by three
    /// lattice of two-lane roads with signalled crossings and buildings.
    pub fn demo_city() -> Result<Self> {
        let mut grid = GridWorld::new(40, 24);

        for col in [5, 19, 33] {
            grid.paint_road(Cell::new(0, col), Cell::new(23, col))?;
        }
        for row in [4, 12, 19] {
            grid.paint_road(Cell::new(row, 0), Cell::new(row, 39))?;
        }

        let crossings = [
            (Cell::new(8, 5), Orientation::Vertical, LightState::Green),
            (Cell::new(16, 19), Orientation::Vertical, LightState::Red),
            (Cell::new(9, 33), Orientation::Vertical, LightState::Green),
            (Cell::new(12, 10), Orientation::Horizontal, LightState::Red),
            (Cell::new(4, 26), Orientation::Horizontal, LightState::Green),
            (Cell::new(19, 27), Orientation::Horizontal, LightState::Red),
        ];
        for (at, orientation, state) in crossings {
            grid.place_crosswalk_and_light(at, orientation, state);
        }

        let buildings = [
            (1, 1),
            (1, 2),
            (2, 10),
            (2, 11),
            (8, 12),
            (9, 12),
            (8, 25),
            (9, 26),
            (15, 2),
            (16, 2),
            (15, 28),
            (16, 37),
            (22, 10),
            (22, 26),
        ];
        for (row, col) in buildings {
            let cell = Cell::new(row, col);
            if grid.tile_at(cell) == Some(&Tile::Grass) {
                grid.set_tile(cell, Tile::Building);
            }
        }

        Ok(grid)
    }

    /// Render the grid as text, with overlays (vehicles etc.) drawn on top.
    /// Pedestrians in the registry are shown as `p`.
    pub fn render_ascii(&self, overlays: &[(Cell, char)]) -> String {
        let mut rows: Vec<Vec<char>> = (0..self.height)
            .map(|row| {
                (0..self.width)
                    .map(|col| {
                        self.tile_at(Cell::new(row, col))
                            .map(Tile::symbol)
                            .unwrap_or(' ')
                    })
                    .collect()
            })
            .collect();

        let pedestrians = self.pedestrian_cells.iter().map(|cell| (*cell, 'p'));
        for (cell, symbol) in pedestrians.chain(overlays.iter().copied()) {
            if self.in_bounds(cell) {
                rows[cell.row as usize][cell.col as usize] = symbol;
            }
        }

        let mut out = String::new();
        for row in rows {
            out.extend(row);
            out.push('\n');
        }
        out
    }
}

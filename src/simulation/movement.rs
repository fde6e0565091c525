//! Movement legality between adjacent cells
//!
//! Shared by the pathfinder and by live vehicle turning so that every
//! computed path is one a vehicle is actually allowed to drive.

use super::grid::{GridWorld, Tile};
use super::types::{Cell, Direction};

/// Direction of a single 4-adjacent step from `from` to `to`
pub fn move_direction(from: Cell, to: Cell) -> Option<Direction> {
    Direction::from_delta(to.row - from.row, to.col - from.col)
}

/// Whether a tile lets traffic pass through it in `direction`.
///
/// Crosswalks only allow travel along their axis, lanes only along their
/// direction; intersections allow everything.
pub fn tile_allows(tile: &Tile, direction: Direction) -> bool {
    match tile {
        Tile::Crosswalk { orientation } => orientation.allows(direction),
        Tile::Road {
            direction: lane, ..
        } => lane.is_none() || *lane == Some(direction),
        _ => false,
    }
}

/// Whether a vehicle may step from `from` to the adjacent cell `to`
pub fn can_move(grid: &GridWorld, from: Cell, to: Cell) -> bool {
    let Some(direction) = move_direction(from, to) else {
        return false;
    };
    match (grid.tile_at(from), grid.tile_at(to)) {
        (Some(from_tile), Some(to_tile)) => {
            tile_allows(from_tile, direction) && tile_allows(to_tile, direction)
        }
        _ => false,
    }
}

/// Whether a vehicle standing on `from` may leave it heading `direction`
pub fn can_move_towards(grid: &GridWorld, from: Cell, direction: Direction) -> bool {
    can_move(grid, from, from.step(direction))
}

//! Turn selection for vehicles entering an intersection cell

use log::debug;
use rand::seq::IndexedRandom;
use rand::Rng;

use super::car::{occupied_by_other, CarSnapshot};
use super::grid::GridWorld;
use super::movement::can_move_towards;
use super::types::{preferred_direction, CarId, Cell, Direction, STRAIGHT_BIAS};

/// What an AI car does on an intersection cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnDecision {
    Go(Direction),
    /// Nothing is open: reverse in place
    UTurn(Direction),
    /// No heading to reverse either
    Respawn,
}

/// What the agent does on an intersection cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentTurn {
    Go(Direction),
    /// Stop and re-evaluate next tick
    Wait,
}

/// Directions that are legal to leave `cell` by and lead to a cell no other
/// vehicle is on, in [`Direction::ALL`] order
pub fn open_directions(
    grid: &GridWorld,
    cell: Cell,
    others: &[CarSnapshot],
    me: CarId,
) -> Vec<Direction> {
    Direction::ALL
        .into_iter()
        .filter(|direction| {
            can_move_towards(grid, cell, *direction)
                && !occupied_by_other(others, me, cell.step(*direction))
        })
        .collect()
}

/// Pick an exit for an AI car.
///
/// Normally the U-turn is only used when it is the sole way out and going
/// straight is preferred with probability [`STRAIGHT_BIAS`]. A car that
/// just recovered from being stuck (`needs_reroute`) must not go straight
/// and may turn back.
pub fn choose_ai_direction<R: Rng + ?Sized>(
    grid: &GridWorld,
    cell: Cell,
    heading: Option<Direction>,
    needs_reroute: bool,
    others: &[CarSnapshot],
    me: CarId,
    rng: &mut R,
) -> TurnDecision {
    let open = open_directions(grid, cell, others, me);
    let reverse = heading.map(Direction::opposite);

    if needs_reroute {
        let detours: Vec<Direction> = open
            .iter()
            .copied()
            .filter(|direction| Some(*direction) != heading)
            .collect();
        if let Some(direction) = detours.choose(rng) {
            debug!("Car {:?} rerouting via {} at {:?}", me.0, direction.symbol(), cell);
            return TurnDecision::Go(*direction);
        }
    }

    let mut options: Vec<Direction> = open
        .iter()
        .copied()
        .filter(|direction| Some(*direction) != reverse)
        .collect();
    if options.is_empty() {
        options = open;
    }

    if let Some(straight) = heading.filter(|straight| options.contains(straight)) {
        if rng.random_bool(STRAIGHT_BIAS) {
            return TurnDecision::Go(straight);
        }
    }

    match (options.choose(rng), reverse) {
        (Some(direction), _) => TurnDecision::Go(*direction),
        (None, Some(reverse)) => TurnDecision::UTurn(reverse),
        (None, None) => TurnDecision::Respawn,
    }
}

/// Pick an exit for the agent: head towards `waypoint` along the dominant
/// axis if that way is open, otherwise take any open way. The U-turn is
/// only considered while a replan is pending.
#[allow(clippy::too_many_arguments)]
pub fn choose_agent_direction<R: Rng + ?Sized>(
    grid: &GridWorld,
    cell: Cell,
    heading: Option<Direction>,
    waypoint: Option<Cell>,
    allow_uturn: bool,
    others: &[CarSnapshot],
    me: CarId,
    rng: &mut R,
) -> AgentTurn {
    let reverse = heading.map(Direction::opposite);
    let valid: Vec<Direction> = open_directions(grid, cell, others, me)
        .into_iter()
        .filter(|direction| allow_uturn || Some(*direction) != reverse)
        .collect();

    let preferred = waypoint.and_then(|waypoint| preferred_direction(cell, waypoint));
    if let Some(direction) = preferred.filter(|direction| valid.contains(direction)) {
        return AgentTurn::Go(direction);
    }

    match valid.choose(rng) {
        Some(direction) => AgentTurn::Go(*direction),
        None => AgentTurn::Wait,
    }
}

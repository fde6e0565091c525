//! Errors that cross the simulation core boundary

use thiserror::Error;

use super::types::Cell;

/// Errors raised synchronously by positioning calls
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimError {
    /// Target cell is outside the grid or not drivable
    #[error("invalid position ({row}, {col}): {reason}")]
    InvalidPosition {
        row: i32,
        col: i32,
        reason: &'static str,
    },
}

impl SimError {
    pub fn invalid_position(cell: Cell, reason: &'static str) -> Self {
        SimError::InvalidPosition {
            row: cell.row,
            col: cell.col,
            reason,
        }
    }
}

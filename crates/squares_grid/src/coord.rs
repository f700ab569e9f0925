//! Grid coordinates for the 10x10 squares board.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Number of rows (and columns) on the grid.
pub const GRID_SIZE: usize = 10;

/// Number of squares on the grid.
pub const CELL_COUNT: usize = GRID_SIZE * GRID_SIZE;

/// A square's position: row and column, each in `0..10`.
///
/// Construction is validated, so a `GridCoord` in hand always addresses a
/// real square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawCoord")]
pub struct GridCoord {
    row: u8,
    col: u8,
}

#[derive(Deserialize)]
struct RawCoord {
    row: u8,
    col: u8,
}

impl TryFrom<RawCoord> for GridCoord {
    type Error = ValidationError;

    fn try_from(raw: RawCoord) -> Result<Self, Self::Error> {
        Self::new(raw.row, raw.col)
    }
}

impl GridCoord {
    /// Creates a coordinate, rejecting anything off the grid.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::CoordinateOutOfRange`] if either axis is `>= 10`.
    #[instrument]
    pub fn new(row: u8, col: u8) -> Result<Self, ValidationError> {
        if usize::from(row) >= GRID_SIZE || usize::from(col) >= GRID_SIZE {
            return Err(ValidationError::CoordinateOutOfRange { row, col });
        }
        Ok(Self { row, col })
    }

    /// Creates a coordinate from a row-major index (0-99).
    pub fn from_index(index: usize) -> Option<Self> {
        if index >= CELL_COUNT {
            return None;
        }
        Some(Self {
            row: (index / GRID_SIZE) as u8,
            col: (index % GRID_SIZE) as u8,
        })
    }

    /// Row-major index (0-99).
    pub fn index(self) -> usize {
        usize::from(self.row) * GRID_SIZE + usize::from(self.col)
    }

    /// Row index.
    pub fn row(self) -> u8 {
        self.row
    }

    /// Column index.
    pub fn col(self) -> u8 {
        self.col
    }

    /// All 100 coordinates in row-major order.
    pub fn all() -> impl Iterator<Item = GridCoord> {
        (0..CELL_COUNT).filter_map(Self::from_index)
    }
}

impl std::fmt::Display for GridCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_off_grid() {
        assert!(GridCoord::new(9, 9).is_ok());
        assert_eq!(
            GridCoord::new(10, 0),
            Err(ValidationError::CoordinateOutOfRange { row: 10, col: 0 })
        );
        assert!(GridCoord::new(0, 10).is_err());
    }

    #[test]
    fn test_index_is_row_major() {
        let coord = GridCoord::new(3, 7).unwrap();
        assert_eq!(coord.index(), 37);
        assert_eq!(GridCoord::from_index(37), Some(coord));
        assert_eq!(GridCoord::from_index(100), None);
    }

    #[test]
    fn test_all_covers_grid_once() {
        let all: Vec<_> = GridCoord::all().collect();
        assert_eq!(all.len(), CELL_COUNT);
        assert_eq!(all[0], GridCoord::new(0, 0).unwrap());
        assert_eq!(all[99], GridCoord::new(9, 9).unwrap());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: GridCoord = serde_json::from_str(r#"{"row":2,"col":5}"#).unwrap();
        assert_eq!(ok, GridCoord::new(2, 5).unwrap());
        let bad: Result<GridCoord, _> = serde_json::from_str(r#"{"row":12,"col":5}"#);
        assert!(bad.is_err());
    }
}

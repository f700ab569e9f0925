//! Point-in-time view of a whole grid.

use crate::coord::{CELL_COUNT, GridCoord};
use crate::numbers::AssignedNumbers;
use crate::phases::Phase;
use crate::types::{PlayerId, SquareState, Team};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// Per-status square totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SquareCounts {
    /// Squares still free.
    pub unclaimed: usize,
    /// Squares owned by a player.
    pub claimed: usize,
    /// Squares voided at lock.
    pub void: usize,
}

/// The 100 square states of a game plus its phase and digits.
///
/// `squares` is indexed row-major by [`GridCoord::index`]. Digits are
/// `None` until numbers are released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct GridSnapshot {
    phase: Phase,
    row_team: Team,
    numbers: Option<AssignedNumbers>,
    squares: Vec<SquareState>,
}

impl GridSnapshot {
    /// An all-unclaimed grid.
    pub fn new(phase: Phase, row_team: Team, numbers: Option<AssignedNumbers>) -> Self {
        Self {
            phase,
            row_team,
            numbers,
            squares: vec![SquareState::Unclaimed; CELL_COUNT],
        }
    }

    /// Builds a grid from stored square states; unspecified squares are unclaimed.
    pub fn from_squares(
        phase: Phase,
        row_team: Team,
        numbers: Option<AssignedNumbers>,
        squares: impl IntoIterator<Item = (GridCoord, SquareState)>,
    ) -> Self {
        let mut snapshot = Self::new(phase, row_team, numbers);
        for (coord, state) in squares {
            snapshot.set(coord, state);
        }
        snapshot
    }

    /// Overwrites one square.
    pub fn set(&mut self, coord: GridCoord, state: SquareState) {
        if let Some(slot) = self.squares.get_mut(coord.index()) {
            *slot = state;
        }
    }

    /// State of one square.
    pub fn square(&self, coord: GridCoord) -> SquareState {
        self.squares
            .get(coord.index())
            .copied()
            .unwrap_or(SquareState::Unclaimed)
    }

    /// Every square with its coordinate, row-major.
    pub fn iter(&self) -> impl Iterator<Item = (GridCoord, SquareState)> + '_ {
        GridCoord::all().zip(self.squares.iter().copied())
    }

    /// Squares owned by `player`.
    pub fn owned_by(&self, player: PlayerId) -> Vec<GridCoord> {
        self.iter()
            .filter(|(_, state)| state.owner() == Some(player))
            .map(|(coord, _)| coord)
            .collect()
    }

    /// Totals by status.
    pub fn counts(&self) -> SquareCounts {
        self.squares
            .iter()
            .fold(SquareCounts::default(), |mut counts, state| {
                match state {
                    SquareState::Unclaimed => counts.unclaimed += 1,
                    SquareState::Claimed(_) => counts.claimed += 1,
                    SquareState::Void => counts.void += 1,
                }
                counts
            })
    }

    /// True when every square is owned.
    pub fn is_full(&self) -> bool {
        self.counts().claimed == CELL_COUNT
    }
}

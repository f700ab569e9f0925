//! Per-quarter winner lookup.
//!
//! The row team's last score digit picks a row, the other team's picks a
//! column; whoever owns the intersection wins the quarter. A void (or
//! revoked) intersection is a quarter without a winner, not an error.

use crate::coord::GridCoord;
use crate::error::StateError;
use crate::phases::Phase;
use crate::snapshot::GridSnapshot;
use crate::types::{PlayerId, Quarter, SquareState, Team};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// What the winning intersection held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "player", rename_all = "snake_case")]
pub enum QuarterOutcome {
    /// The square's owner wins.
    Winner(PlayerId),
    /// The square was voided at lock; nobody wins.
    Void,
    /// The square's claim was revoked after lock; nobody wins.
    Unclaimed,
}

impl QuarterOutcome {
    /// The winning player, if any.
    pub fn winner(&self) -> Option<PlayerId> {
        match self {
            QuarterOutcome::Winner(player) => Some(*player),
            QuarterOutcome::Void | QuarterOutcome::Unclaimed => None,
        }
    }
}

/// Result of resolving one quarter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarterResult {
    /// Quarter the scores belong to.
    pub quarter: Quarter,
    /// Last digit of team A's score.
    pub digit_a: u8,
    /// Last digit of team B's score.
    pub digit_b: u8,
    /// Intersection selected by the digits.
    pub coord: GridCoord,
    /// Who, if anyone, wins.
    pub outcome: QuarterOutcome,
}

/// Stateless winner lookup over a released grid.
#[derive(Debug, Clone, Copy, Default)]
pub struct WinnerResolver;

impl WinnerResolver {
    /// Resolves the winning square for one quarter's scores.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::NumbersNotReleased`] unless the grid has
    /// released digits.
    #[instrument(skip(self, grid), fields(phase = %grid.phase()))]
    pub fn resolve(
        &self,
        grid: &GridSnapshot,
        quarter: Quarter,
        score_a: u32,
        score_b: u32,
    ) -> Result<QuarterResult, StateError> {
        let numbers = match (grid.phase(), grid.numbers()) {
            (Phase::NumbersReleased, Some(numbers)) => numbers,
            (phase, _) => return Err(StateError::NumbersNotReleased(*phase)),
        };

        let digit_a = (score_a % 10) as u8;
        let digit_b = (score_b % 10) as u8;
        let (row_digit, col_digit) = match grid.row_team() {
            Team::A => (digit_a, digit_b),
            Team::B => (digit_b, digit_a),
        };

        // Both axes are permutations of 0-9, so every digit has an index.
        let row = numbers.rows().position_of(row_digit).unwrap_or_default();
        let col = numbers.cols().position_of(col_digit).unwrap_or_default();
        let coord = GridCoord::new(row as u8, col as u8)
            .map_err(|_| StateError::NumbersNotReleased(*grid.phase()))?;

        let outcome = match grid.square(coord) {
            SquareState::Claimed(player) => QuarterOutcome::Winner(player),
            SquareState::Void => QuarterOutcome::Void,
            SquareState::Unclaimed => QuarterOutcome::Unclaimed,
        };

        debug!(%quarter, %coord, ?outcome, "Quarter resolved");
        Ok(QuarterResult {
            quarter,
            digit_a,
            digit_b,
            coord,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numbers::{AssignedNumbers, DigitPermutation};

    fn released(row_team: Team, squares: Vec<(GridCoord, SquareState)>) -> GridSnapshot {
        let numbers = AssignedNumbers::new(
            DigitPermutation::new([7, 2, 9, 0, 4, 1, 8, 3, 6, 5]).unwrap(),
            DigitPermutation::new([3, 8, 0, 5, 2, 9, 1, 6, 4, 7]).unwrap(),
        );
        let mut grid =
            GridSnapshot::from_squares(Phase::NumbersReleased, row_team, Some(numbers), squares);
        // Everything not claimed was voided at lock.
        for coord in GridCoord::all() {
            if grid.square(coord).is_unclaimed() {
                grid.set(coord, SquareState::Void);
            }
        }
        grid
    }

    #[test]
    fn test_winning_intersection() {
        let origin = GridCoord::new(0, 0).unwrap();
        let grid = released(Team::A, vec![(origin, SquareState::Claimed(1))]);
        let result = WinnerResolver.resolve(&grid, Quarter::First, 17, 23).unwrap();
        assert_eq!(result.coord, origin);
        assert_eq!(result.digit_a, 7);
        assert_eq!(result.digit_b, 3);
        assert_eq!(result.outcome, QuarterOutcome::Winner(1));
    }

    #[test]
    fn test_void_intersection_has_no_winner() {
        let origin = GridCoord::new(0, 0).unwrap();
        let grid = released(Team::A, vec![(origin, SquareState::Claimed(1))]);
        // 20 -> row digit 0 at index 3; 14 -> col digit 4 at index 8.
        let result = WinnerResolver.resolve(&grid, Quarter::Second, 20, 14).unwrap();
        assert_eq!(result.coord, GridCoord::new(3, 8).unwrap());
        assert_eq!(result.outcome, QuarterOutcome::Void);
        assert_eq!(result.outcome.winner(), None);
    }

    #[test]
    fn test_row_team_b_swaps_axes() {
        // Team B on rows: B digit 7 -> row 0, A digit 3 -> col 0.
        let origin = GridCoord::new(0, 0).unwrap();
        let grid = released(Team::B, vec![(origin, SquareState::Claimed(9))]);
        let result = WinnerResolver.resolve(&grid, Quarter::Third, 23, 17).unwrap();
        assert_eq!(result.coord, origin);
        assert_eq!(result.outcome.winner(), Some(9));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let center = GridCoord::new(5, 5).unwrap();
        let grid = released(Team::A, vec![(center, SquareState::Claimed(2))]);
        let first = WinnerResolver.resolve(&grid, Quarter::Fourth, 31, 42).unwrap();
        let second = WinnerResolver.resolve(&grid, Quarter::Fourth, 31, 42).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_before_release_is_state_error() {
        let grid = GridSnapshot::new(Phase::Locked, Team::A, None);
        assert_eq!(
            WinnerResolver.resolve(&grid, Quarter::First, 7, 3),
            Err(StateError::NumbersNotReleased(Phase::Locked))
        );
    }
}

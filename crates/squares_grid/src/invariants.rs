//! Grid invariants.
//!
//! Logical properties every stored grid must satisfy, whatever sequence of
//! claims, revokes and transitions produced it.

use crate::coord::CELL_COUNT;
use crate::phases::Phase;
use crate::snapshot::GridSnapshot;

/// A logical property that must hold for a given state.
pub trait Invariant<S> {
    /// Checks if the invariant holds for the given state.
    fn holds(state: &S) -> bool;

    /// Human-readable description of the invariant.
    fn description() -> &'static str;
}

/// Violation of an invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation {
    /// Description of the violated invariant.
    pub description: String,
}

impl InvariantViolation {
    /// Creates a new invariant violation.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

/// A set of invariants that can be checked together.
pub trait InvariantSet<S> {
    /// Checks all invariants in the set, collecting every violation.
    fn check_all(state: &S) -> Result<(), Vec<InvariantViolation>>;
}

impl<S, I1, I2, I3> InvariantSet<S> for (I1, I2, I3)
where
    I1: Invariant<S>,
    I2: Invariant<S>,
    I3: Invariant<S>,
{
    fn check_all(state: &S) -> Result<(), Vec<InvariantViolation>> {
        let violations: Vec<_> = [
            (I1::holds(state), I1::description()),
            (I2::holds(state), I2::description()),
            (I3::holds(state), I3::description()),
        ]
        .into_iter()
        .filter(|(holds, _)| !holds)
        .map(|(_, description)| InvariantViolation::new(description))
        .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

/// Invariant: the grid has exactly 100 squares.
pub struct FullGridInvariant;

impl Invariant<GridSnapshot> for FullGridInvariant {
    fn holds(grid: &GridSnapshot) -> bool {
        grid.squares().len() == CELL_COUNT
    }

    fn description() -> &'static str {
        "Grid holds exactly 100 squares"
    }
}

/// Invariant: digits exist exactly when the phase says they were released.
///
/// Digits themselves are [`crate::DigitPermutation`]s, so "partially
/// assigned" is unrepresentable; this checks the phase agrees.
pub struct DigitsMatchPhaseInvariant;

impl Invariant<GridSnapshot> for DigitsMatchPhaseInvariant {
    fn holds(grid: &GridSnapshot) -> bool {
        grid.numbers().is_some() == (*grid.phase() == Phase::NumbersReleased)
    }

    fn description() -> &'static str {
        "Row and column digits are set if and only if numbers are released"
    }
}

/// Invariant: an open grid has no void squares.
///
/// VOID only arises from locking, and unlocking restores every square the
/// lock voided.
pub struct NoVoidWhileOpenInvariant;

impl Invariant<GridSnapshot> for NoVoidWhileOpenInvariant {
    fn holds(grid: &GridSnapshot) -> bool {
        *grid.phase() != Phase::Open || grid.counts().void == 0
    }

    fn description() -> &'static str {
        "Open grids contain no void squares"
    }
}

/// All grid invariants as a composable set.
pub type GridInvariants = (FullGridInvariant, DigitsMatchPhaseInvariant, NoVoidWhileOpenInvariant);

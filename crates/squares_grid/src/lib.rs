//! Pure squares-pool logic.
//!
//! A squares pool is a 10x10 grid of claimable squares. Once the grid locks,
//! rows and columns are each assigned a random ordering of the digits 0-9,
//! and each quarter's winner is the owner of the square where the teams'
//! last score digits intersect.
//!
//! This crate has no I/O. It defines:
//!
//! - **Coordinates and square states**: [`GridCoord`], [`SquareState`]
//! - **Lifecycle**: [`Phase`] and the [`Transition`]s between phases
//! - **Digit assignment**: [`NumberAssignor`] over a [`SecureRandom`] source
//! - **Winner lookup**: [`WinnerResolver`] over a [`GridSnapshot`]
//! - **Errors**: the validation/state/conflict/permission/not-found taxonomy
//!
//! # Example
//!
//! ```
//! use squares_grid::{
//!     GridCoord, GridSnapshot, NumberAssignor, Phase, Quarter, SquareState, Team, WinnerResolver,
//! };
//!
//! let mut rng = squares_grid::os_random();
//! let numbers = NumberAssignor.assign(&mut rng);
//! let grid = GridSnapshot::from_squares(
//!     Phase::NumbersReleased,
//!     Team::A,
//!     Some(numbers),
//!     GridCoord::all().map(|coord| (coord, SquareState::Claimed(1))),
//! );
//! let result = WinnerResolver.resolve(&grid, Quarter::First, 17, 23).unwrap();
//! assert_eq!(result.outcome.winner(), Some(1));
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod coord;
mod error;
mod invariants;
mod numbers;
mod phases;
mod snapshot;
mod types;
mod winner;

pub use coord::{CELL_COUNT, GRID_SIZE, GridCoord};
pub use error::{ConflictError, NotFoundError, PermissionError, StateError, ValidationError};
pub use invariants::{
    DigitsMatchPhaseInvariant, FullGridInvariant, GridInvariants, Invariant, InvariantSet,
    InvariantViolation, NoVoidWhileOpenInvariant,
};
pub use numbers::{AssignedNumbers, DigitPermutation, NumberAssignor, SecureRandom, os_random};
pub use phases::{Phase, Transition};
pub use snapshot::{GridSnapshot, SquareCounts};
pub use types::{
    Decision, GameCode, GameId, MAX_COUNT, PlayerId, Quarter, RequestId, RequestStatus, SquareState,
    Team, check_count,
};
pub use winner::{QuarterOutcome, QuarterResult, WinnerResolver};

//! Error taxonomy shared by every squares operation.
//!
//! Each class answers a different question for the caller:
//! fix the input ([`ValidationError`]), wait for a different phase
//! ([`StateError`]), pick another target ([`ConflictError`]), ask someone
//! with more rights ([`PermissionError`]), or check the reference
//! ([`NotFoundError`]).

use crate::{GameId, GridCoord, Phase, PlayerId, RequestId, RequestStatus, Transition};

/// Malformed input. Always caller-fixable.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum ValidationError {
    /// Row or column outside `0..10`.
    #[display("Coordinate ({row}, {col}) is outside the 10x10 grid")]
    CoordinateOutOfRange {
        /// Requested row.
        row: u8,
        /// Requested column.
        col: u8,
    },

    /// A count that must be positive was zero.
    #[display("{_0} must be greater than zero")]
    NonPositiveCount(&'static str),

    /// A count, or a total it feeds, exceeds [`MAX_COUNT`](crate::MAX_COUNT).
    #[display("{_0} must not exceed {max}", max = crate::MAX_COUNT)]
    CountTooLarge(&'static str),

    /// A digit sequence is not a permutation of 0-9.
    #[display("Invalid digit sequence: {_0}")]
    InvalidDigits(String),

    /// Game code is not six alphanumeric characters.
    #[display("Game code must be exactly 6 alphanumeric characters, got '{_0}'")]
    InvalidCode(String),

    /// A required text field was blank.
    #[display("{_0} is required")]
    EmptyField(&'static str),

    /// Display name longer than allowed.
    #[display("Name must be at most {max} characters")]
    NameTooLong {
        /// Character limit.
        max: usize,
    },

    /// Display name reserved for the grid itself.
    #[display("The name '{_0}' is not allowed")]
    ReservedName(String),

    /// Price below zero.
    #[display("Price per square must not be negative, got {_0}")]
    NegativePrice(i64),

    /// Quarter number not in 1-5.
    #[display("Unknown quarter {_0} (expected 1-4, or 5 for overtime)")]
    UnknownQuarter(u8),
}

impl std::error::Error for ValidationError {}

/// Operation is illegal in the game's current phase.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum StateError {
    /// Claims and joins require an open grid.
    #[display("Grid is not open for claims (phase: {_0})")]
    GridNotOpen(Phase),

    /// The requested phase transition does not start from the current phase.
    #[display("Cannot {transition} while the grid is {phase}")]
    IllegalTransition {
        /// Attempted transition.
        transition: Transition,
        /// Phase the game was in.
        phase: Phase,
    },

    /// Winner lookup before numbers exist.
    #[display("Numbers have not been released (phase: {_0})")]
    NumbersNotReleased(Phase),

    /// A claim request was already decided.
    #[display("Request is already {_0}")]
    RequestResolved(RequestStatus),
}

impl std::error::Error for StateError {}

/// Lost race or exhausted allowance. The caller may retry elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum ConflictError {
    /// Another player holds the square (or it is no longer claimable).
    #[display("Square {_0} is already claimed")]
    AlreadyClaimed(GridCoord),

    /// Player already holds as many squares as allowed.
    #[display("Square limit of {allowed} reached")]
    CapExceeded {
        /// Base cap plus approved grants.
        allowed: u32,
    },

    /// Game code already in use.
    #[display("Game code '{_0}' is already taken")]
    CodeTaken(String),

    /// Player already has an undecided request.
    #[display("Player {_0} already has a pending request")]
    RequestPending(PlayerId),
}

impl std::error::Error for ConflictError {}

/// Caller lacks the right to perform the operation.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum PermissionError {
    /// Banned players cannot claim, join, or request squares.
    #[display("Player {_0} is banned from this game")]
    PlayerBanned(PlayerId),

    /// Admin token was issued for another game.
    #[display("Not an admin of game {_0}")]
    NotGameAdmin(GameId),
}

impl std::error::Error for PermissionError {}

/// Unknown reference.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum NotFoundError {
    /// No game with this id.
    #[display("Game {_0} not found")]
    Game(GameId),

    /// No game with this display code.
    #[display("Game '{_0}' not found")]
    GameCode(String),

    /// No player with this id in the game.
    #[display("Player {_0} not found")]
    Player(PlayerId),

    /// No claim request with this id in the game.
    #[display("Request {_0} not found")]
    Request(RequestId),
}

impl std::error::Error for NotFoundError {}

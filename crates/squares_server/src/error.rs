//! Unified error for every squares operation.

use derive_more::{Display, Error, From};
use squares_grid::{ConflictError, NotFoundError, PermissionError, StateError, ValidationError};

use crate::db::DbError;

/// Any failure a squares operation can report.
///
/// The first five classes are business-rule rejections the caller can act
/// on. [`SquaresError::Storage`] means the store itself failed.
#[derive(Debug, Clone, Display, Error, From)]
pub enum SquaresError {
    /// Malformed input.
    #[display("{_0}")]
    Validation(ValidationError),

    /// Illegal in the game's current phase.
    #[display("{_0}")]
    State(StateError),

    /// Lost race or exhausted allowance.
    #[display("{_0}")]
    Conflict(ConflictError),

    /// Caller lacks the right.
    #[display("{_0}")]
    Permission(PermissionError),

    /// Unknown game, player or request.
    #[display("{_0}")]
    NotFound(NotFoundError),

    /// Store failure.
    #[display("{_0}")]
    Storage(DbError),
}

impl From<diesel::result::Error> for SquaresError {
    #[track_caller]
    fn from(err: diesel::result::Error) -> Self {
        Self::Storage(DbError::from(err))
    }
}

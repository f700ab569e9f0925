//! Grid lifecycle phases and the transitions between them.
//!
//! `Open -> Locked -> NumbersReleased`. Locking may be undone while numbers
//! are unreleased; release is terminal. Persistence layers apply a
//! [`Transition`] as a conditional write keyed on [`Transition::from_phase`],
//! so two racing transitions can never both commit.

use crate::error::StateError;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Lifecycle phase of a game.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Squares may be claimed.
    Open,
    /// Claims are closed; unclaimed squares are void.
    Locked,
    /// Row and column digits are assigned. Terminal.
    NumbersReleased,
}

/// A phase change requested by an admin (or by the auto-lock check).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// `Open -> Locked`, voiding every unclaimed square.
    #[strum(serialize = "lock")]
    Lock,
    /// `Locked -> Open`, restoring the squares the lock voided.
    #[strum(serialize = "unlock")]
    Unlock,
    /// `Locked -> NumbersReleased`, assigning digits.
    #[strum(serialize = "release numbers")]
    Release,
}

impl Transition {
    /// Phase the game must be in for this transition to apply.
    pub fn from_phase(self) -> Phase {
        match self {
            Transition::Lock => Phase::Open,
            Transition::Unlock | Transition::Release => Phase::Locked,
        }
    }

    /// Phase the game is in after this transition.
    pub fn to_phase(self) -> Phase {
        match self {
            Transition::Lock => Phase::Locked,
            Transition::Unlock => Phase::Open,
            Transition::Release => Phase::NumbersReleased,
        }
    }
}

impl Phase {
    /// Applies a transition, returning the next phase.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::IllegalTransition`] if the transition does not
    /// start from this phase.
    #[instrument]
    pub fn apply(self, transition: Transition) -> Result<Phase, StateError> {
        if self == transition.from_phase() {
            Ok(transition.to_phase())
        } else {
            Err(StateError::IllegalTransition {
                transition,
                phase: self,
            })
        }
    }

    /// Fails unless squares may currently be claimed.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::GridNotOpen`] for locked or released grids.
    pub fn ensure_open(self) -> Result<(), StateError> {
        match self {
            Phase::Open => Ok(()),
            other => Err(StateError::GridNotOpen(other)),
        }
    }

    /// True once no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::NumbersReleased)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_forward_path() {
        let phase = Phase::Open.apply(Transition::Lock).unwrap();
        assert_eq!(phase, Phase::Locked);
        let phase = phase.apply(Transition::Release).unwrap();
        assert_eq!(phase, Phase::NumbersReleased);
        assert!(phase.is_terminal());
    }

    #[test]
    fn test_unlock_returns_to_open() {
        assert_eq!(Phase::Locked.apply(Transition::Unlock), Ok(Phase::Open));
    }

    #[test]
    fn test_release_cannot_skip_lock() {
        assert_eq!(
            Phase::Open.apply(Transition::Release),
            Err(StateError::IllegalTransition {
                transition: Transition::Release,
                phase: Phase::Open,
            })
        );
    }

    #[test]
    fn test_released_is_terminal() {
        for transition in Transition::iter() {
            assert!(Phase::NumbersReleased.apply(transition).is_err());
        }
    }

    #[test]
    fn test_only_open_accepts_claims() {
        assert!(Phase::Open.ensure_open().is_ok());
        assert_eq!(Phase::Locked.ensure_open(), Err(StateError::GridNotOpen(Phase::Locked)));
        assert!(Phase::NumbersReleased.ensure_open().is_err());
    }

    #[test]
    fn test_db_strings() {
        assert_eq!(Phase::NumbersReleased.as_ref(), "numbers_released");
        assert_eq!("locked".parse::<Phase>().unwrap(), Phase::Locked);
    }
}

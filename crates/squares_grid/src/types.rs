//! Core domain types for a squares pool.

use crate::error::ValidationError;
use crate::numbers::SecureRandom;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Identifier of a game record.
pub type GameId = i32;

/// Identifier of a player record.
pub type PlayerId = i32;

/// Identifier of a claim request record.
pub type RequestId = i32;

/// Largest square count a cap, grant, request or allowance may hold.
pub const MAX_COUNT: u32 = i32::MAX as u32;

/// Checks that a caller-supplied square count is positive and at most
/// [`MAX_COUNT`]. `field` names the count in the error.
pub fn check_count(count: u32, field: &'static str) -> Result<u32, ValidationError> {
    match count {
        0 => Err(ValidationError::NonPositiveCount(field)),
        count if count > MAX_COUNT => Err(ValidationError::CountTooLarge(field)),
        count => Ok(count),
    }
}

/// Ownership state of one square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "status", content = "owner", rename_all = "snake_case")]
pub enum SquareState {
    /// Free to claim while the grid is open.
    Unclaimed,
    /// Owned by a player.
    Claimed(PlayerId),
    /// Excluded from play because it was unclaimed at lock time.
    Void,
}

impl SquareState {
    /// Returns the owner if the square is claimed.
    pub fn owner(&self) -> Option<PlayerId> {
        match self {
            SquareState::Claimed(player) => Some(*player),
            SquareState::Unclaimed | SquareState::Void => None,
        }
    }

    /// True for squares nobody owns and nobody voided.
    pub fn is_unclaimed(&self) -> bool {
        matches!(self, SquareState::Unclaimed)
    }
}

/// One of the two competing teams.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Team {
    /// First team (score A).
    #[default]
    A,
    /// Second team (score B).
    B,
}

/// Scoring checkpoint at which a winner is looked up.
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
pub enum Quarter {
    /// End of the first quarter.
    First,
    /// Halftime.
    Second,
    /// End of the third quarter.
    Third,
    /// Final score in regulation.
    Fourth,
    /// Final score after overtime.
    Overtime,
}

impl TryFrom<u8> for Quarter {
    type Error = ValidationError;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        match number {
            1 => Ok(Quarter::First),
            2 => Ok(Quarter::Second),
            3 => Ok(Quarter::Third),
            4 => Ok(Quarter::Fourth),
            5 => Ok(Quarter::Overtime),
            other => Err(ValidationError::UnknownQuarter(other)),
        }
    }
}

/// Lifecycle of a request for extra squares.
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
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Waiting on an admin.
    Pending,
    /// Granted; extra squares were added to the player's cap.
    Approved,
    /// Refused.
    Denied,
}

/// Admin decision on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// Approve and grant `count` extra squares.
    Approve {
        /// Extra squares to grant.
        count: u32,
    },
    /// Deny without granting anything.
    Deny,
}

impl Decision {
    /// Status a pending request moves to under this decision.
    pub fn status(&self) -> RequestStatus {
        match self {
            Decision::Approve { .. } => RequestStatus::Approved,
            Decision::Deny => RequestStatus::Denied,
        }
    }
}

/// Six-character uppercase alphanumeric game code shown to players.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GameCode(String);

impl GameCode {
    /// Length of every game code.
    pub const LEN: usize = 6;

    /// Parses a creator-supplied code. Surrounding whitespace is trimmed and
    /// letters are uppercased.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidCode`] unless the code is exactly six
    /// ASCII alphanumerics.
    #[instrument]
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let code = raw.trim().to_ascii_uppercase();
        if code.len() != Self::LEN || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ValidationError::InvalidCode(raw.to_string()));
        }
        Ok(Self(code))
    }

    /// Generates a code from three random bytes rendered as uppercase hex.
    #[instrument(skip(rng))]
    pub fn generate<R: SecureRandom + ?Sized>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 3];
        rng.fill_bytes(&mut bytes);
        Self(bytes.iter().map(|b| format!("{b:02X}")).collect())
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for GameCode {
    type Error = ValidationError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<GameCode> for String {
    fn from(code: GameCode) -> Self {
        code.0
    }
}

impl std::fmt::Display for GameCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

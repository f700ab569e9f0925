//! Proof that a caller administers a game.

use serde::{Deserialize, Serialize};
use squares_grid::{GameId, PermissionError};

/// Admin capability scoped to one game.
///
/// Tokens are minted by whatever authenticated the caller; the core only
/// checks that the token names the game being changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdminToken {
    game_id: GameId,
}

impl AdminToken {
    /// A token for `game_id`.
    pub fn for_game(game_id: GameId) -> Self {
        Self { game_id }
    }

    /// Game this token administers.
    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    /// Fails unless this token administers `game_id`.
    pub fn authorize(&self, game_id: GameId) -> Result<(), PermissionError> {
        if self.game_id == game_id {
            Ok(())
        } else {
            Err(PermissionError::NotGameAdmin(game_id))
        }
    }
}

//! SQLite persistence for games, players, squares and claim requests.

mod error;
mod models;
mod repository;
mod schema; // Diesel generated schema - internal use only

pub use error::DbError;
pub use models::{ClaimRequest, Game, GameSummary, Player, PlayerSummary, Square};
pub use repository::{SquareStore, StoreTx};

pub(crate) use models::NewGameRow;

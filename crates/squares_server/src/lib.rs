//! Squares pool server.
//!
//! Durable storage and concurrency-safe services for squares pools, built on
//! the pure logic in [`squares_grid`].
//!
//! # Architecture
//!
//! - **Store**: [`SquareStore`], SQLite via diesel, one immediate
//!   transaction per mutating operation
//! - **Lifecycle**: [`GridStateMachine`] locks, unlocks and releases numbers
//! - **Ownership**: [`SquareClaimAllocator`] claims, revokes, grants, bans
//!   and square requests
//! - **Facade**: [`SquaresService`] bundles both plus views and winner lookup
//! - **HTTP**: [`router`] exposes the facade as JSON
//!
//! # Example
//!
//! ```no_run
//! use squares_server::{AdminToken, GameConfig, SquaresService};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = SquaresService::open("squares.db")?;
//! let game = service.create_game(GameConfig::new("Office Pool", "Chiefs", "Eagles"))?;
//! let admin = AdminToken::for_game(*game.id());
//!
//! let player = service.join(*game.id(), "Alice")?;
//! service.claim(*game.id(), *player.id(), 0, 0)?;
//! service.lock(&admin, *game.id())?;
//! service.release_numbers(&admin, *game.id())?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod admin;
mod allocator;
mod api;
mod clock;
mod config;
mod db;
mod error;
mod grid_state;
mod notify;
mod service;

pub use admin::AdminToken;
pub use allocator::{MAX_NAME_CHARS, SquareClaimAllocator};
pub use api::{ADMIN_HEADER, ApiError, router};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ADMIN_KEY_VAR, ConfigError, ServerConfig};
pub use db::{
    ClaimRequest, DbError, Game, GameSummary, Player, PlayerSummary, Square, SquareStore, StoreTx,
};
pub use error::SquaresError;
pub use grid_state::GridStateMachine;
pub use notify::{Notifier, RecordingNotifier, SquaresEvent, TracingNotifier};
pub use service::{GameConfig, SquaresService};

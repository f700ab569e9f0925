//! Best-effort event notifications.
//!
//! Events are dispatched after the store commits. A notifier cannot fail
//! or veto the operation that produced the event.

use serde::Serialize;
use squares_grid::{GameId, GridCoord, PlayerId, RequestId, RequestStatus};
use std::sync::{Mutex, PoisonError};
use tracing::info;

/// Something worth telling a game's admin about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SquaresEvent {
    /// A game was created.
    GameCreated {
        /// Game id.
        game_id: GameId,
        /// Display code.
        code: String,
    },
    /// A player claimed a square.
    SquareClaimed {
        /// Game id.
        game_id: GameId,
        /// Claiming player.
        player_id: PlayerId,
        /// Claimed square.
        coord: GridCoord,
    },
    /// The last unclaimed square was claimed.
    GridFull {
        /// Game id.
        game_id: GameId,
    },
    /// The grid locked, manually or by deadline.
    Locked {
        /// Game id.
        game_id: GameId,
        /// Squares voided by the lock.
        voided: usize,
        /// True when the auto-lock deadline triggered it.
        automatic: bool,
    },
    /// The grid reopened.
    Unlocked {
        /// Game id.
        game_id: GameId,
        /// Squares restored to unclaimed.
        restored: usize,
    },
    /// Row and column digits were assigned.
    NumbersReleased {
        /// Game id.
        game_id: GameId,
    },
    /// A player was banned.
    PlayerBanned {
        /// Game id.
        game_id: GameId,
        /// Banned player.
        player_id: PlayerId,
    },
    /// A player asked for more squares.
    SquaresRequested {
        /// Game id.
        game_id: GameId,
        /// Asking player.
        player_id: PlayerId,
        /// Squares asked for.
        count: u32,
    },
    /// An admin decided a request.
    RequestResolved {
        /// Game id.
        game_id: GameId,
        /// Decided request.
        request_id: RequestId,
        /// Resulting status.
        status: RequestStatus,
    },
}

/// Receives events after their operation commits.
pub trait Notifier: Send + Sync + std::fmt::Debug {
    /// Delivers one event. Must not block for long or panic.
    fn notify(&self, event: &SquaresEvent);
}

/// Writes events to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, event: &SquaresEvent) {
        info!(?event, "Squares event");
    }
}

/// Keeps every event in memory, for inspection in tests.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<SquaresEvent>>,
}

impl RecordingNotifier {
    /// Events received so far, oldest first.
    pub fn events(&self) -> Vec<SquaresEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: &SquaresEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

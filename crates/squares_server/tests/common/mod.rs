//! Shared setup for squares server integration tests.

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use tempfile::NamedTempFile;

use squares_server::{
    AdminToken, FixedClock, Game, GameConfig, GridStateMachine, Player, RecordingNotifier,
    SquareStore, SquaresService,
};

/// A migrated temporary database plus a service wired to test collaborators.
///
/// `_db` must stay in scope to keep the file alive.
pub struct TestEnv {
    pub _db: NamedTempFile,
    pub service: SquaresService,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<FixedClock>,
}

/// Fixed starting time for every test clock.
pub fn start_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 2, 8)
        .and_then(|d| d.and_hms_opt(18, 0, 0))
        .expect("Valid start time")
}

pub fn setup() -> TestEnv {
    let db_file = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = db_file.path().to_str().expect("Invalid path").to_string();

    let store = SquareStore::new(db_path).expect("Failed to create store");
    store.run_migrations().expect("Migrations failed");

    let notifier = Arc::new(RecordingNotifier::default());
    let clock = Arc::new(FixedClock::new(start_time()));
    let machine = GridStateMachine::new(
        store,
        notifier.clone(),
        clock.clone(),
        Box::new(StdRng::seed_from_u64(7)),
    );

    TestEnv {
        _db: db_file,
        service: SquaresService::new(machine),
        notifier,
        clock,
    }
}

impl TestEnv {
    /// Creates a game from `config` and returns it with its admin token.
    pub fn game(&self, config: GameConfig) -> (Game, AdminToken) {
        let game = self.service.create_game(config).expect("Create game failed");
        let token = AdminToken::for_game(*game.id());
        (game, token)
    }

    /// An uncapped game with no deadline.
    pub fn open_game(&self) -> (Game, AdminToken) {
        self.game(GameConfig::new("Office Pool", "Chiefs", "Eagles"))
    }

    pub fn join(&self, game: &Game, name: &str) -> Player {
        self.service.join(*game.id(), name).expect("Join failed")
    }
}

//! Game lifecycle: lock, unlock, auto-lock and number release.

use chrono::NaiveDateTime;
use squares_grid::{
    AssignedNumbers, GameId, GridSnapshot, NotFoundError, NumberAssignor, Phase, PlayerId,
    SecureRandom, StateError, Transition, os_random,
};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, instrument, warn};

use crate::admin::AdminToken;
use crate::clock::{Clock, SystemClock};
use crate::db::{Game, Player, SquareStore, StoreTx};
use crate::error::SquaresError;
use crate::notify::{Notifier, SquaresEvent, TracingNotifier};

/// Owns phase changes for every game in a store.
///
/// Each transition is a conditional write on the game's current phase,
/// applied in the same transaction as its square side effects.
#[derive(Clone)]
pub struct GridStateMachine {
    store: SquareStore,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    rng: Arc<Mutex<Box<dyn SecureRandom>>>,
}

impl std::fmt::Debug for GridStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridStateMachine")
            .field("store", &self.store)
            .field("notifier", &self.notifier)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl GridStateMachine {
    /// Creates a state machine over `store` with explicit collaborators.
    #[instrument(skip_all)]
    pub fn new(
        store: SquareStore,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        rng: Box<dyn SecureRandom>,
    ) -> Self {
        info!("Creating GridStateMachine");
        Self {
            store,
            notifier,
            clock,
            rng: Arc::new(Mutex::new(rng)),
        }
    }

    /// Production wiring: tracing notifications, wall clock, OS-seeded RNG.
    pub fn with_defaults(store: SquareStore) -> Self {
        Self::new(
            store,
            Arc::new(TracingNotifier),
            Arc::new(SystemClock),
            Box::new(os_random()),
        )
    }

    /// The underlying store.
    pub fn store(&self) -> &SquareStore {
        &self.store
    }

    /// Current time from the injected clock.
    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    pub(crate) fn notify(&self, event: SquaresEvent) {
        self.notifier.notify(&event);
    }

    /// Runs `f` with exclusive use of the secure random source.
    pub(crate) fn with_rng<T>(&self, f: impl FnOnce(&mut dyn SecureRandom) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut **rng)
    }

    /// Locks the game if its auto-lock deadline has passed, using the
    /// injected clock. Returns true if this call performed the lock.
    ///
    /// # Errors
    ///
    /// [`NotFoundError::Game`] for an unknown game, or a storage failure.
    pub fn auto_lock_check(&self, game_id: GameId) -> Result<bool, SquaresError> {
        self.auto_lock_check_at(game_id, self.clock.now())
    }

    /// Locks the game if its auto-lock deadline is at or before `now`.
    ///
    /// Safe to call any number of times: once the game has left the open
    /// phase, or when no deadline is set, this does nothing.
    #[instrument(skip(self))]
    pub fn auto_lock_check_at(
        &self,
        game_id: GameId,
        now: NaiveDateTime,
    ) -> Result<bool, SquaresError> {
        let voided = self.store.write(|tx| -> Result<_, SquaresError> {
            let game = require_game(tx, game_id)?;
            if !game.lock_due(now) {
                return Ok(None);
            }
            lock_in_tx(tx, &game).map(Some)
        })?;

        match voided {
            Some(voided) => {
                info!(game_id, voided, "Auto-lock deadline reached, grid locked");
                self.notify(SquaresEvent::Locked {
                    game_id,
                    voided,
                    automatic: true,
                });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Closes the grid: every unclaimed square becomes void. Returns the
    /// number of squares voided.
    ///
    /// # Errors
    ///
    /// [`StateError::IllegalTransition`] unless the game is open.
    #[instrument(skip(self, token))]
    pub fn lock(&self, token: &AdminToken, game_id: GameId) -> Result<usize, SquaresError> {
        token.authorize(game_id)?;
        debug!(game_id, "Locking grid");

        let voided = self
            .store
            .write(|tx| -> Result<_, SquaresError> {
                let game = require_game(tx, game_id)?;
                lock_in_tx(tx, &game)
            })
            .inspect_err(|e| warn!(game_id, error = %e, "Lock rejected"))?;

        info!(game_id, voided, "Grid locked");
        self.notify(SquaresEvent::Locked {
            game_id,
            voided,
            automatic: false,
        });
        Ok(voided)
    }

    /// Reopens a locked grid, restoring exactly the squares the lock voided.
    /// Returns the number of squares restored.
    ///
    /// A deadline that has already passed is cleared, otherwise the next
    /// operation would lock the grid again.
    ///
    /// # Errors
    ///
    /// [`StateError::IllegalTransition`] unless the game is locked.
    #[instrument(skip(self, token))]
    pub fn unlock(&self, token: &AdminToken, game_id: GameId) -> Result<usize, SquaresError> {
        token.authorize(game_id)?;
        let now = self.clock.now();
        debug!(game_id, "Unlocking grid");

        let restored = self
            .store
            .write(|tx| -> Result<_, SquaresError> {
                let game = require_game(tx, game_id)?;
                apply_transition(tx, &game, Transition::Unlock)?;
                if game.lock_at().is_some_and(|at| now >= at) {
                    debug!(game_id, "Clearing elapsed auto-lock deadline");
                    tx.clear_lock_at(game_id)?;
                }
                Ok(tx.restore_lock_voids(game_id)?)
            })
            .inspect_err(|e| warn!(game_id, error = %e, "Unlock rejected"))?;

        info!(game_id, restored, "Grid unlocked");
        self.notify(SquaresEvent::Unlocked { game_id, restored });
        Ok(restored)
    }

    /// Assigns row and column digits and moves the game to its terminal
    /// phase.
    ///
    /// Digits are drawn before the write. If the game turns out not to be
    /// locked, they are discarded and never stored.
    ///
    /// # Errors
    ///
    /// [`StateError::IllegalTransition`] unless the game is locked.
    #[instrument(skip(self, token))]
    pub fn release_numbers(
        &self,
        token: &AdminToken,
        game_id: GameId,
    ) -> Result<AssignedNumbers, SquaresError> {
        token.authorize(game_id)?;
        self.auto_lock_check(game_id)?;

        let numbers = self.with_rng(|rng| NumberAssignor.assign(rng));
        debug!(game_id, "Digits drawn, storing");

        self.store
            .write(|tx| -> Result<_, SquaresError> {
                let game = require_game(tx, game_id)?;
                game.phase().apply(Transition::Release)?;
                if !tx.release_if_locked(game_id, &numbers)? {
                    return Err(illegal(Transition::Release, *game.phase()));
                }
                Ok(())
            })
            .inspect_err(|e| warn!(game_id, error = %e, "Release rejected, digits discarded"))?;

        info!(
            game_id,
            rows = %numbers.rows(),
            cols = %numbers.cols(),
            "Numbers released"
        );
        self.notify(SquaresEvent::NumbersReleased { game_id });
        Ok(numbers)
    }

    /// Current phase of a game.
    #[instrument(skip(self))]
    pub fn phase(&self, game_id: GameId) -> Result<Phase, SquaresError> {
        self.auto_lock_check(game_id)?;
        self.store
            .read(|tx| -> Result<_, SquaresError> { Ok(*require_game(tx, game_id)?.phase()) })
    }
}

fn illegal(transition: Transition, phase: Phase) -> SquaresError {
    StateError::IllegalTransition { transition, phase }.into()
}

/// Applies `transition` as a conditional phase write.
fn apply_transition(
    tx: &mut StoreTx<'_>,
    game: &Game,
    transition: Transition,
) -> Result<Phase, SquaresError> {
    let next = game.phase().apply(transition)?;
    if !tx.set_phase_if(*game.id(), transition.from_phase(), next)? {
        return Err(illegal(transition, *game.phase()));
    }
    Ok(next)
}

fn lock_in_tx(tx: &mut StoreTx<'_>, game: &Game) -> Result<usize, SquaresError> {
    apply_transition(tx, game, Transition::Lock)?;
    Ok(tx.void_unclaimed(*game.id())?)
}

/// Loads a game or reports it missing.
pub(crate) fn require_game(tx: &mut StoreTx<'_>, game_id: GameId) -> Result<Game, SquaresError> {
    tx.game(game_id)?
        .ok_or_else(|| NotFoundError::Game(game_id).into())
}

/// Loads a player of a game or reports it missing.
pub(crate) fn require_player(
    tx: &mut StoreTx<'_>,
    game_id: GameId,
    player_id: PlayerId,
) -> Result<Player, SquaresError> {
    tx.player(game_id, player_id)?
        .ok_or_else(|| NotFoundError::Player(player_id).into())
}

/// Reads a game's whole grid.
pub(crate) fn snapshot_in_tx(
    tx: &mut StoreTx<'_>,
    game: &Game,
) -> Result<GridSnapshot, SquaresError> {
    let squares = tx.squares(*game.id())?;
    Ok(GridSnapshot::from_squares(
        *game.phase(),
        *game.row_team(),
        *game.numbers(),
        squares.iter().map(|square| (*square.coord(), *square.state())),
    ))
}

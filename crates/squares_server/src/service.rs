//! Facade over the state machine, allocator and winner lookup.

use chrono::NaiveDateTime;
use derive_setters::Setters;
use serde::Deserialize;
use squares_grid::{
    AssignedNumbers, ConflictError, Decision, GameCode, GameId, GridCoord, GridInvariants,
    GridSnapshot, InvariantSet, NotFoundError, PlayerId, Quarter, QuarterResult, RequestId, Team,
    ValidationError, WinnerResolver, check_count,
};
use tracing::{debug, info, instrument, warn};

use crate::admin::AdminToken;
use crate::allocator::SquareClaimAllocator;
use crate::db::{
    ClaimRequest, DbError, Game, GameSummary, NewGameRow, Player, PlayerSummary, Square,
    SquareStore,
};
use crate::error::SquaresError;
use crate::grid_state::{GridStateMachine, require_game, require_player, snapshot_in_tx};
use crate::notify::SquaresEvent;

/// Attempts at drawing an unused random game code before giving up.
const CODE_ATTEMPTS: usize = 16;

/// Settings for a new game.
///
/// ```
/// use squares_server::GameConfig;
///
/// let config = GameConfig::new("Big Game", "Chiefs", "Eagles")
///     .with_price_cents(500)
///     .with_max_squares(10u32);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Setters)]
#[setters(prefix = "with_", strip_option, into)]
pub struct GameConfig {
    name: String,
    team_a: String,
    team_b: String,
    /// Team matched against the row digits.
    #[serde(default)]
    row_team: Team,
    #[serde(default)]
    price_cents: i64,
    /// Base cap per player; `None` means unlimited.
    #[serde(default)]
    max_squares: Option<u32>,
    #[serde(default)]
    lock_at: Option<NaiveDateTime>,
    /// Custom display code; generated when absent.
    #[serde(default)]
    code: Option<String>,
}

impl GameConfig {
    /// A free, uncapped game with no deadline and a generated code.
    pub fn new(
        name: impl Into<String>,
        team_a: impl Into<String>,
        team_b: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            team_a: team_a.into(),
            team_b: team_b.into(),
            row_team: Team::default(),
            price_cents: 0,
            max_squares: None,
            lock_at: None,
            code: None,
        }
    }

    /// Checks the settings and returns the parsed custom code and the cap
    /// as stored.
    fn validate(&self) -> Result<(Option<GameCode>, Option<i32>), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyField("Game name"));
        }
        if self.team_a.trim().is_empty() {
            return Err(ValidationError::EmptyField("Team A name"));
        }
        if self.team_b.trim().is_empty() {
            return Err(ValidationError::EmptyField("Team B name"));
        }
        if self.price_cents < 0 {
            return Err(ValidationError::NegativePrice(self.price_cents));
        }
        let max_squares = self
            .max_squares
            .map(|cap| {
                let cap = check_count(cap, "Max squares per player")?;
                i32::try_from(cap)
                    .map_err(|_| ValidationError::CountTooLarge("Max squares per player"))
            })
            .transpose()?;
        let code = self.code.as_deref().map(GameCode::parse).transpose()?;
        Ok((code, max_squares))
    }
}

/// Every squares operation behind one handle.
#[derive(Debug, Clone)]
pub struct SquaresService {
    machine: GridStateMachine,
    allocator: SquareClaimAllocator,
}

impl SquaresService {
    /// Wraps a configured state machine.
    #[instrument(skip(machine))]
    pub fn new(machine: GridStateMachine) -> Self {
        info!("Creating SquaresService");
        Self {
            allocator: SquareClaimAllocator::new(machine.clone()),
            machine,
        }
    }

    /// Opens (and migrates) the database at `db_path` with production
    /// collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the path is empty or migrations fail.
    #[instrument]
    pub fn open(db_path: &str) -> Result<Self, DbError> {
        let store = SquareStore::new(db_path.to_string())?;
        store.run_migrations()?;
        Ok(Self::new(GridStateMachine::with_defaults(store)))
    }

    /// Lifecycle operations.
    pub fn machine(&self) -> &GridStateMachine {
        &self.machine
    }

    /// Ownership operations.
    pub fn allocator(&self) -> &SquareClaimAllocator {
        &self.allocator
    }

    fn store(&self) -> &SquareStore {
        self.machine.store()
    }

    // ─────────────────────────────────────────────────────────
    //  Games
    // ─────────────────────────────────────────────────────────

    /// Creates a game with 100 unclaimed squares.
    ///
    /// # Errors
    ///
    /// - [`ValidationError`] for blank names, a negative price, a zero or oversized cap, or a
    ///   malformed code
    /// - [`ConflictError::CodeTaken`] if a custom code is already in use
    #[instrument(skip(self, config), fields(name = %config.name))]
    pub fn create_game(&self, config: GameConfig) -> Result<Game, SquaresError> {
        let (custom_code, max_squares) = config.validate()?;

        let game = self
            .store()
            .write(|tx| -> Result<_, SquaresError> {
                let code = match custom_code {
                    Some(code) => {
                        if tx.code_exists(code.as_str())? {
                            return Err(ConflictError::CodeTaken(code.to_string()).into());
                        }
                        code
                    }
                    None => self.unused_code(|code| tx.code_exists(code))?,
                };

                Ok(tx.insert_game(NewGameRow::new(
                    code.to_string(),
                    config.name.trim().to_string(),
                    config.team_a.trim().to_string(),
                    config.team_b.trim().to_string(),
                    config.row_team.to_string(),
                    config.price_cents,
                    max_squares,
                    config.lock_at,
                ))?)
            })
            .inspect_err(|e| warn!(error = %e, "Game creation rejected"))?;

        info!(game_id = game.id(), code = %game.code(), "Game created");
        self.machine.notify(SquaresEvent::GameCreated {
            game_id: *game.id(),
            code: game.code().to_string(),
        });
        Ok(game)
    }

    fn unused_code(
        &self,
        mut exists: impl FnMut(&str) -> Result<bool, DbError>,
    ) -> Result<GameCode, SquaresError> {
        for attempt in 1..=CODE_ATTEMPTS {
            let code = self.machine.with_rng(|rng| GameCode::generate(rng));
            if !exists(code.as_str())? {
                return Ok(code);
            }
            debug!(attempt, %code, "Generated code already taken");
        }
        Err(DbError::new("Could not find an unused game code").into())
    }

    /// Loads a game.
    #[instrument(skip(self))]
    pub fn game(&self, game_id: GameId) -> Result<Game, SquaresError> {
        self.machine.auto_lock_check(game_id)?;
        self.store()
            .read(|tx| -> Result<_, SquaresError> { require_game(tx, game_id) })
    }

    /// Loads a game by its display code (case-insensitive).
    #[instrument(skip(self))]
    pub fn game_by_code(&self, code: &str) -> Result<Game, SquaresError> {
        let code = GameCode::parse(code)?;
        let game = self
            .store()
            .read(|tx| -> Result<_, SquaresError> {
                tx.game_by_code(code.as_str())?
                    .ok_or_else(|| NotFoundError::GameCode(code.to_string()).into())
            })?;
        if self.machine.auto_lock_check(*game.id())? {
            return self.game(*game.id());
        }
        Ok(game)
    }

    /// Lists every game with its live claim and player counts, newest first.
    #[instrument(skip(self))]
    pub fn games(&self) -> Result<Vec<GameSummary>, SquaresError> {
        let ids: Vec<GameId> = self.store().read(|tx| -> Result<_, DbError> {
            Ok(tx.games()?.iter().map(|game| *game.id()).collect())
        })?;
        for game_id in ids {
            match self.machine.auto_lock_check(game_id) {
                // Deleted since the listing.
                Ok(_) | Err(SquaresError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        self.store().read(|tx| -> Result<_, SquaresError> {
            tx.games()?
                .into_iter()
                .map(|game| {
                    let claimed = tx.claimed_total(*game.id())?;
                    let players = tx.player_count(*game.id())?;
                    Ok(GameSummary::new(game, claimed, players))
                })
                .collect()
        })
    }

    /// Removes a game with all its squares, players and requests.
    #[instrument(skip(self, token))]
    pub fn delete_game(&self, token: &AdminToken, game_id: GameId) -> Result<(), SquaresError> {
        token.authorize(game_id)?;
        let deleted = self.store().write(|tx| tx.delete_game(game_id))?;
        if !deleted {
            return Err(NotFoundError::Game(game_id).into());
        }
        info!(game_id, "Game deleted");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────
    //  Lifecycle
    // ─────────────────────────────────────────────────────────

    /// See [`GridStateMachine::auto_lock_check`].
    pub fn auto_lock_check(&self, game_id: GameId) -> Result<bool, SquaresError> {
        self.machine.auto_lock_check(game_id)
    }

    /// See [`GridStateMachine::auto_lock_check_at`].
    pub fn auto_lock_check_at(
        &self,
        game_id: GameId,
        now: NaiveDateTime,
    ) -> Result<bool, SquaresError> {
        self.machine.auto_lock_check_at(game_id, now)
    }

    /// See [`GridStateMachine::lock`].
    pub fn lock(&self, token: &AdminToken, game_id: GameId) -> Result<usize, SquaresError> {
        self.machine.lock(token, game_id)
    }

    /// See [`GridStateMachine::unlock`].
    pub fn unlock(&self, token: &AdminToken, game_id: GameId) -> Result<usize, SquaresError> {
        self.machine.unlock(token, game_id)
    }

    /// See [`GridStateMachine::release_numbers`].
    pub fn release_numbers(
        &self,
        token: &AdminToken,
        game_id: GameId,
    ) -> Result<AssignedNumbers, SquaresError> {
        self.machine.release_numbers(token, game_id)
    }

    // ─────────────────────────────────────────────────────────
    //  Players and squares
    // ─────────────────────────────────────────────────────────

    /// See [`SquareClaimAllocator::join`].
    pub fn join(&self, game_id: GameId, name: &str) -> Result<Player, SquaresError> {
        self.allocator.join(game_id, name)
    }

    /// Loads a player.
    #[instrument(skip(self))]
    pub fn player(&self, game_id: GameId, player_id: PlayerId) -> Result<Player, SquaresError> {
        self.store()
            .read(|tx| -> Result<_, SquaresError> { require_player(tx, game_id, player_id) })
    }

    /// Every player with their live claim count and allowance.
    #[instrument(skip(self))]
    pub fn list_players(&self, game_id: GameId) -> Result<Vec<PlayerSummary>, SquaresError> {
        self.machine.auto_lock_check(game_id)?;
        self.store().read(|tx| -> Result<_, SquaresError> {
            let game = require_game(tx, game_id)?;
            tx.players(game_id)?
                .into_iter()
                .map(|player| {
                    let claimed = tx.claimed_count(game_id, *player.id())?;
                    let allowed = game.allowance(&player);
                    Ok(PlayerSummary::new(player, claimed, allowed))
                })
                .collect()
        })
    }

    /// Claims the square at (`row`, `col`). See [`SquareClaimAllocator::claim`].
    pub fn claim(
        &self,
        game_id: GameId,
        player_id: PlayerId,
        row: u8,
        col: u8,
    ) -> Result<Square, SquaresError> {
        let coord = GridCoord::new(row, col)?;
        self.allocator.claim(game_id, player_id, coord)
    }

    /// Revokes the claim on (`row`, `col`). See [`SquareClaimAllocator::revoke`].
    pub fn revoke(
        &self,
        token: &AdminToken,
        game_id: GameId,
        row: u8,
        col: u8,
    ) -> Result<Option<PlayerId>, SquaresError> {
        let coord = GridCoord::new(row, col)?;
        self.allocator.revoke(token, game_id, coord)
    }

    /// See [`SquareClaimAllocator::grant_extra`].
    pub fn grant_extra(
        &self,
        token: &AdminToken,
        game_id: GameId,
        player_id: PlayerId,
        count: u32,
    ) -> Result<Player, SquaresError> {
        self.allocator.grant_extra(token, game_id, player_id, count)
    }

    /// See [`SquareClaimAllocator::ban`].
    pub fn ban(
        &self,
        token: &AdminToken,
        game_id: GameId,
        player_id: PlayerId,
    ) -> Result<Player, SquaresError> {
        self.allocator.ban(token, game_id, player_id)
    }

    /// See [`SquareClaimAllocator::unban`].
    pub fn unban(
        &self,
        token: &AdminToken,
        game_id: GameId,
        player_id: PlayerId,
    ) -> Result<Player, SquaresError> {
        self.allocator.unban(token, game_id, player_id)
    }

    // ─────────────────────────────────────────────────────────
    //  Requests
    // ─────────────────────────────────────────────────────────

    /// See [`SquareClaimAllocator::submit_request`].
    pub fn submit_request(
        &self,
        game_id: GameId,
        player_id: PlayerId,
        count: u32,
    ) -> Result<ClaimRequest, SquaresError> {
        self.allocator.submit_request(game_id, player_id, count)
    }

    /// See [`SquareClaimAllocator::resolve_request`].
    pub fn resolve_request(
        &self,
        token: &AdminToken,
        game_id: GameId,
        request_id: RequestId,
        decision: Decision,
    ) -> Result<ClaimRequest, SquaresError> {
        self.allocator.resolve_request(token, game_id, request_id, decision)
    }

    /// Every request of a game, oldest first.
    #[instrument(skip(self))]
    pub fn list_requests(&self, game_id: GameId) -> Result<Vec<ClaimRequest>, SquaresError> {
        self.store().read(|tx| -> Result<_, SquaresError> {
            require_game(tx, game_id)?;
            Ok(tx.requests(game_id)?)
        })
    }

    // ─────────────────────────────────────────────────────────
    //  Views
    // ─────────────────────────────────────────────────────────

    /// All 100 squares of a game with its phase and digits.
    #[instrument(skip(self))]
    pub fn get_grid_view(&self, game_id: GameId) -> Result<GridSnapshot, SquaresError> {
        self.machine.auto_lock_check(game_id)?;
        let snapshot = self.store().read(|tx| -> Result<_, SquaresError> {
            let game = require_game(tx, game_id)?;
            snapshot_in_tx(tx, &game)
        })?;

        if let Err(violations) = GridInvariants::check_all(&snapshot) {
            warn!(game_id, ?violations, "Stored grid violates invariants");
        }
        Ok(snapshot)
    }

    /// Winner of one quarter given both teams' scores.
    ///
    /// # Errors
    ///
    /// [`squares_grid::StateError::NumbersNotReleased`] before release.
    #[instrument(skip(self))]
    pub fn resolve_winner(
        &self,
        game_id: GameId,
        quarter: Quarter,
        score_a: u32,
        score_b: u32,
    ) -> Result<QuarterResult, SquaresError> {
        let snapshot = self.get_grid_view(game_id)?;
        let result = WinnerResolver.resolve(&snapshot, quarter, score_a, score_b)?;
        debug!(
            game_id,
            %quarter,
            coord = %result.coord,
            outcome = ?result.outcome,
            "Quarter resolved"
        );
        Ok(result)
    }
}

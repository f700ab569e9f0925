//! Durable square storage.
//!
//! [`SquareStore`] hands out [`StoreTx`] handles inside SQLite `BEGIN
//! IMMEDIATE` transactions. Immediate transactions take the write lock up
//! front, so every read a caller makes inside one is still true when its
//! writes commit. The `*_if_*` methods are conditional writes keyed on the
//! expected prior state and report whether a row changed.

use chrono::{NaiveDateTime, Utc};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use squares_grid::{AssignedNumbers, GameId, GridCoord, Phase, PlayerId, RequestId, RequestStatus};
use tracing::{debug, info, instrument};

use crate::db::models::{
    GameRow, NewGameRow, NewPlayerRow, NewRequestRow, NewSquareRow, PlayerRow, RequestRow,
    SquareRow, SquareStatus, encode_digits,
};
use crate::db::{ClaimRequest, DbError, Game, Player, Square, schema};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Milliseconds a connection waits on a locked database before failing.
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Durable store for games, players, squares and claim requests.
#[derive(Debug, Clone)]
pub struct SquareStore {
    db_path: String,
}

impl SquareStore {
    /// Creates a store for the SQLite database at the given path.
    ///
    /// Each operation opens its own connection, so the path must name a
    /// file; `":memory:"` would give every connection a separate database.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the path is empty.
    #[instrument(skip(db_path), fields(db_path = %db_path))]
    pub fn new(db_path: String) -> Result<Self, DbError> {
        if db_path.trim().is_empty() {
            return Err(DbError::new("Database path is empty"));
        }
        info!(path = %db_path, "Creating SquareStore");
        Ok(Self { db_path })
    }

    /// Establishes a configured database connection.
    #[instrument(skip(self))]
    fn connection(&self) -> Result<SqliteConnection, DbError> {
        debug!(path = %self.db_path, "Establishing connection");
        let mut conn = SqliteConnection::establish(&self.db_path)
            .map_err(|e| DbError::new(format!("Failed to connect to '{}': {}", self.db_path, e)))?;
        conn.batch_execute(&format!(
            "PRAGMA busy_timeout = {BUSY_TIMEOUT_MS}; PRAGMA foreign_keys = ON;"
        ))?;
        Ok(conn)
    }

    /// Applies any pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a migration fails.
    #[instrument(skip(self))]
    pub fn run_migrations(&self) -> Result<(), DbError> {
        let mut conn = self.connection()?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| DbError::new(format!("Migration failed: {}", e)))?;
        info!(count = applied.len(), "Migrations applied");
        Ok(())
    }

    /// Runs `f` inside an immediate (write-locked) transaction.
    ///
    /// The transaction commits when `f` returns `Ok` and rolls back on `Err`,
    /// so a rejected operation leaves no partial writes.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns, or a storage error converted into `E`.
    pub(crate) fn write<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut StoreTx<'_>) -> Result<T, E>,
        E: From<DbError> + From<diesel::result::Error>,
    {
        let mut conn = self.connection()?;
        conn.immediate_transaction(|conn| f(&mut StoreTx { conn }))
    }

    /// Runs `f` inside a read transaction, giving it a consistent view.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns, or a storage error converted into `E`.
    pub fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut StoreTx<'_>) -> Result<T, E>,
        E: From<DbError> + From<diesel::result::Error>,
    {
        let mut conn = self.connection()?;
        conn.transaction(|conn| f(&mut StoreTx { conn }))
    }
}

/// Record-level access within one store transaction.
pub struct StoreTx<'a> {
    conn: &'a mut SqliteConnection,
}

impl std::fmt::Debug for StoreTx<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreTx").finish_non_exhaustive()
    }
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

impl StoreTx<'_> {
    // ─────────────────────────────────────────────────────────
    //  Games
    // ─────────────────────────────────────────────────────────

    /// Inserts a game and its 100 unclaimed squares.
    #[instrument(skip(self, game))]
    pub(crate) fn insert_game(&mut self, game: NewGameRow) -> Result<Game, DbError> {
        let row = diesel::insert_into(schema::games::table)
            .values(&game)
            .returning(GameRow::as_returning())
            .get_result(self.conn)?;

        let game = Game::try_from(row)?;
        let squares: Vec<_> = GridCoord::all()
            .map(|coord| {
                NewSquareRow::new(*game.id(), i32::from(coord.row()), i32::from(coord.col()))
            })
            .collect();
        diesel::insert_into(schema::squares::table)
            .values(&squares)
            .execute(self.conn)?;

        info!(game_id = game.id(), code = %game.code(), "Game inserted");
        Ok(game)
    }

    /// True if a game already uses `code`.
    #[instrument(skip(self))]
    pub fn code_exists(&mut self, code: &str) -> Result<bool, DbError> {
        let count: i64 = schema::games::table
            .filter(schema::games::code.eq(code))
            .count()
            .get_result(self.conn)?;
        Ok(count > 0)
    }

    /// Loads a game by id.
    #[instrument(skip(self))]
    pub fn game(&mut self, game_id: GameId) -> Result<Option<Game>, DbError> {
        schema::games::table
            .find(game_id)
            .select(GameRow::as_select())
            .first(self.conn)
            .optional()?
            .map(Game::try_from)
            .transpose()
    }

    /// Loads a game by display code.
    #[instrument(skip(self))]
    pub fn game_by_code(&mut self, code: &str) -> Result<Option<Game>, DbError> {
        schema::games::table
            .filter(schema::games::code.eq(code))
            .select(GameRow::as_select())
            .first(self.conn)
            .optional()?
            .map(Game::try_from)
            .transpose()
    }

    /// Lists all games, newest first.
    #[instrument(skip(self))]
    pub fn games(&mut self) -> Result<Vec<Game>, DbError> {
        schema::games::table
            .order(schema::games::created_at.desc())
            .select(GameRow::as_select())
            .load(self.conn)?
            .into_iter()
            .map(Game::try_from)
            .collect()
    }

    /// Moves the game from `expected` to `next`. Returns false if the game
    /// was not in `expected`.
    #[instrument(skip(self))]
    pub(crate) fn set_phase_if(
        &mut self,
        game_id: GameId,
        expected: Phase,
        next: Phase,
    ) -> Result<bool, DbError> {
        let changed = diesel::update(
            schema::games::table
                .find(game_id)
                .filter(schema::games::phase.eq(expected.as_ref())),
        )
        .set(schema::games::phase.eq(next.as_ref()))
        .execute(self.conn)?;
        Ok(changed == 1)
    }

    /// Moves a locked game to released and stores its digits in the same
    /// write. Returns false if the game was not locked.
    #[instrument(skip(self, numbers))]
    pub(crate) fn release_if_locked(
        &mut self,
        game_id: GameId,
        numbers: &AssignedNumbers,
    ) -> Result<bool, DbError> {
        let changed = diesel::update(
            schema::games::table
                .find(game_id)
                .filter(schema::games::phase.eq(Phase::Locked.as_ref()))
                .filter(schema::games::row_digits.is_null())
                .filter(schema::games::col_digits.is_null()),
        )
        .set((
            schema::games::phase.eq(Phase::NumbersReleased.as_ref()),
            schema::games::row_digits.eq(Some(encode_digits(numbers.rows())?)),
            schema::games::col_digits.eq(Some(encode_digits(numbers.cols())?)),
        ))
        .execute(self.conn)?;
        Ok(changed == 1)
    }

    /// Drops the auto-lock deadline.
    #[instrument(skip(self))]
    pub(crate) fn clear_lock_at(&mut self, game_id: GameId) -> Result<(), DbError> {
        diesel::update(schema::games::table.find(game_id))
            .set(schema::games::lock_at.eq(None::<NaiveDateTime>))
            .execute(self.conn)?;
        Ok(())
    }

    /// Deletes a game and everything it owns. Returns false if it did not exist.
    #[instrument(skip(self))]
    pub(crate) fn delete_game(&mut self, game_id: GameId) -> Result<bool, DbError> {
        diesel::delete(
            schema::claim_requests::table.filter(schema::claim_requests::game_id.eq(game_id)),
        )
            .execute(self.conn)?;
        diesel::delete(schema::squares::table.filter(schema::squares::game_id.eq(game_id)))
            .execute(self.conn)?;
        diesel::delete(schema::players::table.filter(schema::players::game_id.eq(game_id)))
            .execute(self.conn)?;
        let deleted = diesel::delete(schema::games::table.find(game_id)).execute(self.conn)?;
        Ok(deleted == 1)
    }

    // ─────────────────────────────────────────────────────────
    //  Squares
    // ─────────────────────────────────────────────────────────

    /// All 100 squares of a game, row-major.
    #[instrument(skip(self))]
    pub fn squares(&mut self, game_id: GameId) -> Result<Vec<Square>, DbError> {
        schema::squares::table
            .filter(schema::squares::game_id.eq(game_id))
            .order((schema::squares::row_index.asc(), schema::squares::col_index.asc()))
            .select(SquareRow::as_select())
            .load(self.conn)?
            .into_iter()
            .map(Square::try_from)
            .collect()
    }

    /// One square.
    #[instrument(skip(self))]
    pub fn square(&mut self, game_id: GameId, coord: GridCoord) -> Result<Option<Square>, DbError> {
        schema::squares::table
            .filter(schema::squares::game_id.eq(game_id))
            .filter(schema::squares::row_index.eq(i32::from(coord.row())))
            .filter(schema::squares::col_index.eq(i32::from(coord.col())))
            .select(SquareRow::as_select())
            .first(self.conn)
            .optional()?
            .map(Square::try_from)
            .transpose()
    }

    /// Live count of squares owned by a player.
    #[instrument(skip(self))]
    pub fn claimed_count(&mut self, game_id: GameId, player_id: PlayerId) -> Result<u32, DbError> {
        let count: i64 = schema::squares::table
            .filter(schema::squares::game_id.eq(game_id))
            .filter(schema::squares::status.eq(SquareStatus::Claimed.to_db_string()))
            .filter(schema::squares::owner_id.eq(player_id))
            .count()
            .get_result(self.conn)?;
        u32::try_from(count)
            .map_err(|_| DbError::new(format!("Claim count out of range: {}", count)))
    }

    /// Live count of claimed squares in a game.
    #[instrument(skip(self))]
    pub fn claimed_total(&mut self, game_id: GameId) -> Result<usize, DbError> {
        let count: i64 = schema::squares::table
            .filter(schema::squares::game_id.eq(game_id))
            .filter(schema::squares::status.eq(SquareStatus::Claimed.to_db_string()))
            .count()
            .get_result(self.conn)?;
        usize::try_from(count)
            .map_err(|_| DbError::new(format!("Claim count out of range: {}", count)))
    }

    /// Gives an unclaimed square to `player_id`. Returns false if the square
    /// was not unclaimed.
    #[instrument(skip(self))]
    pub(crate) fn claim_if_unclaimed(
        &mut self,
        game_id: GameId,
        coord: GridCoord,
        player_id: PlayerId,
    ) -> Result<bool, DbError> {
        let changed = diesel::update(
            schema::squares::table
                .filter(schema::squares::game_id.eq(game_id))
                .filter(schema::squares::row_index.eq(i32::from(coord.row())))
                .filter(schema::squares::col_index.eq(i32::from(coord.col())))
                .filter(schema::squares::status.eq(SquareStatus::Unclaimed.to_db_string())),
        )
        .set((
            schema::squares::status.eq(SquareStatus::Claimed.to_db_string()),
            schema::squares::owner_id.eq(Some(player_id)),
            schema::squares::claimed_at.eq(Some(now())),
        ))
        .execute(self.conn)?;
        Ok(changed == 1)
    }

    /// Returns a claimed square to unclaimed. Returns false if the square
    /// was not claimed.
    #[instrument(skip(self))]
    pub(crate) fn unclaim_if_claimed(
        &mut self,
        game_id: GameId,
        coord: GridCoord,
    ) -> Result<bool, DbError> {
        let changed = diesel::update(
            schema::squares::table
                .filter(schema::squares::game_id.eq(game_id))
                .filter(schema::squares::row_index.eq(i32::from(coord.row())))
                .filter(schema::squares::col_index.eq(i32::from(coord.col())))
                .filter(schema::squares::status.eq(SquareStatus::Claimed.to_db_string())),
        )
        .set((
            schema::squares::status.eq(SquareStatus::Unclaimed.to_db_string()),
            schema::squares::owner_id.eq(None::<i32>),
            schema::squares::claimed_at.eq(None::<NaiveDateTime>),
        ))
        .execute(self.conn)?;
        Ok(changed == 1)
    }

    /// Voids every unclaimed square, marking each as voided by the lock.
    #[instrument(skip(self))]
    pub(crate) fn void_unclaimed(&mut self, game_id: GameId) -> Result<usize, DbError> {
        let voided = diesel::update(
            schema::squares::table
                .filter(schema::squares::game_id.eq(game_id))
                .filter(schema::squares::status.eq(SquareStatus::Unclaimed.to_db_string())),
        )
        .set((
            schema::squares::status.eq(SquareStatus::Void.to_db_string()),
            schema::squares::voided_by_lock.eq(true),
        ))
        .execute(self.conn)?;
        debug!(game_id, voided, "Unclaimed squares voided");
        Ok(voided)
    }

    /// Restores exactly the squares a lock voided.
    #[instrument(skip(self))]
    pub(crate) fn restore_lock_voids(&mut self, game_id: GameId) -> Result<usize, DbError> {
        let restored = diesel::update(
            schema::squares::table
                .filter(schema::squares::game_id.eq(game_id))
                .filter(schema::squares::status.eq(SquareStatus::Void.to_db_string()))
                .filter(schema::squares::voided_by_lock.eq(true)),
        )
        .set((
            schema::squares::status.eq(SquareStatus::Unclaimed.to_db_string()),
            schema::squares::voided_by_lock.eq(false),
        ))
        .execute(self.conn)?;
        debug!(game_id, restored, "Lock-voided squares restored");
        Ok(restored)
    }

    // ─────────────────────────────────────────────────────────
    //  Players
    // ─────────────────────────────────────────────────────────

    /// Registers a player.
    #[instrument(skip(self))]
    pub(crate) fn insert_player(&mut self, game_id: GameId, name: &str) -> Result<Player, DbError> {
        let row = diesel::insert_into(schema::players::table)
            .values(&NewPlayerRow::new(game_id, name.to_string()))
            .returning(PlayerRow::as_returning())
            .get_result(self.conn)?;
        Player::try_from(row)
    }

    /// Loads a player of a game.
    #[instrument(skip(self))]
    pub fn player(
        &mut self,
        game_id: GameId,
        player_id: PlayerId,
    ) -> Result<Option<Player>, DbError> {
        schema::players::table
            .find(player_id)
            .filter(schema::players::game_id.eq(game_id))
            .select(PlayerRow::as_select())
            .first(self.conn)
            .optional()?
            .map(Player::try_from)
            .transpose()
    }

    /// Loads a player of a game by display name.
    #[instrument(skip(self))]
    pub fn player_by_name(
        &mut self,
        game_id: GameId,
        name: &str,
    ) -> Result<Option<Player>, DbError> {
        schema::players::table
            .filter(schema::players::game_id.eq(game_id))
            .filter(schema::players::name.eq(name))
            .select(PlayerRow::as_select())
            .first(self.conn)
            .optional()?
            .map(Player::try_from)
            .transpose()
    }

    /// All players of a game in join order.
    #[instrument(skip(self))]
    pub fn players(&mut self, game_id: GameId) -> Result<Vec<Player>, DbError> {
        schema::players::table
            .filter(schema::players::game_id.eq(game_id))
            .order(schema::players::id.asc())
            .select(PlayerRow::as_select())
            .load(self.conn)?
            .into_iter()
            .map(Player::try_from)
            .collect()
    }

    /// Number of players registered in a game, banned ones included.
    #[instrument(skip(self))]
    pub fn player_count(&mut self, game_id: GameId) -> Result<usize, DbError> {
        let count: i64 = schema::players::table
            .filter(schema::players::game_id.eq(game_id))
            .count()
            .get_result(self.conn)?;
        usize::try_from(count)
            .map_err(|_| DbError::new(format!("Player count out of range: {}", count)))
    }

    /// Sets the ban flag. Returns false if the player does not exist.
    #[instrument(skip(self))]
    pub(crate) fn set_banned(
        &mut self,
        game_id: GameId,
        player_id: PlayerId,
        banned: bool,
    ) -> Result<bool, DbError> {
        let changed = diesel::update(
            schema::players::table
                .find(player_id)
                .filter(schema::players::game_id.eq(game_id)),
        )
        .set(schema::players::is_banned.eq(banned))
        .execute(self.conn)?;
        Ok(changed == 1)
    }

    /// Adds extra squares to a player's allowance. Returns false if the
    /// player does not exist.
    #[instrument(skip(self))]
    pub(crate) fn add_bonus(
        &mut self,
        game_id: GameId,
        player_id: PlayerId,
        count: u32,
    ) -> Result<bool, DbError> {
        let count = i32::try_from(count)
            .map_err(|_| DbError::new(format!("Grant too large: {}", count)))?;
        let changed = diesel::update(
            schema::players::table
                .find(player_id)
                .filter(schema::players::game_id.eq(game_id)),
        )
        .set(schema::players::bonus_squares.eq(schema::players::bonus_squares + count))
        .execute(self.conn)?;
        Ok(changed == 1)
    }

    // ─────────────────────────────────────────────────────────
    //  Claim requests
    // ─────────────────────────────────────────────────────────

    /// Records a pending request.
    #[instrument(skip(self))]
    pub(crate) fn insert_request(
        &mut self,
        game_id: GameId,
        player_id: PlayerId,
        requested: u32,
    ) -> Result<ClaimRequest, DbError> {
        let requested = i32::try_from(requested)
            .map_err(|_| DbError::new(format!("Request too large: {}", requested)))?;
        let row = diesel::insert_into(schema::claim_requests::table)
            .values(&NewRequestRow::new(game_id, player_id, requested))
            .returning(RequestRow::as_returning())
            .get_result(self.conn)?;
        ClaimRequest::try_from(row)
    }

    /// Loads a request of a game.
    #[instrument(skip(self))]
    pub fn request(
        &mut self,
        game_id: GameId,
        request_id: RequestId,
    ) -> Result<Option<ClaimRequest>, DbError> {
        schema::claim_requests::table
            .find(request_id)
            .filter(schema::claim_requests::game_id.eq(game_id))
            .select(RequestRow::as_select())
            .first(self.conn)
            .optional()?
            .map(ClaimRequest::try_from)
            .transpose()
    }

    /// The player's pending request, if any.
    #[instrument(skip(self))]
    pub fn pending_request(
        &mut self,
        game_id: GameId,
        player_id: PlayerId,
    ) -> Result<Option<ClaimRequest>, DbError> {
        schema::claim_requests::table
            .filter(schema::claim_requests::game_id.eq(game_id))
            .filter(schema::claim_requests::player_id.eq(player_id))
            .filter(schema::claim_requests::status.eq(RequestStatus::Pending.as_ref()))
            .select(RequestRow::as_select())
            .first(self.conn)
            .optional()?
            .map(ClaimRequest::try_from)
            .transpose()
    }

    /// All requests of a game, oldest first.
    #[instrument(skip(self))]
    pub fn requests(&mut self, game_id: GameId) -> Result<Vec<ClaimRequest>, DbError> {
        schema::claim_requests::table
            .filter(schema::claim_requests::game_id.eq(game_id))
            .order(schema::claim_requests::id.asc())
            .select(RequestRow::as_select())
            .load(self.conn)?
            .into_iter()
            .map(ClaimRequest::try_from)
            .collect()
    }

    /// Moves a pending request to `status`. Returns false if the request
    /// was not pending.
    #[instrument(skip(self))]
    pub(crate) fn resolve_request_if_pending(
        &mut self,
        request_id: RequestId,
        status: RequestStatus,
        granted: Option<u32>,
    ) -> Result<bool, DbError> {
        let granted = granted
            .map(i32::try_from)
            .transpose()
            .map_err(|_| DbError::new("Grant too large"))?;
        let changed = diesel::update(
            schema::claim_requests::table
                .find(request_id)
                .filter(schema::claim_requests::status.eq(RequestStatus::Pending.as_ref())),
        )
        .set((
            schema::claim_requests::status.eq(status.as_ref()),
            schema::claim_requests::granted.eq(granted),
            schema::claim_requests::resolved_at.eq(Some(now())),
        ))
        .execute(self.conn)?;
        Ok(changed == 1)
    }
}

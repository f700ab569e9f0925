//! Database rows and the domain records decoded from them.

use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_new::new;
use diesel::prelude::*;
use serde::Serialize;
use squares_grid::{
    AssignedNumbers, DigitPermutation, GameCode, GameId, GridCoord, Phase, PlayerId, RequestId,
    RequestStatus, SquareState, Team,
};
use tracing::instrument;

use crate::db::{DbError, schema};

// ─────────────────────────────────────────────────────────────
//  Games
// ─────────────────────────────────────────────────────────────

/// Game table row.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = schema::games)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub(crate) struct GameRow {
    id: i32,
    code: String,
    name: String,
    team_a: String,
    team_b: String,
    row_team: String,
    price_cents: i64,
    max_squares: Option<i32>,
    lock_at: Option<NaiveDateTime>,
    phase: String,
    row_digits: Option<String>,
    col_digits: Option<String>,
    created_at: NaiveDateTime,
}

/// Insertable game row.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::games)]
pub(crate) struct NewGameRow {
    code: String,
    name: String,
    team_a: String,
    team_b: String,
    row_team: String,
    price_cents: i64,
    max_squares: Option<i32>,
    lock_at: Option<NaiveDateTime>,
}

/// A squares pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Getters)]
pub struct Game {
    id: GameId,
    code: GameCode,
    name: String,
    team_a: String,
    team_b: String,
    row_team: Team,
    price_cents: i64,
    max_squares: Option<u32>,
    lock_at: Option<NaiveDateTime>,
    phase: Phase,
    numbers: Option<AssignedNumbers>,
    created_at: NaiveDateTime,
}

impl Game {
    /// Squares `player` may hold at once, or `None` when the game has no cap.
    pub fn allowance(&self, player: &Player) -> Option<u32> {
        self.max_squares
            .map(|base| base.saturating_add(*player.bonus_squares()))
    }

    /// True when the auto-lock deadline has been reached at `now`.
    pub fn lock_due(&self, now: NaiveDateTime) -> bool {
        self.phase == Phase::Open && self.lock_at.is_some_and(|at| now >= at)
    }
}

impl TryFrom<GameRow> for Game {
    type Error = DbError;

    #[instrument(skip(row), fields(game_id = row.id))]
    fn try_from(row: GameRow) -> Result<Self, Self::Error> {
        let numbers = match (row.row_digits.as_deref(), row.col_digits.as_deref()) {
            (None, None) => None,
            (Some(rows), Some(cols)) => {
                Some(AssignedNumbers::new(decode_digits(rows)?, decode_digits(cols)?))
            }
            _ => return Err(DbError::new(format!("Game {} has partially assigned digits", row.id))),
        };

        Ok(Self {
            id: row.id,
            code: GameCode::parse(&row.code).map_err(|e| DbError::new(e.to_string()))?,
            name: row.name,
            team_a: row.team_a,
            team_b: row.team_b,
            row_team: row
                .row_team
                .parse()
                .map_err(|_| DbError::new(format!("Invalid row team: '{}'", row.row_team)))?,
            price_cents: row.price_cents,
            max_squares: row.max_squares.map(decode_count).transpose()?,
            lock_at: row.lock_at,
            phase: row
                .phase
                .parse()
                .map_err(|_| DbError::new(format!("Invalid phase: '{}'", row.phase)))?,
            numbers,
            created_at: row.created_at,
        })
    }
}

/// Serializes a permutation for a digits column.
pub(crate) fn encode_digits(digits: &DigitPermutation) -> Result<String, DbError> {
    Ok(serde_json::to_string(digits)?)
}

fn decode_digits(raw: &str) -> Result<DigitPermutation, DbError> {
    Ok(serde_json::from_str(raw)?)
}

fn decode_count(value: i32) -> Result<u32, DbError> {
    u32::try_from(value).map_err(|_| DbError::new(format!("Negative count stored: {}", value)))
}

// ─────────────────────────────────────────────────────────────
//  Players
// ─────────────────────────────────────────────────────────────

/// Player table row.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = schema::players)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub(crate) struct PlayerRow {
    id: i32,
    game_id: i32,
    name: String,
    is_banned: bool,
    bonus_squares: i32,
    joined_at: NaiveDateTime,
}

/// Insertable player row.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::players)]
pub(crate) struct NewPlayerRow {
    game_id: i32,
    name: String,
}

/// A participant in one game.
///
/// Claimed-square counts are deliberately absent: they are always counted
/// from the squares table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Getters)]
pub struct Player {
    id: PlayerId,
    game_id: GameId,
    name: String,
    banned: bool,
    bonus_squares: u32,
    joined_at: NaiveDateTime,
}

impl TryFrom<PlayerRow> for Player {
    type Error = DbError;

    fn try_from(row: PlayerRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            game_id: row.game_id,
            name: row.name,
            banned: row.is_banned,
            bonus_squares: decode_count(row.bonus_squares)?,
            joined_at: row.joined_at,
        })
    }
}

/// A player together with live square totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Getters, new)]
pub struct PlayerSummary {
    player: Player,
    claimed: u32,
    allowed: Option<u32>,
}

/// A game together with live claim and player totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Getters, new)]
pub struct GameSummary {
    game: Game,
    claimed: usize,
    players: usize,
}

// ─────────────────────────────────────────────────────────────
//  Squares
// ─────────────────────────────────────────────────────────────

/// Stored square status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum SquareStatus {
    Unclaimed,
    Claimed,
    Void,
}

impl SquareStatus {
    /// Converts status to the string stored in the database.
    pub(crate) fn to_db_string(self) -> &'static str {
        match self {
            Self::Unclaimed => "unclaimed",
            Self::Claimed => "claimed",
            Self::Void => "void",
        }
    }

    /// Parses status from the string stored in the database.
    pub(crate) fn from_db_string(s: &str) -> Result<Self, DbError> {
        match s {
            "unclaimed" => Ok(Self::Unclaimed),
            "claimed" => Ok(Self::Claimed),
            "void" => Ok(Self::Void),
            _ => Err(DbError::new(format!("Invalid square status: '{}'", s))),
        }
    }
}

/// Square table row.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = schema::squares)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub(crate) struct SquareRow {
    id: i32,
    game_id: i32,
    row_index: i32,
    col_index: i32,
    status: String,
    owner_id: Option<i32>,
    voided_by_lock: bool,
    claimed_at: Option<NaiveDateTime>,
}

/// Insertable square row; new squares start unclaimed.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::squares)]
pub(crate) struct NewSquareRow {
    game_id: i32,
    row_index: i32,
    col_index: i32,
}

/// One cell of a game's grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Getters)]
pub struct Square {
    coord: GridCoord,
    state: SquareState,
    claimed_at: Option<NaiveDateTime>,
}

impl TryFrom<SquareRow> for Square {
    type Error = DbError;

    fn try_from(row: SquareRow) -> Result<Self, Self::Error> {
        let coord = u8::try_from(row.row_index)
            .ok()
            .zip(u8::try_from(row.col_index).ok())
            .and_then(|(r, c)| GridCoord::new(r, c).ok())
            .ok_or_else(|| DbError::new(format!("Square {} is off the grid", row.id)))?;

        let state = match (SquareStatus::from_db_string(&row.status)?, row.owner_id) {
            (SquareStatus::Unclaimed, _) => SquareState::Unclaimed,
            (SquareStatus::Void, _) => SquareState::Void,
            (SquareStatus::Claimed, Some(owner)) => SquareState::Claimed(owner),
            (SquareStatus::Claimed, None) => {
                return Err(DbError::new(format!("Square {} is claimed without an owner", row.id)));
            }
        };

        Ok(Self {
            coord,
            state,
            claimed_at: row.claimed_at,
        })
    }
}

// ─────────────────────────────────────────────────────────────
//  Claim requests
// ─────────────────────────────────────────────────────────────

/// Claim request table row.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = schema::claim_requests)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub(crate) struct RequestRow {
    id: i32,
    game_id: i32,
    player_id: i32,
    requested: i32,
    status: String,
    granted: Option<i32>,
    requested_at: NaiveDateTime,
    resolved_at: Option<NaiveDateTime>,
}

/// Insertable claim request row; new requests start pending.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::claim_requests)]
pub(crate) struct NewRequestRow {
    game_id: i32,
    player_id: i32,
    requested: i32,
}

/// A player's ask for squares beyond their cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Getters)]
pub struct ClaimRequest {
    id: RequestId,
    game_id: GameId,
    player_id: PlayerId,
    requested: u32,
    status: RequestStatus,
    granted: Option<u32>,
    requested_at: NaiveDateTime,
    resolved_at: Option<NaiveDateTime>,
}

impl TryFrom<RequestRow> for ClaimRequest {
    type Error = DbError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            game_id: row.game_id,
            player_id: row.player_id,
            requested: decode_count(row.requested)?,
            status: row
                .status
                .parse()
                .map_err(|_| DbError::new(format!("Invalid request status: '{}'", row.status)))?,
            granted: row.granted.map(decode_count).transpose()?,
            requested_at: row.requested_at,
            resolved_at: row.resolved_at,
        })
    }
}

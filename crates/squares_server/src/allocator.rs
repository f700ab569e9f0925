//! Square ownership changes.
//!
//! Every method runs the auto-lock check first, then does its reads and
//! writes inside one immediate transaction. Claims finish with a conditional
//! update on the square still being unclaimed, so two players racing for a
//! square cannot both win.

use squares_grid::{
    CELL_COUNT, ConflictError, Decision, GameId, GridCoord, MAX_COUNT, NotFoundError,
    PermissionError, PlayerId, RequestId, StateError, ValidationError, check_count,
};
use tracing::{debug, info, instrument, warn};

use crate::admin::AdminToken;
use crate::db::{ClaimRequest, DbError, Player, Square, SquareStore, StoreTx};
use crate::error::SquaresError;
use crate::grid_state::{GridStateMachine, require_game, require_player};
use crate::notify::SquaresEvent;

/// Longest display name a player may join with, in characters.
pub const MAX_NAME_CHARS: usize = 20;

/// Name shown on void squares, so no player may take it.
const RESERVED_NAME: &str = "VOID";

/// Mediates claims, revokes, grants, bans and square requests.
#[derive(Debug, Clone)]
pub struct SquareClaimAllocator {
    machine: GridStateMachine,
}

impl SquareClaimAllocator {
    /// Creates an allocator sharing `machine`'s store and collaborators.
    pub fn new(machine: GridStateMachine) -> Self {
        Self { machine }
    }

    fn store(&self) -> &SquareStore {
        self.machine.store()
    }

    /// Registers `name` in an open game, or returns the player already
    /// registered under that name.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::EmptyField`] for a blank name
    /// - [`ValidationError::NameTooLong`] past [`MAX_NAME_CHARS`] characters
    /// - [`ValidationError::ReservedName`] for "void" in any case
    /// - [`StateError::GridNotOpen`] once the grid has locked
    /// - [`PermissionError::PlayerBanned`] if the name belongs to a banned player
    #[instrument(skip(self))]
    pub fn join(&self, game_id: GameId, name: &str) -> Result<Player, SquaresError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyField("Player name").into());
        }
        if name.chars().count() > MAX_NAME_CHARS {
            return Err(ValidationError::NameTooLong { max: MAX_NAME_CHARS }.into());
        }
        if name.eq_ignore_ascii_case(RESERVED_NAME) {
            return Err(ValidationError::ReservedName(name.to_string()).into());
        }
        self.machine.auto_lock_check(game_id)?;

        self.store()
            .write(|tx| -> Result<_, SquaresError> {
                let game = require_game(tx, game_id)?;
                game.phase().ensure_open()?;

                if let Some(existing) = tx.player_by_name(game_id, name)? {
                    if *existing.banned() {
                        return Err(PermissionError::PlayerBanned(*existing.id()).into());
                    }
                    debug!(player_id = existing.id(), "Existing player rejoined");
                    return Ok(existing);
                }

                let player = tx.insert_player(game_id, name)?;
                info!(player_id = player.id(), name, "Player joined");
                Ok(player)
            })
            .inspect_err(|e| warn!(game_id, name, error = %e, "Join rejected"))
    }

    /// Gives the square at `coord` to `player_id`.
    ///
    /// # Errors
    ///
    /// Checked in this order:
    /// - [`StateError::GridNotOpen`] unless the game is open
    /// - [`PermissionError::PlayerBanned`] for a banned player
    /// - [`ConflictError::AlreadyClaimed`] unless the square is unclaimed
    /// - [`ConflictError::CapExceeded`] if the player is at their allowance
    #[instrument(skip(self))]
    pub fn claim(
        &self,
        game_id: GameId,
        player_id: PlayerId,
        coord: GridCoord,
    ) -> Result<Square, SquaresError> {
        self.machine.auto_lock_check(game_id)?;

        let (square, full) = self
            .store()
            .write(|tx| -> Result<_, SquaresError> {
                let game = require_game(tx, game_id)?;
                game.phase().ensure_open()?;

                let player = require_player(tx, game_id, player_id)?;
                if *player.banned() {
                    return Err(PermissionError::PlayerBanned(player_id).into());
                }

                let current = tx
                    .square(game_id, coord)?
                    .ok_or_else(|| missing_square(game_id, coord))?;
                if !current.state().is_unclaimed() {
                    return Err(ConflictError::AlreadyClaimed(coord).into());
                }

                if let Some(allowed) = game.allowance(&player) {
                    let held = tx.claimed_count(game_id, player_id)?;
                    if held >= allowed {
                        return Err(ConflictError::CapExceeded { allowed }.into());
                    }
                }

                if !tx.claim_if_unclaimed(game_id, coord, player_id)? {
                    return Err(ConflictError::AlreadyClaimed(coord).into());
                }

                let square = tx
                    .square(game_id, coord)?
                    .ok_or_else(|| missing_square(game_id, coord))?;
                let full = tx.claimed_total(game_id)? == CELL_COUNT;
                Ok((square, full))
            })
            .inspect_err(|e| warn!(game_id, player_id, %coord, error = %e, "Claim rejected"))?;

        info!(game_id, player_id, %coord, "Square claimed");
        self.machine.notify(SquaresEvent::SquareClaimed {
            game_id,
            player_id,
            coord,
        });
        if full {
            self.machine.notify(SquaresEvent::GridFull { game_id });
        }
        Ok(square)
    }

    /// Returns a claimed square to unclaimed, in any phase. Returns the
    /// previous owner, or `None` if the square was not claimed. Void squares
    /// stay void.
    #[instrument(skip(self, token))]
    pub fn revoke(
        &self,
        token: &AdminToken,
        game_id: GameId,
        coord: GridCoord,
    ) -> Result<Option<PlayerId>, SquaresError> {
        token.authorize(game_id)?;
        self.machine.auto_lock_check(game_id)?;

        let previous = self.store().write(|tx| -> Result<_, SquaresError> {
            require_game(tx, game_id)?;
            let owner = tx.square(game_id, coord)?.and_then(|square| square.state().owner());
            match owner {
                Some(owner) if tx.unclaim_if_claimed(game_id, coord)? => Ok(Some(owner)),
                _ => Ok(None),
            }
        })?;

        match previous {
            Some(owner) => info!(game_id, %coord, previous_owner = owner, "Claim revoked"),
            None => debug!(game_id, %coord, "Nothing to revoke"),
        }
        Ok(previous)
    }

    /// Raises a player's allowance by `count` squares.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::NonPositiveCount`] when `count` is zero
    /// - [`ValidationError::CountTooLarge`] when `count` or the player's new
    ///   total of extra squares exceeds [`MAX_COUNT`]
    #[instrument(skip(self, token))]
    pub fn grant_extra(
        &self,
        token: &AdminToken,
        game_id: GameId,
        player_id: PlayerId,
        count: u32,
    ) -> Result<Player, SquaresError> {
        token.authorize(game_id)?;
        let count = check_count(count, "Grant count")?;
        self.machine.auto_lock_check(game_id)?;

        let player = self
            .store()
            .write(|tx| -> Result<_, SquaresError> {
                require_game(tx, game_id)?;
                raise_bonus(tx, game_id, player_id, count)?;
                require_player(tx, game_id, player_id)
            })
            .inspect_err(|e| warn!(game_id, player_id, count, error = %e, "Grant rejected"))?;

        info!(game_id, player_id, count, bonus = player.bonus_squares(), "Extra squares granted");
        Ok(player)
    }

    /// Bars a player from claiming, joining or requesting. Squares they
    /// already hold stay theirs.
    #[instrument(skip(self, token))]
    pub fn ban(
        &self,
        token: &AdminToken,
        game_id: GameId,
        player_id: PlayerId,
    ) -> Result<Player, SquaresError> {
        let player = self.set_banned(token, game_id, player_id, true)?;
        info!(game_id, player_id, "Player banned");
        self.machine.notify(SquaresEvent::PlayerBanned { game_id, player_id });
        Ok(player)
    }

    /// Lifts a ban.
    #[instrument(skip(self, token))]
    pub fn unban(
        &self,
        token: &AdminToken,
        game_id: GameId,
        player_id: PlayerId,
    ) -> Result<Player, SquaresError> {
        let player = self.set_banned(token, game_id, player_id, false)?;
        info!(game_id, player_id, "Player unbanned");
        Ok(player)
    }

    fn set_banned(
        &self,
        token: &AdminToken,
        game_id: GameId,
        player_id: PlayerId,
        banned: bool,
    ) -> Result<Player, SquaresError> {
        token.authorize(game_id)?;
        self.machine.auto_lock_check(game_id)?;

        self.store().write(|tx| -> Result<_, SquaresError> {
            require_game(tx, game_id)?;
            if !tx.set_banned(game_id, player_id, banned)? {
                return Err(NotFoundError::Player(player_id).into());
            }
            require_player(tx, game_id, player_id)
        })
    }

    /// Asks the admin for `count` more squares.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::NonPositiveCount`] when `count` is zero
    /// - [`ValidationError::CountTooLarge`] when `count` exceeds [`MAX_COUNT`]
    /// - [`PermissionError::PlayerBanned`] for a banned player
    /// - [`ConflictError::RequestPending`] if an earlier request is undecided
    #[instrument(skip(self))]
    pub fn submit_request(
        &self,
        game_id: GameId,
        player_id: PlayerId,
        count: u32,
    ) -> Result<ClaimRequest, SquaresError> {
        let count = check_count(count, "Requested squares")?;
        self.machine.auto_lock_check(game_id)?;

        let request = self
            .store()
            .write(|tx| -> Result<_, SquaresError> {
                require_game(tx, game_id)?;
                let player = require_player(tx, game_id, player_id)?;
                if *player.banned() {
                    return Err(PermissionError::PlayerBanned(player_id).into());
                }
                if tx.pending_request(game_id, player_id)?.is_some() {
                    return Err(ConflictError::RequestPending(player_id).into());
                }
                Ok(tx.insert_request(game_id, player_id, count)?)
            })
            .inspect_err(|e| warn!(game_id, player_id, error = %e, "Request rejected"))?;

        info!(game_id, player_id, request_id = request.id(), count, "Squares requested");
        self.machine.notify(SquaresEvent::SquaresRequested {
            game_id,
            player_id,
            count,
        });
        Ok(request)
    }

    /// Decides a pending request. Approval grants the decision's count in
    /// the same transaction.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::NonPositiveCount`] for an approval of zero squares
    /// - [`ValidationError::CountTooLarge`] when the approval would take the
    ///   player's extra squares past [`MAX_COUNT`]
    /// - [`StateError::RequestResolved`] if the request was already decided
    #[instrument(skip(self, token))]
    pub fn resolve_request(
        &self,
        token: &AdminToken,
        game_id: GameId,
        request_id: RequestId,
        decision: Decision,
    ) -> Result<ClaimRequest, SquaresError> {
        token.authorize(game_id)?;
        let granted = match decision {
            Decision::Approve { count } => Some(check_count(count, "Approved squares")?),
            Decision::Deny => None,
        };
        self.machine.auto_lock_check(game_id)?;

        let request = self.store().write(|tx| -> Result<_, SquaresError> {
            let request = tx
                .request(game_id, request_id)?
                .ok_or(NotFoundError::Request(request_id))?;
            if !tx.resolve_request_if_pending(request_id, decision.status(), granted)? {
                return Err(StateError::RequestResolved(*request.status()).into());
            }
            if let Some(count) = granted {
                raise_bonus(tx, game_id, *request.player_id(), count)?;
            }
            tx.request(game_id, request_id)?
                .ok_or_else(|| NotFoundError::Request(request_id).into())
        })?;

        info!(game_id, request_id, status = %request.status(), ?granted, "Request resolved");
        self.machine.notify(SquaresEvent::RequestResolved {
            game_id,
            request_id,
            status: *request.status(),
        });
        Ok(request)
    }
}

/// Adds `count` extra squares to a player, keeping the total storable.
fn raise_bonus(
    tx: &mut StoreTx<'_>,
    game_id: GameId,
    player_id: PlayerId,
    count: u32,
) -> Result<(), SquaresError> {
    let player = require_player(tx, game_id, player_id)?;
    player
        .bonus_squares()
        .checked_add(count)
        .filter(|total| *total <= MAX_COUNT)
        .ok_or(ValidationError::CountTooLarge("Extra squares"))?;
    if !tx.add_bonus(game_id, player_id, count)? {
        return Err(NotFoundError::Player(player_id).into());
    }
    Ok(())
}

fn missing_square(game_id: GameId, coord: GridCoord) -> DbError {
    DbError::new(format!("Game {} is missing square {}", game_id, coord))
}

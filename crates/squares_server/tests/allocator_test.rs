//! Tests for claims, caps, grants, bans, revokes and square requests.

mod common;

use common::setup;
use squares_grid::{
    ConflictError, Decision, GridCoord, MAX_COUNT, NotFoundError, PermissionError, RequestStatus,
    SquareState, StateError, ValidationError,
};
use squares_server::{AdminToken, GameConfig, MAX_NAME_CHARS, SquaresError, SquaresEvent};

#[test]
fn test_concurrent_claims_have_one_winner() {
    let env = setup();
    let (game, _) = env.open_game();
    let players: Vec<_> = (0..8).map(|i| env.join(&game, &format!("Player {i}"))).collect();

    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = players
            .iter()
            .map(|player| {
                let service = env.service.clone();
                let (game_id, player_id) = (*game.id(), *player.id());
                s.spawn(move || service.claim(game_id, player_id, 4, 4))
            })
            .collect();
        handles.into_iter().map(|h| h.join().expect("Claim thread panicked")).collect()
    });

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1, "Exactly one claim should succeed");
    for result in &results {
        if let Err(e) = result {
            assert!(
                matches!(e, SquaresError::Conflict(ConflictError::AlreadyClaimed(_))),
                "Unexpected error: {e}"
            );
        }
    }

    let grid = env.service.get_grid_view(*game.id()).unwrap();
    let coord = GridCoord::new(4, 4).unwrap();
    assert_eq!(grid.square(coord), *winners[0].state());
    assert_eq!(grid.counts().claimed, 1);
}

#[test]
fn test_second_claim_on_square_conflicts() {
    let env = setup();
    let (game, _) = env.open_game();
    let alice = env.join(&game, "Alice");
    let bob = env.join(&game, "Bob");

    env.service.claim(*game.id(), *alice.id(), 0, 0).unwrap();
    let result = env.service.claim(*game.id(), *bob.id(), 0, 0);
    assert!(matches!(
        result,
        Err(SquaresError::Conflict(ConflictError::AlreadyClaimed(c)))
            if c == GridCoord::new(0, 0).unwrap()
    ));

    // Claiming your own square again is also a conflict
    assert!(env.service.claim(*game.id(), *alice.id(), 0, 0).is_err());
}

#[test]
fn test_cap_enforced_and_grant_raises_it() {
    let env = setup();
    let (game, token) = env.game(GameConfig::new("Capped", "A", "B").with_max_squares(2u32));
    let alice = env.join(&game, "Alice");
    let id = *game.id();

    env.service.claim(id, *alice.id(), 0, 0).unwrap();
    env.service.claim(id, *alice.id(), 0, 1).unwrap();
    assert!(matches!(
        env.service.claim(id, *alice.id(), 0, 2),
        Err(SquaresError::Conflict(ConflictError::CapExceeded { allowed: 2 }))
    ));

    let player = env.service.grant_extra(&token, id, *alice.id(), 2).unwrap();
    assert_eq!(*player.bonus_squares(), 2);

    env.service.claim(id, *alice.id(), 0, 2).unwrap();
    env.service.claim(id, *alice.id(), 0, 3).unwrap();
    assert!(matches!(
        env.service.claim(id, *alice.id(), 0, 4),
        Err(SquaresError::Conflict(ConflictError::CapExceeded { allowed: 4 }))
    ));

    let summary = env.service.list_players(id).unwrap();
    assert_eq!(*summary[0].claimed(), 4);
    assert_eq!(*summary[0].allowed(), Some(4));
}

#[test]
fn test_uncapped_game_allows_many_claims() {
    let env = setup();
    let (game, _) = env.open_game();
    let alice = env.join(&game, "Alice");

    for col in 0..10 {
        for row in 0..3 {
            env.service.claim(*game.id(), *alice.id(), row, col).unwrap();
        }
    }
    let summary = env.service.list_players(*game.id()).unwrap();
    assert_eq!(*summary[0].claimed(), 30);
    assert_eq!(*summary[0].allowed(), None);
}

#[test]
fn test_grant_zero_rejected() {
    let env = setup();
    let (game, token) = env.open_game();
    let alice = env.join(&game, "Alice");
    assert!(matches!(
        env.service.grant_extra(&token, *game.id(), *alice.id(), 0),
        Err(SquaresError::Validation(ValidationError::NonPositiveCount(_)))
    ));
}

#[test]
fn test_oversized_counts_are_validation_errors() {
    let env = setup();
    let (game, token) = env.game(GameConfig::new("Capped", "A", "B").with_max_squares(1u32));
    let id = *game.id();
    let alice = env.join(&game, "Alice");

    assert!(matches!(
        env.service.grant_extra(&token, id, *alice.id(), u32::MAX),
        Err(SquaresError::Validation(ValidationError::CountTooLarge(_)))
    ));
    assert!(matches!(
        env.service.submit_request(id, *alice.id(), u32::MAX),
        Err(SquaresError::Validation(ValidationError::CountTooLarge(_)))
    ));

    let topped = env.service.grant_extra(&token, id, *alice.id(), MAX_COUNT).unwrap();
    assert_eq!(*topped.bonus_squares(), MAX_COUNT);
    assert!(matches!(
        env.service.grant_extra(&token, id, *alice.id(), 1),
        Err(SquaresError::Validation(ValidationError::CountTooLarge(_)))
    ));

    let request = env.service.submit_request(id, *alice.id(), 1).unwrap();
    assert!(matches!(
        env.service
            .resolve_request(&token, id, *request.id(), Decision::Approve { count: 1 }),
        Err(SquaresError::Validation(ValidationError::CountTooLarge(_)))
    ));

    // Rejected approvals roll back: the request stays pending, the bonus unchanged.
    let requests = env.service.list_requests(id).unwrap();
    assert_eq!(*requests[0].status(), RequestStatus::Pending);
    assert_eq!(*env.service.player(id, *alice.id()).unwrap().bonus_squares(), MAX_COUNT);
}

#[test]
fn test_join_rejects_long_and_reserved_names() {
    let env = setup();
    let (game, _) = env.open_game();
    let id = *game.id();

    let long = "x".repeat(MAX_NAME_CHARS + 1);
    assert!(matches!(
        env.service.join(id, &long),
        Err(SquaresError::Validation(ValidationError::NameTooLong { max: MAX_NAME_CHARS }))
    ));
    for name in ["VOID", " void "] {
        assert!(matches!(
            env.service.join(id, name),
            Err(SquaresError::Validation(ValidationError::ReservedName(_)))
        ));
    }

    let exact = "é".repeat(MAX_NAME_CHARS);
    assert_eq!(env.join(&game, &exact).name(), &exact);
    assert_eq!(env.service.list_players(id).unwrap().len(), 1);
}

#[test]
fn test_ban_keeps_claims_and_unban_restores() {
    let env = setup();
    let (game, token) = env.open_game();
    let id = *game.id();
    let alice = env.join(&game, "Alice");
    env.service.claim(id, *alice.id(), 0, 0).unwrap();

    let banned = env.service.ban(&token, id, *alice.id()).unwrap();
    assert!(*banned.banned());
    assert!(env.notifier.events().contains(&SquaresEvent::PlayerBanned {
        game_id: id,
        player_id: *alice.id(),
    }));

    assert!(matches!(
        env.service.claim(id, *alice.id(), 0, 1),
        Err(SquaresError::Permission(PermissionError::PlayerBanned(_)))
    ));
    assert!(matches!(
        env.service.submit_request(id, *alice.id(), 2),
        Err(SquaresError::Permission(PermissionError::PlayerBanned(_)))
    ));
    assert!(matches!(
        env.service.join(id, "Alice"),
        Err(SquaresError::Permission(PermissionError::PlayerBanned(_)))
    ));

    let grid = env.service.get_grid_view(id).unwrap();
    assert_eq!(grid.owned_by(*alice.id()), vec![GridCoord::new(0, 0).unwrap()]);

    env.service.unban(&token, id, *alice.id()).unwrap();
    env.service.claim(id, *alice.id(), 0, 1).unwrap();
    let grid = env.service.get_grid_view(id).unwrap();
    assert_eq!(grid.owned_by(*alice.id()).len(), 2);
}

#[test]
fn test_revoke_returns_previous_owner() {
    let env = setup();
    let (game, token) = env.open_game();
    let id = *game.id();
    let alice = env.join(&game, "Alice");
    let bob = env.join(&game, "Bob");
    env.service.claim(id, *alice.id(), 2, 3).unwrap();

    assert_eq!(env.service.revoke(&token, id, 2, 3).unwrap(), Some(*alice.id()));
    assert_eq!(env.service.revoke(&token, id, 2, 3).unwrap(), None);

    // The square is claimable again
    env.service.claim(id, *bob.id(), 2, 3).unwrap();
}

#[test]
fn test_revoke_leaves_void_squares_void() {
    let env = setup();
    let (game, token) = env.open_game();
    let id = *game.id();
    env.service.lock(&token, id).unwrap();

    assert_eq!(env.service.revoke(&token, id, 5, 5).unwrap(), None);
    let grid = env.service.get_grid_view(id).unwrap();
    assert_eq!(grid.square(GridCoord::new(5, 5).unwrap()), SquareState::Void);
}

#[test]
fn test_admin_token_must_match_game() {
    let env = setup();
    let (game, _) = env.open_game();
    let (other, _) = env.open_game();
    let wrong = AdminToken::for_game(*other.id());

    assert!(matches!(
        env.service.revoke(&wrong, *game.id(), 0, 0),
        Err(SquaresError::Permission(PermissionError::NotGameAdmin(_)))
    ));
    assert!(matches!(
        env.service.lock(&wrong, *game.id()),
        Err(SquaresError::Permission(PermissionError::NotGameAdmin(_)))
    ));
}

#[test]
fn test_claim_validates_coordinates_and_references() {
    let env = setup();
    let (game, _) = env.open_game();
    let alice = env.join(&game, "Alice");

    assert!(matches!(
        env.service.claim(*game.id(), *alice.id(), 10, 0),
        Err(SquaresError::Validation(ValidationError::CoordinateOutOfRange { row: 10, col: 0 }))
    ));
    assert!(matches!(
        env.service.claim(*game.id(), 9999, 0, 0),
        Err(SquaresError::NotFound(NotFoundError::Player(9999)))
    ));
    assert!(matches!(
        env.service.claim(9999, *alice.id(), 0, 0),
        Err(SquaresError::NotFound(NotFoundError::Game(9999)))
    ));
}

#[test]
fn test_join_returns_existing_player() {
    let env = setup();
    let (game, _) = env.open_game();
    let first = env.join(&game, "Alice");
    let again = env.join(&game, "  Alice ");
    assert_eq!(first.id(), again.id());

    assert!(matches!(
        env.service.join(*game.id(), "   "),
        Err(SquaresError::Validation(ValidationError::EmptyField(_)))
    ));
}

#[test]
fn test_request_lifecycle() {
    let env = setup();
    let (game, token) = env.game(GameConfig::new("Capped", "A", "B").with_max_squares(1u32));
    let id = *game.id();
    let alice = env.join(&game, "Alice");

    assert!(matches!(
        env.service.submit_request(id, *alice.id(), 0),
        Err(SquaresError::Validation(_))
    ));

    let request = env.service.submit_request(id, *alice.id(), 3).unwrap();
    assert_eq!(*request.status(), RequestStatus::Pending);
    assert!(matches!(
        env.service.submit_request(id, *alice.id(), 1),
        Err(SquaresError::Conflict(ConflictError::RequestPending(_)))
    ));

    let approved = env
        .service
        .resolve_request(&token, id, *request.id(), Decision::Approve { count: 3 })
        .unwrap();
    assert_eq!(*approved.status(), RequestStatus::Approved);
    assert_eq!(*approved.granted(), Some(3));
    assert_eq!(*env.service.player(id, *alice.id()).unwrap().bonus_squares(), 3);

    assert!(matches!(
        env.service.resolve_request(&token, id, *request.id(), Decision::Deny),
        Err(SquaresError::State(StateError::RequestResolved(RequestStatus::Approved)))
    ));

    let second = env.service.submit_request(id, *alice.id(), 5).unwrap();
    let denied = env
        .service
        .resolve_request(&token, id, *second.id(), Decision::Deny)
        .unwrap();
    assert_eq!(*denied.status(), RequestStatus::Denied);
    assert_eq!(*denied.granted(), None);
    assert_eq!(*env.service.player(id, *alice.id()).unwrap().bonus_squares(), 3);

    assert_eq!(env.service.list_requests(id).unwrap().len(), 2);
}

#[test]
fn test_approve_zero_rejected() {
    let env = setup();
    let (game, token) = env.open_game();
    let alice = env.join(&game, "Alice");
    let request = env.service.submit_request(*game.id(), *alice.id(), 2).unwrap();

    assert!(matches!(
        env.service
            .resolve_request(&token, *game.id(), *request.id(), Decision::Approve { count: 0 }),
        Err(SquaresError::Validation(_))
    ));
    assert!(matches!(
        env.service
            .resolve_request(&token, *game.id(), 9999, Decision::Deny),
        Err(SquaresError::NotFound(NotFoundError::Request(9999)))
    ));
}

#[test]
fn test_full_grid_notifies() {
    let env = setup();
    let (game, _) = env.open_game();
    let alice = env.join(&game, "Alice");

    for coord in GridCoord::all() {
        env.service
            .claim(*game.id(), *alice.id(), coord.row(), coord.col())
            .unwrap();
    }

    let events = env.notifier.events();
    assert!(events.contains(&SquaresEvent::GridFull { game_id: *game.id() }));
    assert!(env.service.get_grid_view(*game.id()).unwrap().is_full());
}

//! Tests for the JSON HTTP API.

mod common;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use squares_server::{ADMIN_HEADER, router};

const ADMIN_KEY: &str = "letmein";

fn app(env: &common::TestEnv) -> Router {
    router(env.service.clone(), Some(ADMIN_KEY.to_string()))
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    admin: bool) -> (StatusCode, Value,
) {
    let mut builder = Request::builder().method(method).uri(uri);
    if admin {
        builder = builder.header(ADMIN_HEADER, ADMIN_KEY);
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).expect("Valid request"))
        .await
        .expect("Router is infallible");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Body readable")
        .to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("JSON body")
    };
    (status, value)
}

async fn create_game(app: &Router) -> String {
    let (status, game) = send(
        app,
        "POST",
        "/games",
        Some(json!({
            "name": "Office Pool",
            "team_a": "Chiefs",
            "team_b": "Eagles",
            "max_squares": 5
        })),
        true,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    game["code"].as_str().expect("Game code").to_string()
}

#[tokio::test]
async fn test_admin_routes_require_key() {
    let env = common::setup();
    let app = app(&env);

    let (status, body) = send(
        &app,
        "POST",
        "/games",
        Some(json!({"name": "Pool", "team_a": "A", "team_b": "B"})),
        false,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].is_string());

    let code = create_game(&app).await;
    let (status, _) = send(&app, "POST", &format!("/games/{code}/lock"), None, false).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_routes_closed_without_configured_key() {
    let env = common::setup();
    let app = router(env.service.clone(), None);
    let (status, _) = send(
        &app,
        "POST",
        "/games",
        Some(json!({"name": "Pool", "team_a": "A", "team_b": "B"})),
        true,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_full_game_over_http() {
    let env = common::setup();
    let app = app(&env);
    let code = create_game(&app).await;

    let (status, game) = send(
        &app,
        "GET",
        &format!("/games/{}", code.to_lowercase()),
        None,
        false,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(game["phase"], "open");

    let (status, alice) = send(
        &app,
        "POST",
        &format!("/games/{code}/players"),
        Some(json!({"name": "Alice"})),
        false,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let alice_id = alice["id"].as_i64().expect("Player id");

    let (status, bob) = send(
        &app,
        "POST",
        &format!("/games/{code}/players"),
        Some(json!({"name": "Bob"})),
        false,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let bob_id = bob["id"].as_i64().expect("Player id");

    let claim =
        |player_id: i64, row: u8, col: u8| json!({"player_id": player_id, "row": row, "col": col});
    let (status, square) = send(
        &app,
        "POST",
        &format!("/games/{code}/claims"),
        Some(claim(alice_id, 0, 0)),
        false,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(square["state"]["status"], "claimed");
    assert_eq!(square["state"]["owner"], alice_id);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/games/{code}/claims"),
        Some(claim(bob_id, 0, 0)),
        false,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/games/{code}/claims"),
        Some(claim(bob_id, 10, 0)),
        false,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, players) = send(&app, "GET", &format!("/games/{code}/players"), None, false).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(players[0]["claimed"], 1);
    assert_eq!(players[0]["allowed"], 5);

    let (status, locked) = send(&app, "POST", &format!("/games/{code}/lock"), None, true).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(locked["voided"], 99);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/games/{code}/claims"),
        Some(claim(bob_id, 1, 1)),
        false,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, numbers) = send(&app, "POST", &format!("/games/{code}/release"), None, true).await;
    assert_eq!(status, StatusCode::OK);
    let row_digit = numbers["rows"][0].as_u64().expect("Row digit");
    let col_digit = numbers["cols"][0].as_u64().expect("Column digit");

    let uri = format!(
        "/games/{code}/winner?quarter=1&score_a={}&score_b={}",
        20 + row_digit,
        30 + col_digit
    );
    let (status, result) = send(&app, "GET", &uri, None, false).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["outcome"]["kind"], "winner");
    assert_eq!(result["outcome"]["player"], alice_id);

    let (status, _) = send(
        &app,
        "GET",
        &format!("/games/{code}/winner?quarter=9&score_a=0&score_b=0"),
        None,
        false,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, grid) = send(&app, "GET", &format!("/games/{code}/grid"), None, false).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(grid["phase"], "numbers_released");
    assert_eq!(grid["squares"].as_array().map(Vec::len), Some(100));
}

#[tokio::test]
async fn test_requests_and_bans_over_http() {
    let env = common::setup();
    let app = app(&env);
    let code = create_game(&app).await;

    let (_, alice) = send(
        &app,
        "POST",
        &format!("/games/{code}/players"),
        Some(json!({"name": "Alice"})),
        false,
    )
    .await;
    let alice_id = alice["id"].as_i64().expect("Player id");

    let (status, request) = send(
        &app,
        "POST",
        &format!("/games/{code}/requests"),
        Some(json!({"player_id": alice_id, "count": 2})),
        false,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(request["status"], "pending");
    let request_id = request["id"].as_i64().expect("Request id");

    let (status, resolved) = send(
        &app,
        "POST",
        &format!("/games/{code}/requests/{request_id}"),
        Some(json!({"decision": "approve", "count": 2})),
        true,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resolved["status"], "approved");

    let (status, _) = send(
        &app,
        "POST",
        &format!("/games/{code}/requests/{request_id}"),
        Some(json!({"decision": "deny"})),
        true,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, player) = send(
        &app,
        "POST",
        &format!("/games/{code}/players/{alice_id}/ban"),
        None,
        true,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(player["banned"], true);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/games/{code}/claims"),
        Some(json!({"player_id": alice_id, "row": 0, "col": 0})),
        false,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, player) = send(
        &app,
        "DELETE",
        &format!("/games/{code}/players/{alice_id}/ban"),
        None,
        true,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(player["banned"], false);
    assert_eq!(player["bonus_squares"], 2);

    let (status, requests) = send(
        &app,
        "GET",
        &format!("/games/{code}/requests"),
        None,
        true,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(requests.as_array().map(Vec::len), Some(1));

    let (status, body) = send(
        &app,
        "POST",
        &format!("/games/{code}/players/{alice_id}/grant"),
        Some(json!({"count": u32::MAX})),
        true,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_game_listing_over_http() {
    let env = common::setup();
    let app = app(&env);
    let code = create_game(&app).await;

    let (_, alice) = send(
        &app,
        "POST",
        &format!("/games/{code}/players"),
        Some(json!({"name": "Alice"})),
        false,
    )
    .await;
    let alice_id = alice["id"].as_i64().expect("Player id");
    let (status, _) = send(
        &app,
        "POST",
        &format!("/games/{code}/claims"),
        Some(json!({"player_id": alice_id, "row": 2, "col": 3})),
        false,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", "/games", None, false).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, games) = send(&app, "GET", "/games", None, true).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(games.as_array().map(Vec::len), Some(1));
    assert_eq!(games[0]["game"]["code"], code.as_str());
    assert_eq!(games[0]["claimed"], 1);
    assert_eq!(games[0]["players"], 1);
}

#[tokio::test]
async fn test_unknown_game_and_delete() {
    let env = common::setup();
    let app = app(&env);

    let (status, _) = send(&app, "GET", "/games/ZZZZZZ", None, false).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let code = create_game(&app).await;
    let (status, _) = send(&app, "DELETE", &format!("/games/{code}"), None, true).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", &format!("/games/{code}"), None, false).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

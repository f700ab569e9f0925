//! JSON HTTP API over [`SquaresService`].
//!
//! Games are addressed by display code. Admin routes require the
//! `x-squares-admin` header to match the configured admin key. Store calls
//! are blocking, so every handler hands its work to tokio's blocking pool.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use squares_grid::{Decision, GameId, PlayerId, Quarter, RequestId};
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

use crate::admin::AdminToken;
use crate::error::SquaresError;
use crate::service::{GameConfig, SquaresService};

/// Header carrying the admin key.
pub const ADMIN_HEADER: &str = "x-squares-admin";

/// Shared handler state.
#[derive(Debug, Clone)]
struct ApiState {
    service: SquaresService,
    admin_key: Option<Arc<str>>,
}

/// Builds the router. With no admin key configured, admin routes always
/// answer 403.
#[instrument(skip(service, admin_key))]
pub fn router(service: SquaresService, admin_key: Option<String>) -> Router {
    let state = ApiState {
        service,
        admin_key: admin_key.map(Arc::from),
    };

    Router::new()
        .route("/games", get(list_games).post(create_game))
        .route("/games/{code}", get(get_game).delete(delete_game))
        .route("/games/{code}/grid", get(get_grid))
        .route("/games/{code}/players", get(list_players).post(join))
        .route("/games/{code}/players/{player_id}/grant", post(grant_extra))
        .route("/games/{code}/players/{player_id}/ban", post(ban).delete(unban))
        .route("/games/{code}/claims", post(claim))
        .route("/games/{code}/squares/{row}/{col}", delete(revoke))
        .route("/games/{code}/lock", post(lock))
        .route("/games/{code}/unlock", post(unlock))
        .route("/games/{code}/release", post(release_numbers))
        .route("/games/{code}/requests", get(list_requests).post(submit_request))
        .route("/games/{code}/requests/{request_id}", post(resolve_request))
        .route("/games/{code}/winner", get(winner))
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────
//  Errors
// ─────────────────────────────────────────────────────────────

/// Handler failure rendered as `{"error": "..."}`.
#[derive(Debug, derive_more::Display, derive_more::From)]
pub enum ApiError {
    /// Rejected or failed squares operation.
    #[display("{_0}")]
    Squares(SquaresError),
    /// Missing or wrong admin key.
    #[display("Admin key required")]
    #[from(ignore)]
    Unauthorized,
    /// The blocking task panicked or was cancelled.
    #[display("Internal error: {_0}")]
    #[from(ignore)]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Squares(SquaresError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Squares(SquaresError::State(_) | SquaresError::Conflict(_)) => {
                StatusCode::CONFLICT
            }
            ApiError::Squares(SquaresError::Permission(_)) | ApiError::Unauthorized => {
                StatusCode::FORBIDDEN
            }
            ApiError::Squares(SquaresError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Squares(SquaresError::Storage(_)) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            debug!(%status, error = %self, "Request rejected");
        }
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

impl From<squares_grid::ValidationError> for ApiError {
    fn from(err: squares_grid::ValidationError) -> Self {
        ApiError::Squares(err.into())
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Runs store work on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, SquaresError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

impl ApiState {
    fn authorize(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let supplied = headers.get(ADMIN_HEADER).and_then(|v| v.to_str().ok());
        match (self.admin_key.as_deref(), supplied) {
            (Some(expected), Some(supplied)) if expected == supplied => Ok(()),
            _ => {
                warn!("Admin route called without a valid admin key");
                Err(ApiError::Unauthorized)
            }
        }
    }

    fn game_id(&self, code: &str) -> Result<GameId, SquaresError> {
        Ok(*self.service.game_by_code(code)?.id())
    }
}

// ─────────────────────────────────────────────────────────────
//  Games
// ─────────────────────────────────────────────────────────────

async fn create_game(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(config): Json<GameConfig>,
) -> Result<impl IntoResponse, ApiError> {
    state.authorize(&headers)?;
    let game = blocking(move || state.service.create_game(config)).await?;
    Ok((StatusCode::CREATED, Json(game)))
}

async fn list_games(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<Vec<crate::GameSummary>> {
    state.authorize(&headers)?;
    blocking(move || state.service.games()).await.map(Json)
}

async fn get_game(
    State(state): State<ApiState>,
    Path(code): Path<String>,
) -> ApiResult<crate::Game> {
    blocking(move || state.service.game_by_code(&code)).await.map(Json)
}

async fn delete_game(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(code): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.authorize(&headers)?;
    blocking(move || {
        let game_id = state.game_id(&code)?;
        state.service.delete_game(&AdminToken::for_game(game_id), game_id)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_grid(
    State(state): State<ApiState>,
    Path(code): Path<String>,
) -> ApiResult<squares_grid::GridSnapshot> {
    blocking(move || {
        let game_id = state.game_id(&code)?;
        state.service.get_grid_view(game_id)
    })
    .await
    .map(Json)
}

#[derive(Debug, Deserialize)]
struct WinnerQuery {
    quarter: u8,
    score_a: u32,
    score_b: u32,
}

async fn winner(
    State(state): State<ApiState>,
    Path(code): Path<String>,
    Query(query): Query<WinnerQuery>,
) -> ApiResult<squares_grid::QuarterResult> {
    let quarter = Quarter::try_from(query.quarter)?;
    blocking(move || {
        let game_id = state.game_id(&code)?;
        state
            .service
            .resolve_winner(game_id, quarter, query.score_a, query.score_b)
    })
    .await
    .map(Json)
}

// ─────────────────────────────────────────────────────────────
//  Lifecycle
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct LockResponse {
    voided: usize,
}

#[derive(Debug, Serialize)]
struct UnlockResponse {
    restored: usize,
}

async fn lock(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(code): Path<String>,
) -> ApiResult<LockResponse> {
    state.authorize(&headers)?;
    blocking(move || {
        let game_id = state.game_id(&code)?;
        state.service.lock(&AdminToken::for_game(game_id), game_id)
    })
    .await
    .map(|voided| Json(LockResponse { voided }))
}

async fn unlock(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(code): Path<String>,
) -> ApiResult<UnlockResponse> {
    state.authorize(&headers)?;
    blocking(move || {
        let game_id = state.game_id(&code)?;
        state.service.unlock(&AdminToken::for_game(game_id), game_id)
    })
    .await
    .map(|restored| Json(UnlockResponse { restored }))
}

async fn release_numbers(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(code): Path<String>,
) -> ApiResult<squares_grid::AssignedNumbers> {
    state.authorize(&headers)?;
    blocking(move || {
        let game_id = state.game_id(&code)?;
        state
            .service
            .release_numbers(&AdminToken::for_game(game_id), game_id)
    })
    .await
    .map(Json)
}

// ─────────────────────────────────────────────────────────────
//  Players and squares
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct JoinBody {
    name: String,
}

async fn join(
    State(state): State<ApiState>,
    Path(code): Path<String>,
    Json(body): Json<JoinBody>,
) -> ApiResult<crate::Player> {
    blocking(move || {
        let game_id = state.game_id(&code)?;
        state.service.join(game_id, &body.name)
    })
    .await
    .map(Json)
}

async fn list_players(
    State(state): State<ApiState>,
    Path(code): Path<String>,
) -> ApiResult<Vec<crate::PlayerSummary>> {
    blocking(move || {
        let game_id = state.game_id(&code)?;
        state.service.list_players(game_id)
    })
    .await
    .map(Json)
}

#[derive(Debug, Deserialize)]
struct ClaimBody {
    player_id: PlayerId,
    row: u8,
    col: u8,
}

async fn claim(
    State(state): State<ApiState>,
    Path(code): Path<String>,
    Json(body): Json<ClaimBody>,
) -> ApiResult<crate::Square> {
    blocking(move || {
        let game_id = state.game_id(&code)?;
        state.service.claim(game_id, body.player_id, body.row, body.col)
    })
    .await
    .map(Json)
}

#[derive(Debug, Serialize)]
struct RevokeResponse {
    previous_owner: Option<PlayerId>,
}

async fn revoke(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((code, row, col)): Path<(String, u8, u8)>,
) -> ApiResult<RevokeResponse> {
    state.authorize(&headers)?;
    blocking(move || {
        let game_id = state.game_id(&code)?;
        state
            .service
            .revoke(&AdminToken::for_game(game_id), game_id, row, col)
    })
    .await
    .map(|previous_owner| Json(RevokeResponse { previous_owner }))
}

#[derive(Debug, Deserialize)]
struct CountBody {
    count: u32,
}

async fn grant_extra(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((code, player_id)): Path<(String, PlayerId)>,
    Json(body): Json<CountBody>,
) -> ApiResult<crate::Player> {
    state.authorize(&headers)?;
    blocking(move || {
        let game_id = state.game_id(&code)?;
        state
            .service
            .grant_extra(&AdminToken::for_game(game_id), game_id, player_id, body.count)
    })
    .await
    .map(Json)
}

async fn ban(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((code, player_id)): Path<(String, PlayerId)>,
) -> ApiResult<crate::Player> {
    state.authorize(&headers)?;
    blocking(move || {
        let game_id = state.game_id(&code)?;
        state.service.ban(&AdminToken::for_game(game_id), game_id, player_id)
    })
    .await
    .map(Json)
}

async fn unban(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((code, player_id)): Path<(String, PlayerId)>,
) -> ApiResult<crate::Player> {
    state.authorize(&headers)?;
    blocking(move || {
        let game_id = state.game_id(&code)?;
        state.service.unban(&AdminToken::for_game(game_id), game_id, player_id)
    })
    .await
    .map(Json)
}

// ─────────────────────────────────────────────────────────────
//  Requests
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RequestBody {
    player_id: PlayerId,
    count: u32,
}

async fn submit_request(
    State(state): State<ApiState>,
    Path(code): Path<String>,
    Json(body): Json<RequestBody>,
) -> ApiResult<crate::ClaimRequest> {
    blocking(move || {
        let game_id = state.game_id(&code)?;
        state.service.submit_request(game_id, body.player_id, body.count)
    })
    .await
    .map(Json)
}

async fn list_requests(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(code): Path<String>,
) -> ApiResult<Vec<crate::ClaimRequest>> {
    state.authorize(&headers)?;
    blocking(move || {
        let game_id = state.game_id(&code)?;
        state.service.list_requests(game_id)
    })
    .await
    .map(Json)
}

async fn resolve_request(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((code, request_id)): Path<(String, RequestId)>,
    Json(decision): Json<Decision>,
) -> ApiResult<crate::ClaimRequest> {
    state.authorize(&headers)?;
    blocking(move || {
        let game_id = state.game_id(&code)?;
        state
            .service
            .resolve_request(&AdminToken::for_game(game_id), game_id, request_id, decision)
    })
    .await
    .map(Json)
}

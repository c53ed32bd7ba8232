// HTTP API: axum router, handlers and error mapping.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::db::RecommendationRecord;
use crate::draft::league::{Draft, League, User};
use crate::draft::pick::Pick;
use crate::draft::player::PlayerCatalog;
use crate::error::ServiceError;
use crate::player_sync::{SyncOutcome, SyncStatusReport};
use crate::rate_limit::{retry_after_secs, RateLimiter};
use crate::recommend::{RecommendRequest, RecommendationResponse, Recommender};
use crate::sleeper::UpstreamError;

const DEFAULT_HISTORY_LIMIT: usize = 20;
const MAX_HISTORY_LIMIT: usize = 200;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ApiState {
    pub recommender: Arc<Recommender>,
    pub limiter: Arc<RateLimiter>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    error: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    retry_after: Option<u64>,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            retry_after: None,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let (status, retry_after) = match &err {
            ServiceError::Upstream(up) => (upstream_status(up), None),
            ServiceError::Validation(_) => (StatusCode::BAD_REQUEST, None),
            ServiceError::RateLimited { retry_after_secs } => {
                (StatusCode::TOO_MANY_REQUESTS, Some(*retry_after_secs))
            }
            ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, None),
            ServiceError::Internal(e) => {
                error!(error = %format!("{e:#}"), "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
        };
        Self {
            status,
            message: err.to_string(),
            retry_after,
        }
    }
}

fn upstream_status(err: &UpstreamError) -> StatusCode {
    match err {
        UpstreamError::Timeout { .. } | UpstreamError::Transport { .. } => {
            StatusCode::GATEWAY_TIMEOUT
        }
        UpstreamError::Status { .. } if err.is_not_found() => StatusCode::NOT_FOUND,
        UpstreamError::Status { .. } | UpstreamError::Decode { .. } => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorBody {
            error: self.message,
        });
        match self.retry_after {
            Some(secs) => (
                self.status,
                [(header::RETRY_AFTER, secs.to_string())],
                body,
            )
                .into_response(),
            None => (self.status, body).into_response(),
        }
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DiscoverQuery {
    username: Option<String>,
    season: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DraftsQuery {
    league_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PicksQuery {
    draft_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    draft_id: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SyncQuery {
    #[serde(default)]
    force: bool,
}

#[derive(Debug, Serialize)]
struct RootResponse {
    message: &'static str,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    llm_configured: bool,
    cache_entries: usize,
    players_stored: usize,
    sync: SyncStatusReport,
}

#[derive(Debug, Serialize)]
struct DiscoverResponse {
    user_id: String,
    user: User,
    leagues: Vec<League>,
}

#[derive(Debug, Serialize)]
struct DraftsResponse {
    drafts: Vec<Draft>,
}

#[derive(Debug, Serialize)]
struct PicksResponse {
    picks: Vec<Pick>,
}

#[derive(Debug, Serialize)]
struct PlayersResponse<'a> {
    count: usize,
    players: &'a PlayerCatalog,
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    draft_id: String,
    recommendations: Vec<RecommendationRecord>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the application router with CORS for `allowed_origins`. An empty
/// list or `"*"` allows any origin.
pub fn router(state: ApiState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/discover", get(discover))
        .route("/drafts", get(drafts))
        .route("/picks", get(picks))
        .route("/players", get(players))
        .route("/recommend", post(recommend))
        .route("/recommendations", get(recommendations))
        .route("/sync", post(sync))
        .route("/sync/status", get(sync_status))
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o.trim() == "*") {
        return base.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o.trim()) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(origins))
}

/// Serve until `shutdown` resolves. Client addresses are exposed to
/// handlers for rate limiting.
pub async fn serve<F>(listener: tokio::net::TcpListener, app: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!("HTTP API listening on http://{addr}");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Sleeper Draft Assistant API",
        status: "healthy",
    })
}

async fn health(State(state): State<ApiState>) -> ApiResult<HealthResponse> {
    let rec = &state.recommender;
    Ok(Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().timestamp(),
        llm_configured: rec.llm_enabled(),
        cache_entries: rec.cache().len(),
        players_stored: rec.stored_player_count().await?,
        sync: rec.player_sync().status(),
    }))
}

async fn discover(
    State(state): State<ApiState>,
    Query(q): Query<DiscoverQuery>,
) -> ApiResult<DiscoverResponse> {
    let username = required(q.username, "username")?;
    let season = required(q.season, "season")?;
    let found = state.recommender.discover(&username, &season).await?;
    Ok(Json(DiscoverResponse {
        user_id: found.user.user_id.clone(),
        user: found.user,
        leagues: found.leagues,
    }))
}

async fn drafts(
    State(state): State<ApiState>,
    Query(q): Query<DraftsQuery>,
) -> ApiResult<DraftsResponse> {
    let league_id = required(q.league_id, "league_id")?;
    let drafts = state.recommender.drafts(&league_id).await?;
    Ok(Json(DraftsResponse { drafts }))
}

async fn picks(
    State(state): State<ApiState>,
    Query(q): Query<PicksQuery>,
) -> ApiResult<PicksResponse> {
    let draft_id = required(q.draft_id, "draft_id")?;
    let picks = state.recommender.picks(&draft_id).await?;
    Ok(Json(PicksResponse { picks }))
}

async fn players(State(state): State<ApiState>) -> std::result::Result<Response, ApiError> {
    let players = state.recommender.players().await?;
    Ok(Json(PlayersResponse {
        count: players.len(),
        players: &players,
    })
    .into_response())
}

async fn recommend(
    State(state): State<ApiState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: std::result::Result<Json<RecommendRequest>, JsonRejection>,
) -> ApiResult<RecommendationResponse> {
    if let Err(retry_after) = state.limiter.check(addr.ip()) {
        return Err(ServiceError::RateLimited {
            retry_after_secs: retry_after_secs(retry_after),
        }
        .into());
    }

    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let (draft_id, team_on_clock, strategy) = request.validate()?;
    let response = state
        .recommender
        .recommend(&draft_id, &team_on_clock, strategy)
        .await?;
    Ok(Json(response))
}

async fn recommendations(
    State(state): State<ApiState>,
    Query(q): Query<HistoryQuery>,
) -> ApiResult<HistoryResponse> {
    let draft_id = required(q.draft_id, "draft_id")?;
    let limit = q
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let recommendations = state.recommender.history(&draft_id, limit).await?;
    Ok(Json(HistoryResponse {
        draft_id,
        recommendations,
    }))
}

async fn sync(
    State(state): State<ApiState>,
    Query(q): Query<SyncQuery>,
) -> ApiResult<SyncOutcome> {
    let outcome = state.recommender.player_sync().sync_players(q.force).await?;
    Ok(Json(outcome))
}

async fn sync_status(State(state): State<ApiState>) -> Json<SyncStatusReport> {
    Json(state.recommender.player_sync().status())
}

fn required(value: Option<String>, name: &str) -> std::result::Result<String, ApiError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::bad_request(format!("{name} is required"))),
    }
}

use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use server_api::ApiContext;
use shared::{
    domain::UserId,
    error::{ApiError, ErrorCode},
    protocol::{LoginRequest, LoginResponse, RpcMethod},
};
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod auth;
mod config;

use app_state::AppState;
use auth::{bearer_token, mint_token, verify_token, AuthConfig};
use config::{load_settings, prepare_database_url};

const MAX_REQUEST_BYTES: usize = 64 * 1024;

type HttpError = (StatusCode, Json<ApiError>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let state = AppState {
        api: ApiContext { storage },
        auth: AuthConfig {
            jwt_secret: settings.jwt_secret,
            ttl_seconds: settings.token_ttl_seconds,
        },
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/rpc/:method", post(rpc))
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BYTES))
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, HttpError> {
    state.api.storage.health_check().await.map_err(|e| {
        error!(error = %e, "health check failed");
        http_error(ApiError::new(ErrorCode::Internal, e.to_string()))
    })?;
    Ok("ok")
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, HttpError> {
    let user_id = server_api::register(&state.api, &req)
        .await
        .map_err(http_error)?;
    issue_session(&state, user_id)
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, HttpError> {
    let user_id = server_api::authenticate(&state.api, &req)
        .await
        .map_err(|err| {
            warn!(username = %req.username, "rejected login");
            http_error(err)
        })?;
    info!(user_id = user_id.0, "user logged in");
    issue_session(&state, user_id)
}

async fn rpc(
    State(state): State<Arc<AppState>>,
    Path(method): Path<String>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, HttpError> {
    let user_id = authorize(&state, &headers)?;
    let method = RpcMethod::from_name(&method).ok_or_else(|| {
        http_error(ApiError::new(
            ErrorCode::NotFound,
            format!("unknown method '{method}'"),
        ))
    })?;

    match server_api::dispatch(&state.api, user_id, method, body).await {
        Ok(response) => Ok(Json(response)),
        Err(err) => {
            warn!(user_id = user_id.0, %method, code = ?err.code, message = %err.message, "rpc failed");
            Err(http_error(err))
        }
    }
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<UserId, HttpError> {
    bearer_token(headers)
        .and_then(|token| verify_token(&state.auth, token))
        .ok_or_else(|| {
            http_error(ApiError::new(
                ErrorCode::Unauthorized,
                "missing or invalid session token",
            ))
        })
}

fn issue_session(state: &AppState, user_id: UserId) -> Result<Json<LoginResponse>, HttpError> {
    let token = mint_token(&state.auth, user_id).map_err(|e| {
        http_error(ApiError::new(
            ErrorCode::Internal,
            format!("failed to mint token: {e}"),
        ))
    })?;
    Ok(Json(LoginResponse {
        uid: user_id,
        token,
    }))
}

fn http_error(err: ApiError) -> HttpError {
    let status = match err.code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(err))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;

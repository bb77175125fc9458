use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::digest::{build_digest, DIGEST_TOP_CONVERSATIONS, PREVIEW_TOP_CONVERSATIONS};
use crate::notifier::send_digest;
use crate::records::{MemoryRecordStore, RecordStore};
use crate::session::{SessionStore, TeamProfile, UserSession};
use crate::slack::types::OAUTH_AUTHORIZE_URL;
use crate::slack::SlackClient;
use crate::sync::{sync_user_dms, SyncError};

use super::auth::{authenticate, issue_session_token, AuthError};
use super::config::{ServiceConfig, OAUTH_SCOPES};
use super::jobs::start_batch_jobs;
use super::state::AppState;
use super::BoxError;

pub async fn run_server(
    config: ServiceConfig,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), BoxError> {
    let config = Arc::new(config);
    let slack = Arc::new(SlackClient::new());
    let sessions = Arc::new(SessionStore::new());
    let records: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());

    let jobs = start_batch_jobs(
        config.clone(),
        slack.clone(),
        sessions.clone(),
        records.clone(),
    );

    let state = AppState {
        config: config.clone(),
        slack,
        sessions,
        records,
    };

    let cors = CorsLayer::new()
        .allow_origin(config.frontend_url.parse::<HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let host: IpAddr = config
        .host
        .parse()
        .map_err(|_| format!("invalid host: {}", config.host))?;
    let addr = SocketAddr::new(host, config.port);
    info!("DM tracker service listening on {}", addr);

    let app = Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/auth/install", get(auth_install))
        .route("/auth/callback", get(auth_callback))
        .route("/api/user", get(api_user))
        .route("/api/dms", get(api_dms))
        .route("/api/sync-dms", post(api_sync_dms))
        .route("/api/send-digest", post(api_send_digest))
        .route("/api/digest", get(api_digest))
        .with_state(state)
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;
    jobs.stop();
    serve_result?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "OK",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Redirect to the provider's authorization page.
/// GET /auth/install
async fn auth_install(State(state): State<AppState>) -> impl IntoResponse {
    let client_id = match &state.config.slack_client_id {
        Some(id) => id.clone(),
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "error": "Slack OAuth not configured (missing SLACK_CLIENT_ID)"
                })),
            )
                .into_response();
        }
    };

    let redirect_uri = state.config.redirect_uri();
    let auth_url = format!(
        "{}?client_id={}&scope={}&redirect_uri={}",
        OAUTH_AUTHORIZE_URL,
        urlencoding::encode(&client_id),
        urlencoding::encode(OAUTH_SCOPES),
        urlencoding::encode(&redirect_uri)
    );

    Redirect::temporary(&auth_url).into_response()
}

#[derive(Debug, serde::Deserialize)]
struct AuthCallbackParams {
    code: Option<String>,
    error: Option<String>,
}

/// Handle the provider's OAuth callback.
/// GET /auth/callback?code=...
///
/// Every failure path redirects back to the dashboard with an error
/// indicator instead of rendering a raw failure page.
async fn auth_callback(
    State(state): State<AppState>,
    Query(params): Query<AuthCallbackParams>,
) -> impl IntoResponse {
    let frontend = &state.config.frontend_url;

    if let Some(error) = params.error {
        error!("OAuth error from provider: {}", error);
        return frontend_error_redirect(frontend, &error);
    }

    let code = match params.code {
        Some(code) => code,
        None => return frontend_error_redirect(frontend, "no_code"),
    };

    let (client_id, client_secret) = match (
        &state.config.slack_client_id,
        &state.config.slack_client_secret,
    ) {
        (Some(id), Some(secret)) => (id.clone(), secret.clone()),
        _ => {
            error!("OAuth callback hit without client credentials configured");
            return frontend_error_redirect(frontend, "oauth_not_configured");
        }
    };

    match establish_session(&state, &client_id, &client_secret, &code).await {
        Ok((token, user_json)) => {
            let url = format!(
                "{}?token={}&user={}",
                frontend,
                token,
                urlencoding::encode(&user_json)
            );
            Redirect::temporary(&url).into_response()
        }
        Err(err) => {
            error!("OAuth callback failed: {}", err);
            frontend_error_redirect(frontend, &err.to_string())
        }
    }
}

/// Exchange the code, fetch the user profile, store the session and issue
/// the dashboard's JWT. Returns the token plus the user profile JSON the
/// dashboard expects in the redirect.
async fn establish_session(
    state: &AppState,
    client_id: &str,
    client_secret: &str,
    code: &str,
) -> Result<(String, String), BoxError> {
    let redirect_uri = state.config.redirect_uri();
    let access = state
        .slack
        .oauth_access(client_id, client_secret, code, &redirect_uri)
        .await?;

    let bot_token = access.access_token.clone();
    let authed_user = access
        .authed_user
        .ok_or("oauth response carried no authed_user")?;
    let user_token = authed_user
        .access_token
        .or_else(|| bot_token.clone())
        .ok_or("oauth response carried no access token")?;

    let user = state.slack.user_info(&user_token, &authed_user.id).await?;

    let (team_id, team_name) = match access.team {
        Some(team) => (
            team.id.unwrap_or_default(),
            team.name.unwrap_or_default(),
        ),
        None => (String::new(), String::new()),
    };
    let team = TeamProfile {
        id: team_id.clone(),
        name: team_name.clone(),
        domain: if team_name.is_empty() {
            "app".to_string()
        } else {
            team_name.to_lowercase()
        },
    };

    let user_json = serde_json::to_string(&user)?;
    let session = UserSession {
        user_id: authed_user.id.clone(),
        team_id: team_id.clone(),
        access_token: user_token,
        bot_token,
        user,
        team,
        created_at: Utc::now(),
    };
    state.sessions.upsert(session);
    info!("stored session for user {}", authed_user.id);

    let token = issue_session_token(&state.config.jwt_secret, &authed_user.id, &team_id)?;
    Ok((token, user_json))
}

fn frontend_error_redirect(frontend_url: &str, error: &str) -> Response {
    let url = format!("{}?error={}", frontend_url, urlencoding::encode(error));
    Redirect::temporary(&url).into_response()
}

/// Resolve the bearer token to a live session, or produce the error
/// response directly.
fn authorize(state: &AppState, headers: &HeaderMap) -> Result<UserSession, Response> {
    let claims = match authenticate(&state.config.jwt_secret, headers) {
        Ok(claims) => claims,
        Err(AuthError::MissingToken) => {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "No token provided" })),
            )
                .into_response());
        }
        Err(err) => {
            error!("session token rejected: {}", err);
            return Err((
                StatusCode::FORBIDDEN,
                Json(serde_json::json!({ "error": "Invalid token" })),
            )
                .into_response());
        }
    };

    match state.sessions.get(&claims.user_id) {
        Some(session) => Ok(session),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "User not found" })),
        )
            .into_response()),
    }
}

/// GET /api/user — current user and team profile.
async fn api_user(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = match authorize(&state, &headers) {
        Ok(session) => session,
        Err(response) => return response,
    };
    Json(serde_json::json!({
        "user": session.user,
        "team": session.team,
    }))
    .into_response()
}

/// GET /api/dms — the stored record set for the user.
async fn api_dms(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = match authorize(&state, &headers) {
        Ok(session) => session,
        Err(response) => return response,
    };
    match state.records.get(&session.user_id) {
        Ok(records) => Json(records).into_response(),
        Err(err) => {
            error!("record fetch failed for {}: {}", session.user_id, err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Failed to fetch DMs" })),
            )
                .into_response()
        }
    }
}

/// POST /api/sync-dms — fetch, resolve and replace the user's record set.
async fn api_sync_dms(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = match authorize(&state, &headers) {
        Ok(session) => session,
        Err(response) => return response,
    };

    match sync_user_dms(&state.slack, &session, state.records.as_ref()).await {
        Ok(records) => Json(serde_json::json!({
            "success": true,
            "count": records.len(),
            "dms": records,
        }))
        .into_response(),
        Err(err @ SyncError::Slack(_)) => {
            error!("DM sync failed for {}: {}", session.user_id, err);
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": "Failed to sync DMs" })),
            )
                .into_response()
        }
        Err(err) => {
            error!("DM sync failed for {}: {}", session.user_id, err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Failed to sync DMs" })),
            )
                .into_response()
        }
    }
}

/// POST /api/send-digest — today's digest, delivered as a DM.
async fn api_send_digest(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = match authorize(&state, &headers) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let records = match state.records.get(&session.user_id) {
        Ok(records) => records,
        Err(err) => {
            error!("record fetch failed for {}: {}", session.user_id, err);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Failed to send digest" })),
            )
                .into_response();
        }
    };

    let digest = build_digest(&records, Utc::now().date_naive(), DIGEST_TOP_CONVERSATIONS);
    match send_digest(&state.slack, &session, &digest).await {
        Ok(()) => Json(serde_json::json!({
            "success": true,
            "digest": digest,
        }))
        .into_response(),
        Err(err) => {
            error!("digest send failed for {}: {}", session.user_id, err);
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": "Failed to send digest" })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct DigestParams {
    date: Option<NaiveDate>,
}

/// GET /api/digest?date=YYYY-MM-DD — on-demand preview, nothing is sent.
async fn api_digest(
    State(state): State<AppState>,
    Query(params): Query<DigestParams>,
    headers: HeaderMap,
) -> Response {
    let session = match authorize(&state, &headers) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let records = match state.records.get(&session.user_id) {
        Ok(records) => records,
        Err(err) => {
            error!("record fetch failed for {}: {}", session.user_id, err);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Failed to build digest" })),
            )
                .into_response();
        }
    };

    let date = params.date.unwrap_or_else(|| Utc::now().date_naive());
    let digest = build_digest(&records, date, PREVIEW_TOP_CONVERSATIONS);
    Json(digest).into_response()
}

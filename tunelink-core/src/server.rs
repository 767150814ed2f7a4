//! HTTP surface: `/health`, `/slack/callback` and `/spotify/callback`.

use axum::Router;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header::{CONTENT_TYPE, LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::{AppError, MalformedQuery};
use crate::orchestrator::{ChatHandoff, LinkOrchestrator};
use crate::types::CallbackQuery;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<LinkOrchestrator>,
    /// Completion page HTML, served after a successful link.
    pub completion_page: Arc<str>,
}

impl AppState {
    pub fn new(orchestrator: LinkOrchestrator, completion_page: impl Into<Arc<str>>) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            completion_page: completion_page.into(),
        }
    }
}

/// Read the completion page once at startup.
pub async fn load_completion_page(path: &Path) -> std::io::Result<String> {
    tokio::fs::read_to_string(path).await
}

/// Build the axum Router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/slack/callback", get(slack_callback))
        .route("/spotify/callback", get(spotify_callback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    ([(CONTENT_TYPE, "text/plain; charset=utf-8")], "OK")
}

/// Unwrap the query extractor, keeping a decode failure for the orchestrator.
fn callback_query(
    query: Result<Query<CallbackQuery>, QueryRejection>,
) -> Result<CallbackQuery, MalformedQuery> {
    query
        .map(|Query(query)| query)
        .map_err(|e| MalformedQuery {
            message: e.body_text(),
        })
}

async fn slack_callback(
    State(state): State<AppState>,
    query: Result<Query<CallbackQuery>, QueryRejection>,
) -> Response {
    match state
        .orchestrator
        .complete_chat_auth(callback_query(query))
        .await
    {
        Ok(handoff) => redirect_with_carriers(handoff).unwrap_or_else(|e| e.into_response()),
        Err(e) => e.into_response(),
    }
}

async fn spotify_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<CallbackQuery>, QueryRejection>,
) -> Response {
    match state
        .orchestrator
        .complete_music_auth(&headers, callback_query(query))
        .await
    {
        Ok(_) => Html(state.completion_page.to_string()).into_response(),
        Err(e) => e.into_response(),
    }
}

/// `303 See Other` to Spotify with both carriers set.
fn redirect_with_carriers(handoff: ChatHandoff) -> Result<Response, AppError> {
    let mut headers = HeaderMap::new();
    for carrier in &handoff.carriers {
        let value = HeaderValue::try_from(carrier.set_cookie_value()).map_err(|e| {
            warn!(carrier = carrier.name, error = %e, "Slack returned a value unusable as a cookie");
            AppError::ChatAuthBadRequest
        })?;
        headers.append(SET_COOKIE, value);
    }
    let location = HeaderValue::try_from(handoff.redirect_url).map_err(|e| {
        warn!(error = %e, "Spotify authorization URL is not a valid header value");
        AppError::ChatAuthBadRequest
    })?;
    headers.insert(LOCATION, location);

    Ok((StatusCode::SEE_OTHER, headers).into_response())
}

/// Serve until `shutdown` resolves.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Tunelink listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Bind `host:port` and serve until Ctrl-C or SIGTERM.
pub async fn run(host: &str, port: u16, state: AppState) -> Result<(), std::io::Error> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve(listener, state, shutdown_signal()).await?;
    info!("Tunelink stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

use axum::{
    extract::{FromRequestParts, Path, State},
    http::{
        header::{COOKIE, SET_COOKIE, USER_AGENT},
        request::Parts,
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        Html, IntoResponse, Response,
    },
    Json,
};
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, warn};

use super::SharedState;
use crate::error::{AppError, AppResult, StorageError};
use crate::pipeline::RequestContext;
use crate::storage::{PageView, PageViewLedger, Session, SessionStore};

const ABOUT_PAGE: &str = include_str!("pages/about.html");
const DASHBOARD_PAGE: &str = include_str!("pages/dashboard.html");

/// Client address of the inbound request.
///
/// Socket peer when the server runs with connect info, else the first
/// `X-Forwarded-For` entry, else empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddr(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientAddr {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(axum::extract::ConnectInfo(addr)) =
            parts.extensions.get::<axum::extract::ConnectInfo<SocketAddr>>()
        {
            return Ok(ClientAddr(addr.ip().to_string()));
        }

        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .unwrap_or_default();

        Ok(ClientAddr(forwarded))
    }
}

/// Session listing entry, shaped for the dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Client address.
    pub ip: String,
    /// Continent.
    pub continent: String,
    /// Country.
    pub country: String,
    /// City.
    pub city: String,
    /// Operating system.
    pub os: String,
    /// Browser.
    pub browser: String,
    /// Session token.
    pub session: String,
    /// Creation time, RFC 3339.
    pub time: String,
}

impl From<Session> for SessionSummary {
    fn from(session: Session) -> Self {
        Self {
            time: session.created_at.to_rfc3339(),
            ip: session.ip,
            continent: session.continent,
            country: session.country,
            city: session.city,
            os: session.os,
            browser: session.browser,
            session: session.token,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Storage(StorageError::SessionNotFound { .. }) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        let body = serde_json::json!({
            "error": {
                "message": self.to_string(),
                "code": status.as_u16(),
            }
        });

        (status, Json(body)).into_response()
    }
}

/// Visitor-facing about page
pub async fn about(
    State(state): State<SharedState>,
    client: ClientAddr,
    headers: HeaderMap,
) -> AppResult<Response> {
    track_page(&state, "about", client, &headers, Html(ABOUT_PAGE)).await
}

/// Any tracked page by name
pub async fn page(
    State(state): State<SharedState>,
    Path(page): Path<String>,
    client: ClientAddr,
    headers: HeaderMap,
) -> AppResult<Response> {
    let body = Html(format!(
        "<!doctype html><html><head><title>{0}</title></head><body><h1>{0}</h1></body></html>",
        escape_html(&page)
    ));
    track_page(&state, &page, client, &headers, body).await
}

async fn track_page(
    state: &SharedState,
    page: &str,
    ClientAddr(remote_addr): ClientAddr,
    headers: &HeaderMap,
    body: impl IntoResponse,
) -> AppResult<Response> {
    let cookie_name = &state.config.server.cookie_name;

    let mut ctx = RequestContext::new(remote_addr);
    ctx.user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    ctx.session_token = session_cookie(headers, cookie_name);

    let outcome = state.pipeline.ingest(page, ctx).await?;

    let mut response = body.into_response();
    if outcome.new_session {
        let cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            cookie_name, outcome.session_token
        );
        let value = HeaderValue::from_str(&cookie).map_err(|e| AppError::Internal {
            message: format!("Invalid session cookie: {}", e),
        })?;
        response.headers_mut().insert(SET_COOKIE, value);
    }

    Ok(response)
}

/// Live dashboard page
pub async fn dashboard() -> Html<&'static str> {
    Html(DASHBOARD_PAGE)
}

/// Page views recorded for one session
pub async fn session_pages(
    State(state): State<SharedState>,
    Path(token): Path<String>,
) -> AppResult<Json<Vec<PageView>>> {
    if state.storage.get_session(&token).await?.is_none() {
        return Err(StorageError::SessionNotFound { token }.into());
    }

    let views = state.storage.page_views_for_session(&token).await?;
    Ok(Json(views))
}

/// Every session, each exactly once
pub async fn all_sessions(
    State(state): State<SharedState>,
) -> AppResult<Json<Vec<SessionSummary>>> {
    let sessions = state.storage.list_sessions().await?;
    Ok(Json(sessions.into_iter().map(SessionSummary::from).collect()))
}

/// Server-sent event stream of session and page-view notifications
pub async fn events(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = state.broadcast.subscribe();
    let stopped = state.shutdown_token.clone().cancelled_owned();

    let stream = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let name = format!("{}-{}", event.channel, event.name);
                    match SseEvent::default().event(name).json_data(&event.payload) {
                        Ok(sse) => return Some((Ok(sse), rx)),
                        Err(e) => warn!(error = %e, "Failed to encode dashboard event"),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Dashboard subscriber lagged, events skipped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
    .take_until(stopped);

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Liveness check
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Value of the session cookie, if the client sent one
pub fn session_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

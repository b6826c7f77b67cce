//! Per-request page-view ingestion.
//!
//! [`IngestionPipeline::ingest`] runs the fixed sequence
//! identity → session → page view → publish for one request:
//!
//! ```text
//! Start → IdentityResolved → SessionResolved → PageViewRecorded → Published → Done
//! ```
//!
//! Enrichment and notification problems are absorbed and logged. Storage
//! failures abort the request, since the page-view write is the one result
//! the caller depends on.

pub mod token;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{AppResult, StorageError};
use crate::events::{Event, EventSender};
use crate::identity::{EnrichmentRecord, IdentityResolver};
use crate::storage::{PageViewLedger, Session, SessionStore};

/// Attempts at minting a token that is not already taken.
const MAX_MINT_ATTEMPTS: usize = 3;

/// Everything the pipeline needs to know about one inbound request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Peer address as seen by the server (may be empty if unknown).
    pub remote_addr: String,
    /// Raw User-Agent header.
    pub user_agent: Option<String>,
    /// Session credential presented by the client, if any.
    pub session_token: Option<String>,
}

impl RequestContext {
    /// Context for a request from `remote_addr`
    pub fn new(remote_addr: impl Into<String>) -> Self {
        Self {
            remote_addr: remote_addr.into(),
            ..Self::default()
        }
    }

    /// Set the User-Agent header
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set the presented session credential
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }
}

/// Result of ingesting one page view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOutcome {
    /// Active session token; hand back to the client as its credential.
    pub session_token: String,
    /// Visit counter for (page, session) after this request.
    pub visit_count: i64,
    /// True when this request created the session.
    pub new_session: bool,
    /// True when this request created the page-view row.
    pub new_page_view: bool,
}

/// Stages of one ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    /// Request accepted
    Start,
    /// Enrichment record computed
    IdentityResolved,
    /// Active session token known and durably recorded
    SessionResolved,
    /// Page-view counter created or incremented
    PageViewRecorded,
    /// Notifications enqueued
    Published,
    /// Outcome returned
    Done,
}

impl IngestStage {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestStage::Start => "start",
            IngestStage::IdentityResolved => "identity_resolved",
            IngestStage::SessionResolved => "session_resolved",
            IngestStage::PageViewRecorded => "pageview_recorded",
            IngestStage::Published => "published",
            IngestStage::Done => "done",
        }
    }
}

impl std::fmt::Display for IngestStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Orchestrates identity, session, page-view and event steps per request
#[derive(Clone)]
pub struct IngestionPipeline {
    identity: IdentityResolver,
    sessions: Arc<dyn SessionStore>,
    ledger: Arc<dyn PageViewLedger>,
    events: EventSender,
}

impl IngestionPipeline {
    /// Create a new pipeline
    pub fn new(
        identity: IdentityResolver,
        sessions: Arc<dyn SessionStore>,
        ledger: Arc<dyn PageViewLedger>,
        events: EventSender,
    ) -> Self {
        Self {
            identity,
            sessions,
            ledger,
            events,
        }
    }

    /// Ingest one page view
    pub async fn ingest(&self, page: &str, ctx: RequestContext) -> AppResult<IngestOutcome> {
        let start = Instant::now();
        stage(IngestStage::Start, page);

        let enrichment = self
            .identity
            .resolve(&ctx.remote_addr, ctx.user_agent.as_deref())
            .await;
        stage(IngestStage::IdentityResolved, page);

        let (session, new_session) = self
            .resolve_session(ctx.session_token.as_deref(), &enrichment)
            .await?;
        stage(IngestStage::SessionResolved, page);

        let visit = self.ledger.record_visit(page, &session.token).await?;
        stage(IngestStage::PageViewRecorded, page);

        self.events.publish(Event::page_viewed(
            page,
            &session.token,
            &enrichment.ip,
            visit.visit_count,
            Utc::now(),
        ));
        stage(IngestStage::Published, page);

        info!(
            page = %page,
            session = %session.token,
            visits = visit.visit_count,
            new_session,
            latency_ms = start.elapsed().as_millis(),
            "Page view ingested"
        );
        stage(IngestStage::Done, page);

        Ok(IngestOutcome {
            session_token: session.token,
            visit_count: visit.visit_count,
            new_session,
            new_page_view: visit.created,
        })
    }

    /// Recover the presented session or create a new one.
    ///
    /// A presented token the store does not know is ignored and a fresh one
    /// is minted, so clients cannot pick their own tokens.
    async fn resolve_session(
        &self,
        presented: Option<&str>,
        enrichment: &EnrichmentRecord,
    ) -> AppResult<(Session, bool)> {
        if let Some(token) = presented.filter(|t| !t.is_empty()) {
            match self.sessions.get_session(token).await? {
                Some(session) => return Ok((session, false)),
                None => warn!(
                    token = %token,
                    "Unknown session credential, issuing a new session"
                ),
            }
        }

        let session = self.create_session(enrichment).await?;
        info!(
            session = %session.token,
            ip = %session.ip,
            country = %session.country,
            "New session created"
        );
        self.events.publish(Event::session_created(&session));

        Ok((session, true))
    }

    async fn create_session(&self, enrichment: &EnrichmentRecord) -> AppResult<Session> {
        let mut attempt = 1;
        loop {
            let candidate = token::mint(&enrichment.ip);
            match self.sessions.create_session(&candidate, enrichment).await {
                Ok(session) => return Ok(session),
                Err(StorageError::SessionExists { token }) if attempt < MAX_MINT_ATTEMPTS => {
                    warn!(token = %token, attempt, "Minted session token collided, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn stage(stage: IngestStage, page: &str) {
    debug!(stage = %stage, page = %page, "Ingestion stage");
}

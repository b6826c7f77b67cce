//! Storage layer for visitor sessions and page-view counters.
//!
//! Two contracts live here: [`SessionStore`] (write-once session records
//! keyed by token) and [`PageViewLedger`] (one counter per page and session,
//! updated by an atomic create-or-increment). [`SqliteStorage`] implements
//! both; all synchronization is delegated to the database.

mod sqlite;

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;

pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageResult;
use crate::identity::EnrichmentRecord;

/// A visitor session: one token tied to the enrichment snapshot taken when it was issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque session token.
    pub token: String,
    /// Client address at creation.
    pub ip: String,
    /// Continent at creation (empty if unknown).
    pub continent: String,
    /// Country at creation (empty if unknown).
    pub country: String,
    /// City at creation (empty if unknown).
    pub city: String,
    /// Operating system at creation (empty if unknown).
    pub os: String,
    /// Browser at creation (empty if unknown).
    pub browser: String,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Build a session from a token and the current enrichment record
    pub fn new(token: impl Into<String>, enrichment: &EnrichmentRecord) -> Self {
        Self {
            token: token.into(),
            ip: enrichment.ip.clone(),
            continent: enrichment.continent.clone(),
            country: enrichment.country.clone(),
            city: enrichment.city.clone(),
            os: enrichment.os.clone(),
            browser: enrichment.browser.clone(),
            created_at: Utc::now(),
        }
    }

    /// The enrichment snapshot captured in this session
    pub fn enrichment(&self) -> EnrichmentRecord {
        EnrichmentRecord {
            ip: self.ip.clone(),
            os: self.os.clone(),
            browser: self.browser.clone(),
            continent: self.continent.clone(),
            country: self.country.clone(),
            city: self.city.clone(),
        }
    }
}

/// Visit counter for one (page, session) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageView {
    /// Page identifier.
    pub page: String,
    /// Session token the visits belong to.
    pub session_token: String,
    /// Number of recorded visits, at least 1.
    pub visit_count: i64,
    /// When the pair was first recorded.
    pub first_visited_at: DateTime<Utc>,
}

/// Result of a create-or-increment on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitOutcome {
    /// True when this call inserted the row.
    pub created: bool,
    /// Counter value after this call.
    pub visit_count: i64,
    /// First-visit timestamp of the row.
    pub first_visited_at: DateTime<Utc>,
}

/// Persistent mapping from session token to session record.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Get a session by token.
    async fn get_session(&self, token: &str) -> StorageResult<Option<Session>>;

    /// Create a session. Fails with `SessionExists` if the token is taken.
    async fn create_session(
        &self,
        token: &str,
        enrichment: &EnrichmentRecord,
    ) -> StorageResult<Session>;

    /// List every session, oldest first.
    async fn list_sessions(&self) -> StorageResult<Vec<Session>>;
}

/// Persistent page-view counters keyed by (page, session token).
#[async_trait]
pub trait PageViewLedger: Send + Sync {
    /// Atomically create the counter at 1 or increment it.
    async fn record_visit(&self, page: &str, session_token: &str) -> StorageResult<VisitOutcome>;

    /// Get the counter for one pair.
    async fn get_page_view(
        &self,
        page: &str,
        session_token: &str,
    ) -> StorageResult<Option<PageView>>;

    /// All counters for a session, in first-visit order.
    async fn page_views_for_session(&self, session_token: &str) -> StorageResult<Vec<PageView>>;

    /// Every counter in the ledger.
    async fn list_page_views(&self) -> StorageResult<Vec<PageView>>;
}

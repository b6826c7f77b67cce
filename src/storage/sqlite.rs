use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use super::{PageView, PageViewLedger, Session, SessionStore, VisitOutcome};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};
use crate::identity::EnrichmentRecord;

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// How long a writer waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed storage implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Create an in-memory database (tests and ephemeral runs).
    ///
    /// Each SQLite connection to `:memory:` is its own database, so the pool
    /// is pinned to a single connection that is never recycled.
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to open in-memory database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl SessionStore for SqliteStorage {
    async fn get_session(&self, token: &str) -> StorageResult<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT token, ip, continent, country, city, os, browser, created_at
            FROM sessions
            WHERE token = ?
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Session::try_from).transpose()
    }

    async fn create_session(
        &self,
        token: &str,
        enrichment: &EnrichmentRecord,
    ) -> StorageResult<Session> {
        let session = Session::new(token, enrichment);

        sqlx::query(
            r#"
            INSERT INTO sessions (token, ip, continent, country, city, os, browser, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.token)
        .bind(&session.ip)
        .bind(&session.continent)
        .bind(&session.country)
        .bind(&session.city)
        .bind(&session.os)
        .bind(&session.browser)
        .bind(session.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                StorageError::SessionExists {
                    token: token.to_string(),
                }
            }
            other => StorageError::Sqlx(other),
        })?;

        debug!(token = %session.token, "Session row inserted");
        Ok(session)
    }

    async fn list_sessions(&self) -> StorageResult<Vec<Session>> {
        let rows: Vec<SessionRow> = sqlx::query_as(
            r#"
            SELECT token, ip, continent, country, city, os, browser, created_at
            FROM sessions
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Session::try_from).collect()
    }
}

#[async_trait]
impl PageViewLedger for SqliteStorage {
    async fn record_visit(&self, page: &str, session_token: &str) -> StorageResult<VisitOutcome> {
        // Single statement: SQLite serializes writers, so concurrent calls for
        // the same key never both insert and never lose an increment.
        let (visit_count, first_visited_at): (i64, String) = sqlx::query_as(
            r#"
            INSERT INTO pageviews (page, session_token, visit_count, first_visited_at)
            VALUES (?, ?, 1, ?)
            ON CONFLICT(page, session_token) DO UPDATE
                SET visit_count = pageviews.visit_count + 1
            RETURNING visit_count, first_visited_at
            "#,
        )
        .bind(page)
        .bind(session_token)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        Ok(VisitOutcome {
            created: visit_count == 1,
            visit_count,
            first_visited_at: parse_timestamp(&first_visited_at)?,
        })
    }

    async fn get_page_view(
        &self,
        page: &str,
        session_token: &str,
    ) -> StorageResult<Option<PageView>> {
        let row: Option<PageViewRow> = sqlx::query_as(
            r#"
            SELECT page, session_token, visit_count, first_visited_at
            FROM pageviews
            WHERE page = ? AND session_token = ?
            "#,
        )
        .bind(page)
        .bind(session_token)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PageView::try_from).transpose()
    }

    async fn page_views_for_session(&self, session_token: &str) -> StorageResult<Vec<PageView>> {
        let rows: Vec<PageViewRow> = sqlx::query_as(
            r#"
            SELECT page, session_token, visit_count, first_visited_at
            FROM pageviews
            WHERE session_token = ?
            ORDER BY first_visited_at ASC, page ASC
            "#,
        )
        .bind(session_token)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PageView::try_from).collect()
    }

    async fn list_page_views(&self) -> StorageResult<Vec<PageView>> {
        let rows: Vec<PageViewRow> = sqlx::query_as(
            r#"
            SELECT page, session_token, visit_count, first_visited_at
            FROM pageviews
            ORDER BY first_visited_at ASC, page ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PageView::try_from).collect()
    }
}

fn parse_timestamp(raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Query {
            message: format!("Invalid timestamp '{}': {}", raw, e),
        })
}

// Internal row types for SQLx mapping
#[derive(sqlx::FromRow)]
struct SessionRow {
    token: String,
    ip: String,
    continent: String,
    country: String,
    city: String,
    os: String,
    browser: String,
    created_at: String,
}

impl TryFrom<SessionRow> for Session {
    type Error = StorageError;

    fn try_from(row: SessionRow) -> StorageResult<Self> {
        Ok(Self {
            created_at: parse_timestamp(&row.created_at)?,
            token: row.token,
            ip: row.ip,
            continent: row.continent,
            country: row.country,
            city: row.city,
            os: row.os,
            browser: row.browser,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PageViewRow {
    page: String,
    session_token: String,
    visit_count: i64,
    first_visited_at: String,
}

impl TryFrom<PageViewRow> for PageView {
    type Error = StorageError;

    fn try_from(row: PageViewRow) -> StorageResult<Self> {
        Ok(Self {
            first_visited_at: parse_timestamp(&row.first_visited_at)?,
            page: row.page,
            session_token: row.session_token,
            visit_count: row.visit_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_roundtrips_rfc3339() {
        let now = Utc::now();
        assert_eq!(parse_timestamp(&now.to_rfc3339()).unwrap(), now);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        let err = parse_timestamp("yesterday").unwrap_err();
        assert!(matches!(err, StorageError::Query { .. }));
    }

    #[tokio::test]
    async fn test_unique_violation_maps_to_session_exists() {
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        let enrichment = EnrichmentRecord::with_ip("10.0.0.1");

        storage.create_session("dup", &enrichment).await.unwrap();
        let err = storage.create_session("dup", &enrichment).await.unwrap_err();

        assert!(matches!(err, StorageError::SessionExists { ref token } if token == "dup"));
    }
}

//! Persistence layer.
//!
//! Errand requests and their recommendations live in a single SQLite
//! `requests` table, accessed through an sqlx pool. Permission and policy
//! failures are reported as `PersistenceError::PermissionDenied` so the
//! operator can fix credentials instead of chasing a generic error.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::types::{ErrandRecord, PersistenceError, PricingRequest, PricingResult, RequestStatus};

/// Default database location.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://errands.db";

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

const CREATE_REQUESTS: &str = r#"
CREATE TABLE IF NOT EXISTS requests (
    id                      TEXT PRIMARY KEY,
    task_type               TEXT NOT NULL,
    pickup_location         TEXT NOT NULL,
    dropoff_location        TEXT NOT NULL,
    notes                   TEXT,
    budget_estimate         TEXT,
    dispatcher_name         TEXT,
    dispatcher_phone        TEXT,
    recommended_price_range TEXT,
    intelligent_prompts     TEXT,
    map_url                 TEXT,
    status                  TEXT NOT NULL DEFAULT 'pending',
    created_at              TEXT NOT NULL
)
"#;

const CREATE_CREATED_AT_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_requests_created_at ON requests (created_at DESC)";

const SELECT_COLUMNS: &str = "id, task_type, pickup_location, dropoff_location, notes, \
     budget_estimate, dispatcher_name, dispatcher_phone, recommended_price_range, \
     intelligent_prompts, map_url, status, created_at";

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RequestStore {
    pool: SqlitePool,
}

impl RequestStore {
    /// Open (creating if needed) the database at `url` and migrate it.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("Invalid database URL: {url}"))?
            .create_if_missing(true);

        let store = Self::connect_with(options, DEFAULT_MAX_CONNECTIONS).await?;
        store
            .migrate()
            .await
            .with_context(|| format!("Failed to migrate database: {url}"))?;

        info!(url, "Request store ready");
        Ok(store)
    }

    /// Open a pool with explicit options. Does not migrate.
    pub async fn connect_with(options: SqliteConnectOptions, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .context("Failed to open request store")?;
        Ok(Self { pool })
    }

    /// A private in-memory database, migrated. The single connection is
    /// kept open for the pool's lifetime so the data survives.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .context("Invalid in-memory database URL")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory request store")?;

        let store = Self { pool };
        store.migrate().await.context("Failed to migrate in-memory store")?;
        Ok(store)
    }

    /// Create the `requests` table and its index if missing.
    pub async fn migrate(&self) -> Result<(), PersistenceError> {
        sqlx::query(CREATE_REQUESTS)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        sqlx::query(CREATE_CREATED_AT_INDEX)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(())
    }

    /// Persist a priced errand as a new pending request.
    pub async fn insert(
        &self,
        request: &PricingRequest,
        result: &PricingResult,
    ) -> Result<ErrandRecord, PersistenceError> {
        let id = uuid::Uuid::new_v4().to_string();
        // Stored text keeps microseconds, so the returned record matches a reload.
        let created_at = Utc::now().trunc_subsecs(6);
        let (dispatcher_name, dispatcher_phone) = match request.dispatcher() {
            Some((name, phone)) => (Some(name), Some(phone)),
            None => (None, None),
        };

        sqlx::query(
            "INSERT INTO requests (id, task_type, pickup_location, dropoff_location, notes, \
             budget_estimate, dispatcher_name, dispatcher_phone, recommended_price_range, \
             intelligent_prompts, map_url, status, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(request.task_type())
        .bind(request.pickup_location())
        .bind(request.dropoff_location())
        .bind(request.notes())
        .bind(request.budget_estimate())
        .bind(dispatcher_name)
        .bind(dispatcher_phone)
        .bind(&result.recommended_price_range)
        .bind(&result.intelligent_prompts)
        .bind(result.map_url.as_deref())
        .bind(RequestStatus::Pending.as_str())
        .bind(timestamp(&created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let err = classify(e);
            warn!(error = %err, "Failed to persist errand request");
            err
        })?;

        debug!(id = %id, task_type = request.task_type(), "Errand request saved");

        Ok(ErrandRecord {
            id,
            task_type: request.task_type().to_string(),
            pickup_location: request.pickup_location().to_string(),
            dropoff_location: request.dropoff_location().to_string(),
            notes: request.notes().map(str::to_string),
            budget_estimate: request.budget_estimate().map(str::to_string),
            dispatcher_name: dispatcher_name.map(str::to_string),
            dispatcher_phone: dispatcher_phone.map(str::to_string),
            recommended_price_range: Some(result.recommended_price_range.clone()),
            intelligent_prompts: Some(result.intelligent_prompts.clone()),
            map_url: result.map_url.clone(),
            status: RequestStatus::Pending,
            created_at,
        })
    }

    /// Newest requests first.
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<ErrandRecord>, PersistenceError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM requests ORDER BY created_at DESC, rowid DESC LIMIT ?"
        );
        let rows = sqlx::query(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;

        rows.iter().map(record_from_row).collect()
    }

    /// Returns false when no request has this id.
    pub async fn update_status(
        &self,
        id: &str,
        status: RequestStatus,
    ) -> Result<bool, PersistenceError> {
        let result = sqlx::query("UPDATE requests SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(classify)?;

        let updated = result.rows_affected() > 0;
        debug!(id, status = %status, updated, "Request status update");
        Ok(updated)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

// ---------------------------------------------------------------------------
// Row mapping and error classification
// ---------------------------------------------------------------------------

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn record_from_row(row: &SqliteRow) -> Result<ErrandRecord, PersistenceError> {
    let status: String = row.try_get("status").map_err(classify)?;
    let created_at: String = row.try_get("created_at").map_err(classify)?;

    Ok(ErrandRecord {
        id: row.try_get("id").map_err(classify)?,
        task_type: row.try_get("task_type").map_err(classify)?,
        pickup_location: row.try_get("pickup_location").map_err(classify)?,
        dropoff_location: row.try_get("dropoff_location").map_err(classify)?,
        notes: row.try_get("notes").map_err(classify)?,
        budget_estimate: row.try_get("budget_estimate").map_err(classify)?,
        dispatcher_name: row.try_get("dispatcher_name").map_err(classify)?,
        dispatcher_phone: row.try_get("dispatcher_phone").map_err(classify)?,
        recommended_price_range: row.try_get("recommended_price_range").map_err(classify)?,
        intelligent_prompts: row.try_get("intelligent_prompts").map_err(classify)?,
        map_url: row.try_get("map_url").map_err(classify)?,
        status: status.parse().map_err(PersistenceError::Store)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| PersistenceError::Store(format!("Bad created_at {created_at}: {e}")))?
            .with_timezone(&Utc),
    })
}

/// Map a driver error onto the two persistence failure kinds.
pub(crate) fn classify(err: sqlx::Error) -> PersistenceError {
    match &err {
        sqlx::Error::Database(db) => {
            if db.code().as_deref().is_some_and(is_permission_code) {
                return PersistenceError::PermissionDenied {
                    detail: db.message().to_string(),
                };
            }
        }
        sqlx::Error::Io(io) if io.kind() == std::io::ErrorKind::PermissionDenied => {
            return PersistenceError::PermissionDenied {
                detail: io.to_string(),
            };
        }
        _ => {}
    }
    PersistenceError::Store(err.to_string())
}

/// Postgres `insufficient_privilege`, or a SQLite primary code of
/// PERM (3), READONLY (8) or AUTH (23). SQLite reports extended codes,
/// whose low byte is the primary code.
fn is_permission_code(code: &str) -> bool {
    if code == "42501" {
        return true;
    }
    code.parse::<i32>()
        .map(|c| matches!(c & 0xff, 3 | 8 | 23))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

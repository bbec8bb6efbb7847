//! Dead-letter queue store.
//!
//! SQLite-backed record of failed work items. The store is the exclusive
//! owner of the record lifecycle: the pipeline orchestrator never writes here
//! directly - the batch and retry drivers translate pipeline failures into
//! the calls below.
//!
//! State machine:
//!
//! ```text
//! pending -> retrying -> succeeded
//!                     -> pending              (retries remain)
//!                     -> failed_permanently   (retries exhausted)
//! ```
//!
//! `succeeded` and `failed_permanently` are terminal; only the operator bulk
//! clears remove such records. `retry_count` is incremented by
//! `mark_retrying` *before* the attempt runs, so it counts attempts made, not
//! attempts completed. Transitions use plain read-then-write sequences; two
//! concurrent sweeps over the same record are not mutually excluded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::content::DataType;
use crate::generator::SampledParams;
use crate::pipeline::orchestrator::ErrorStage;
use crate::storage::figures::FigureRef;

/// Default retry budget fixed into each record at creation.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Errors that can occur during DLQ operations.
#[derive(Debug, Error)]
pub enum DlqError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(#[from] sqlx::Error),

    #[error("Record not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid state transition from '{from}' to '{to}'")]
    InvalidTransition { from: String, to: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt record field: {0}")]
    Decode(String),
}

/// Lifecycle status of a DLQ record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DlqStatus {
    Pending,
    Retrying,
    Succeeded,
    FailedPermanently,
}

impl DlqStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DlqStatus::Pending => "pending",
            DlqStatus::Retrying => "retrying",
            DlqStatus::Succeeded => "succeeded",
            DlqStatus::FailedPermanently => "failed_permanently",
        }
    }

    /// Whether no automatic operation may leave this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DlqStatus::Succeeded | DlqStatus::FailedPermanently)
    }
}

impl fmt::Display for DlqStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DlqStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DlqStatus::Pending),
            "retrying" => Ok(DlqStatus::Retrying),
            "succeeded" => Ok(DlqStatus::Succeeded),
            "failed_permanently" => Ok(DlqStatus::FailedPermanently),
            other => Err(format!("unknown DLQ status '{other}'")),
        }
    }
}

/// A persisted failed work item.
#[derive(Debug, Clone, PartialEq)]
pub struct DlqRecord {
    pub id: Uuid,
    pub data_type: DataType,
    /// The original sampled parameters, verbatim.
    pub params: SampledParams,
    /// Last successfully produced chart payload, if stage 1 ever completed.
    pub chart_data: Option<Value>,
    /// Last successfully stored figure, if stage 2 ever completed.
    pub figure: Option<FigureRef>,
    pub batch_id: Option<String>,
    /// Error message from the most recent attempt.
    pub error: String,
    /// Stage the most recent attempt failed at.
    pub error_stage: ErrorStage,
    /// Attempts made (incremented before each retry attempt runs).
    pub retry_count: u32,
    /// Fixed at creation.
    pub max_retries: u32,
    pub status: DlqStatus,
    /// Stamped by `mark_succeeded`.
    pub question_id: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a DLQ record from a first-attempt failure.
#[derive(Debug, Clone)]
pub struct NewDlqItem {
    pub data_type: DataType,
    pub params: SampledParams,
    pub chart_data: Option<Value>,
    pub figure: Option<FigureRef>,
    pub batch_id: Option<String>,
    pub error: String,
    pub error_stage: ErrorStage,
    pub max_retries: u32,
}

/// Latest-attempt state recorded by `mark_failed`.
///
/// Overwrites the carried artifacts so the next retry resumes from the most
/// recent failure point, not the original one.
#[derive(Debug, Clone)]
pub struct AttemptFailure {
    pub error: String,
    pub error_stage: ErrorStage,
    pub chart_data: Option<Value>,
    pub figure: Option<FigureRef>,
}

/// Operator-facing queue counts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DlqStats {
    pub pending: i64,
    pub retrying: i64,
    pub succeeded: i64,
    pub failed_permanently: i64,
    /// Counts of non-succeeded records per failure stage.
    pub by_stage: Vec<(String, i64)>,
}

/// SQLite-backed DLQ store.
pub struct DlqStore {
    pool: SqlitePool,
}

impl DlqStore {
    /// Connects to the database at `url` (e.g. `sqlite://quizforge_dlq.db`),
    /// creating the file if missing, and prepares the schema.
    pub async fn connect(url: &str) -> Result<Self, DlqError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| DlqError::ConnectionFailed(e.to_string()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| DlqError::ConnectionFailed(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// In-memory store for tests and dry runs.
    pub async fn in_memory() -> Result<Self, DlqError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| DlqError::ConnectionFailed(e.to_string()))?;

        // A single never-recycled connection: each SQLite :memory: connection
        // is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| DlqError::ConnectionFailed(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Creates the schema if it does not exist. Idempotent.
    pub async fn run_migrations(&self) -> Result<(), DlqError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS dlq_items (
                id              TEXT PRIMARY KEY,
                data_type       TEXT NOT NULL,
                params          TEXT NOT NULL,
                chart_data      TEXT,
                figure          TEXT,
                batch_id        TEXT,
                error           TEXT NOT NULL,
                error_stage     TEXT NOT NULL,
                retry_count     INTEGER NOT NULL DEFAULT 0,
                max_retries     INTEGER NOT NULL,
                status          TEXT NOT NULL,
                question_id     TEXT,
                last_attempt_at TEXT,
                created_at      TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_dlq_status_created
             ON dlq_items (status, created_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Creates a record in `pending` with `retry_count = 0`.
    pub async fn add(&self, item: NewDlqItem) -> Result<DlqRecord, DlqError> {
        let id = Uuid::new_v4();
        let created_at = Utc::now();
        let params_json = serde_json::to_string(&item.params)?;
        let chart_json = item
            .chart_data
            .as_ref()
            .map(|v| serde_json::to_string(v))
            .transpose()?;
        let figure_json = item
            .figure
            .as_ref()
            .map(|f| serde_json::to_string(f))
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO dlq_items (
                id, data_type, params, chart_data, figure, batch_id,
                error, error_stage, retry_count, max_retries, status, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(item.data_type.as_str())
        .bind(&params_json)
        .bind(&chart_json)
        .bind(&figure_json)
        .bind(&item.batch_id)
        .bind(&item.error)
        .bind(item.error_stage.as_str())
        .bind(item.max_retries as i64)
        .bind(DlqStatus::Pending.as_str())
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::info!(
            dlq_id = %id,
            stage = %item.error_stage,
            error = %item.error,
            "added failed item to DLQ"
        );

        self.require(id).await
    }

    /// Point lookup by id.
    pub async fn get(&self, id: Uuid) -> Result<Option<DlqRecord>, DlqError> {
        let row = sqlx::query("SELECT * FROM dlq_items WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_record).transpose()
    }

    /// All `pending` records, oldest first.
    pub async fn list_pending(&self) -> Result<Vec<DlqRecord>, DlqError> {
        let rows = sqlx::query(
            "SELECT * FROM dlq_items WHERE status = ? ORDER BY created_at ASC",
        )
        .bind(DlqStatus::Pending.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_record).collect()
    }

    /// `pending -> retrying`, incrementing `retry_count` before the attempt
    /// runs.
    pub async fn mark_retrying(&self, id: Uuid) -> Result<DlqRecord, DlqError> {
        let record = self.require(id).await?;
        if record.status != DlqStatus::Pending {
            return Err(DlqError::InvalidTransition {
                from: record.status.to_string(),
                to: DlqStatus::Retrying.to_string(),
            });
        }

        sqlx::query(
            "UPDATE dlq_items
             SET status = ?, retry_count = retry_count + 1, last_attempt_at = ?
             WHERE id = ?",
        )
        .bind(DlqStatus::Retrying.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        self.require(id).await
    }

    /// `retrying -> succeeded`, stamping the stored question id.
    pub async fn mark_succeeded(&self, id: Uuid, question_id: &str) -> Result<DlqRecord, DlqError> {
        let record = self.require(id).await?;
        if record.status != DlqStatus::Retrying {
            return Err(DlqError::InvalidTransition {
                from: record.status.to_string(),
                to: DlqStatus::Succeeded.to_string(),
            });
        }

        sqlx::query("UPDATE dlq_items SET status = ?, question_id = ? WHERE id = ?")
            .bind(DlqStatus::Succeeded.as_str())
            .bind(question_id)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        tracing::info!(dlq_id = %id, question_id, "DLQ item succeeded on retry");
        self.require(id).await
    }

    /// `retrying -> pending` while retries remain, else
    /// `retrying -> failed_permanently`. Always overwrites the error and the
    /// carried artifacts with the latest attempt's values.
    pub async fn mark_failed(&self, id: Uuid, failure: AttemptFailure) -> Result<DlqRecord, DlqError> {
        let record = self.require(id).await?;
        let next_status = if record.retry_count < record.max_retries {
            DlqStatus::Pending
        } else {
            DlqStatus::FailedPermanently
        };
        if record.status != DlqStatus::Retrying {
            return Err(DlqError::InvalidTransition {
                from: record.status.to_string(),
                to: next_status.to_string(),
            });
        }

        let chart_json = failure
            .chart_data
            .as_ref()
            .map(|v| serde_json::to_string(v))
            .transpose()?;
        let figure_json = failure
            .figure
            .as_ref()
            .map(|f| serde_json::to_string(f))
            .transpose()?;

        sqlx::query(
            "UPDATE dlq_items
             SET status = ?, error = ?, error_stage = ?, chart_data = ?, figure = ?
             WHERE id = ?",
        )
        .bind(next_status.as_str())
        .bind(&failure.error)
        .bind(failure.error_stage.as_str())
        .bind(&chart_json)
        .bind(&figure_json)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if next_status == DlqStatus::FailedPermanently {
            tracing::warn!(
                dlq_id = %id,
                retry_count = record.retry_count,
                stage = %failure.error_stage,
                "DLQ item exhausted its retries"
            );
        }

        self.require(id).await
    }

    /// Counts by status and by failure stage.
    pub async fn stats(&self) -> Result<DlqStats, DlqError> {
        let mut stats = DlqStats::default();

        let status_rows =
            sqlx::query("SELECT status, COUNT(*) AS n FROM dlq_items GROUP BY status")
                .fetch_all(&self.pool)
                .await?;
        for row in status_rows {
            let status: String = row.try_get("status")?;
            let n: i64 = row.try_get("n")?;
            match status.parse::<DlqStatus>() {
                Ok(DlqStatus::Pending) => stats.pending = n,
                Ok(DlqStatus::Retrying) => stats.retrying = n,
                Ok(DlqStatus::Succeeded) => stats.succeeded = n,
                Ok(DlqStatus::FailedPermanently) => stats.failed_permanently = n,
                Err(e) => return Err(DlqError::Decode(e)),
            }
        }

        let stage_rows = sqlx::query(
            "SELECT error_stage, COUNT(*) AS n FROM dlq_items
             WHERE status != ? GROUP BY error_stage ORDER BY error_stage",
        )
        .bind(DlqStatus::Succeeded.as_str())
        .fetch_all(&self.pool)
        .await?;
        for row in stage_rows {
            let stage: String = row.try_get("error_stage")?;
            let n: i64 = row.try_get("n")?;
            stats.by_stage.push((stage, n));
        }

        Ok(stats)
    }

    /// Deletes all `succeeded` records. Operator-only.
    pub async fn clear_succeeded(&self) -> Result<u64, DlqError> {
        let result = sqlx::query("DELETE FROM dlq_items WHERE status = ?")
            .bind(DlqStatus::Succeeded.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Deletes every record. Operator-only.
    pub async fn clear_all(&self) -> Result<u64, DlqError> {
        let result = sqlx::query("DELETE FROM dlq_items")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Point lookup that treats absence as an error.
    async fn require(&self, id: Uuid) -> Result<DlqRecord, DlqError> {
        self.get(id).await?.ok_or(DlqError::NotFound(id))
    }
}

/// Maps a row to a record, surfacing corrupt fields as `DlqError::Decode`.
fn row_to_record(row: SqliteRow) -> Result<DlqRecord, DlqError> {
    let id_text: String = row.try_get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|e| DlqError::Decode(e.to_string()))?;

    let data_type_text: String = row.try_get("data_type")?;
    let data_type = data_type_text
        .parse::<DataType>()
        .map_err(|e| DlqError::Decode(e.to_string()))?;

    let params_json: String = row.try_get("params")?;
    let params: SampledParams = serde_json::from_str(&params_json)?;

    let chart_json: Option<String> = row.try_get("chart_data")?;
    let chart_data = chart_json
        .map(|s| serde_json::from_str::<Value>(&s))
        .transpose()?;

    let figure_json: Option<String> = row.try_get("figure")?;
    let figure = figure_json
        .map(|s| serde_json::from_str::<FigureRef>(&s))
        .transpose()?;

    let error_stage_text: String = row.try_get("error_stage")?;
    let error_stage = error_stage_text
        .parse::<ErrorStage>()
        .map_err(DlqError::Decode)?;

    let status_text: String = row.try_get("status")?;
    let status = status_text.parse::<DlqStatus>().map_err(DlqError::Decode)?;

    let retry_count: i64 = row.try_get("retry_count")?;
    let max_retries: i64 = row.try_get("max_retries")?;

    let last_attempt_text: Option<String> = row.try_get("last_attempt_at")?;
    let last_attempt_at = last_attempt_text
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| DlqError::Decode(e.to_string()))
        })
        .transpose()?;

    let created_text: String = row.try_get("created_at")?;
    let created_at = DateTime::parse_from_rfc3339(&created_text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DlqError::Decode(e.to_string()))?;

    Ok(DlqRecord {
        id,
        data_type,
        params,
        chart_data,
        figure,
        batch_id: row.try_get("batch_id")?,
        error: row.try_get("error")?,
        error_stage,
        retry_count: retry_count as u32,
        max_retries: max_retries as u32,
        status,
        question_id: row.try_get("question_id")?,
        last_attempt_at,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_item(error_stage: ErrorStage) -> NewDlqItem {
        NewDlqItem {
            data_type: DataType::BarChart,
            params: SampledParams::fixture(),
            chart_data: None,
            figure: None,
            batch_id: Some("batch-1".to_string()),
            error: "no text response".to_string(),
            error_stage,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    #[tokio::test]
    async fn test_add_creates_pending_record() {
        let store = DlqStore::in_memory().await.unwrap();
        let record = store.add(new_item(ErrorStage::DataGeneration)).await.unwrap();

        assert_eq!(record.status, DlqStatus::Pending);
        assert_eq!(record.retry_count, 0);
        assert_eq!(record.max_retries, 3);
        assert_eq!(record.error, "no text response");
        assert_eq!(record.batch_id.as_deref(), Some("batch-1"));
        assert!(record.last_attempt_at.is_none());
        assert_eq!(record.params, SampledParams::fixture());
    }

    #[tokio::test]
    async fn test_mark_retrying_increments_before_attempt() {
        let store = DlqStore::in_memory().await.unwrap();
        let record = store.add(new_item(ErrorStage::ImageGeneration)).await.unwrap();

        let retrying = store.mark_retrying(record.id).await.unwrap();
        assert_eq!(retrying.status, DlqStatus::Retrying);
        assert_eq!(retrying.retry_count, 1);
        assert!(retrying.last_attempt_at.is_some());
    }

    #[tokio::test]
    async fn test_mark_retrying_rejects_non_pending() {
        let store = DlqStore::in_memory().await.unwrap();
        let record = store.add(new_item(ErrorStage::Storage)).await.unwrap();

        store.mark_retrying(record.id).await.unwrap();
        let err = store.mark_retrying(record.id).await.unwrap_err();
        assert!(matches!(err, DlqError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_mark_failed_requeues_while_retries_remain() {
        let store = DlqStore::in_memory().await.unwrap();
        let record = store.add(new_item(ErrorStage::DataGeneration)).await.unwrap();

        store.mark_retrying(record.id).await.unwrap();
        let failed = store
            .mark_failed(
                record.id,
                AttemptFailure {
                    error: "invalid JSON".to_string(),
                    error_stage: ErrorStage::DataGeneration,
                    chart_data: None,
                    figure: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(failed.status, DlqStatus::Pending);
        assert_eq!(failed.retry_count, 1);
        assert_eq!(failed.error, "invalid JSON");
    }

    #[tokio::test]
    async fn test_mark_failed_overwrites_carried_artifacts() {
        let store = DlqStore::in_memory().await.unwrap();
        let record = store.add(new_item(ErrorStage::DataGeneration)).await.unwrap();
        assert!(record.chart_data.is_none());

        store.mark_retrying(record.id).await.unwrap();
        let chart = json!({"title": "Test", "categories": ["A"], "values": [1], "yAxisLabel": "Y"});
        let failed = store
            .mark_failed(
                record.id,
                AttemptFailure {
                    error: "no image".to_string(),
                    error_stage: ErrorStage::ImageGeneration,
                    chart_data: Some(chart.clone()),
                    figure: None,
                },
            )
            .await
            .unwrap();

        // The retry got further: the next attempt resumes from the newer
        // failure point.
        assert_eq!(failed.error_stage, ErrorStage::ImageGeneration);
        assert_eq!(failed.chart_data, Some(chart));
    }

    #[tokio::test]
    async fn test_exhaustion_boundary() {
        let store = DlqStore::in_memory().await.unwrap();
        let record = store.add(new_item(ErrorStage::QuestionGeneration)).await.unwrap();
        let failure = || AttemptFailure {
            error: "no text response".to_string(),
            error_stage: ErrorStage::QuestionGeneration,
            chart_data: None,
            figure: None,
        };

        // Cycles 1 and 2 requeue; cycle 3 exhausts the budget of 3.
        for expected_count in 1..=2u32 {
            let r = store.mark_retrying(record.id).await.unwrap();
            assert_eq!(r.retry_count, expected_count);
            let r = store.mark_failed(record.id, failure()).await.unwrap();
            assert_eq!(r.status, DlqStatus::Pending);
        }

        let r = store.mark_retrying(record.id).await.unwrap();
        assert_eq!(r.retry_count, 3);
        let r = store.mark_failed(record.id, failure()).await.unwrap();
        assert_eq!(r.status, DlqStatus::FailedPermanently);
        assert_eq!(r.retry_count, 3);
    }

    #[tokio::test]
    async fn test_retry_count_monotonic() {
        let store = DlqStore::in_memory().await.unwrap();
        let record = store.add(new_item(ErrorStage::DataGeneration)).await.unwrap();
        let failure = || AttemptFailure {
            error: "x".to_string(),
            error_stage: ErrorStage::DataGeneration,
            chart_data: None,
            figure: None,
        };

        let mut last = 0u32;
        for _ in 0..3 {
            let r = store.mark_retrying(record.id).await.unwrap();
            assert!(r.retry_count > last);
            last = r.retry_count;
            let r = store.mark_failed(record.id, failure()).await.unwrap();
            assert_eq!(r.retry_count, last);
        }
    }

    #[tokio::test]
    async fn test_terminal_states_stable() {
        let store = DlqStore::in_memory().await.unwrap();
        let record = store.add(new_item(ErrorStage::Storage)).await.unwrap();

        store.mark_retrying(record.id).await.unwrap();
        store.mark_succeeded(record.id, "q_123").await.unwrap();

        // No automatic operation leaves a terminal state.
        assert!(matches!(
            store.mark_retrying(record.id).await,
            Err(DlqError::InvalidTransition { .. })
        ));
        assert!(matches!(
            store.mark_succeeded(record.id, "q_456").await,
            Err(DlqError::InvalidTransition { .. })
        ));

        let current = store.get(record.id).await.unwrap().unwrap();
        assert_eq!(current.status, DlqStatus::Succeeded);
        assert_eq!(current.question_id.as_deref(), Some("q_123"));
    }

    #[tokio::test]
    async fn test_mark_failed_error_names_real_target() {
        let store = DlqStore::in_memory().await.unwrap();
        let record = store.add(new_item(ErrorStage::DataGeneration)).await.unwrap();
        let failure = || AttemptFailure {
            error: "x".to_string(),
            error_stage: ErrorStage::DataGeneration,
            chart_data: None,
            figure: None,
        };

        // Retries remaining: the rejected transition targets `pending`.
        let err = store.mark_failed(record.id, failure()).await.unwrap_err();
        match err {
            DlqError::InvalidTransition { from, to } => {
                assert_eq!(from, "pending");
                assert_eq!(to, "pending");
            }
            other => panic!("expected InvalidTransition, got {other}"),
        }

        // Exhaust the budget, then fail again from the terminal state: the
        // rejected transition targets `failed_permanently`.
        for _ in 0..3 {
            store.mark_retrying(record.id).await.unwrap();
            store.mark_failed(record.id, failure()).await.unwrap();
        }
        let current = store.get(record.id).await.unwrap().unwrap();
        assert_eq!(current.status, DlqStatus::FailedPermanently);

        let err = store.mark_failed(record.id, failure()).await.unwrap_err();
        match err {
            DlqError::InvalidTransition { from, to } => {
                assert_eq!(from, "failed_permanently");
                assert_eq!(to, "failed_permanently");
            }
            other => panic!("expected InvalidTransition, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_succeeded_record_not_listed_pending() {
        let store = DlqStore::in_memory().await.unwrap();
        let a = store.add(new_item(ErrorStage::DataGeneration)).await.unwrap();
        let _b = store.add(new_item(ErrorStage::ImageGeneration)).await.unwrap();

        store.mark_retrying(a.id).await.unwrap();
        store.mark_succeeded(a.id, "q_1").await.unwrap();

        let pending = store.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_ne!(pending[0].id, a.id);
    }

    #[tokio::test]
    async fn test_stats_and_clears() {
        let store = DlqStore::in_memory().await.unwrap();
        let a = store.add(new_item(ErrorStage::DataGeneration)).await.unwrap();
        let _b = store.add(new_item(ErrorStage::ImageGeneration)).await.unwrap();

        store.mark_retrying(a.id).await.unwrap();
        store.mark_succeeded(a.id, "q_1").await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.by_stage, vec![("image_generation".to_string(), 1)]);

        assert_eq!(store.clear_succeeded().await.unwrap(), 1);
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.succeeded, 0);
        assert_eq!(stats.pending, 1);

        assert_eq!(store.clear_all().await.unwrap(), 1);
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.pending, 0);
    }

    #[tokio::test]
    async fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dlq.db");
        let url = format!("sqlite://{}", path.display());

        let id = {
            let store = DlqStore::connect(&url).await.unwrap();
            store.add(new_item(ErrorStage::DataGeneration)).await.unwrap().id
        };

        let store = DlqStore::connect(&url).await.unwrap();
        let record = store.get(id).await.unwrap().unwrap();
        assert_eq!(record.status, DlqStatus::Pending);
    }
}

//! Database operations for `import_jobs` and `import_job_errors`.
//!
//! Counter updates are single atomic statements so a poller always observes
//! monotonic progress and the invariants `processed <= total` and
//! `succeeded + failed + skipped <= processed` hold at every point.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use restock_core::{Identifier, ItemErrorKind, ItemOutcome};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `import_jobs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ImportJobRow {
    pub id: i64,
    pub public_id: Uuid,
    pub status: String,
    pub trigger_source: String,
    pub total: i32,
    pub processed: i32,
    pub succeeded: i32,
    pub failed: i32,
    pub skipped: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A row from the `import_job_errors` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobErrorRow {
    pub id: i64,
    pub job_id: i64,
    pub identifier: Option<String>,
    pub kind: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

const JOB_COLUMNS: &str = "id, public_id, status, trigger_source, total, processed, \
     succeeded, failed, skipped, created_at, updated_at, completed_at";

// ---------------------------------------------------------------------------
// import_jobs operations
// ---------------------------------------------------------------------------

/// Creates a new import job in `pending` status with the given item total.
///
/// Generates a UUID in Rust and binds it to `public_id`. Returns the full
/// newly-created row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_import_job(
    pool: &PgPool,
    total: i32,
    trigger_source: &str,
) -> Result<ImportJobRow, DbError> {
    let public_id = Uuid::new_v4();

    let row = sqlx::query_as::<_, ImportJobRow>(&format!(
        "INSERT INTO import_jobs (public_id, status, trigger_source, total) \
         VALUES ($1, 'pending', $2, $3) \
         RETURNING {JOB_COLUMNS}"
    ))
    .bind(public_id)
    .bind(trigger_source)
    .bind(total)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a job as `processing`.
///
/// # Errors
///
/// Returns [`DbError::InvalidJobTransition`] if the job is not `pending`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn start_import_job(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE import_jobs \
         SET status = 'processing', updated_at = NOW() \
         WHERE id = $1 AND status = 'pending'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidJobTransition {
            id,
            expected_status: "pending",
        });
    }

    Ok(())
}

/// Increments the counters for one processed item.
///
/// One statement per item: `processed` and exactly one of
/// `succeeded`/`failed`/`skipped` advance together, so no observer can see a
/// gap or a double count.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the job does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn record_item_result(
    pool: &PgPool,
    id: i64,
    outcome: ItemOutcome,
) -> Result<(), DbError> {
    let (succeeded, failed, skipped) = match outcome {
        ItemOutcome::Succeeded => (1, 0, 0),
        ItemOutcome::Failed => (0, 1, 0),
        ItemOutcome::Skipped => (0, 0, 1),
    };

    let result = sqlx::query(
        "UPDATE import_jobs SET \
             processed  = processed + 1, \
             succeeded  = succeeded + $2, \
             failed     = failed + $3, \
             skipped    = skipped + $4, \
             updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(succeeded)
    .bind(failed)
    .bind(skipped)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Marks a job as `completed` and stamps `completed_at`.
///
/// # Errors
///
/// Returns [`DbError::InvalidJobTransition`] if the job is not `processing`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn complete_import_job(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE import_jobs \
         SET status = 'completed', completed_at = NOW(), updated_at = NOW() \
         WHERE id = $1 AND status = 'processing'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidJobTransition {
            id,
            expected_status: "processing",
        });
    }

    Ok(())
}

/// Marks a job as `failed` and stamps `completed_at`.
///
/// # Errors
///
/// Returns [`DbError::InvalidJobTransition`] if the job is already terminal,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn fail_import_job(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE import_jobs \
         SET status = 'failed', completed_at = NOW(), updated_at = NOW() \
         WHERE id = $1 AND status IN ('pending', 'processing')",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidJobTransition {
            id,
            expected_status: "pending or processing",
        });
    }

    Ok(())
}

/// Marks a job as `stopped` (cooperative cancellation). Reachable from
/// `pending` or `processing`; already-applied writes stay applied.
///
/// # Errors
///
/// Returns [`DbError::InvalidJobTransition`] if the job is already terminal,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn stop_import_job(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE import_jobs \
         SET status = 'stopped', completed_at = NOW(), updated_at = NOW() \
         WHERE id = $1 AND status IN ('pending', 'processing')",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidJobTransition {
            id,
            expected_status: "pending or processing",
        });
    }

    Ok(())
}

/// Fetches a single job by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_import_job(pool: &PgPool, id: i64) -> Result<ImportJobRow, DbError> {
    let row = sqlx::query_as::<_, ImportJobRow>(&format!(
        "SELECT {JOB_COLUMNS} FROM import_jobs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Fetches a single job by its public UUID (the id exposed on the API).
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given id, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_import_job_by_public_id(
    pool: &PgPool,
    public_id: Uuid,
) -> Result<ImportJobRow, DbError> {
    let row = sqlx::query_as::<_, ImportJobRow>(&format!(
        "SELECT {JOB_COLUMNS} FROM import_jobs WHERE public_id = $1"
    ))
    .bind(public_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Returns the most recent `limit` jobs, ordered by `created_at DESC`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_import_jobs(pool: &PgPool, limit: i64) -> Result<Vec<ImportJobRow>, DbError> {
    let rows = sqlx::query_as::<_, ImportJobRow>(&format!(
        "SELECT {JOB_COLUMNS} FROM import_jobs \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// import_job_errors operations
// ---------------------------------------------------------------------------

/// Appends one error row for a job. `identifier` is `None` for job-scoped
/// entries (system faults, the cancellation marker).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn append_job_error(
    pool: &PgPool,
    job_id: i64,
    identifier: Option<&Identifier>,
    kind: ItemErrorKind,
    message: &str,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO import_job_errors (job_id, identifier, kind, message) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(job_id)
    .bind(identifier.map(Identifier::as_str))
    .bind(kind.as_str())
    .bind(message)
    .execute(pool)
    .await?;

    Ok(())
}

/// Returns all error rows for a job, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_job_errors(pool: &PgPool, job_id: i64) -> Result<Vec<JobErrorRow>, DbError> {
    let rows = sqlx::query_as::<_, JobErrorRow>(
        "SELECT id, job_id, identifier, kind, message, created_at \
         FROM import_job_errors \
         WHERE job_id = $1 \
         ORDER BY id",
    )
    .bind(job_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

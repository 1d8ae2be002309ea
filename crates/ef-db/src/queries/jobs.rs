//! Encoding job operations.

use chrono::Utc;
use ef_core::{EncodingJob, EncodingTask, Error, JobId, JobState, JobTransition, Result};
use rusqlite::{Connection, TransactionBehavior};

use super::{db_err, optional, tasks};
use crate::models::{format_opt_time, format_time, job_from_row, JOB_COLS};

/// Insert a job and its tasks in one transaction.
pub fn create_job(conn: &mut Connection, job: &EncodingJob, tasks: &[EncodingTask]) -> Result<()> {
    if let Some(task) = tasks.iter().find(|t| t.job_id != job.id) {
        return Err(Error::Validation(format!(
            "task {} belongs to job {}, not {}",
            task.id, task.job_id, job.id
        )));
    }

    let tx = conn.transaction().map_err(db_err)?;
    tx.execute(
        &format!(
            "INSERT INTO encoding_jobs ({JOB_COLS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
        ),
        rusqlite::params![
            job.id.to_string(),
            job.input_path.to_string_lossy().into_owned(),
            job.output_folder.to_string_lossy().into_owned(),
            job.profile_id.to_string(),
            job.profile_snapshot,
            job.state.as_str(),
            job.weight,
            job.error_message,
            job.failed_task_id.map(|id| id.to_string()),
            job.retry_of.map(|id| id.to_string()),
            format_time(job.created_at),
            format_opt_time(job.started_at),
            format_opt_time(job.completed_at),
            job.execution_time_ms,
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Error::Conflict(format!("job {} already exists", job.id))
        }
        other => db_err(other),
    })?;

    for task in tasks {
        tasks::insert_task(&tx, task)?;
    }
    tx.commit().map_err(db_err)?;
    Ok(())
}

/// Get a job by ID.
pub fn get_job(conn: &Connection, id: JobId) -> Result<Option<EncodingJob>> {
    let q = format!("SELECT {JOB_COLS} FROM encoding_jobs WHERE id = ?1");
    optional(conn.query_row(&q, [id.to_string()], job_from_row))
}

/// List jobs in creation order, optionally filtered by state.
pub fn list_jobs(conn: &Connection, state: Option<JobState>) -> Result<Vec<EncodingJob>> {
    let rows = match state {
        Some(s) => {
            let q = format!(
                "SELECT {JOB_COLS} FROM encoding_jobs WHERE state = ?1 ORDER BY created_at ASC"
            );
            let mut stmt = conn.prepare(&q).map_err(db_err)?;
            let rows = stmt
                .query_map([s.as_str()], job_from_row)
                .map_err(db_err)?
                .collect::<std::result::Result<Vec<_>, _>>();
            rows
        }
        None => {
            let q = format!("SELECT {JOB_COLS} FROM encoding_jobs ORDER BY created_at ASC");
            let mut stmt = conn.prepare(&q).map_err(db_err)?;
            let rows = stmt
                .query_map([], job_from_row)
                .map_err(db_err)?
                .collect::<std::result::Result<Vec<_>, _>>();
            rows
        }
    };
    rows.map_err(db_err)
}

/// Apply a transition under an immediate (write-locking) transaction.
pub fn transition_job(
    conn: &mut Connection,
    id: JobId,
    transition: &JobTransition,
) -> Result<EncodingJob> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(db_err)?;

    let mut job = get_job(&tx, id)?.ok_or_else(|| Error::not_found("job", id))?;
    job.apply(transition, Utc::now())?;

    tx.execute(
        "UPDATE encoding_jobs SET state = ?1, error_message = ?2, failed_task_id = ?3,
            started_at = ?4, completed_at = ?5, execution_time_ms = ?6
         WHERE id = ?7",
        rusqlite::params![
            job.state.as_str(),
            job.error_message,
            job.failed_task_id.map(|t| t.to_string()),
            format_opt_time(job.started_at),
            format_opt_time(job.completed_at),
            job.execution_time_ms,
            id.to_string(),
        ],
    )
    .map_err(db_err)?;
    tx.commit().map_err(db_err)?;
    Ok(job)
}

//! Append-only progress samples.

use ef_core::{EncodingProgress, JobId, Result, TaskId};
use rusqlite::Connection;

use super::{db_err, optional};
use crate::models::{format_time, progress_from_row, PROGRESS_COLS};

pub fn append_progress(conn: &Connection, p: &EncodingProgress) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO encoding_progress ({PROGRESS_COLS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        ),
        rusqlite::params![
            p.id.to_string(),
            p.job_id.to_string(),
            p.task_id.to_string(),
            p.percentage,
            p.frame as i64,
            p.fps,
            p.speed,
            p.bitrate_kbps,
            p.current_time_secs,
            p.eta_secs,
            format_time(p.recorded_at),
        ],
    )
    .map_err(db_err)?;
    Ok(())
}

pub fn latest_progress(conn: &Connection, task_id: TaskId) -> Result<Option<EncodingProgress>> {
    let q = format!(
        "SELECT {PROGRESS_COLS} FROM encoding_progress WHERE task_id = ?1
         ORDER BY rowid DESC LIMIT 1"
    );
    optional(conn.query_row(&q, [task_id.to_string()], progress_from_row))
}

/// Every sample of a task in insertion order.
pub fn list_progress(conn: &Connection, task_id: TaskId) -> Result<Vec<EncodingProgress>> {
    let q = format!("SELECT {PROGRESS_COLS} FROM encoding_progress WHERE task_id = ?1 ORDER BY rowid");
    let mut stmt = conn.prepare(&q).map_err(db_err)?;
    let rows = stmt
        .query_map([task_id.to_string()], progress_from_row)
        .map_err(db_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err)?;
    Ok(rows)
}

/// Newest sample per task of a job.
pub fn latest_progress_for_job(conn: &Connection, job_id: JobId) -> Result<Vec<EncodingProgress>> {
    let q = format!(
        "SELECT {PROGRESS_COLS} FROM encoding_progress
         WHERE rowid IN (
             SELECT MAX(rowid) FROM encoding_progress WHERE job_id = ?1 GROUP BY task_id
         )
         ORDER BY rowid"
    );
    let mut stmt = conn.prepare(&q).map_err(db_err)?;
    let rows = stmt
        .query_map([job_id.to_string()], progress_from_row)
        .map_err(db_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err)?;
    Ok(rows)
}

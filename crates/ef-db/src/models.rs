//! Row mapping between SQLite and the domain entities.
//!
//! Ids are stored as hyphenated UUID text, timestamps as RFC 3339 text and
//! enums as their lowercase names. Task dependencies are a JSON array of
//! ids; profiles are their JSON snapshot.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use ef_codec::EncodingProfile;
use ef_core::{EncodingJob, EncodingProgress, EncodingTask, TaskId};
use rusqlite::types::Type;
use rusqlite::Row;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

fn conversion_error(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

/// Parse a UUID-based ID from a text column.
fn parse_id<T: From<Uuid>>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    let uuid = Uuid::parse_str(&s).map_err(|e| conversion_error(idx, e))?;
    Ok(T::from(uuid))
}

fn parse_opt_id<T: From<Uuid>>(row: &Row, idx: usize) -> rusqlite::Result<Option<T>> {
    let s: Option<String> = row.get(idx)?;
    s.map(|v| {
        Uuid::parse_str(&v)
            .map(T::from)
            .map_err(|e| conversion_error(idx, e))
    })
    .transpose()
}

fn parse_enum<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let s: String = row.get(idx)?;
    s.parse().map_err(|e| conversion_error(idx, e))
}

fn parse_time(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn parse_opt_time(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let s: Option<String> = row.get(idx)?;
    s.map(|v| {
        DateTime::parse_from_rfc3339(&v)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, e))
    })
    .transpose()
}

pub fn format_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339()
}

pub fn format_opt_time(t: Option<DateTime<Utc>>) -> Option<String> {
    t.map(format_time)
}

pub fn format_dependencies(ids: &[TaskId]) -> String {
    let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
    serde_json::Value::from(ids).to_string()
}

// ---------------------------------------------------------------------------
// EncodingJob
// ---------------------------------------------------------------------------

pub const JOB_COLS: &str = "id, input_path, output_folder, profile_id, profile_snapshot,
    state, weight, error_message, failed_task_id, retry_of,
    created_at, started_at, completed_at, execution_time_ms";

pub fn job_from_row(row: &Row) -> rusqlite::Result<EncodingJob> {
    Ok(EncodingJob {
        id: parse_id(row, 0)?,
        input_path: PathBuf::from(row.get::<_, String>(1)?),
        output_folder: PathBuf::from(row.get::<_, String>(2)?),
        profile_id: parse_id(row, 3)?,
        profile_snapshot: row.get(4)?,
        state: parse_enum(row, 5)?,
        weight: row.get(6)?,
        error_message: row.get(7)?,
        failed_task_id: parse_opt_id(row, 8)?,
        retry_of: parse_opt_id(row, 9)?,
        created_at: parse_time(row, 10)?,
        started_at: parse_opt_time(row, 11)?,
        completed_at: parse_opt_time(row, 12)?,
        execution_time_ms: row.get(13)?,
    })
}

// ---------------------------------------------------------------------------
// EncodingTask
// ---------------------------------------------------------------------------

pub const TASK_COLS: &str = "id, job_id, sequence, task_type, weight, state, dependencies,
    assigned_node, retry_count, max_retries, error_message,
    created_at, started_at, completed_at";

pub fn task_from_row(row: &Row) -> rusqlite::Result<EncodingTask> {
    let deps: String = row.get(6)?;
    let dependencies: Vec<TaskId> =
        serde_json::from_str(&deps).map_err(|e| conversion_error(6, e))?;

    Ok(EncodingTask {
        id: parse_id(row, 0)?,
        job_id: parse_id(row, 1)?,
        sequence: row.get(2)?,
        task_type: parse_enum(row, 3)?,
        weight: row.get(4)?,
        state: parse_enum(row, 5)?,
        dependencies,
        assigned_node: row.get(7)?,
        retry_count: row.get(8)?,
        max_retries: row.get(9)?,
        error_message: row.get(10)?,
        created_at: parse_time(row, 11)?,
        started_at: parse_opt_time(row, 12)?,
        completed_at: parse_opt_time(row, 13)?,
    })
}

// ---------------------------------------------------------------------------
// EncodingProgress
// ---------------------------------------------------------------------------

pub const PROGRESS_COLS: &str = "id, job_id, task_id, percentage, frame, fps, speed,
    bitrate_kbps, current_time_secs, eta_secs, recorded_at";

pub fn progress_from_row(row: &Row) -> rusqlite::Result<EncodingProgress> {
    Ok(EncodingProgress {
        id: parse_id(row, 0)?,
        job_id: parse_id(row, 1)?,
        task_id: parse_id(row, 2)?,
        percentage: row.get(3)?,
        frame: row.get::<_, i64>(4)?.max(0) as u64,
        fps: row.get(5)?,
        speed: row.get(6)?,
        bitrate_kbps: row.get(7)?,
        current_time_secs: row.get(8)?,
        eta_secs: row.get(9)?,
        recorded_at: parse_time(row, 10)?,
    })
}

// ---------------------------------------------------------------------------
// EncodingProfile
// ---------------------------------------------------------------------------

/// Profiles are read back from the `data` column alone.
pub fn profile_from_row(row: &Row) -> rusqlite::Result<EncodingProfile> {
    let data: String = row.get(0)?;
    EncodingProfile::from_snapshot(&data).map_err(|e| conversion_error(0, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependencies_round_trip_as_json() {
        let ids = vec![TaskId::new(), TaskId::new()];
        let text = format_dependencies(&ids);
        let back: Vec<TaskId> = serde_json::from_str(&text).unwrap();
        assert_eq!(back, ids);
        assert_eq!(format_dependencies(&[]), "[]");
    }

    #[test]
    fn timestamps_round_trip() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let now = Utc::now();
        let back = conn
            .query_row("SELECT ?1", [format_time(now)], |row| parse_time(row, 0))
            .unwrap();
        assert_eq!(back, now);
    }
}

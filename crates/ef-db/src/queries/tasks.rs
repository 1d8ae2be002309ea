//! Encoding task operations.

use chrono::Utc;
use ef_core::{EncodingTask, Error, JobId, Result, TaskId, TaskState, TaskTransition};
use rusqlite::{Connection, TransactionBehavior};

use super::{db_err, optional};
use crate::models::{format_dependencies, format_opt_time, format_time, task_from_row, TASK_COLS};

pub(crate) fn insert_task(conn: &Connection, task: &EncodingTask) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO encoding_tasks ({TASK_COLS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
        ),
        rusqlite::params![
            task.id.to_string(),
            task.job_id.to_string(),
            task.sequence,
            task.task_type.as_str(),
            task.weight,
            task.state.as_str(),
            format_dependencies(&task.dependencies),
            task.assigned_node,
            task.retry_count,
            task.max_retries,
            task.error_message,
            format_time(task.created_at),
            format_opt_time(task.started_at),
            format_opt_time(task.completed_at),
        ],
    )
    .map_err(db_err)?;
    Ok(())
}

pub fn get_task(conn: &Connection, id: TaskId) -> Result<Option<EncodingTask>> {
    let q = format!("SELECT {TASK_COLS} FROM encoding_tasks WHERE id = ?1");
    optional(conn.query_row(&q, [id.to_string()], task_from_row))
}

/// Tasks of a job in sequence order.
pub fn list_tasks(conn: &Connection, job_id: JobId) -> Result<Vec<EncodingTask>> {
    let q = format!("SELECT {TASK_COLS} FROM encoding_tasks WHERE job_id = ?1 ORDER BY sequence");
    let mut stmt = conn.prepare(&q).map_err(db_err)?;
    let rows = stmt
        .query_map([job_id.to_string()], task_from_row)
        .map_err(db_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err)?;
    Ok(rows)
}

pub fn list_tasks_in_state(conn: &Connection, state: TaskState) -> Result<Vec<EncodingTask>> {
    let q = format!(
        "SELECT {TASK_COLS} FROM encoding_tasks WHERE state = ?1 ORDER BY created_at, sequence"
    );
    let mut stmt = conn.prepare(&q).map_err(db_err)?;
    let rows = stmt
        .query_map([state.as_str()], task_from_row)
        .map_err(db_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err)?;
    Ok(rows)
}

/// Apply a transition under an immediate (write-locking) transaction.
pub fn transition_task(
    conn: &mut Connection,
    id: TaskId,
    transition: &TaskTransition,
) -> Result<EncodingTask> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(db_err)?;

    let mut task = get_task(&tx, id)?.ok_or_else(|| Error::not_found("task", id))?;
    task.apply(transition, Utc::now())?;

    tx.execute(
        "UPDATE encoding_tasks SET state = ?1, error_message = ?2, assigned_node = ?3,
            started_at = ?4, completed_at = ?5
         WHERE id = ?6",
        rusqlite::params![
            task.state.as_str(),
            task.error_message,
            task.assigned_node,
            format_opt_time(task.started_at),
            format_opt_time(task.completed_at),
            id.to_string(),
        ],
    )
    .map_err(db_err)?;
    tx.commit().map_err(db_err)?;
    Ok(task)
}

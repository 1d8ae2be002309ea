//! Embedded SQL migrations and runner.
//!
//! Migrations are stored as `&str` constants and executed in order.  A
//! `schema_migrations` table tracks which versions have been applied.

use ef_core::{Error, Result};
use rusqlite::Connection;

/// V1: jobs, tasks and progress samples.
const V1_INITIAL: &str = r#"
CREATE TABLE encoding_jobs (
    id                TEXT PRIMARY KEY,
    input_path        TEXT NOT NULL,
    output_folder     TEXT NOT NULL,
    profile_id        TEXT NOT NULL,
    profile_snapshot  TEXT NOT NULL,
    state             TEXT NOT NULL DEFAULT 'queued',
    weight            REAL NOT NULL DEFAULT 0,
    error_message     TEXT,
    failed_task_id    TEXT,
    retry_of          TEXT REFERENCES encoding_jobs(id),
    created_at        TEXT NOT NULL,
    started_at        TEXT,
    completed_at      TEXT,
    execution_time_ms INTEGER
);

CREATE TABLE encoding_tasks (
    id             TEXT PRIMARY KEY,
    job_id         TEXT NOT NULL REFERENCES encoding_jobs(id) ON DELETE CASCADE,
    sequence       INTEGER NOT NULL,
    task_type      TEXT NOT NULL,
    weight         REAL NOT NULL,
    state          TEXT NOT NULL DEFAULT 'pending',
    dependencies   TEXT NOT NULL DEFAULT '[]',
    assigned_node  TEXT,
    retry_count    INTEGER NOT NULL DEFAULT 0,
    max_retries    INTEGER NOT NULL DEFAULT 0,
    error_message  TEXT,
    created_at     TEXT NOT NULL,
    started_at     TEXT,
    completed_at   TEXT,
    UNIQUE (job_id, sequence)
);

CREATE TABLE encoding_progress (
    id                TEXT PRIMARY KEY,
    job_id            TEXT NOT NULL REFERENCES encoding_jobs(id) ON DELETE CASCADE,
    task_id           TEXT NOT NULL REFERENCES encoding_tasks(id) ON DELETE CASCADE,
    percentage        REAL NOT NULL,
    frame             INTEGER NOT NULL,
    fps               REAL NOT NULL,
    speed             REAL NOT NULL,
    bitrate_kbps      REAL NOT NULL,
    current_time_secs REAL NOT NULL,
    eta_secs          REAL,
    recorded_at       TEXT NOT NULL
);

CREATE INDEX idx_encoding_jobs_state     ON encoding_jobs(state);
CREATE INDEX idx_encoding_tasks_job      ON encoding_tasks(job_id);
CREATE INDEX idx_encoding_tasks_state    ON encoding_tasks(state);
CREATE INDEX idx_encoding_progress_task  ON encoding_progress(task_id);
"#;

/// V2: user encoding profiles, stored as their JSON snapshot.
const V2_PROFILES: &str = r#"
CREATE TABLE encoding_profiles (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL UNIQUE COLLATE NOCASE,
    is_default  INTEGER NOT NULL DEFAULT 0,
    data        TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
"#;

/// Ordered list of (version, sql) pairs.
const MIGRATIONS: &[(i64, &str)] = &[(1, V1_INITIAL), (2, V2_PROFILES)];

/// Run all pending migrations on `conn`.
///
/// Creates the `schema_migrations` tracking table if it does not exist,
/// then applies each outstanding migration inside a transaction.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .map_err(|e| Error::database(format!("Failed to create schema_migrations: {e}")))?;

    for &(version, sql) in MIGRATIONS {
        let already: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM schema_migrations WHERE version = ?1",
                [version],
                |row| row.get(0),
            )
            .map_err(|e| Error::database(e.to_string()))?;

        if already {
            continue;
        }

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;

        tx.execute_batch(sql)
            .map_err(|e| Error::database(format!("Migration V{version} failed: {e}")))?;

        tx.execute("INSERT INTO schema_migrations (version) VALUES (?1)", [version])
            .map_err(|e| Error::database(e.to_string()))?;

        tx.commit().map_err(|e| Error::database(e.to_string()))?;
        tracing::debug!(version, "Applied migration");
    }

    Ok(())
}

//! SQL for each table, as plain functions over a connection.

pub mod jobs;
pub mod profiles;
pub mod progress;
pub mod tasks;

use ef_core::{Error, Result};

/// Map "no rows" to `None`.
pub(crate) fn optional<T>(result: rusqlite::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

pub(crate) fn db_err(e: rusqlite::Error) -> Error {
    Error::database(e.to_string())
}

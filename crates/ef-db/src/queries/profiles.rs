//! User profile storage.

use ef_codec::EncodingProfile;
use ef_core::{Error, ProfileId, Result};
use rusqlite::Connection;

use super::{db_err, optional};
use crate::models::{format_time, profile_from_row};

/// Insert or replace a profile by id.
pub fn save_profile(conn: &Connection, profile: &EncodingProfile) -> Result<()> {
    let data = profile.to_snapshot()?;
    conn.execute(
        "INSERT INTO encoding_profiles (id, name, is_default, data, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
             name = excluded.name,
             is_default = excluded.is_default,
             data = excluded.data,
             updated_at = excluded.updated_at",
        rusqlite::params![
            profile.id.to_string(),
            profile.name,
            profile.is_default,
            data,
            format_time(profile.created_at),
            format_time(profile.updated_at),
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Error::Conflict(format!("a profile named '{}' already exists", profile.name))
        }
        other => db_err(other),
    })?;
    Ok(())
}

pub fn get_profile(conn: &Connection, id: ProfileId) -> Result<Option<EncodingProfile>> {
    optional(conn.query_row(
        "SELECT data FROM encoding_profiles WHERE id = ?1",
        [id.to_string()],
        profile_from_row,
    ))
}

/// Case-insensitive lookup.
pub fn find_profile_by_name(conn: &Connection, name: &str) -> Result<Option<EncodingProfile>> {
    optional(conn.query_row(
        "SELECT data FROM encoding_profiles WHERE name = ?1",
        [name],
        profile_from_row,
    ))
}

pub fn list_profiles(conn: &Connection) -> Result<Vec<EncodingProfile>> {
    let mut stmt = conn
        .prepare("SELECT data FROM encoding_profiles ORDER BY name")
        .map_err(db_err)?;
    let rows = stmt
        .query_map([], profile_from_row)
        .map_err(db_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err)?;
    Ok(rows)
}

pub fn delete_profile(conn: &Connection, id: ProfileId) -> Result<bool> {
    let n = conn
        .execute("DELETE FROM encoding_profiles WHERE id = ?1", [id.to_string()])
        .map_err(db_err)?;
    Ok(n > 0)
}

pub fn default_profile(conn: &Connection) -> Result<Option<EncodingProfile>> {
    optional(conn.query_row(
        "SELECT data FROM encoding_profiles WHERE is_default = 1 ORDER BY name LIMIT 1",
        [],
        profile_from_row,
    ))
}

//! User accounts

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{format_ts, get_ts, is_constraint_violation, new_id};
use crate::types::{NorthstarError, Result};

/// User row from database
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    #[serde(skip)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl UserRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            email: row.get("email")?,
            name: row.get("name")?,
            password_hash: row.get("password_hash")?,
            created_at: get_ts(row, "created_at")?,
        })
    }
}

/// Insert a user. Fails with `Conflict` when the email is taken.
pub fn insert_user(
    conn: &Connection,
    email: &str,
    password_hash: &str,
    name: Option<&str>,
    now: DateTime<Utc>,
) -> Result<UserRow> {
    let id = new_id();
    conn.execute(
        "INSERT INTO users (id, email, password_hash, name, created_at) VALUES (?, ?, ?, ?, ?)",
        params![id, email, password_hash, name, format_ts(&now)],
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            NorthstarError::Conflict("Email already in use".into())
        } else {
            NorthstarError::from(e)
        }
    })?;

    Ok(UserRow {
        id,
        email: email.to_string(),
        name: name.map(str::to_string),
        password_hash: password_hash.to_string(),
        created_at: now,
    })
}

pub fn find_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    Ok(conn
        .query_row(
            "SELECT * FROM users WHERE email = ?",
            params![email],
            UserRow::from_row,
        )
        .optional()?)
}

pub fn get_user(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    Ok(conn
        .query_row("SELECT * FROM users WHERE id = ?", params![id], UserRow::from_row)
        .optional()?)
}

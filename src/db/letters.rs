//! Letters to a future self

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use super::{format_ts, get_ts, new_id};
use crate::types::requests::NewLetter;
use crate::types::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LetterRow {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub deliver_on: DateTime<Utc>,
    pub delivery_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LetterRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            content: row.get("content")?,
            deliver_on: get_ts(row, "deliver_on")?,
            delivery_email: row.get("delivery_email")?,
            created_at: get_ts(row, "created_at")?,
        })
    }
}

pub fn insert(
    conn: &Connection,
    user_id: &str,
    letter: &NewLetter,
    now: DateTime<Utc>,
) -> Result<LetterRow> {
    let id = new_id();
    conn.execute(
        "INSERT INTO future_letters (id, user_id, content, deliver_on, delivery_email, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
        params![
            id,
            user_id,
            letter.content,
            format_ts(&letter.deliver_on),
            letter.delivery_email,
            format_ts(&now),
        ],
    )?;

    Ok(LetterRow {
        id,
        user_id: user_id.to_string(),
        content: letter.content.clone(),
        deliver_on: letter.deliver_on,
        delivery_email: letter.delivery_email.clone(),
        created_at: now,
    })
}

/// Latest delivery date first
pub fn list(conn: &Connection, user_id: &str) -> Result<Vec<LetterRow>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM future_letters WHERE user_id = ? ORDER BY deliver_on DESC, rowid DESC",
    )?;
    let rows = stmt
        .query_map(params![user_id], LetterRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{now, users, Database};
    use chrono::TimeZone;

    fn letter(content: &str, year: i32) -> NewLetter {
        NewLetter {
            content: content.into(),
            deliver_on: Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap(),
            delivery_email: None,
        }
    }

    #[test]
    fn test_list_latest_delivery_first() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let user = users::insert_user(conn, "a@x.com", "h", None, now())?;
            insert(conn, &user.id, &letter("soon", 2026), now())?;
            insert(conn, &user.id, &letter("later", 2030), now())?;
            insert(conn, &user.id, &letter("middle", 2028), now())?;

            let contents: Vec<String> = list(conn, &user.id)?.into_iter().map(|l| l.content).collect();
            assert_eq!(contents, vec!["later", "middle", "soon"]);

            assert!(list(conn, "nobody")?.is_empty());
            Ok(())
        })
        .unwrap();
    }
}

//! Vision snapshots

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{format_ts, get_ts, new_id};
use crate::types::requests::{NewVision, VisionAnswers};
use crate::types::Result;

/// Columns holding the answers, in `VisionAnswers::PROMPTS` order
const ANSWER_COLUMNS: [&str; 11] = [
    "answer_learn",
    "answer_have",
    "answer_be",
    "answer_try",
    "answer_see",
    "answer_do",
    "answer_go",
    "answer_create",
    "answer_contribute",
    "answer_overcome",
    "answer_one_day",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionRow {
    pub id: String,
    pub user_id: String,
    #[serde(flatten)]
    pub answers: VisionAnswers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl VisionRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let mut values: [Option<String>; 11] = Default::default();
        for (value, column) in values.iter_mut().zip(ANSWER_COLUMNS) {
            *value = row.get(column)?;
        }

        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            answers: VisionAnswers::from_array(values),
            client_key: row.get("client_key")?,
            created_at: get_ts(row, "created_at")?,
        })
    }
}

pub fn insert_vision(
    conn: &Connection,
    user_id: &str,
    vision: &NewVision,
    now: DateTime<Utc>,
) -> Result<VisionRow> {
    let id = new_id();
    let sql = format!(
        "INSERT INTO visions (id, user_id, client_key, created_at, {}) VALUES (?, ?, ?, ?, {})",
        ANSWER_COLUMNS.join(", "),
        vec!["?"; ANSWER_COLUMNS.len()].join(", ")
    );

    let created_at = format_ts(&now);
    let answers = vision.answers.as_array();
    let mut values: Vec<&dyn rusqlite::ToSql> =
        vec![&id, &user_id, &vision.client_key, &created_at];
    for answer in &answers {
        values.push(answer);
    }

    conn.execute(&sql, values.as_slice())?;

    Ok(VisionRow {
        id,
        user_id: user_id.to_string(),
        answers: vision.answers.clone(),
        client_key: vision.client_key.clone(),
        created_at: now,
    })
}

/// Most recent vision, ties broken by insertion order
pub fn latest_vision(conn: &Connection, user_id: &str) -> Result<Option<VisionRow>> {
    Ok(conn
        .query_row(
            "SELECT * FROM visions WHERE user_id = ? ORDER BY created_at DESC, rowid DESC LIMIT 1",
            params![user_id],
            VisionRow::from_row,
        )
        .optional()?)
}

pub fn find_by_client_key(
    conn: &Connection,
    user_id: &str,
    client_key: &str,
) -> Result<Option<VisionRow>> {
    Ok(conn
        .query_row(
            "SELECT * FROM visions WHERE user_id = ? AND client_key = ?",
            params![user_id, client_key],
            VisionRow::from_row,
        )
        .optional()?)
}

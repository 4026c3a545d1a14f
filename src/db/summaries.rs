//! Quarterly summaries, one per (user, year, quarter)

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{format_ts, get_ts, new_id};
use crate::types::requests::SummaryUpsert;
use crate::types::{NorthstarError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRow {
    pub id: String,
    pub user_id: String,
    pub year: i32,
    pub quarter: u8,
    pub achievements: Option<String>,
    pub reflection: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SummaryRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            year: row.get("year")?,
            quarter: row.get("quarter")?,
            achievements: row.get("achievements")?,
            reflection: row.get("reflection")?,
            created_at: get_ts(row, "created_at")?,
            updated_at: get_ts(row, "updated_at")?,
        })
    }
}

/// Insert or update the summary for the period.
///
/// Fields left out of an update keep their stored value.
pub fn upsert(
    conn: &Connection,
    user_id: &str,
    summary: &SummaryUpsert,
    now: DateTime<Utc>,
) -> Result<SummaryRow> {
    conn.execute(
        r#"
        INSERT INTO quarterly_summaries (
            id, user_id, year, quarter, achievements, reflection, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
        ON CONFLICT (user_id, year, quarter) DO UPDATE SET
            achievements = COALESCE(excluded.achievements, quarterly_summaries.achievements),
            reflection = COALESCE(excluded.reflection, quarterly_summaries.reflection),
            updated_at = excluded.updated_at
        "#,
        params![
            new_id(),
            user_id,
            summary.year,
            summary.quarter,
            summary.achievements,
            summary.reflection,
            format_ts(&now),
        ],
    )?;

    get(conn, user_id, summary.year, summary.quarter)?
        .ok_or_else(|| NorthstarError::Internal("Summary not found after upsert".into()))
}

pub fn get(conn: &Connection, user_id: &str, year: i32, quarter: u8) -> Result<Option<SummaryRow>> {
    Ok(conn
        .query_row(
            "SELECT * FROM quarterly_summaries WHERE user_id = ? AND year = ? AND quarter = ?",
            params![user_id, year, quarter],
            SummaryRow::from_row,
        )
        .optional()?)
}

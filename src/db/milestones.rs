//! Goal milestones

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use super::{format_ts, get_ts, new_id};
use crate::types::requests::NewMilestone;
use crate::types::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneRow {
    pub id: String,
    pub goal_id: String,
    pub note: String,
    pub reached_at: DateTime<Utc>,
    pub position: i64,
}

impl MilestoneRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            goal_id: row.get("goal_id")?,
            note: row.get("note")?,
            reached_at: get_ts(row, "reached_at")?,
            position: row.get("position")?,
        })
    }
}

/// Milestones in insertion order
pub fn list_for_goal(conn: &Connection, goal_id: &str) -> Result<Vec<MilestoneRow>> {
    let mut stmt =
        conn.prepare("SELECT * FROM milestones WHERE goal_id = ? ORDER BY position, rowid")?;
    let rows = stmt
        .query_map(params![goal_id], MilestoneRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn insert_at(
    conn: &Connection,
    goal_id: &str,
    note: &str,
    reached_at: DateTime<Utc>,
    position: i64,
) -> Result<MilestoneRow> {
    let id = new_id();
    conn.execute(
        "INSERT INTO milestones (id, goal_id, note, reached_at, position) VALUES (?, ?, ?, ?, ?)",
        params![id, goal_id, note, format_ts(&reached_at), position],
    )?;
    Ok(MilestoneRow {
        id,
        goal_id: goal_id.to_string(),
        note: note.to_string(),
        reached_at,
        position,
    })
}

/// Append a milestone after the goal's existing ones
pub fn append(
    conn: &Connection,
    goal_id: &str,
    note: &str,
    reached_at: DateTime<Utc>,
) -> Result<MilestoneRow> {
    let next: i64 = conn.query_row(
        "SELECT COALESCE(MAX(position) + 1, 0) FROM milestones WHERE goal_id = ?",
        params![goal_id],
        |row| row.get(0),
    )?;
    insert_at(conn, goal_id, note, reached_at, next)
}

/// Delete every milestone of the goal and insert `milestones` in order.
/// Entries without a timestamp get `now`. Call inside a transaction.
pub fn replace_all(
    conn: &Connection,
    goal_id: &str,
    milestones: &[NewMilestone],
    now: DateTime<Utc>,
) -> Result<Vec<MilestoneRow>> {
    conn.execute("DELETE FROM milestones WHERE goal_id = ?", params![goal_id])?;

    milestones
        .iter()
        .enumerate()
        .map(|(position, m)| {
            insert_at(
                conn,
                goal_id,
                &m.note,
                m.reached_at.unwrap_or(now),
                position as i64,
            )
        })
        .collect()
}

//! Goal hierarchy: goals, strategies and action steps

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::milestones::{self, MilestoneRow};
use super::{format_ts, get_opt_ts, get_ts, new_id, opt_ts};
use crate::types::requests::NewGoal;
use crate::types::{Result, Status, StatusStamps};

/// Goal row with its strategies and milestones
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub why: Option<String>,
    pub expected_completion_date: DateTime<Utc>,
    pub status: Status,
    pub start_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_key: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub strategies: Vec<StrategyRow>,
    #[serde(default)]
    pub milestones: Vec<MilestoneRow>,
}

impl GoalRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            title: row.get("title")?,
            why: row.get("why")?,
            expected_completion_date: get_ts(row, "expected_completion_date")?,
            status: row.get("status")?,
            start_date: get_opt_ts(row, "start_date")?,
            completed_at: get_opt_ts(row, "completed_at")?,
            client_key: row.get("client_key")?,
            created_at: get_ts(row, "created_at")?,
            strategies: vec![],
            milestones: vec![],
        })
    }
}

/// Strategy row with its action steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyRow {
    pub id: String,
    pub goal_id: String,
    pub title: String,
    pub status: Status,
    pub start_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub actions: Vec<ActionRow>,
}

impl StrategyRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            goal_id: row.get("goal_id")?,
            title: row.get("title")?,
            status: row.get("status")?,
            start_date: get_opt_ts(row, "start_date")?,
            completed_at: get_opt_ts(row, "completed_at")?,
            position: row.get("position")?,
            created_at: get_ts(row, "created_at")?,
            actions: vec![],
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRow {
    pub id: String,
    pub strategy_id: String,
    pub description: String,
    pub status: Status,
    pub start_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

impl ActionRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            strategy_id: row.get("strategy_id")?,
            description: row.get("description")?,
            status: row.get("status")?,
            start_date: get_opt_ts(row, "start_date")?,
            completed_at: get_opt_ts(row, "completed_at")?,
            position: row.get("position")?,
            created_at: get_ts(row, "created_at")?,
        })
    }
}

/// Tables that carry a status and its stamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tracked {
    Goal,
    Strategy,
    Action,
}

impl Tracked {
    fn table(self) -> &'static str {
        match self {
            Tracked::Goal => "goals",
            Tracked::Strategy => "strategies",
            Tracked::Action => "action_steps",
        }
    }

    /// Current state of a row the user owns, selected as
    /// (status, start_date, completed_at)
    fn owned_state_sql(self) -> &'static str {
        match self {
            Tracked::Goal => {
                "SELECT status, start_date, completed_at FROM goals WHERE id = ?1 AND user_id = ?2"
            }
            Tracked::Strategy => {
                "SELECT s.status AS status, s.start_date AS start_date, s.completed_at AS completed_at
                 FROM strategies s
                 JOIN goals g ON g.id = s.goal_id
                 WHERE s.id = ?1 AND g.user_id = ?2"
            }
            Tracked::Action => {
                "SELECT a.status AS status, a.start_date AS start_date, a.completed_at AS completed_at
                 FROM action_steps a
                 JOIN strategies s ON s.id = a.strategy_id
                 JOIN goals g ON g.id = s.goal_id
                 WHERE a.id = ?1 AND g.user_id = ?2"
            }
        }
    }
}

// ============================================================================
// Reads
// ============================================================================

/// Goals that are not COMPLETE
pub fn count_active_goals(conn: &Connection, user_id: &str) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM goals WHERE user_id = ? AND status != 'COMPLETE'",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

pub fn count_strategies(conn: &Connection, goal_id: &str) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM strategies WHERE goal_id = ?",
        params![goal_id],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

pub fn count_actions(conn: &Connection, strategy_id: &str) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM action_steps WHERE strategy_id = ?",
        params![strategy_id],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// Goal with strategies, actions and milestones, if the user owns it
pub fn get_goal(conn: &Connection, user_id: &str, goal_id: &str) -> Result<Option<GoalRow>> {
    let goal = conn
        .query_row(
            "SELECT * FROM goals WHERE id = ? AND user_id = ?",
            params![goal_id, user_id],
            GoalRow::from_row,
        )
        .optional()?;

    goal.map(|g| load_children(conn, g)).transpose()
}

pub fn find_by_client_key(
    conn: &Connection,
    user_id: &str,
    client_key: &str,
) -> Result<Option<GoalRow>> {
    let goal = conn
        .query_row(
            "SELECT * FROM goals WHERE user_id = ? AND client_key = ?",
            params![user_id, client_key],
            GoalRow::from_row,
        )
        .optional()?;

    goal.map(|g| load_children(conn, g)).transpose()
}

/// All of a user's goals, newest first, fully nested
pub fn list_goals(conn: &Connection, user_id: &str) -> Result<Vec<GoalRow>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM goals WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
    )?;
    let goals = stmt
        .query_map(params![user_id], GoalRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    goals.into_iter().map(|g| load_children(conn, g)).collect()
}

fn load_children(conn: &Connection, mut goal: GoalRow) -> Result<GoalRow> {
    goal.strategies = strategies_for_goal(conn, &goal.id)?;
    goal.milestones = milestones::list_for_goal(conn, &goal.id)?;
    Ok(goal)
}

fn strategies_for_goal(conn: &Connection, goal_id: &str) -> Result<Vec<StrategyRow>> {
    let mut stmt =
        conn.prepare("SELECT * FROM strategies WHERE goal_id = ? ORDER BY position, rowid")?;
    let strategies = stmt
        .query_map(params![goal_id], StrategyRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    strategies
        .into_iter()
        .map(|mut s| {
            s.actions = actions_for_strategy(conn, &s.id)?;
            Ok(s)
        })
        .collect()
}

fn actions_for_strategy(conn: &Connection, strategy_id: &str) -> Result<Vec<ActionRow>> {
    let mut stmt =
        conn.prepare("SELECT * FROM action_steps WHERE strategy_id = ? ORDER BY position, rowid")?;
    let actions = stmt
        .query_map(params![strategy_id], ActionRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(actions)
}

/// Strategy with its actions, if its goal belongs to the user
pub fn get_strategy(
    conn: &Connection,
    user_id: &str,
    strategy_id: &str,
) -> Result<Option<StrategyRow>> {
    let strategy = conn
        .query_row(
            "SELECT s.* FROM strategies s JOIN goals g ON g.id = s.goal_id
             WHERE s.id = ? AND g.user_id = ?",
            params![strategy_id, user_id],
            StrategyRow::from_row,
        )
        .optional()?;

    strategy
        .map(|mut s| {
            s.actions = actions_for_strategy(conn, &s.id)?;
            Ok(s)
        })
        .transpose()
}

/// Action, if its goal belongs to the user
pub fn get_action(conn: &Connection, user_id: &str, action_id: &str) -> Result<Option<ActionRow>> {
    Ok(conn
        .query_row(
            "SELECT a.* FROM action_steps a
             JOIN strategies s ON s.id = a.strategy_id
             JOIN goals g ON g.id = s.goal_id
             WHERE a.id = ? AND g.user_id = ?",
            params![action_id, user_id],
            ActionRow::from_row,
        )
        .optional()?)
}

pub fn goal_exists(conn: &Connection, user_id: &str, goal_id: &str) -> Result<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM goals WHERE id = ? AND user_id = ?",
            params![goal_id, user_id],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

// ============================================================================
// Writes
// ============================================================================

/// Insert a goal with its nested strategies and actions.
///
/// Runs on whatever transaction the caller holds; returns the new goal id.
pub fn insert_goal_tree(
    conn: &Connection,
    user_id: &str,
    goal: &NewGoal,
    now: DateTime<Utc>,
) -> Result<String> {
    let goal_id = new_id();
    let created_at = format_ts(&now);

    conn.execute(
        r#"
        INSERT INTO goals (
            id, user_id, title, why, expected_completion_date, status, client_key, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            goal_id,
            user_id,
            goal.title,
            goal.why,
            format_ts(&goal.expected_completion_date),
            Status::Unbegun,
            goal.client_key,
            created_at,
        ],
    )?;

    for (position, strategy) in goal.strategies.iter().enumerate() {
        let strategy_id = insert_strategy_row(conn, &goal_id, &strategy.title, position, &created_at)?;
        for (position, description) in strategy.actions.iter().enumerate() {
            insert_action_row(conn, &strategy_id, description, position, &created_at)?;
        }
    }

    debug!(
        goal_id = %goal_id,
        strategies = goal.strategies.len(),
        "Inserted goal tree"
    );
    Ok(goal_id)
}

fn insert_strategy_row(
    conn: &Connection,
    goal_id: &str,
    title: &str,
    position: usize,
    created_at: &str,
) -> Result<String> {
    let id = new_id();
    conn.execute(
        "INSERT INTO strategies (id, goal_id, title, status, position, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
        params![id, goal_id, title, Status::Unbegun, position as i64, created_at],
    )?;
    Ok(id)
}

fn insert_action_row(
    conn: &Connection,
    strategy_id: &str,
    description: &str,
    position: usize,
    created_at: &str,
) -> Result<String> {
    let id = new_id();
    conn.execute(
        "INSERT INTO action_steps (id, strategy_id, description, status, position, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
        params![id, strategy_id, description, Status::Unbegun, position as i64, created_at],
    )?;
    Ok(id)
}

/// Append a strategy after the goal's existing ones
pub fn append_strategy(
    conn: &Connection,
    goal_id: &str,
    title: &str,
    now: DateTime<Utc>,
) -> Result<StrategyRow> {
    let position = count_strategies(conn, goal_id)?;
    let id = insert_strategy_row(conn, goal_id, title, position, &format_ts(&now))?;
    Ok(StrategyRow {
        id,
        goal_id: goal_id.to_string(),
        title: title.to_string(),
        status: Status::Unbegun,
        start_date: None,
        completed_at: None,
        position: position as i64,
        created_at: now,
        actions: vec![],
    })
}

/// Append an action after the strategy's existing ones
pub fn append_action(
    conn: &Connection,
    strategy_id: &str,
    description: &str,
    now: DateTime<Utc>,
) -> Result<ActionRow> {
    let position = count_actions(conn, strategy_id)?;
    let id = insert_action_row(conn, strategy_id, description, position, &format_ts(&now))?;
    Ok(ActionRow {
        id,
        strategy_id: strategy_id.to_string(),
        description: description.to_string(),
        status: Status::Unbegun,
        start_date: None,
        completed_at: None,
        position: position as i64,
        created_at: now,
    })
}

/// Set the status of a row the user owns, applying the timestamp side
/// effects. Returns false when no such row exists for this user.
pub fn update_status(
    conn: &Connection,
    tracked: Tracked,
    user_id: &str,
    id: &str,
    status: Status,
    now: DateTime<Utc>,
) -> Result<bool> {
    let current = conn
        .query_row(tracked.owned_state_sql(), params![id, user_id], |row| {
            Ok(StatusStamps {
                start_date: get_opt_ts(row, "start_date")?,
                completed_at: get_opt_ts(row, "completed_at")?,
            })
        })
        .optional()?;

    let Some(stamps) = current else {
        return Ok(false);
    };

    let next = stamps.transition(status, now);
    let sql = format!(
        "UPDATE {} SET status = ?, start_date = ?, completed_at = ? WHERE id = ?",
        tracked.table()
    );
    conn.execute(
        &sql,
        params![
            status,
            opt_ts(next.start_date.as_ref()),
            opt_ts(next.completed_at.as_ref()),
            id
        ],
    )?;

    debug!(table = tracked.table(), id = %id, status = %status, "Status updated");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{now, users, Database};
    use crate::types::requests::NewStrategy;
    use chrono::Duration;

    fn new_goal(title: &str) -> NewGoal {
        NewGoal {
            title: title.into(),
            why: Some("health".into()),
            expected_completion_date: now() + Duration::days(180),
            strategies: vec![
                NewStrategy {
                    title: "Base".into(),
                    actions: vec!["Run 3x/week".into(), "Stretch".into()],
                },
                NewStrategy {
                    title: "Speed".into(),
                    actions: vec![],
                },
            ],
            client_key: None,
        }
    }

    fn setup() -> (Database, String) {
        let db = Database::open_in_memory().unwrap();
        let user_id = db
            .with_conn(|conn| users::insert_user(conn, "a@x.com", "h", None, now()))
            .unwrap()
            .id;
        (db, user_id)
    }

    #[test]
    fn test_insert_and_get_nested() {
        let (db, user_id) = setup();
        db.with_conn(|conn| {
            let id = insert_goal_tree(conn, &user_id, &new_goal("Marathon"), now())?;
            let goal = get_goal(conn, &user_id, &id)?.unwrap();

            assert_eq!(goal.status, Status::Unbegun);
            assert_eq!(goal.strategies.len(), 2);
            assert_eq!(goal.strategies[0].title, "Base");
            assert_eq!(goal.strategies[0].actions.len(), 2);
            assert_eq!(goal.strategies[0].actions[1].description, "Stretch");
            assert!(goal.strategies[1].actions.is_empty());
            assert!(goal.milestones.is_empty());

            assert!(get_goal(conn, "someone-else", &id)?.is_none());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_list_newest_first() {
        let (db, user_id) = setup();
        db.with_conn(|conn| {
            let t = now();
            let first = insert_goal_tree(conn, &user_id, &new_goal("first"), t)?;
            let second = insert_goal_tree(conn, &user_id, &new_goal("second"), t)?;
            let third =
                insert_goal_tree(conn, &user_id, &new_goal("third"), t + Duration::seconds(1))?;

            let ids: Vec<String> = list_goals(conn, &user_id)?.into_iter().map(|g| g.id).collect();
            assert_eq!(ids, vec![third, second, first]);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_active_count_ignores_complete() {
        let (db, user_id) = setup();
        db.with_conn(|conn| {
            let a = insert_goal_tree(conn, &user_id, &new_goal("a"), now())?;
            insert_goal_tree(conn, &user_id, &new_goal("b"), now())?;
            assert_eq!(count_active_goals(conn, &user_id)?, 2);

            update_status(conn, Tracked::Goal, &user_id, &a, Status::Complete, now())?;
            assert_eq!(count_active_goals(conn, &user_id)?, 1);

            update_status(conn, Tracked::Goal, &user_id, &a, Status::Paused, now())?;
            assert_eq!(count_active_goals(conn, &user_id)?, 2);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_status_stamps_persist() {
        let (db, user_id) = setup();
        db.with_conn(|conn| {
            let id = insert_goal_tree(conn, &user_id, &new_goal("g"), now())?;
            let t0 = now();
            let t1 = t0 + Duration::hours(2);

            assert!(update_status(conn, Tracked::Goal, &user_id, &id, Status::InProgress, t0)?);
            assert!(update_status(conn, Tracked::Goal, &user_id, &id, Status::Paused, t1)?);
            assert!(update_status(conn, Tracked::Goal, &user_id, &id, Status::InProgress, t1)?);
            assert!(update_status(conn, Tracked::Goal, &user_id, &id, Status::Complete, t1)?);

            let goal = get_goal(conn, &user_id, &id)?.unwrap();
            assert_eq!(goal.status, Status::Complete);
            assert_eq!(goal.start_date, Some(t0));
            assert_eq!(goal.completed_at, Some(t1));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_nested_status_requires_ownership() {
        let (db, user_id) = setup();
        db.with_conn(|conn| {
            let id = insert_goal_tree(conn, &user_id, &new_goal("g"), now())?;
            let goal = get_goal(conn, &user_id, &id)?.unwrap();
            let strategy_id = goal.strategies[0].id.clone();
            let action_id = goal.strategies[0].actions[0].id.clone();

            let other = users::insert_user(conn, "b@x.com", "h", None, now())?.id;
            assert!(!update_status(conn, Tracked::Strategy, &other, &strategy_id, Status::Complete, now())?);
            assert!(!update_status(conn, Tracked::Action, &other, &action_id, Status::Complete, now())?);
            assert!(!update_status(conn, Tracked::Action, &user_id, "missing", Status::Complete, now())?);

            assert!(update_status(conn, Tracked::Action, &user_id, &action_id, Status::Complete, now())?);
            let action = get_action(conn, &user_id, &action_id)?.unwrap();
            assert_eq!(action.status, Status::Complete);
            assert!(action.completed_at.is_some());
            assert!(get_action(conn, &other, &action_id)?.is_none());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_append_positions() {
        let (db, user_id) = setup();
        db.with_conn(|conn| {
            let id = insert_goal_tree(conn, &user_id, &new_goal("g"), now())?;
            let strategy = append_strategy(conn, &id, "Third", now())?;
            assert_eq!(strategy.position, 2);

            let action = append_action(conn, &strategy.id, "First step", now())?;
            assert_eq!(action.position, 0);

            let loaded = get_strategy(conn, &user_id, &strategy.id)?.unwrap();
            assert_eq!(loaded.actions, vec![action]);
            Ok(())
        })
        .unwrap();
    }
}

//! Database schema definitions

use rusqlite::Connection;
use tracing::info;

use crate::types::{NorthstarError, Result};

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!("Migrating schema from v{} to v{}", current_version, SCHEMA_VERSION);
        migrate_schema(conn, current_version)?;
    } else if current_version > SCHEMA_VERSION {
        return Err(NorthstarError::Database(format!(
            "Database schema v{} is newer than supported v{}",
            current_version, SCHEMA_VERSION
        )));
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )
    .map_err(|e| {
        NorthstarError::Database(format!("Failed to create schema_version table: {}", e))
    })?;

    let version: Option<i32> = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])?;
    Ok(())
}

fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(ACCOUNT_SCHEMA)
        .map_err(|e| NorthstarError::Database(format!("Failed to create account tables: {}", e)))?;

    conn.execute_batch(GOALS_SCHEMA)
        .map_err(|e| NorthstarError::Database(format!("Failed to create goal tables: {}", e)))?;

    conn.execute_batch(JOURNAL_SCHEMA)
        .map_err(|e| NorthstarError::Database(format!("Failed to create journal tables: {}", e)))?;

    conn.execute_batch(INDEXES_SCHEMA)
        .map_err(|e| NorthstarError::Database(format!("Failed to create indexes: {}", e)))?;

    Ok(())
}

/// Migrate schema from an older version
fn migrate_schema(conn: &Connection, from_version: i32) -> Result<()> {
    // v1 is the first released schema; later versions add steps keyed on from_version
    info!("No migration steps from v{}", from_version);
    set_schema_version(conn, SCHEMA_VERSION)
}

const ACCOUNT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY NOT NULL,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    name TEXT,
    created_at TEXT NOT NULL
);

-- One row per submitted vision; the newest is current
CREATE TABLE IF NOT EXISTS visions (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    answer_learn TEXT,
    answer_have TEXT,
    answer_be TEXT,
    answer_try TEXT,
    answer_see TEXT,
    answer_do TEXT,
    answer_go TEXT,
    answer_create TEXT,
    answer_contribute TEXT,
    answer_overcome TEXT,
    answer_one_day TEXT,
    -- Idempotency key from the offline client (NULLs never collide)
    client_key TEXT,
    created_at TEXT NOT NULL,
    UNIQUE (user_id, client_key)
);
"#;

const GOALS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS goals (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    why TEXT,
    expected_completion_date TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'UNBEGUN'
        CHECK (status IN ('UNBEGUN', 'IN_PROGRESS', 'PAUSED', 'COMPLETE')),
    start_date TEXT,
    completed_at TEXT,
    client_key TEXT,
    created_at TEXT NOT NULL,
    UNIQUE (user_id, client_key)
);

CREATE TABLE IF NOT EXISTS strategies (
    id TEXT PRIMARY KEY NOT NULL,
    goal_id TEXT NOT NULL REFERENCES goals(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'UNBEGUN'
        CHECK (status IN ('UNBEGUN', 'IN_PROGRESS', 'PAUSED', 'COMPLETE')),
    start_date TEXT,
    completed_at TEXT,
    position INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS action_steps (
    id TEXT PRIMARY KEY NOT NULL,
    strategy_id TEXT NOT NULL REFERENCES strategies(id) ON DELETE CASCADE,
    description TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'UNBEGUN'
        CHECK (status IN ('UNBEGUN', 'IN_PROGRESS', 'PAUSED', 'COMPLETE')),
    start_date TEXT,
    completed_at TEXT,
    position INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS milestones (
    id TEXT PRIMARY KEY NOT NULL,
    goal_id TEXT NOT NULL REFERENCES goals(id) ON DELETE CASCADE,
    note TEXT NOT NULL,
    reached_at TEXT NOT NULL,
    position INTEGER NOT NULL
);
"#;

const JOURNAL_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS quarterly_summaries (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    year INTEGER NOT NULL,
    quarter INTEGER NOT NULL CHECK (quarter BETWEEN 1 AND 4),
    achievements TEXT,
    reflection TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (user_id, year, quarter)
);

-- Stored only; nothing delivers them yet
CREATE TABLE IF NOT EXISTS future_letters (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    content TEXT NOT NULL,
    deliver_on TEXT NOT NULL,
    delivery_email TEXT,
    created_at TEXT NOT NULL
);
"#;

const INDEXES_SCHEMA: &str = r#"
CREATE INDEX IF NOT EXISTS idx_visions_user ON visions(user_id, created_at);
CREATE INDEX IF NOT EXISTS idx_goals_user ON goals(user_id, created_at);
CREATE INDEX IF NOT EXISTS idx_goals_user_status ON goals(user_id, status);
CREATE INDEX IF NOT EXISTS idx_strategies_goal ON strategies(goal_id, position);
CREATE INDEX IF NOT EXISTS idx_actions_strategy ON action_steps(strategy_id, position);
CREATE INDEX IF NOT EXISTS idx_milestones_goal ON milestones(goal_id, position);
CREATE INDEX IF NOT EXISTS idx_letters_user ON future_letters(user_id, deliver_on);
"#;

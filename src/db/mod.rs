//! SQLite storage for Northstar
//!
//! One connection behind a mutex. Repository modules expose free functions
//! over `&Connection` / `&mut Connection`; the services decide transaction
//! boundaries.
//!
//! ## Tables
//!
//! - `users` - accounts (email unique)
//! - `visions` - vision snapshots, latest is current
//! - `goals`, `strategies`, `action_steps` - the goal hierarchy
//! - `milestones` - ordered notes per goal
//! - `quarterly_summaries` - one row per (user, year, quarter)
//! - `future_letters` - scheduled letters

pub mod goals;
pub mod letters;
pub mod milestones;
pub mod schema;
pub mod summaries;
pub mod users;
pub mod visions;

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef};
use rusqlite::{Connection, Row};
use tracing::{debug, info};

use crate::types::{NorthstarError, Result, Status};

/// SQLite database handle
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the database file, creating parent directories
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        info!("Opening SQLite database at {:?}", path);

        let conn = Connection::open(path)
            .map_err(|e| NorthstarError::Database(format!("Failed to open SQLite: {}", e)))?;

        // WAL only applies to file-backed databases
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| NorthstarError::Database(format!("Failed to set PRAGMA: {}", e)))?;

        Self::init(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory().map_err(|e| {
            NorthstarError::Database(format!("Failed to open in-memory SQLite: {}", e))
        })?;

        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        schema::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run a read against the connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| NorthstarError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Execute a write operation with exclusive access
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| NorthstarError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&mut conn)
    }

    /// Round-trip a trivial query
    pub fn ping(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
    }
}

/// Fresh UUID v4 row id
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current time at storage precision
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Storage and wire format for timestamps: RFC 3339, UTC, milliseconds.
/// Fixed width, so lexical order is chronological.
pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts_column(raw: &str, col: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                Type::Text,
                format!("column {}: {}", col, e).into(),
            )
        })
}

pub(crate) fn get_ts(row: &Row, col: &str) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(col)?;
    parse_ts_column(&raw, col)
}

pub(crate) fn get_opt_ts(row: &Row, col: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(col)?;
    raw.map(|r| parse_ts_column(&r, col)).transpose()
}

pub(crate) fn opt_ts(ts: Option<&DateTime<Utc>>) -> Option<String> {
    ts.map(format_ts)
}

impl ToSql for Status {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Status {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// True when the error is a UNIQUE/CHECK/FK constraint failure
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

//! Northstar - goal-tracking service
//!
//! A vision answered through eleven prompts, up to five active yearly goals,
//! each broken into strategies and action steps, plus quarterly summaries and
//! letters to a future self. Visitors may work offline; the `offline` module
//! migrates that work once they register.

pub mod auth;
pub mod config;
pub mod db;
pub mod logging;
pub mod offline;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;

pub use config::Args;
pub use server::{run, serve, AppState};
pub use types::{NorthstarError, Result};

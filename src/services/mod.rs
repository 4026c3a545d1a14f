//! Service layer for Northstar
//!
//! Services sit between the HTTP handlers and the repositories and own:
//! - Input validation
//! - Quotas and ownership checks
//! - Transaction boundaries
//!
//! ```text
//! HTTP Handlers (thin)
//!     ↓
//! Service Layer (business logic)
//!     ↓
//! Repository Layer (db/*.rs)
//!     ↓
//! SQLite Database
//! ```

pub mod account_service;
pub mod goal_service;
pub mod journal_service;

pub use account_service::{AccountService, AuthUser, LoginResponse, RegisteredUser};
pub use goal_service::GoalService;
pub use journal_service::JournalService;

use std::sync::Arc;

use crate::auth::JwtValidator;
use crate::db::Database;

/// Service container for dependency injection
pub struct Services {
    pub accounts: Arc<AccountService>,
    pub goals: Arc<GoalService>,
    pub journal: Arc<JournalService>,
}

impl Services {
    /// Create all services over one shared database
    pub fn new(db: Arc<Database>, jwt: JwtValidator) -> Self {
        Self {
            accounts: Arc::new(AccountService::new(db.clone(), jwt)),
            goals: Arc::new(GoalService::new(db.clone())),
            journal: Arc::new(JournalService::new(db)),
        }
    }
}

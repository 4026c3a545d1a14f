//! Shared types: errors, status, request bodies and validation

pub mod error;
pub mod requests;
pub mod status;
pub mod validation;

pub use error::{NorthstarError, Result};
pub use status::{ParseStatusError, Status, StatusStamps};
pub use validation::FieldErrors;

/// Goals not yet COMPLETE a user may hold at once
pub const MAX_ACTIVE_GOALS: usize = 5;

pub const MAX_STRATEGIES_PER_GOAL: usize = 10;

pub const MAX_ACTIONS_PER_STRATEGY: usize = 10;

pub const QUOTA_MESSAGE: &str =
    "You already have 5 active goals. Please complete at least one goal before adding a new one.";

//! Goal service - business logic for the goal hierarchy
//!
//! Owns the active-goal quota, the per-goal and per-strategy limits, status
//! bookkeeping and the transaction boundaries around nested writes.

use std::sync::Arc;

use rusqlite::TransactionBehavior;
use tracing::{debug, info};

use crate::db::goals::{self, ActionRow, GoalRow, StrategyRow, Tracked};
use crate::db::milestones::{self, MilestoneRow};
use crate::db::{now, Database};
use crate::types::requests::{
    CreateActionRequest, CreateGoalRequest, CreateMilestoneRequest, CreateStrategyRequest,
    ReplaceMilestonesRequest, StatusUpdate,
};
use crate::types::{
    NorthstarError, Result, MAX_ACTIONS_PER_STRATEGY, MAX_ACTIVE_GOALS, MAX_STRATEGIES_PER_GOAL,
    QUOTA_MESSAGE,
};

pub struct GoalService {
    db: Arc<Database>,
}

impl GoalService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// All goals, newest first, with strategies, actions and milestones
    pub fn list(&self, user_id: &str) -> Result<Vec<GoalRow>> {
        self.db.with_conn(|conn| goals::list_goals(conn, user_id))
    }

    pub fn get(&self, user_id: &str, goal_id: &str) -> Result<GoalRow> {
        self.db
            .with_conn(|conn| goals::get_goal(conn, user_id, goal_id))?
            .ok_or_else(goal_not_found)
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Create a goal with nested strategies and actions.
    ///
    /// A replay of a known `clientKey` returns the stored goal and skips the
    /// quota check.
    pub fn create(&self, user_id: &str, request: &CreateGoalRequest) -> Result<GoalRow> {
        let goal = request.validate()?;

        self.db.with_conn_mut(|conn| {
            if let Some(key) = goal.client_key.as_deref() {
                if let Some(existing) = goals::find_by_client_key(conn, user_id, key)? {
                    debug!(goal_id = %existing.id, "Goal create replayed");
                    return Ok(existing);
                }
            }

            // Count and insert under one write lock so concurrent creates
            // cannot both pass the quota
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            if goals::count_active_goals(&tx, user_id)? >= MAX_ACTIVE_GOALS {
                return Err(NorthstarError::QuotaExceeded(QUOTA_MESSAGE.into()));
            }
            let goal_id = goals::insert_goal_tree(&tx, user_id, &goal, now())?;
            tx.commit()?;

            info!(user_id = %user_id, goal_id = %goal_id, "Goal created");
            let row = goals::get_goal(conn, user_id, &goal_id)?
                .ok_or_else(|| NorthstarError::Internal("Goal not found after insert".into()))?;
            Ok(row)
        })
    }

    pub fn set_status(&self, user_id: &str, goal_id: &str, update: &StatusUpdate) -> Result<GoalRow> {
        let status = update.validate()?;
        self.db.with_conn(|conn| {
            if !goals::update_status(conn, Tracked::Goal, user_id, goal_id, status, now())? {
                return Err(goal_not_found());
            }
            goals::get_goal(conn, user_id, goal_id)?.ok_or_else(goal_not_found)
        })
    }

    pub fn add_strategy(
        &self,
        user_id: &str,
        goal_id: &str,
        request: &CreateStrategyRequest,
    ) -> Result<StrategyRow> {
        let title = request.validate()?;

        self.db.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            if !goals::goal_exists(&tx, user_id, goal_id)? {
                return Err(goal_not_found());
            }
            if goals::count_strategies(&tx, goal_id)? >= MAX_STRATEGIES_PER_GOAL {
                return Err(NorthstarError::QuotaExceeded(format!(
                    "A goal can have at most {} strategies",
                    MAX_STRATEGIES_PER_GOAL
                )));
            }
            let strategy = goals::append_strategy(&tx, goal_id, &title, now())?;
            tx.commit()?;
            Ok(strategy)
        })
    }

    pub fn add_action(
        &self,
        user_id: &str,
        strategy_id: &str,
        request: &CreateActionRequest,
    ) -> Result<ActionRow> {
        let description = request.validate()?;

        self.db.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            if goals::get_strategy(&tx, user_id, strategy_id)?.is_none() {
                return Err(strategy_not_found());
            }
            if goals::count_actions(&tx, strategy_id)? >= MAX_ACTIONS_PER_STRATEGY {
                return Err(NorthstarError::QuotaExceeded(format!(
                    "A strategy can have at most {} actions",
                    MAX_ACTIONS_PER_STRATEGY
                )));
            }
            let action = goals::append_action(&tx, strategy_id, &description, now())?;
            tx.commit()?;
            Ok(action)
        })
    }

    pub fn set_strategy_status(
        &self,
        user_id: &str,
        strategy_id: &str,
        update: &StatusUpdate,
    ) -> Result<StrategyRow> {
        let status = update.validate()?;
        self.db.with_conn(|conn| {
            if !goals::update_status(conn, Tracked::Strategy, user_id, strategy_id, status, now())? {
                return Err(strategy_not_found());
            }
            goals::get_strategy(conn, user_id, strategy_id)?.ok_or_else(strategy_not_found)
        })
    }

    pub fn set_action_status(
        &self,
        user_id: &str,
        action_id: &str,
        update: &StatusUpdate,
    ) -> Result<ActionRow> {
        let status = update.validate()?;
        self.db.with_conn(|conn| {
            if !goals::update_status(conn, Tracked::Action, user_id, action_id, status, now())? {
                return Err(action_not_found());
            }
            goals::get_action(conn, user_id, action_id)?.ok_or_else(action_not_found)
        })
    }

    /// Append one milestone reached now
    pub fn add_milestone(
        &self,
        user_id: &str,
        goal_id: &str,
        request: &CreateMilestoneRequest,
    ) -> Result<MilestoneRow> {
        let note = request.validate()?;
        self.db.with_conn(|conn| {
            if !goals::goal_exists(conn, user_id, goal_id)? {
                return Err(goal_not_found());
            }
            milestones::append(conn, goal_id, &note, now())
        })
    }

    /// Replace the goal's milestones wholesale; an empty array clears them
    pub fn replace_milestones(
        &self,
        user_id: &str,
        goal_id: &str,
        request: &ReplaceMilestonesRequest,
    ) -> Result<GoalRow> {
        let entries = request.validate()?;

        self.db.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if !goals::goal_exists(&tx, user_id, goal_id)? {
                return Err(goal_not_found());
            }
            milestones::replace_all(&tx, goal_id, &entries, now())?;
            tx.commit()?;

            debug!(goal_id = %goal_id, count = entries.len(), "Milestones replaced");
            goals::get_goal(conn, user_id, goal_id)?.ok_or_else(goal_not_found)
        })
    }
}

fn goal_not_found() -> NorthstarError {
    NorthstarError::NotFound("Goal not found".into())
}

fn strategy_not_found() -> NorthstarError {
    NorthstarError::NotFound("Strategy not found".into())
}

fn action_not_found() -> NorthstarError {
    NorthstarError::NotFound("Action not found".into())
}

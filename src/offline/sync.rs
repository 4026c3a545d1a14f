//! Reconcile the offline cache with a server account
//!
//! 1. Post the vision with its client key
//! 2. Post each goal with its client key; a replay returns the stored goal
//! 3. Push local status for the goal, its strategies and actions
//! 4. Replace server milestones with the local list when they differ
//!
//! Local state wins. Each item is dropped from the cache only once the
//! server acknowledged it at the revision that was pushed; failures stay for
//! the next `sync`.

use tracing::{debug, info, warn};

use super::cache::{OfflineCache, OfflineGoal, OfflineVision};
use super::client::{HttpClient, RemoteApi};
use crate::db::goals::GoalRow;
use crate::db::visions::VisionRow;
use crate::db::format_ts;
use crate::services::RegisteredUser;
use crate::types::requests::{
    ActionDraft, CreateGoalRequest, CreateVisionRequest, MilestoneInput, RegisterRequest,
    StrategyDraft,
};
use crate::types::{NorthstarError, Result};

/// One item the server did not accept
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    /// `"vision"`, `"goal"` or `"cache"`
    pub item: &'static str,
    pub client_key: Option<String>,
    pub error: String,
}

/// Outcome of a reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub vision_synced: bool,
    pub goals_synced: usize,
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    /// Nothing failed
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, item: &'static str, client_key: Option<&str>, error: impl ToString) {
        let error = error.to_string();
        warn!(item, client_key, error = %error, "Offline item not synced");
        self.failures.push(SyncFailure {
            item,
            client_key: client_key.map(str::to_string),
            error,
        });
    }
}

/// Registration result plus what happened to the offline data
#[derive(Debug, Clone)]
pub struct MigrationOutcome {
    pub user: RegisteredUser,
    pub report: SyncReport,
}

fn vision_request(vision: &OfflineVision) -> CreateVisionRequest {
    CreateVisionRequest {
        answers: vision.answers.clone(),
        client_key: Some(vision.client_key.clone()),
    }
}

fn goal_request(goal: &OfflineGoal) -> CreateGoalRequest {
    CreateGoalRequest {
        title: Some(goal.title.clone()),
        why: goal.why.clone(),
        expected_completion_date: Some(format_ts(&goal.expected_completion_date)),
        strategies: goal
            .strategies
            .iter()
            .map(|s| StrategyDraft {
                title: Some(s.title.clone()),
                actions: s
                    .actions
                    .iter()
                    .map(|a| ActionDraft {
                        description: Some(a.description.clone()),
                    })
                    .collect(),
            })
            .collect(),
        client_key: Some(goal.client_key.clone()),
    }
}

fn milestones_match(local: &OfflineGoal, remote: &GoalRow) -> bool {
    local.milestones.len() == remote.milestones.len()
        && local
            .milestones
            .iter()
            .zip(&remote.milestones)
            .all(|(l, r)| l.note == r.note && l.reached_at == r.reached_at)
}

/// Pushes offline state through a `RemoteApi`
pub struct Reconciler<'a, R: RemoteApi + ?Sized> {
    remote: &'a R,
    cache: &'a OfflineCache,
}

impl<'a, R: RemoteApi + ?Sized> Reconciler<'a, R> {
    pub fn new(remote: &'a R, cache: &'a OfflineCache) -> Self {
        Self { remote, cache }
    }

    /// Push everything in the cache. Item failures are collected in the
    /// report; only cache I/O errors abort.
    pub async fn sync(&self) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        if let Some(vision) = self.cache.vision()? {
            match self.push_vision(vision).await {
                Ok(Some(row)) => {
                    info!(vision_id = %row.id, "Offline vision synced");
                    report.vision_synced = true;
                }
                Ok(None) => {}
                Err((client_key, e)) => report.fail("vision", Some(&client_key), e),
            }
        }

        for goal in self.cache.goals()? {
            match self.push_goal(&goal).await {
                Ok(row) => {
                    self.cache.remove_goal_if(&goal.client_key, goal.revision)?;
                    info!(goal_id = %row.id, client_key = %goal.client_key, "Offline goal synced");
                    report.goals_synced += 1;
                }
                Err(e) => report.fail("goal", Some(&goal.client_key), e),
            }
        }

        Ok(report)
    }

    /// Post the vision and drop it from the cache once the server holds
    /// these exact answers.
    ///
    /// A replayed key can answer with an older snapshot, either after a lost
    /// acknowledgement or when the answers were edited during a push. The
    /// local answers are then re-posted under a fresh key. `Ok(None)` means
    /// the vision left the cache while the push was in flight.
    async fn push_vision(
        &self,
        mut vision: OfflineVision,
    ) -> std::result::Result<Option<VisionRow>, (String, NorthstarError)> {
        let mut row = self
            .remote
            .create_vision(&vision_request(&vision))
            .await
            .map_err(|e| (vision.client_key.clone(), e))?;

        if row.answers != vision.answers {
            debug!(client_key = %vision.client_key, "Server holds an older vision snapshot");
            vision = match self.cache.rekey_vision(&vision.client_key) {
                Ok(Some(fresh)) => fresh,
                Ok(None) => return Ok(None),
                Err(e) => return Err((vision.client_key, e)),
            };
            row = self
                .remote
                .create_vision(&vision_request(&vision))
                .await
                .map_err(|e| (vision.client_key.clone(), e))?;
        }

        self.cache
            .clear_vision_if(&vision.client_key, vision.revision)
            .map_err(|e| (vision.client_key.clone(), e))?;
        Ok(Some(row))
    }

    async fn push_goal(&self, goal: &OfflineGoal) -> Result<GoalRow> {
        let mut row = self.remote.create_goal(&goal_request(goal)).await?;

        // Strategies and actions come back in position order, matching the
        // order they were posted in.
        for (local, remote) in goal.strategies.iter().zip(&row.strategies) {
            if local.status != remote.status {
                self.remote.set_strategy_status(&remote.id, local.status).await?;
            }
            for (local, remote) in local.actions.iter().zip(&remote.actions) {
                if local.status != remote.status {
                    self.remote.set_action_status(&remote.id, local.status).await?;
                }
            }
        }

        if goal.status != row.status {
            row = self.remote.set_goal_status(&row.id, goal.status).await?;
        }

        if !milestones_match(goal, &row) {
            let milestones = goal
                .milestones
                .iter()
                .map(|m| MilestoneInput::new(m.note.clone(), m.reached_at))
                .collect();
            row = self.remote.replace_milestones(&row.id, milestones).await?;
        }

        Ok(row)
    }
}

/// Register, then migrate the offline cache into the new account.
///
/// A registration failure is returned and the cache is left untouched. A
/// migration failure never fails the registration; it is logged and shows up
/// in the report.
pub async fn register_and_migrate(
    client: &mut HttpClient,
    cache: &OfflineCache,
    request: &RegisterRequest,
) -> Result<MigrationOutcome> {
    let user = client.register(request).await?;
    client.set_token(user.token.clone());

    let report = match Reconciler::new(&*client, cache).sync().await {
        Ok(report) => report,
        Err(e) => {
            let mut report = SyncReport::default();
            report.fail("cache", None, e);
            report
        }
    };

    if report.is_complete() {
        info!(user_id = %user.id, goals = report.goals_synced, "Offline data migrated");
    } else {
        warn!(
            user_id = %user.id,
            failures = report.failures.len(),
            "Offline data partially migrated; remaining items stay cached"
        );
    }

    Ok(MigrationOutcome { user, report })
}

//! Offline cache for visitors who have not registered yet
//!
//! Each key is a JSON file holding a versioned envelope. Every write replaces
//! the whole document through a temp file and a rename. Items carry a
//! `clientKey` so the server can recognise a replayed upload, and a
//! `revision` bumped on every local edit so the reconciler only drops what
//! it actually pushed.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::db::{new_id, now};
use crate::types::requests::{CreateGoalRequest, VisionAnswers};
use crate::types::{
    FieldErrors, NorthstarError, Result, Status, StatusStamps, MAX_ACTIVE_GOALS, QUOTA_MESSAGE,
};

/// Bumped when the envelope layout changes
pub const CACHE_VERSION: u32 = 1;

pub const VISION_KEY: &str = "userVision";
pub const GOALS_KEY: &str = "userGoals";

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    version: u32,
    /// Number of writes to this key
    revision: u64,
    value: T,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineVision {
    pub client_key: String,
    pub revision: u64,
    #[serde(flatten)]
    pub answers: VisionAnswers,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineAction {
    pub client_key: String,
    pub description: String,
    pub status: Status,
    pub start_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineStrategy {
    pub client_key: String,
    pub title: String,
    pub status: Status,
    pub start_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub actions: Vec<OfflineAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineMilestone {
    pub note: String,
    pub reached_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineGoal {
    pub client_key: String,
    pub revision: u64,
    pub title: String,
    pub why: Option<String>,
    pub expected_completion_date: DateTime<Utc>,
    pub status: Status,
    pub start_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub strategies: Vec<OfflineStrategy>,
    #[serde(default)]
    pub milestones: Vec<OfflineMilestone>,
    pub created_at: DateTime<Utc>,
}

/// Apply a status change and its stamps to one item
fn apply_status(
    status: &mut Status,
    start_date: &mut Option<DateTime<Utc>>,
    completed_at: &mut Option<DateTime<Utc>>,
    next: Status,
) {
    let stamps = StatusStamps {
        start_date: *start_date,
        completed_at: *completed_at,
    }
    .transition(next, now());
    *status = next;
    *start_date = stamps.start_date;
    *completed_at = stamps.completed_at;
}

/// File-backed offline mirror of the vision and goals
pub struct OfflineCache {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl OfflineCache {
    /// Open the cache rooted at `dir`, creating it if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|e| NorthstarError::Internal(format!("Offline cache lock poisoned: {}", e)))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<Envelope<T>>> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let envelope: Envelope<T> = serde_json::from_slice(&bytes).map_err(|e| {
            NorthstarError::Internal(format!("Corrupt offline cache entry {}: {}", key, e))
        })?;

        if envelope.version > CACHE_VERSION {
            return Err(NorthstarError::Internal(format!(
                "Offline cache entry {} has version {}, expected at most {}",
                key, envelope.version, CACHE_VERSION
            )));
        }
        Ok(Some(envelope))
    }

    fn write<T: Serialize>(&self, key: &str, value: &T, previous_revision: u64) -> Result<()> {
        let envelope = Envelope {
            version: CACHE_VERSION,
            revision: previous_revision + 1,
            value,
        };
        let bytes = serde_json::to_vec_pretty(&envelope)
            .map_err(|e| NorthstarError::Internal(format!("Failed to encode {}: {}", key, e)))?;

        let target = self.path_for(key);
        let tmp = self.dir.join(format!(".{}.json.tmp", key));
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &target)?;

        debug!(key, revision = envelope.revision, "Offline cache written");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn load_goals(&self) -> Result<(Vec<OfflineGoal>, u64)> {
        Ok(self
            .read::<Vec<OfflineGoal>>(GOALS_KEY)?
            .map(|e| (e.value, e.revision))
            .unwrap_or_default())
    }

    /// Read-modify-write over the goal list
    fn update_goals<T>(&self, f: impl FnOnce(&mut Vec<OfflineGoal>) -> Result<T>) -> Result<T> {
        let _guard = self.guard()?;
        let (mut goals, revision) = self.load_goals()?;
        let out = f(&mut goals)?;
        self.write(GOALS_KEY, &goals, revision)?;
        Ok(out)
    }

    fn goal_mut<'a>(goals: &'a mut [OfflineGoal], key: &str) -> Result<&'a mut OfflineGoal> {
        goals
            .iter_mut()
            .find(|g| g.client_key == key)
            .ok_or_else(|| NorthstarError::NotFound("Goal not found".into()))
    }

    // ==================== Vision ====================

    pub fn vision(&self) -> Result<Option<OfflineVision>> {
        let _guard = self.guard()?;
        Ok(self.read::<OfflineVision>(VISION_KEY)?.map(|e| e.value))
    }

    /// Store the visitor's answers, keeping the client key of an unsynced
    /// earlier save.
    pub fn save_vision(&self, answers: VisionAnswers) -> Result<OfflineVision> {
        let _guard = self.guard()?;
        let previous = self.read::<OfflineVision>(VISION_KEY)?;
        let (client_key, item_revision, revision) = match &previous {
            Some(e) => (e.value.client_key.clone(), e.value.revision + 1, e.revision),
            None => (new_id(), 1, 0),
        };

        let vision = OfflineVision {
            client_key,
            revision: item_revision,
            answers: answers.normalized(),
            updated_at: now(),
        };
        self.write(VISION_KEY, &vision, revision)?;
        Ok(vision)
    }

    /// Drop the vision only if it was not edited after `revision` was read
    pub fn clear_vision_if(&self, client_key: &str, revision: u64) -> Result<bool> {
        let _guard = self.guard()?;
        match self.read::<OfflineVision>(VISION_KEY)? {
            Some(e) if e.value.client_key == client_key && e.value.revision == revision => {
                self.remove(VISION_KEY)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Move the vision to a fresh client key.
    ///
    /// Used when the server holds a different snapshot under `stale_key`, so
    /// the current answers are posted as a new snapshot. Returns `None` when
    /// the cached vision no longer carries `stale_key`.
    pub fn rekey_vision(&self, stale_key: &str) -> Result<Option<OfflineVision>> {
        let _guard = self.guard()?;
        let Some(entry) = self.read::<OfflineVision>(VISION_KEY)? else {
            return Ok(None);
        };
        if entry.value.client_key != stale_key {
            return Ok(None);
        }

        let vision = OfflineVision {
            client_key: new_id(),
            revision: entry.value.revision + 1,
            ..entry.value
        };
        self.write(VISION_KEY, &vision, entry.revision)?;
        debug!(client_key = %vision.client_key, "Offline vision re-keyed");
        Ok(Some(vision))
    }

    // ==================== Goals ====================

    pub fn goals(&self) -> Result<Vec<OfflineGoal>> {
        let _guard = self.guard()?;
        Ok(self.load_goals()?.0)
    }

    /// Add a goal with its strategies and actions.
    ///
    /// The same validation and active-goal limit as the server apply.
    pub fn add_goal(&self, request: &CreateGoalRequest) -> Result<OfflineGoal> {
        let draft = request.validate()?;

        self.update_goals(|goals| {
            let active = goals.iter().filter(|g| g.status.is_active()).count();
            if active >= MAX_ACTIVE_GOALS {
                return Err(NorthstarError::QuotaExceeded(QUOTA_MESSAGE.into()));
            }

            let goal = OfflineGoal {
                client_key: draft.client_key.unwrap_or_else(new_id),
                revision: 1,
                title: draft.title,
                why: draft.why,
                expected_completion_date: draft.expected_completion_date,
                status: Status::Unbegun,
                start_date: None,
                completed_at: None,
                strategies: draft
                    .strategies
                    .into_iter()
                    .map(|s| OfflineStrategy {
                        client_key: new_id(),
                        title: s.title,
                        status: Status::Unbegun,
                        start_date: None,
                        completed_at: None,
                        actions: s
                            .actions
                            .into_iter()
                            .map(|description| OfflineAction {
                                client_key: new_id(),
                                description,
                                status: Status::Unbegun,
                                start_date: None,
                                completed_at: None,
                            })
                            .collect(),
                    })
                    .collect(),
                milestones: vec![],
                created_at: now(),
            };
            goals.push(goal.clone());
            Ok(goal)
        })
    }

    pub fn set_goal_status(&self, goal_key: &str, status: Status) -> Result<OfflineGoal> {
        self.update_goals(|goals| {
            let goal = Self::goal_mut(goals, goal_key)?;
            apply_status(
                &mut goal.status,
                &mut goal.start_date,
                &mut goal.completed_at,
                status,
            );
            goal.revision += 1;
            Ok(goal.clone())
        })
    }

    pub fn set_strategy_status(
        &self,
        goal_key: &str,
        strategy_key: &str,
        status: Status,
    ) -> Result<OfflineStrategy> {
        self.update_goals(|goals| {
            let goal = Self::goal_mut(goals, goal_key)?;
            let strategy = goal
                .strategies
                .iter_mut()
                .find(|s| s.client_key == strategy_key)
                .ok_or_else(|| NorthstarError::NotFound("Strategy not found".into()))?;
            apply_status(
                &mut strategy.status,
                &mut strategy.start_date,
                &mut strategy.completed_at,
                status,
            );
            let updated = strategy.clone();
            goal.revision += 1;
            Ok(updated)
        })
    }

    pub fn set_action_status(
        &self,
        goal_key: &str,
        action_key: &str,
        status: Status,
    ) -> Result<OfflineAction> {
        self.update_goals(|goals| {
            let goal = Self::goal_mut(goals, goal_key)?;
            let action = goal
                .strategies
                .iter_mut()
                .flat_map(|s| s.actions.iter_mut())
                .find(|a| a.client_key == action_key)
                .ok_or_else(|| NorthstarError::NotFound("Action not found".into()))?;
            apply_status(
                &mut action.status,
                &mut action.start_date,
                &mut action.completed_at,
                status,
            );
            let updated = action.clone();
            goal.revision += 1;
            Ok(updated)
        })
    }

    pub fn add_milestone(&self, goal_key: &str, note: &str) -> Result<OfflineMilestone> {
        let note = note.trim();
        if note.is_empty() {
            let mut errors = FieldErrors::new();
            errors.add("note", "Note is required");
            return Err(errors.into());
        }

        self.update_goals(|goals| {
            let goal = Self::goal_mut(goals, goal_key)?;
            let milestone = OfflineMilestone {
                note: note.to_string(),
                reached_at: now(),
            };
            goal.milestones.push(milestone.clone());
            goal.revision += 1;
            Ok(milestone)
        })
    }

    /// Drop a goal only if it was not edited after `revision` was read
    pub fn remove_goal_if(&self, goal_key: &str, revision: u64) -> Result<bool> {
        self.update_goals(|goals| {
            let before = goals.len();
            goals.retain(|g| !(g.client_key == goal_key && g.revision == revision));
            Ok(goals.len() != before)
        })
    }

    /// Remove everything
    pub fn clear(&self) -> Result<()> {
        let _guard = self.guard()?;
        self.remove(VISION_KEY)?;
        self.remove(GOALS_KEY)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.vision()?.is_none() && self.goals()?.is_empty())
    }
}

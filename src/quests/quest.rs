//! Quest entity and wire types.
//!
//! A [`Quest`] is an immutable-shaped snapshot of one work item's
//! definition plus its mutable per-user status. Entities are built from the
//! catalog response and live exactly as long as one orchestration run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{QuestError, Result};

/// Task-kind key for desktop play (heartbeat) quests.
pub const TASK_PLAY_ON_DESKTOP: &str = "PLAY_ON_DESKTOP";

/// Task-kind keys for video (progress-simulation) quests.
pub const TASK_WATCH_VIDEO: &str = "WATCH_VIDEO";
pub const TASK_WATCH_VIDEO_ON_MOBILE: &str = "WATCH_VIDEO_ON_MOBILE";

/// One quest entry as returned by `GET /quests/@me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestRecord {
    /// Opaque stable identifier, unique within a catalog fetch.
    pub id: String,
    /// Immutable quest definition.
    pub config: QuestConfig,
    /// Per-user status; absent until the user has interacted with the quest.
    #[serde(default)]
    pub user_status: Option<UserStatus>,
}

/// Immutable quest definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestConfig {
    /// Hard expiry; quests past this instant are never processed.
    pub expires_at: DateTime<Utc>,
    /// Task definitions, original shape.
    #[serde(default)]
    pub task_config: Option<TaskConfig>,
    /// Task definitions, v2 shape. Mutually substitutable with the above.
    #[serde(default)]
    pub task_config_v2: Option<TaskConfig>,
    /// Display metadata.
    #[serde(default)]
    pub messages: QuestMessages,
    /// Application the quest belongs to.
    pub application: QuestApplication,
}

/// Display strings attached to a quest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestMessages {
    /// Human-facing quest name; falls back to the application name.
    #[serde(default)]
    pub quest_name: Option<String>,
}

/// Owning application of a quest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestApplication {
    pub id: String,
    pub name: String,
}

/// Mapping from task-kind name to its completion target.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskConfig {
    #[serde(default)]
    pub tasks: HashMap<String, TaskTarget>,
}

/// Completion target for one task: duration in seconds for play tasks,
/// timestamp target for video tasks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TaskTarget {
    pub target: f64,
}

/// Mutable per-user quest status. Replaced wholesale whenever an
/// enroll/heartbeat/progress call returns a fresher one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserStatus {
    #[serde(default)]
    pub enrolled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub claimed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub progress: HashMap<String, TaskProgress>,
}

/// Server-authoritative progress for one task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TaskProgress {
    pub value: f64,
}

/// Completion strategy implied by a quest's task-kind key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Elapsed-time heartbeats until the target duration is reached.
    Play,
    /// Simulated watch-position reports up to the target timestamp.
    Video,
}

/// The single task a quest is completed through.
#[derive(Debug, Clone)]
pub struct ActiveTask {
    pub kind: TaskKind,
    /// The wire key, e.g. `PLAY_ON_DESKTOP`; progress is tracked under it.
    pub name: String,
    pub target: f64,
}

/// One work item: definition snapshot plus mutable user progress.
#[derive(Debug, Clone)]
pub struct Quest {
    record: QuestRecord,
}

impl Quest {
    pub fn new(record: QuestRecord) -> Self {
        Self { record }
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn config(&self) -> &QuestConfig {
        &self.record.config
    }

    pub fn user_status(&self) -> Option<&UserStatus> {
        self.record.user_status.as_ref()
    }

    /// Quest name for log prefixes: `messages.quest_name`, falling back to
    /// the application name.
    pub fn display_name(&self) -> &str {
        self.record
            .config
            .messages
            .quest_name
            .as_deref()
            .unwrap_or(&self.record.config.application.name)
    }

    pub fn is_expired(&self, reference: DateTime<Utc>) -> bool {
        reference > self.record.config.expires_at
    }

    pub fn is_completed(&self) -> bool {
        self.user_status().is_some_and(|s| s.completed_at.is_some())
    }

    pub fn is_enrolled(&self) -> bool {
        self.user_status().is_some_and(|s| s.enrolled_at.is_some())
    }

    pub fn has_claimed_rewards(&self) -> bool {
        self.user_status().is_some_and(|s| s.claimed_at.is_some())
    }

    /// Valid for processing: not completed and not expired.
    pub fn is_valid(&self, reference: DateTime<Utc>) -> bool {
        !self.is_completed() && !self.is_expired(reference)
    }

    /// Adopt a fresher status from an enroll/heartbeat/progress response.
    pub fn update_user_status(&mut self, status: UserStatus) {
        self.record.user_status = Some(status);
    }

    /// Whichever task-config shape the quest carries.
    pub fn task_config(&self) -> Option<&TaskConfig> {
        self.record
            .config
            .task_config
            .as_ref()
            .or(self.record.config.task_config_v2.as_ref())
    }

    /// Resolve the quest's single recognized task.
    ///
    /// Play takes priority over video if a quest were ever to define both;
    /// in practice the kinds are mutually exclusive. Neither key present is
    /// [`QuestError::UnsupportedTask`] — the caller skips the quest and
    /// never retries it.
    pub fn active_task(&self) -> Result<ActiveTask> {
        let tasks = self.task_config().map(|c| &c.tasks);

        let lookup = |name: &str| -> Option<ActiveTask> {
            let target = tasks?.get(name)?.target;
            let kind = if name == TASK_PLAY_ON_DESKTOP {
                TaskKind::Play
            } else {
                TaskKind::Video
            };
            Some(ActiveTask {
                kind,
                name: name.to_owned(),
                target,
            })
        };

        lookup(TASK_PLAY_ON_DESKTOP)
            .or_else(|| lookup(TASK_WATCH_VIDEO))
            .or_else(|| lookup(TASK_WATCH_VIDEO_ON_MOBILE))
            .ok_or(QuestError::UnsupportedTask)
    }

    /// Last known progress value for the given task key, zero when unknown.
    pub fn progress_value(&self, task_name: &str) -> f64 {
        self.user_status()
            .and_then(|s| s.progress.get(task_name))
            .map(|p| p.value)
            .unwrap_or(0.0)
    }
}

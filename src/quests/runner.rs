//! Shared task-runner plumbing.
//!
//! One [`RunContext`] exists per orchestration run. It owns the run's
//! cancellation token and log sink and wraps the quest REST calls the
//! strategies share. Every blocking wait goes through [`RunContext::sleep`]
//! so a stop request resolves all pending waits into
//! [`QuestError::Stopped`] at once.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::EngineTuning;
use crate::error::{QuestError, Result};
use crate::quests::quest::{ActiveTask, Quest, UserStatus};
use crate::session::SessionProvider;

/// Enroll location constant sent by the desktop client.
const ENROLL_LOCATION: u32 = 11;

/// Sink for user-visible progress lines. Quest-scoped lines arrive already
/// prefixed with the quest's display name.
pub type LogSink = Arc<dyn Fn(String) + Send + Sync>;

/// A completion strategy: drives one quest's task to its target.
///
/// New task kinds plug in here; the orchestrator picks the strategy from
/// the quest's active task kind.
#[async_trait]
pub trait TaskStrategy: Send + Sync {
    /// Run the quest to completion. `Err(Stopped)` is a clean cancellation
    /// exit; any other error has already exhausted the runner's retries.
    async fn run(&self, ctx: &RunContext, quest: &mut Quest, task: &ActiveTask) -> Result<()>;
}

/// Per-run shared state handed to every runner at spawn time.
///
/// Lifetime is scoped to exactly one start/stop cycle; nothing here is
/// process-global.
pub struct RunContext {
    session: Arc<SessionProvider>,
    cancel: CancellationToken,
    tuning: EngineTuning,
    sink: LogSink,
}

impl RunContext {
    pub fn new(session: Arc<SessionProvider>, tuning: EngineTuning, sink: LogSink) -> Self {
        Self {
            session,
            cancel: CancellationToken::new(),
            tuning,
            sink,
        }
    }

    pub fn tuning(&self) -> &EngineTuning {
        &self.tuning
    }

    /// Signal the run to stop. Synchronous; every pending [`sleep`] resolves
    /// to `Stopped` immediately, and no runner issues another call.
    ///
    /// [`sleep`]: Self::sleep
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop-check before a network call.
    pub fn ensure_active(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(QuestError::Stopped);
        }
        Ok(())
    }

    /// Cancellable sleep: resolves early into `Stopped` when the run is
    /// cancelled.
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        self.ensure_active()?;
        tokio::select! {
            _ = self.cancel.cancelled() => Err(QuestError::Stopped),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    /// Cancellable backoff after a failed remote call.
    pub async fn backoff(&self) -> Result<()> {
        self.sleep(self.tuning.retry_backoff()).await
    }

    /// Orchestrator-level line, no quest prefix.
    pub fn log(&self, msg: impl Into<String>) {
        (self.sink)(msg.into());
    }

    /// Quest-scoped line, prefixed with the quest's display name.
    pub fn log_quest(&self, name: &str, msg: impl Into<String>) {
        (self.sink)(format!("[{name}] {}", msg.into()));
    }

    // ── Quest REST surface ─────────────────────────────────────────

    /// `POST /quests/{id}/enroll`, returning the updated user status.
    pub async fn enroll(&self, quest_id: &str) -> Result<UserStatus> {
        self.ensure_active()?;
        let body = json!({
            "location": ENROLL_LOCATION,
            "is_targeted": false,
            "metadata_raw": Value::Null,
        });
        let response = self
            .session
            .post(&format!("/quests/{quest_id}/enroll"), &body)
            .await?;
        serde_json::from_value(response)
            .map_err(|e| QuestError::RemoteCall(format!("enroll: malformed status: {e}")))
    }

    /// `POST /quests/{id}/heartbeat`. Returns the echoed user status when
    /// the server includes one; it frequently omits it.
    pub async fn heartbeat(
        &self,
        quest_id: &str,
        application_id: &str,
        terminal: bool,
    ) -> Result<Option<UserStatus>> {
        self.ensure_active()?;
        let body = json!({ "application_id": application_id, "terminal": terminal });
        let response = self
            .session
            .post(&format!("/quests/{quest_id}/heartbeat"), &body)
            .await?;
        Ok(response
            .get("user_status")
            .filter(|v| !v.is_null())
            .and_then(|v| serde_json::from_value(v.clone()).ok()))
    }

    /// `POST /quests/{id}/video-progress` with the simulated timestamp.
    pub async fn video_progress(&self, quest_id: &str, timestamp: f64) -> Result<VideoProgressAck> {
        self.ensure_active()?;
        let body = json!({ "timestamp": timestamp });
        let response = self
            .session
            .post(&format!("/quests/{quest_id}/video-progress"), &body)
            .await?;
        serde_json::from_value(response)
            .map_err(|e| QuestError::RemoteCall(format!("video-progress: malformed ack: {e}")))
    }

    /// Authoritative progress for one quest/task, read from a fresh catalog
    /// fetch. `None` on any failure — the caller falls back to its local
    /// view rather than aborting.
    pub async fn authoritative_progress(&self, quest_id: &str, task_name: &str) -> Option<f64> {
        if self.is_stopped() {
            return None;
        }
        let quests = crate::quests::catalog::fetch(&self.session).await.ok()?;
        quests
            .iter()
            .find(|q| q.id() == quest_id)
            .and_then(|q| q.user_status())
            .and_then(|s| s.progress.get(task_name))
            .map(|p| p.value)
    }
}

/// Response to a video-progress report.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct VideoProgressAck {
    /// Set once the server considers the quest complete.
    #[serde(default)]
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Fresher user status, when echoed.
    #[serde(default)]
    pub user_status: Option<UserStatus>,
}

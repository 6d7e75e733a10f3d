//! Quest orchestrator.
//!
//! Selects eligible quests, dispatches each to the matching strategy on its
//! own task, and owns the run's shared cancellation signal. One quest's
//! unrecoverable error never cancels its siblings; all progress funnels
//! through the run's single log sink.

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EngineTuning;
use crate::error::{QuestError, Result};
use crate::quests::play::PlayStrategy;
use crate::quests::quest::{Quest, TaskKind};
use crate::quests::runner::{LogSink, RunContext, TaskStrategy};
use crate::quests::video::VideoStrategy;
use crate::session::SessionProvider;

/// Orchestrates one run over a fetched quest catalog.
///
/// Owns the [`RunContext`] whose lifetime is exactly one start/stop cycle.
pub struct QuestManager {
    ctx: RunContext,
    quests: Vec<Quest>,
}

impl QuestManager {
    pub fn new(
        session: Arc<SessionProvider>,
        quests: Vec<Quest>,
        tuning: EngineTuning,
        sink: LogSink,
    ) -> Self {
        Self {
            ctx: RunContext::new(session, tuning, sink),
            quests,
        }
    }

    /// All quests from the catalog, server order.
    pub fn quests(&self) -> &[Quest] {
        &self.quests
    }

    pub fn get(&self, quest_id: &str) -> Option<&Quest> {
        self.quests.iter().find(|q| q.id() == quest_id)
    }

    /// Quests worth processing: not completed, not expired. Catalog order
    /// is preserved.
    pub fn filter_quests_valid(&self, reference: DateTime<Utc>) -> Vec<Quest> {
        self.quests
            .iter()
            .filter(|q| q.is_valid(reference))
            .cloned()
            .collect()
    }

    /// Run every given quest concurrently and wait for all of them to
    /// settle. Each runner launches after an independent random jitter so
    /// the first requests do not land as a burst.
    pub async fn run_all(self: Arc<Self>, quests: Vec<Quest>) {
        let handles: Vec<_> = quests
            .into_iter()
            .map(|quest| {
                let manager = Arc::clone(&self);
                let jitter = Duration::from_secs_f64(
                    rand::random::<f64>() * manager.ctx.tuning().spawn_jitter_max_secs,
                );
                tokio::spawn(async move {
                    if manager.ctx.sleep(jitter).await.is_err() {
                        return;
                    }
                    let name = quest.display_name().to_owned();
                    if let Err(e) = manager.run_quest(quest).await
                        && !e.is_stopped()
                    {
                        manager.ctx.log_quest(&name, format!("Error: {e}"));
                    }
                })
            })
            .collect();

        join_all(handles).await;
    }

    /// Process one quest: enroll if needed, then hand it to the strategy
    /// for its task kind.
    pub async fn run_quest(&self, mut quest: Quest) -> Result<()> {
        if self.ctx.is_stopped() {
            return Ok(());
        }

        let name = quest.display_name().to_owned();
        self.ctx.log_quest(&name, "Processing...");

        if !quest.is_enrolled() {
            self.ctx.log_quest(&name, "Enrolling...");
            match self.ctx.enroll(quest.id()).await {
                Ok(status) => quest.update_user_status(status),
                Err(e) => {
                    if !e.is_stopped() {
                        self.ctx.log_quest(&name, format!("Enroll Error: {e}"));
                    }
                    return Err(e);
                }
            }
        }

        match quest.active_task() {
            Ok(task) => {
                let strategy: &dyn TaskStrategy = match task.kind {
                    TaskKind::Play => &PlayStrategy,
                    TaskKind::Video => &VideoStrategy,
                };
                strategy.run(&self.ctx, &mut quest, &task).await
            }
            Err(QuestError::UnsupportedTask) => {
                // Skipped permanently, never retried.
                self.ctx.log_quest(&name, "Unsupported Task Type.");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Stop the run: cancels the shared token, releasing every pending
    /// sleep across every runner. Returns without waiting for runners to
    /// unwind; a runner mid-flight may finish its in-flight call but will
    /// not schedule another.
    pub fn stop_all(&self) {
        tracing::debug!("stopping quest run");
        self.ctx.stop();
    }

    /// True once [`stop_all`](Self::stop_all) has been called.
    pub fn is_stopped(&self) -> bool {
        self.ctx.is_stopped()
    }
}

//! Progress-simulation strategy for video quests.
//!
//! The server is authoritative for the reported timestamp itself, so there
//! is no verification round-trip: the runner walks the watch position up to
//! the target at a fixed speed, with sub-unit jitter so repeated reports
//! are never byte-identical, then pins one final report exactly at the
//! target to force completion if it was not already signaled.

use async_trait::async_trait;

use crate::error::Result;
use crate::quests::quest::{ActiveTask, Quest};
use crate::quests::runner::{RunContext, TaskStrategy};

/// Drives `RUNNING → DONE` for one video quest.
pub struct VideoStrategy;

#[async_trait]
impl TaskStrategy for VideoStrategy {
    async fn run(&self, ctx: &RunContext, quest: &mut Quest, task: &ActiveTask) -> Result<()> {
        let name = quest.display_name().to_owned();
        ctx.log_quest(&name, "Task: WATCH_VIDEO");

        let target = task.target;
        let speed = ctx.tuning().video_speed;
        let mut current = quest.progress_value(&task.name);

        while current < target {
            ctx.ensure_active()?;
            current = (current + speed).min(target);

            match report(ctx, quest, &name, current).await {
                Ok(true) => return Ok(()),
                Ok(false) => {
                    ctx.log_quest(&name, format!("Progress: {}/{target}s", current.floor()));
                    ctx.sleep(ctx.tuning().video_tick()).await?;
                }
                Err(e) if e.is_stopped() => return Err(e),
                Err(e) => {
                    ctx.log_quest(&name, format!("Error: {e}"));
                    ctx.backoff().await?;
                }
            }
        }

        // The loop reported target-adjacent jittered values; one exact
        // report closes the gap. Failures here are ignored — the server
        // already owns completion.
        ctx.ensure_active()?;
        if let Ok(ack) = ctx.video_progress(quest.id(), target).await
            && ack.completed_at.is_some()
        {
            if let Some(status) = ack.user_status {
                quest.update_user_status(status);
            }
            ctx.log_quest(&name, "COMPLETED!");
        }
        Ok(())
    }
}

/// Report one jittered watch position. Returns `true` when the server
/// signals completion.
async fn report(
    ctx: &RunContext,
    quest: &mut Quest,
    name: &str,
    current: f64,
) -> Result<bool> {
    let jittered = current + rand::random::<f64>();
    let ack = ctx.video_progress(quest.id(), jittered).await?;

    if ack.completed_at.is_some() {
        ctx.log_quest(name, "COMPLETED!");
        if let Some(status) = ack.user_status {
            quest.update_user_status(status);
        }
        return Ok(true);
    }
    Ok(false)
}

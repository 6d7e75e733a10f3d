//! Heartbeat strategy for `PLAY_ON_DESKTOP` quests.
//!
//! Reports the owning application as running until the target duration is
//! reached. The server does not echo progress on every heartbeat, so the
//! runner steps its local count optimistically and must verify against the
//! authoritative catalog before claiming completion — the verification
//! correction is the only defense against a false completion claim.

use async_trait::async_trait;

use crate::error::Result;
use crate::quests::quest::{ActiveTask, Quest};
use crate::quests::runner::{RunContext, TaskStrategy};

/// Drives `PENDING_ENROLL → RUNNING → {VERIFYING → RUNNING | COMPLETING}
/// → DONE` for one quest.
pub struct PlayStrategy;

/// Outcome of one heartbeat cycle.
enum Cycle {
    /// Terminal heartbeat sent; the quest is done.
    Done,
    /// Keep looping from the (possibly corrected) progress value.
    Continue,
}

#[async_trait]
impl TaskStrategy for PlayStrategy {
    async fn run(&self, ctx: &RunContext, quest: &mut Quest, task: &ActiveTask) -> Result<()> {
        let name = quest.display_name().to_owned();
        let app_id = quest.config().application.id.clone();
        let app_name = quest.config().application.name.clone();
        ctx.log_quest(&name, format!("Task: PLAY_ON_DESKTOP ({app_name})"));

        let mut current = quest.progress_value(&task.name);

        while current < task.target {
            ctx.ensure_active()?;
            match heartbeat_cycle(ctx, quest, task, &name, &app_id, &mut current).await {
                Ok(Cycle::Done) => return Ok(()),
                Ok(Cycle::Continue) => {}
                Err(e) if e.is_stopped() => return Err(e),
                Err(e) => {
                    ctx.log_quest(&name, format!("Heartbeat Error: {e}"));
                    ctx.backoff().await?;
                }
            }
        }
        Ok(())
    }
}

/// One pass through the heartbeat loop: report, adopt or step progress,
/// and verify before any terminal claim.
async fn heartbeat_cycle(
    ctx: &RunContext,
    quest: &mut Quest,
    task: &ActiveTask,
    name: &str,
    app_id: &str,
    current: &mut f64,
) -> Result<Cycle> {
    let target = task.target;
    ctx.log_quest(name, format!("Heartbeat... Progress: {current}/{target}s"));

    let echoed = ctx.heartbeat(quest.id(), app_id, false).await?;
    let mut reported = None;
    if let Some(status) = echoed {
        reported = status.progress.get(&task.name).map(|p| p.value);
        quest.update_user_status(status);
    }
    match reported {
        // A zero echo is indistinguishable from an omitted one.
        Some(value) if value > 0.0 => *current = value,
        _ => *current += ctx.tuning().heartbeat_step,
    }

    if *current >= target {
        ctx.log_quest(name, "Target reached locally. Verifying...");
        let real = ctx.authoritative_progress(quest.id(), &task.name).await;
        if let Some(real) = real
            && real < target
        {
            ctx.log_quest(
                name,
                format!("Correction: Real progress is {real}/{target}s. Continuing..."),
            );
            *current = real;
            ctx.sleep(ctx.tuning().heartbeat_interval()).await?;
            return Ok(Cycle::Continue);
        }

        if let Some(status) = ctx.heartbeat(quest.id(), app_id, true).await? {
            quest.update_user_status(status);
        }
        ctx.log_quest(name, "COMPLETED!");
        return Ok(Cycle::Done);
    }

    ctx.sleep(ctx.tuning().heartbeat_interval()).await?;
    Ok(Cycle::Continue)
}

//! Questline: automated completion of Discord's time-gated quests.
//!
//! The engine authenticates a spoofed desktop-client session, enumerates
//! the account's quests, and drives each eligible one through a
//! task-specific completion state machine:
//!
//! - **Play quests** are completed by periodic heartbeats reporting the
//!   owning application as running, with server-side verification before
//!   any completion claim.
//! - **Video quests** are completed by simulated watch-position reports up
//!   to the target timestamp.
//!
//! Runners execute concurrently with bounded launch jitter, bounded retry
//! backoff, and immediate global cancellation. The host application talks
//! to a single [`QuestService`] facade and renders its bounded log stream;
//! no engine error escapes it.
//!
//! ```no_run
//! # async fn demo() -> questline::Result<()> {
//! use questline::{QuestService, QuestlineConfig};
//!
//! let service = QuestService::new(QuestlineConfig::new("user-token"))?;
//! service.connect().await;
//! service.start_all().await;
//! for line in service.global_logs() {
//!     println!("{line}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod gateway;
pub mod logging;
pub mod quests;
pub mod service;
pub mod session;

pub use config::{EngineTuning, QuestlineConfig};
pub use error::{QuestError, Result};
pub use quests::{Quest, QuestManager, TaskKind};
pub use service::{LogBuffer, QuestService};
pub use session::SessionProvider;

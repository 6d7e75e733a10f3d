//! Lifecycle facade.
//!
//! [`QuestService`] is the single surface the host application holds: it
//! owns the session provider, the bounded log buffer, and the handle to the
//! orchestrator of the in-flight run. All user-visible behavior is the log
//! stream; no engine error ever reaches the host uncaught.

use chrono::{Local, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::QuestlineConfig;
use crate::error::Result;
use crate::quests::runner::LogSink;
use crate::quests::{QuestManager, catalog};
use crate::session::SessionProvider;

/// Bounded ordered log of user-visible progress lines.
///
/// Lines that do not already carry a `[...]` prefix get a local-time
/// `[HH:MM:SS]` stamp; quest-scoped lines arrive pre-prefixed and are kept
/// as-is. Oldest lines are evicted first once the buffer is full.
#[derive(Debug)]
pub struct LogBuffer {
    lines: VecDeque<String>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a line, evicting the oldest if at capacity.
    pub fn append(&mut self, line: impl Into<String>) {
        let mut line = line.into();
        if !line.starts_with('[') {
            line = format!("[{}] {line}", Local::now().format("%H:%M:%S"));
        }
        tracing::debug!("{line}");

        if self.lines.len() >= self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Ordered snapshot, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(500)
    }
}

/// Start/stop/status surface over the quest engine.
pub struct QuestService {
    session: Arc<SessionProvider>,
    config: QuestlineConfig,
    logs: Arc<Mutex<LogBuffer>>,
    running: AtomicBool,
    active: Mutex<Option<Arc<QuestManager>>>,
}

impl QuestService {
    /// Build the facade. Does not touch the network; call
    /// [`connect`](Self::connect) to open the gateway session.
    pub fn new(config: QuestlineConfig) -> Result<Self> {
        let session = SessionProvider::new(&config)?;
        let logs = Arc::new(Mutex::new(LogBuffer::new(config.engine.log_capacity)));
        Ok(Self {
            session,
            config,
            logs,
            running: AtomicBool::new(false),
            active: Mutex::new(None),
        })
    }

    /// Open the gateway session. Failure is logged, never fatal: quest
    /// runners operate purely over REST.
    pub async fn connect(&self) {
        if let Err(e) = self.session.connect().await {
            self.log(format!("Gateway Error: {e}"));
        }
    }

    /// Fetch the catalog and drive every valid quest to completion.
    ///
    /// No-op when a run is already in progress. Resolves once every
    /// runner has settled; the running flag is cleared on every exit path.
    pub async fn start_all(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            self.log("Already running.");
            return;
        }

        self.lock_logs().clear();
        self.log("Starting Quest Protocol...");

        if let Err(e) = self.run_cycle().await {
            self.log(format!("Critical Error: {e}"));
        }

        *self.lock_active() = None;
        self.running.store(false, Ordering::SeqCst);
    }

    async fn run_cycle(&self) -> Result<()> {
        let quests = catalog::fetch(&self.session).await?;
        let manager = Arc::new(QuestManager::new(
            Arc::clone(&self.session),
            quests,
            self.config.engine.clone(),
            self.sink(),
        ));
        *self.lock_active() = Some(Arc::clone(&manager));

        let valid = manager.filter_quests_valid(Utc::now());
        self.log(format!("Found {} valid quests.", valid.len()));
        if valid.is_empty() {
            self.log("No quests to do.");
            return Ok(());
        }

        Arc::clone(&manager).run_all(valid).await;
        self.log("All quests finished processing.");
        Ok(())
    }

    /// Stop the active run immediately. Pending sleeps across all runners
    /// are released before this returns; the runners themselves unwind as
    /// `start_all` settles.
    pub fn stop_all(&self) {
        let manager = self.lock_active().clone();
        match manager {
            Some(manager) => {
                manager.stop_all();
                self.log("Stopping all tasks immediately...");
            }
            None => self.log("Nothing to stop."),
        }
    }

    /// Empty the log buffer, leaving a single marker line.
    pub fn clear_logs(&self) {
        let mut logs = self.lock_logs();
        logs.clear();
        logs.append("Logs cleared.");
    }

    /// Ordered snapshot of the log buffer, oldest first.
    pub fn global_logs(&self) -> Vec<String> {
        self.lock_logs().snapshot()
    }

    /// True from `start_all` entry until its awaited run settles.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn log(&self, msg: impl Into<String>) {
        self.lock_logs().append(msg);
    }

    /// The single sink every runner line funnels through.
    fn sink(&self) -> LogSink {
        let logs = Arc::clone(&self.logs);
        Arc::new(move |line: String| {
            logs.lock().unwrap_or_else(|e| e.into_inner()).append(line);
        })
    }

    fn lock_logs(&self) -> MutexGuard<'_, LogBuffer> {
        self.logs.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<Arc<QuestManager>>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

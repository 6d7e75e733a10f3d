//! Configuration types for the quest engine.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default Discord REST base used when none is configured.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Default gateway websocket endpoint.
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg";

/// Top-level configuration for the quest engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestlineConfig {
    /// Authorization credential. A `Bot ` scheme prefix is tolerated and
    /// stripped before use; the quests API rejects the scheme form.
    pub token: String,
    /// REST base URL. Overridable for tests against a mock server.
    pub api_base: String,
    /// Gateway websocket URL.
    pub gateway_url: String,
    /// Engine pacing and sizing knobs.
    pub engine: EngineTuning,
}

impl Default for QuestlineConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_base: DEFAULT_API_BASE.to_owned(),
            gateway_url: DEFAULT_GATEWAY_URL.to_owned(),
            engine: EngineTuning::default(),
        }
    }
}

impl QuestlineConfig {
    /// Create a config for the given token with default endpoints.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Self::default()
        }
    }

    /// Override the REST base URL (useful for testing with mock servers).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Override the engine tuning.
    pub fn with_engine(mut self, engine: EngineTuning) -> Self {
        self.engine = engine;
        self
    }
}

/// Pacing knobs for the task runners and orchestrator.
///
/// The heartbeat step is the optimistic progress credited per heartbeat
/// when the server omits an echo. It is tunable; the verification pass that
/// guards completion is not.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineTuning {
    /// Seconds between heartbeats for play-style tasks.
    pub heartbeat_interval_secs: f64,
    /// Optimistic progress credited per unechoed heartbeat, in seconds.
    pub heartbeat_step: f64,
    /// Seconds between video-progress reports.
    pub video_tick_secs: f64,
    /// Simulated watch speed per report, in timestamp units.
    pub video_speed: f64,
    /// Backoff after a failed remote call, in seconds.
    pub retry_backoff_secs: f64,
    /// Upper bound on the random per-quest launch delay, in seconds.
    pub spawn_jitter_max_secs: f64,
    /// Capacity of the facade's log ring buffer.
    pub log_capacity: usize,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 30.0,
            heartbeat_step: 30.0,
            video_tick_secs: 2.0,
            video_speed: 7.0,
            retry_backoff_secs: 5.0,
            spawn_jitter_max_secs: 5.0,
            log_capacity: 500,
        }
    }
}

impl EngineTuning {
    /// Heartbeat interval as a [`Duration`].
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs_f64(self.heartbeat_interval_secs)
    }

    /// Video report interval as a [`Duration`].
    pub fn video_tick(&self) -> Duration {
        Duration::from_secs_f64(self.video_tick_secs)
    }

    /// Retry backoff as a [`Duration`].
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs_f64(self.retry_backoff_secs)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn defaults_match_engine_contract() {
        let tuning = EngineTuning::default();
        assert_eq!(tuning.heartbeat_interval_secs, 30.0);
        assert_eq!(tuning.heartbeat_step, 30.0);
        assert_eq!(tuning.video_tick_secs, 2.0);
        assert_eq!(tuning.video_speed, 7.0);
        assert_eq!(tuning.retry_backoff_secs, 5.0);
        assert_eq!(tuning.spawn_jitter_max_secs, 5.0);
        assert_eq!(tuning.log_capacity, 500);
    }

    #[test]
    fn partial_toml_style_json_fills_defaults() {
        let config: QuestlineConfig =
            serde_json::from_str(r#"{"token": "abc", "engine": {"video_speed": 9.0}}"#)
                .expect("partial config deserializes");
        assert_eq!(config.token, "abc");
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.engine.video_speed, 9.0);
        assert_eq!(config.engine.heartbeat_step, 30.0);
    }

    #[test]
    fn builder_overrides_api_base() {
        let config = QuestlineConfig::new("tok").with_api_base("http://127.0.0.1:9999");
        assert_eq!(config.api_base, "http://127.0.0.1:9999");
        assert_eq!(config.gateway_url, DEFAULT_GATEWAY_URL);
    }
}

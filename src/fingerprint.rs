//! Fixed client fingerprint for the quests API.
//!
//! The quests endpoints differentiate automated/non-browser traffic and
//! reject or rate-limit heartbeats that do not look like the desktop
//! client. Every REST request carries these headers, and the gateway
//! identify payload is rewritten through [`spoof_identify`] so the session
//! matches the same fingerprint.

use base64::Engine;
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;

/// Desktop-client user agent sent on every request and inside the
/// identify properties.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) discord/1.0.9215 Chrome/138.0.7204.251 Electron/37.6.0 Safari/537.36";

/// Marker added to the identify properties so the session registers as a
/// normal desktop launch.
pub const GATEWAY_CONNECT_REASON: &str = "AppSkeleton";

/// Identify properties describing the spoofed desktop client.
///
/// Serialized verbatim into the `x-super-properties` header and into the
/// gateway identify payload. The three id fields are generated once per
/// process so repeated identifies look like one client instance.
#[derive(Debug, Clone, Serialize)]
pub struct ClientProperties {
    pub os: String,
    pub browser: String,
    pub release_channel: String,
    pub client_version: String,
    pub os_version: String,
    pub os_arch: String,
    pub app_arch: String,
    pub system_locale: String,
    pub has_client_mods: bool,
    pub client_launch_id: String,
    pub browser_user_agent: String,
    pub browser_version: String,
    pub os_sdk_version: String,
    pub client_build_number: u64,
    pub native_build_number: u64,
    pub client_event_source: Option<String>,
    pub launch_signature: String,
    pub client_heartbeat_session_id: String,
    pub client_app_state: String,
}

impl Default for ClientProperties {
    fn default() -> Self {
        Self {
            os: "Windows".to_owned(),
            browser: "Discord Client".to_owned(),
            release_channel: "stable".to_owned(),
            client_version: "1.0.9215".to_owned(),
            os_version: "10.0.19045".to_owned(),
            os_arch: "x64".to_owned(),
            app_arch: "x64".to_owned(),
            system_locale: "en-US".to_owned(),
            has_client_mods: false,
            client_launch_id: uuid::Uuid::new_v4().to_string(),
            browser_user_agent: USER_AGENT.to_owned(),
            browser_version: "37.6.0".to_owned(),
            os_sdk_version: "19045".to_owned(),
            client_build_number: 471_091,
            native_build_number: 72_186,
            client_event_source: None,
            launch_signature: uuid::Uuid::new_v4().to_string(),
            client_heartbeat_session_id: uuid::Uuid::new_v4().to_string(),
            client_app_state: "focused".to_owned(),
        }
    }
}

impl ClientProperties {
    /// Base64-encoded JSON form, the `x-super-properties` header value.
    pub fn super_properties(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        base64::engine::general_purpose::STANDARD.encode(json)
    }
}

/// Pure transform applied to every outgoing identify-shaped payload.
///
/// Registered once at session construction and applied by the gateway send
/// path whenever the payload opcode is identify; non-identify payloads
/// pass through untouched.
pub type IdentifyTransform = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Build the default identify transform for the given properties.
///
/// Replaces the caller-agnostic identify `d` block with the fixed
/// fingerprint: the client properties plus the launch-reason marker, zeroed
/// capabilities, and an empty guild-version client state. `token`,
/// `presence` and `compress` are carried over from the original payload.
pub fn identify_transform(properties: ClientProperties) -> IdentifyTransform {
    Arc::new(move |payload| spoof_identify(payload, &properties))
}

/// Rewrite one identify payload (op 2) with the fixed fingerprint.
pub fn spoof_identify(mut payload: Value, properties: &ClientProperties) -> Value {
    if payload.get("op").and_then(Value::as_u64) != Some(2) {
        return payload;
    }

    let d = payload.get("d").cloned().unwrap_or(Value::Null);
    let mut props = serde_json::to_value(properties).unwrap_or_else(|_| json!({}));
    props["is_fast_connect"] = json!(false);
    props["gateway_connect_reasons"] = json!(GATEWAY_CONNECT_REASON);

    payload["d"] = json!({
        "token": d.get("token").cloned().unwrap_or(Value::Null),
        "properties": props,
        "capabilities": 0,
        "presence": d.get("presence").cloned().unwrap_or(Value::Null),
        "compress": d.get("compress").cloned().unwrap_or(Value::Null),
        "client_state": { "guild_versions": {} },
    });
    payload
}

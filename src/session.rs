//! Authenticated session to the quests API.
//!
//! Owns the REST handle every other component calls through, and the
//! once-per-process gateway session. All transport-level identity spoofing
//! lives here: the fingerprint headers on every REST request, and the
//! identify transform registered at construction and applied by the
//! gateway send path.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::QuestlineConfig;
use crate::error::{QuestError, Result};
use crate::fingerprint::{ClientProperties, IdentifyTransform, USER_AGENT, identify_transform};
use crate::gateway;

/// Authenticated handle to the quests REST surface plus the gateway
/// session used to make the identity plausible.
pub struct SessionProvider {
    http: reqwest::Client,
    api_base: String,
    gateway_url: String,
    token: String,
    identify: IdentifyTransform,
    connected: AtomicBool,
}

impl SessionProvider {
    /// Build a session from config. The credential is normalized to a bare
    /// token and the fingerprint headers are installed as defaults so every
    /// request carries them.
    pub fn new(config: &QuestlineConfig) -> Result<Arc<Self>> {
        let token = normalize_token(&config.token);
        let properties = ClientProperties::default();
        let headers = fingerprint_headers(&token, &properties)?;

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| QuestError::Transport(format!("cannot build http client: {e}")))?;

        Ok(Arc::new(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            gateway_url: config.gateway_url.clone(),
            token,
            identify: identify_transform(properties),
            connected: AtomicBool::new(false),
        }))
    }

    /// Establish the gateway session.
    ///
    /// Safe to call more than once; only the first successful call opens a
    /// connection. Failure is a [`QuestError::Transport`] the caller logs —
    /// runners operate purely over REST and do not depend on it.
    pub async fn connect(&self) -> Result<()> {
        if self.connected.load(Ordering::SeqCst) {
            return Ok(());
        }

        gateway::open(&self.gateway_url, &self.token, self.identify.clone())
            .await
            .map_err(|e| QuestError::Transport(e.to_string()))?;

        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Issue an authenticated GET and decode the JSON response.
    pub async fn get(&self, path: &str) -> Result<Value> {
        let response = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| QuestError::RemoteCall(format!("GET {path}: {e}")))?;
        decode_response(path, response).await
    }

    /// Issue an authenticated POST with a JSON body and decode the response.
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| QuestError::RemoteCall(format!("POST {path}: {e}")))?;
        decode_response(path, response).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }
}

/// Strip the scheme prefix from a credential; the quests API rejects the
/// scheme form.
fn normalize_token(raw: &str) -> String {
    let token = raw.trim();
    token.strip_prefix("Bot ").unwrap_or(token).to_owned()
}

/// The fixed browser/client fingerprint attached to every REST request.
fn fingerprint_headers(token: &str, properties: &ClientProperties) -> Result<HeaderMap> {
    let pairs = [
        ("authorization", token.to_owned()),
        ("user-agent", USER_AGENT.to_owned()),
        ("accept-language", "en-US".to_owned()),
        ("origin", "https://discord.com".to_owned()),
        ("pragma", "no-cache".to_owned()),
        ("priority", "u=1, i".to_owned()),
        ("referer", "https://discord.com/channels/@me".to_owned()),
        (
            "sec-ch-ua",
            "\"Not)A;Brand\";v=\"8\", \"Chromium\";v=\"138\"".to_owned(),
        ),
        ("sec-ch-ua-mobile", "?0".to_owned()),
        ("sec-ch-ua-platform", "\"Windows\"".to_owned()),
        ("sec-fetch-dest", "empty".to_owned()),
        ("sec-fetch-mode", "cors".to_owned()),
        ("sec-fetch-site", "same-origin".to_owned()),
        ("x-debug-options", "bugReporterEnabled".to_owned()),
        ("x-discord-locale", "en-US".to_owned()),
        ("x-discord-timezone", "Asia/Kolkata".to_owned()),
        ("x-super-properties", properties.super_properties()),
    ];

    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        let name = HeaderName::from_static(name);
        let value = HeaderValue::from_str(&value)
            .map_err(|e| QuestError::Transport(format!("invalid {name} header: {e}")))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

async fn decode_response(path: &str, response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(QuestError::RemoteCall(format!("{path} ({status}): {body}")));
    }
    if response.content_length() == Some(0) {
        return Ok(Value::Null);
    }
    response
        .json()
        .await
        .map_err(|e| QuestError::RemoteCall(format!("{path}: malformed response: {e}")))
}

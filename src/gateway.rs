//! Gateway websocket session.
//!
//! The engine completes quests purely over REST, but heartbeats are only
//! accepted for an identity with a plausible live session. This module
//! opens that session: hello, identify (rewritten through the registered
//! transform), then a background keepalive loop. Dispatch events are
//! ignored.

use anyhow::{anyhow, bail};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::fingerprint::IdentifyTransform;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Static session metadata.
///
/// The automation never needs more than a single logical connection, so
/// shard count and concurrency limits are fixed rather than fetched from
/// `GET /gateway/bot`.
pub fn session_metadata(gateway_url: &str) -> Value {
    json!({
        "url": gateway_url,
        "shards": 1,
        "session_start_limit": {
            "total": 1000,
            "remaining": 1000,
            "reset_after": 14_400_000,
            "max_concurrency": 1,
        },
    })
}

/// Open the gateway session and leave a keepalive task running.
///
/// Returns once identify has been sent. The identify payload starts from a
/// caller-agnostic shape; `identify` rewrites it (and any later
/// identify-shaped payload) in the send path.
pub(crate) async fn open(
    gateway_url: &str,
    token: &str,
    identify: IdentifyTransform,
) -> anyhow::Result<()> {
    let metadata = session_metadata(gateway_url);
    let base = metadata["url"]
        .as_str()
        .ok_or_else(|| anyhow!("gateway url missing"))?;
    let mut ws_url = url::Url::parse(base)?;
    ws_url.set_query(Some("v=10&encoding=json"));

    let (stream, _) = tokio_tungstenite::connect_async(ws_url.as_str()).await?;
    let (mut write, mut read) = stream.split();

    let hello = read
        .next()
        .await
        .ok_or_else(|| anyhow!("no hello from gateway"))??;
    let hello_text = match hello {
        Message::Text(text) => text.to_string(),
        _ => bail!("unexpected gateway hello payload"),
    };
    let hello_json: Value = serde_json::from_str(&hello_text)?;
    let heartbeat_interval_ms = hello_json
        .get("d")
        .and_then(|v| v.get("heartbeat_interval"))
        .and_then(Value::as_u64)
        .unwrap_or(41_250);

    let identify_payload = json!({
        "op": 2,
        "d": {
            "token": token,
            "intents": 0,
            "compress": false,
            "presence": Value::Null,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "questline",
                "device": "questline",
            },
        },
    });
    send_payload(&mut write, &identify, identify_payload).await?;

    tokio::spawn(keepalive(write, read, identify, heartbeat_interval_ms));
    Ok(())
}

/// Background keepalive: send heartbeats on the advertised interval, drain
/// dispatch events, exit quietly when the peer closes.
async fn keepalive(
    mut write: WsSink,
    mut read: WsSource,
    identify: IdentifyTransform,
    heartbeat_interval_ms: u64,
) {
    let mut interval =
        tokio::time::interval(std::time::Duration::from_millis(heartbeat_interval_ms));
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let heartbeat = json!({ "op": 1, "d": Value::Null });
                if send_payload(&mut write, &identify, heartbeat).await.is_err() {
                    tracing::debug!("gateway heartbeat failed, session closed");
                    break;
                }
            }
            maybe_msg = read.next() => {
                match maybe_msg {
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!("gateway connection closed");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        tracing::warn!("gateway websocket error: {err}");
                        break;
                    }
                }
            }
        }
    }
}

/// Single choke point for outbound payloads; the identify transform runs
/// here so no identify-shaped payload can bypass it.
async fn send_payload(
    write: &mut WsSink,
    identify: &IdentifyTransform,
    payload: Value,
) -> anyhow::Result<()> {
    let payload = identify(payload);
    write.send(Message::Text(payload.to_string())).await?;
    Ok(())
}

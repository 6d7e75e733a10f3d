//! Quest Engine Contract Tests
//!
//! Exercise the full engine (facade → orchestrator → runners) against a
//! mock quests API: heartbeat cadence, verification correction, video
//! progress sequence, enrollment wire format, and fingerprint headers.

use questline::fingerprint::USER_AGENT;
use questline::{EngineTuning, QuestService, QuestlineConfig};
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Millisecond-scale pacing so contract tests finish quickly. The step and
/// speed stay at production values — the cadence under test depends on them.
fn fast_tuning() -> EngineTuning {
    EngineTuning {
        heartbeat_interval_secs: 0.01,
        heartbeat_step: 30.0,
        video_tick_secs: 0.005,
        video_speed: 7.0,
        retry_backoff_secs: 0.01,
        spawn_jitter_max_secs: 0.0,
        log_capacity: 500,
    }
}

fn service_for(server: &MockServer, token: &str) -> QuestService {
    let config = QuestlineConfig::new(token)
        .with_api_base(server.uri())
        .with_engine(fast_tuning());
    QuestService::new(config).expect("service builds")
}

fn play_quest(id: &str, target: f64, progress: Option<f64>) -> Value {
    let mut quest = json!({
        "id": id,
        "config": {
            "expires_at": "2099-01-01T00:00:00Z",
            "task_config": { "tasks": { "PLAY_ON_DESKTOP": { "target": target } } },
            "messages": { "quest_name": format!("Play {id}") },
            "application": { "id": format!("app-{id}"), "name": format!("Game {id}") }
        }
    });
    if let Some(value) = progress {
        quest["user_status"] = json!({
            "enrolled_at": "2025-01-01T00:00:00Z",
            "progress": { "PLAY_ON_DESKTOP": { "value": value } }
        });
    }
    quest
}

fn video_quest(id: &str, target: f64, enrolled: bool) -> Value {
    let mut quest = json!({
        "id": id,
        "config": {
            "expires_at": "2099-01-01T00:00:00Z",
            "task_config": { "tasks": { "WATCH_VIDEO": { "target": target } } },
            "messages": { "quest_name": format!("Watch {id}") },
            "application": { "id": format!("app-{id}"), "name": format!("Video {id}") }
        }
    });
    if enrolled {
        quest["user_status"] = json!({ "enrolled_at": "2025-01-01T00:00:00Z" });
    }
    quest
}

fn catalog_body(quests: Vec<Value>) -> Value {
    json!({ "quests": quests })
}

async fn mount_catalog_once(server: &MockServer, body: Value, priority: u8) {
    Mock::given(method("GET"))
        .and(path("/quests/@me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .up_to_n_times(1)
        .with_priority(priority)
        .mount(server)
        .await;
}

// ────────────────────────────────────────────────────────────────────────────
// Heartbeat cadence
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn play_runner_sends_four_heartbeats_before_terminal() {
    let server = MockServer::start().await;

    // Initial catalog: progress 0. Verification fetch: authoritative 120.
    mount_catalog_once(
        &server,
        catalog_body(vec![play_quest("q1", 120.0, Some(0.0))]),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/quests/@me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(catalog_body(vec![play_quest(
            "q1",
            120.0,
            Some(120.0),
        )])))
        .with_priority(5)
        .expect(1)
        .mount(&server)
        .await;

    // The server never echoes progress on heartbeats: 0→30→60→90→120.
    Mock::given(method("POST"))
        .and(path("/quests/q1/heartbeat"))
        .and(body_partial_json(json!({
            "application_id": "app-q1",
            "terminal": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(4)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/quests/q1/heartbeat"))
        .and(body_partial_json(json!({ "terminal": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user_status": {
                "enrolled_at": "2025-01-01T00:00:00Z",
                "completed_at": "2025-01-01T01:00:00Z"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(&server, "user-token");
    service.start_all().await;

    let logs = service.global_logs();
    assert!(logs.iter().any(|l| l.contains("Heartbeat... Progress: 0/120s")));
    assert!(logs.iter().any(|l| l.contains("Target reached locally. Verifying...")));
    assert!(logs.iter().any(|l| l.contains("COMPLETED!")));
    assert!(!service.is_running());
}

#[tokio::test]
async fn play_runner_corrects_to_authoritative_progress_before_terminal() {
    let server = MockServer::start().await;

    // Catalog sequence: initial 0, first verification 90, second 120.
    mount_catalog_once(
        &server,
        catalog_body(vec![play_quest("q1", 120.0, Some(0.0))]),
        1,
    )
    .await;
    mount_catalog_once(
        &server,
        catalog_body(vec![play_quest("q1", 120.0, Some(90.0))]),
        2,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/quests/@me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(catalog_body(vec![play_quest(
            "q1",
            120.0,
            Some(120.0),
        )])))
        .with_priority(5)
        .expect(1)
        .mount(&server)
        .await;

    // Four unechoed heartbeats reach 120 locally; the 90-correction forces
    // one more before the second verification allows the terminal call.
    Mock::given(method("POST"))
        .and(path("/quests/q1/heartbeat"))
        .and(body_partial_json(json!({ "terminal": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(5)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/quests/q1/heartbeat"))
        .and(body_partial_json(json!({ "terminal": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user_status": { "completed_at": "2025-01-01T01:00:00Z" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(&server, "user-token");
    service.start_all().await;

    let logs = service.global_logs();
    assert!(
        logs.iter()
            .any(|l| l.contains("Correction: Real progress is 90/120s. Continuing...")),
        "expected correction line, got: {logs:?}"
    );
    assert!(logs.iter().any(|l| l.contains("COMPLETED!")));
}

// ────────────────────────────────────────────────────────────────────────────
// Video progress sequence
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn video_runner_walks_to_target_and_pins_final_report() {
    let server = MockServer::start().await;

    mount_catalog_once(&server, catalog_body(vec![video_quest("q2", 50.0, true)]), 1).await;

    // The final report is pinned exactly at the target; only it completes.
    Mock::given(method("POST"))
        .and(path("/quests/q2/video-progress"))
        .and(body_partial_json(json!({ "timestamp": 50.0 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "completed_at": "2025-01-01T01:00:00Z",
            "user_status": { "completed_at": "2025-01-01T01:00:00Z" }
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/quests/q2/video-progress"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .with_priority(5)
        .mount(&server)
        .await;

    let service = service_for(&server, "user-token");
    service.start_all().await;

    let logs = service.global_logs();
    assert!(logs.iter().any(|l| l.contains("Task: WATCH_VIDEO")));
    assert!(logs.iter().any(|l| l.contains("COMPLETED!")));

    // Reported watch positions: 7,14,21,28,35,42,49,50 (jittered), then 50.
    let requests = server.received_requests().await.expect("requests recorded");
    let timestamps: Vec<f64> = requests
        .iter()
        .filter(|r| r.url.path() == "/quests/q2/video-progress")
        .map(|r| {
            let body: Value = serde_json::from_slice(&r.body).expect("json body");
            body["timestamp"].as_f64().expect("timestamp")
        })
        .collect();

    let floors: Vec<f64> = timestamps.iter().map(|t| t.floor()).collect();
    assert_eq!(
        floors,
        [7.0, 14.0, 21.0, 28.0, 35.0, 42.0, 49.0, 50.0, 50.0],
        "timestamps were: {timestamps:?}"
    );
    let last = timestamps.last().expect("at least one report");
    assert_eq!(*last, 50.0, "final report must be pinned at the target");
}

// ────────────────────────────────────────────────────────────────────────────
// Enrollment and fingerprint
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn enroll_uses_desktop_wire_format_and_bare_token() {
    let server = MockServer::start().await;

    mount_catalog_once(&server, catalog_body(vec![video_quest("q3", 7.0, false)]), 1).await;

    // The `Bot ` scheme prefix must be stripped; the fingerprint headers
    // must ride on every call.
    Mock::given(method("POST"))
        .and(path("/quests/q3/enroll"))
        .and(header("authorization", "secret-token"))
        .and(header("user-agent", USER_AGENT))
        .and(header("x-discord-locale", "en-US"))
        .and(header_exists("x-super-properties"))
        .and(body_partial_json(json!({
            "location": 11,
            "is_targeted": false,
            "metadata_raw": null
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "enrolled_at": "2025-01-01T00:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/quests/q3/video-progress"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "completed_at": "2025-01-01T01:00:00Z"
        })))
        .mount(&server)
        .await;

    let service = service_for(&server, "Bot secret-token");
    service.start_all().await;

    let logs = service.global_logs();
    assert!(logs.iter().any(|l| l.contains("Enrolling...")));
    assert!(logs.iter().any(|l| l.contains("COMPLETED!")));
}

// ────────────────────────────────────────────────────────────────────────────
// Unsupported task kinds
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unsupported_task_is_skipped_without_network_calls() {
    let server = MockServer::start().await;

    let quest = json!({
        "id": "q4",
        "config": {
            "expires_at": "2099-01-01T00:00:00Z",
            "task_config": { "tasks": { "STREAM_ON_DESKTOP": { "target": 60.0 } } },
            "application": { "id": "app-q4", "name": "Streamer" }
        },
        "user_status": { "enrolled_at": "2025-01-01T00:00:00Z" }
    });
    mount_catalog_once(&server, catalog_body(vec![quest]), 1).await;

    let service = service_for(&server, "user-token");
    service.start_all().await;

    let logs = service.global_logs();
    let unsupported = logs
        .iter()
        .filter(|l| l.contains("Unsupported Task Type."))
        .count();
    assert_eq!(unsupported, 1);

    // Nothing beyond the single catalog fetch hit the wire.
    let requests = server.received_requests().await.expect("requests recorded");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url.path(), "/quests/@me");
}

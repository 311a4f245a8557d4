//! Integration tests for the HTTP surface.
//!
//! The router runs against a temp data directory and a scripted device
//! transport, so no real receivers are contacted.

use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use av_controls::api::{build_router, AppState};
use av_controls::control::ControlService;
use av_controls::device::{DeviceError, DeviceRequest, DeviceTransport};
use av_controls::logging::LogGate;
use av_controls::store::{ConfigSnapshot, ConfigStore, LogLevel, Receiver, SnapshotHandle};

#[derive(Default)]
struct ScriptedTransport {
    replies: Mutex<HashMap<String, Result<String, DeviceError>>>,
    sent: Mutex<Vec<DeviceRequest>>,
}

impl ScriptedTransport {
    fn reply(&self, endpoint: &str, reply: Result<String, DeviceError>) {
        self.replies.lock().unwrap().insert(endpoint.to_string(), reply);
    }

    fn sent(&self) -> Vec<DeviceRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeviceTransport for ScriptedTransport {
    async fn send(&self, request: DeviceRequest) -> Result<String, DeviceError> {
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get(&request.endpoint)
            .cloned()
            .unwrap_or_else(|| Err(DeviceError::transport("Connection refused")));
        self.sent.lock().unwrap().push(request);
        reply
    }
}

struct TestApp {
    router: axum::Router,
    transport: Arc<ScriptedTransport>,
    store: ConfigStore,
    snapshot: SnapshotHandle,
    _dir: TempDir,
}

fn create_test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("payloads.txt"), "power=AABBCC\n\nguide = DDEEFF\n").unwrap();
    fs::write(dir.path().join("transmitters.txt"), "Bar Cable,http://192.168.8.201\n").unwrap();

    let mut initial = ConfigSnapshot::default();
    initial.receivers.insert(
        "Lobby".to_string(),
        Receiver {
            ip: "10.0.0.5".parse().unwrap(),
            show_power: false,
        },
    );
    initial.transmitters.insert("Apple TV".to_string(), 7);

    let store = ConfigStore::new(dir.path().join("config.toml"));
    store.ensure_initialized().unwrap();
    store.commit(&initial).unwrap();

    let transport = Arc::new(ScriptedTransport::default());
    let snapshot = SnapshotHandle::new(store.load().unwrap());
    let control = ControlService::new(
        transport.clone(),
        snapshot.clone(),
        dir.path().join("payloads.txt"),
        dir.path().join("transmitters.txt"),
    );
    let state = AppState::new(control, store.clone(), snapshot.clone(), LogGate::new(LogLevel::Error));

    TestApp {
        router: build_router(state),
        transport,
        store,
        snapshot,
        _dir: dir,
    }
}

fn post_form(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

#[tokio::test]
async fn test_api_rejects_other_methods() {
    let app = create_test_app();

    let response = app.router.oneshot(get("/api")).await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body_json(response).await["error"], "Invalid request method");
}

#[tokio::test]
async fn test_api_requires_parameters() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(post_form("/api", "device_url=http%3A%2F%2F192.168.8.201"))
        .await
        .unwrap();

    assert_eq!(body_json(response).await["error"], "Missing required parameters");
    assert!(app.transport.sent().is_empty());
}

#[tokio::test]
async fn test_api_unknown_action() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(post_form("/api", "device_url=192.168.8.201&action=eject"))
        .await
        .unwrap();

    assert_eq!(body_json(response).await["error"], "Invalid action");
    assert!(app.transport.sent().is_empty());
}

#[tokio::test]
async fn test_api_relays_ir_code() {
    let app = create_test_app();
    app.transport
        .reply("command/cli", Ok(r#"{"data":"OK"}"#.to_string()));

    let response = app
        .router
        .oneshot(post_form(
            "/api",
            "device_url=http%3A%2F%2F192.168.8.201%2F&action=power",
        ))
        .await
        .unwrap();

    assert_eq!(body_json(response).await["success"], true);
    let sent = app.transport.sent();
    assert_eq!(sent[0].url(), "http://192.168.8.201/cgi-bin/api/command/cli");
    assert_eq!(
        sent[0].body.as_deref(),
        Some(r#"echo "AABBCC" | ./fluxhandlerV2.sh"#)
    );
}

#[tokio::test]
async fn test_api_reports_http_status() {
    let app = create_test_app();
    app.transport.reply(
        "command/cli",
        Err(DeviceError::Http {
            status: 500,
            body: "boom".to_string(),
        }),
    );

    let response = app
        .router
        .oneshot(post_form("/api", "device_url=192.168.8.201&action=guide"))
        .await
        .unwrap();

    assert_eq!(body_json(response).await["error"], "HTTP Error 500");
}

#[tokio::test]
async fn test_power_refused_without_power_control() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(post_form("/", "receiver_ip=10.0.0.5&power_command=cec_tv_on.sh"))
        .await
        .unwrap();

    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "Power control not enabled for this receiver.");
    assert!(app.transport.sent().is_empty());
}

#[tokio::test]
async fn test_unrecognized_command_form() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(post_form("/", "foo=bar"))
        .await
        .unwrap();

    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "Invalid request.");
}

#[tokio::test]
async fn test_control_page_shows_banner_when_nothing_answers() {
    let app = create_test_app();

    let response = app.router.oneshot(get("/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Unable to connect to any receivers."));
    assert!(html.contains("Bar Cable"));
}

#[tokio::test]
async fn test_control_page_renders_reachable_receiver() {
    let app = create_test_app();
    app.transport
        .reply("details/channel", Ok(r#"{"data":"7"}"#.to_string()));
    app.transport
        .reply("details/device/model", Ok(r#"{"data":"3G RX"}"#.to_string()));

    let html = body_text(app.router.oneshot(get("/")).await.unwrap()).await;

    assert!(!html.contains("global-error"));
    assert!(html.contains("<option value=\"7\" selected>Apple TV</option>"));
    assert!(!html.contains("type=\"range\""));
}

#[tokio::test]
async fn test_invalid_global_settings_leave_config_untouched() {
    let app = create_test_app();
    let before = fs::read(app.store.path()).unwrap();

    let response = app
        .router
        .oneshot(post_form(
            "/settings",
            "section=global&max_volume=10&min_volume=20&volume_step=1&api_timeout=5&home_url=http%3A%2F%2Flocalhost&log_level=error",
        ))
        .await
        .unwrap();

    let html = body_text(response).await;
    assert!(html.contains("Minimum volume must be less than maximum volume"));
    assert_eq!(fs::read(app.store.path()).unwrap(), before);
    assert_eq!(app.snapshot.current().await.global.max_volume, 11);
}

#[tokio::test]
async fn test_receiver_settings_are_committed() {
    let app = create_test_app();

    let response = app
        .router
        .clone()
        .oneshot(post_form(
            "/settings",
            "section=receivers&receiver_name%5B0%5D=Lobby&receiver_ip%5B0%5D=10.0.0.5\
             &receiver_name%5B1%5D=Bar+TV+1&receiver_ip%5B1%5D=10.0.0.6&receiver_power%5B1%5D=1",
        ))
        .await
        .unwrap();
    assert!(body_text(response).await.contains("Configuration updated successfully"));

    let current = app.snapshot.current().await;
    assert_eq!(current.receivers.len(), 2);
    assert!(current.receivers["Bar TV 1"].show_power);
    assert_eq!(current.transmitters["Apple TV"], 7);
    assert_eq!(app.store.load().unwrap(), *current);

    let status = body_json(app.router.oneshot(get("/status")).await.unwrap()).await;
    assert_eq!(status["receivers"], 2);
    assert_eq!(status["service"], "av-controls");
}

#[tokio::test]
async fn test_restore_rejects_path_traversal() {
    let app = create_test_app();
    let before = fs::read(app.store.path()).unwrap();

    let response = app
        .router
        .oneshot(post_form(
            "/settings/restore",
            "backup_file=..%2F..%2Fetc%2Fpasswd",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Invalid backup file selected"));
    assert_eq!(fs::read(app.store.path()).unwrap(), before);
}

#[tokio::test]
async fn test_restore_redirects_and_reloads() {
    let app = create_test_app();
    let backup = app.store.list_backups().unwrap().remove(0);

    let response = app
        .router
        .clone()
        .oneshot(post_form(
            "/settings/restore",
            &format!("backup_file={}", backup.name),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION],
        "/settings?restored=1"
    );
    // The backup predates the initial commit, so it holds the defaults
    assert!(app.snapshot.current().await.receivers.is_empty());

    let html = body_text(app.router.oneshot(get("/settings?restored=1")).await.unwrap()).await;
    assert!(html.contains("Configuration restored successfully"));
}

#[tokio::test]
async fn test_embedded_assets() {
    let app = create_test_app();

    let response = app
        .router
        .clone()
        .oneshot(get("/assets/styles.css"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/css"));

    let missing = app.router.oneshot(get("/assets/nope.js")).await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

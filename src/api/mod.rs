//! HTTP API handlers

use axum::{
    extract::{rejection::FormRejection, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::control::{CommandReply, CommandRequest, ControlService};
use crate::device::DeviceError;
use crate::logging::LogGate;
use crate::store::{ConfigSnapshot, ConfigStore, SettingsForm, SnapshotHandle};
use crate::ui::assets::serve_asset;
use crate::ui::pages::{render_index, render_settings, IndexView, SettingsView};
use crate::ui::Flash;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub control: ControlService,
    pub store: Arc<ConfigStore>,
    pub snapshot: SnapshotHandle,
    pub log_gate: LogGate,
    pub started: Instant,
}

impl AppState {
    pub fn new(control: ControlService, store: ConfigStore, snapshot: SnapshotHandle, log_gate: LogGate) -> Self {
        Self {
            control,
            store: Arc::new(store),
            snapshot,
            log_gate,
            started: Instant::now(),
        }
    }

    /// Swap in a freshly committed snapshot and apply its log level
    async fn install(&self, snapshot: ConfigSnapshot) {
        self.log_gate.set(snapshot.global.log_level);
        self.snapshot.replace(snapshot).await;
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler).post(command_handler))
        .route("/api", post(ir_relay_handler).fallback(invalid_method_handler))
        .route("/settings", get(settings_handler).post(save_settings_handler))
        .route("/settings/restore", post(restore_handler))
        .route("/status", get(status_handler))
        .route("/assets/{*path}", get(serve_asset))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// General status response
#[derive(Serialize)]
pub struct StatusResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub receivers: usize,
    pub transmitters: usize,
}

/// GET /status - Service health check
pub async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let snapshot = state.snapshot.current().await;
    Json(StatusResponse {
        service: "av-controls",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started.elapsed().as_secs(),
        receivers: snapshot.receivers.len(),
        transmitters: snapshot.transmitters.len(),
    })
}

/// GET / - Control page with live receiver state
pub async fn index_handler(State(state): State<AppState>) -> Html<String> {
    let snapshot = state.snapshot.current().await;

    let any_reachable =
        snapshot.receivers.is_empty() || state.control.any_receiver_reachable(&snapshot).await;
    let cards = if any_reachable {
        state.control.receiver_cards(&snapshot).await
    } else {
        error!("No receivers reachable");
        Vec::new()
    };
    let targets = state.control.remote_targets();

    Html(render_index(&IndexView {
        snapshot: &snapshot,
        any_reachable,
        cards: &cards,
        targets: &targets,
    }))
}

/// POST / - Power, channel/volume or remote command from the control page
pub async fn command_handler(
    State(state): State<AppState>,
    form: Result<Form<HashMap<String, String>>, FormRejection>,
) -> Json<CommandReply> {
    let request = match form {
        Ok(Form(fields)) => CommandRequest::from_form(&fields),
        Err(e) => {
            warn!("Unreadable command form: {}", e);
            None
        }
    };
    match request {
        Some(request) => Json(state.control.handle(request).await),
        None => Json(CommandReply::invalid_request()),
    }
}

/// POST /api - Replay an IR action on a transmitter
pub async fn ir_relay_handler(
    State(state): State<AppState>,
    form: Result<Form<HashMap<String, String>>, FormRejection>,
) -> Json<serde_json::Value> {
    let fields = form.map(|Form(fields)| fields).unwrap_or_default();
    let (Some(device_url), Some(action)) = (fields.get("device_url"), fields.get("action")) else {
        return Json(json!({ "error": "Missing required parameters" }));
    };

    match state.control.relay_ir(device_url, action).await {
        Ok(()) => Json(json!({ "success": true })),
        Err(DeviceError::UnknownAction { .. }) => Json(json!({ "error": "Invalid action" })),
        Err(DeviceError::Http { status, .. }) => Json(json!({ "error": format!("HTTP Error {status}") })),
        Err(DeviceError::Transport { message }) => Json(json!({ "error": message })),
        Err(e) => Json(json!({ "error": e.to_string() })),
    }
}

/// Any other method on /api
pub async fn invalid_method_handler() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "Invalid request method" })),
    )
        .into_response()
}

async fn settings_page(state: &AppState, flash: Option<Flash>) -> Html<String> {
    let snapshot = state.snapshot.current().await;
    let backups = state.store.list_backups().unwrap_or_else(|e| {
        error!("Failed to list configuration backups: {}", e);
        Vec::new()
    });
    let writable = state.store.writable().map_err(|e| e.to_string());

    Html(render_settings(&SettingsView {
        snapshot: &snapshot,
        backups: &backups,
        writable,
        flash,
    }))
}

/// GET /settings
pub async fn settings_handler(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Html<String> {
    let flash = query
        .contains_key("restored")
        .then(|| Flash::success("Configuration restored successfully"));
    settings_page(&state, flash).await
}

/// POST /settings - Validate and commit a settings section
pub async fn save_settings_handler(
    State(state): State<AppState>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Html<String> {
    let form = SettingsForm::from_pairs(fields);
    let current = state.snapshot.current().await;

    let flash = match state.store.apply_form(&form, &current) {
        Ok(committed) => {
            state.install(committed).await;
            info!("Configuration updated from settings page");
            Flash::success("Configuration updated successfully")
        }
        Err(e) => {
            error!("Error updating configuration: {}", e);
            Flash::error(format!("Error updating configuration: {e}"))
        }
    };
    settings_page(&state, Some(flash)).await
}

/// POST /settings/restore - Restore a named backup
pub async fn restore_handler(
    State(state): State<AppState>,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    let name = fields.get("backup_file").map(String::as_str).unwrap_or("");

    match state.store.restore(name) {
        Ok(restored) => {
            state.install(restored).await;
            info!(backup = name, "Configuration restored");
            Redirect::to("/settings?restored=1").into_response()
        }
        Err(e) => {
            error!(backup = name, "Error restoring backup: {}", e);
            settings_page(&state, Some(Flash::error(format!("Error restoring backup: {e}"))))
                .await
                .into_response()
        }
    }
}

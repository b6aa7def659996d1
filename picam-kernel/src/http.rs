/**
 * API REST PICAM - Serveur HTTP du kernel
 *
 * RÔLE :
 * Expose l'état de la flotte, les snapshots et les actions de contrôle en JSON.
 * Le rendu HTML est hors périmètre : un front consomme ces routes.
 *
 * ROUTES :
 * - GET  /health                      -> "ok"
 * - GET  /system/health               -> santé du kernel
 * - GET  /api/cameras                 -> liste des caméras
 * - GET  /api/{id}/status             -> état d'une caméra
 * - GET  /api/{id}/snapshot           -> image (cache 10s, stale si le Pi ne répond pas)
 * - GET  /api/{id}/unit               -> `systemctl is-active` du service
 * - POST /api/{id}/action/{action}    -> start|stop|restart|enable-mode|disable-mode
 *
 * ERREURS : 404 caméra inconnue, 400 action invalide, 500 action échouée,
 * 503 aucun snapshot disponible.
 */

use axum::{extract::{Path, State}, routing::{get, post}, Json, Router};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use crate::engine::{EngineError, FleetEngine};
use crate::health::{HealthTracker, KernelHealth};
use crate::models::{format_uptime, CameraStatus, DeviceState, HostInfo};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

#[derive(serde::Serialize)]
pub struct DeviceView {
    id: String,
    name: String,
    stream_url: String,
    service_reachable: bool,
    service_status: Option<CameraStatus>,
    uptime: Option<String>,         // "3h 4m"
    service_error: Option<String>,
    host_reachable: bool,
    host_info: Option<HostInfo>,
    host_error: Option<String>,
    last_checked: Option<String>,   // format RFC3339 pour l'API
    stale: bool,                    // pas de cycle complet depuis 3 intervalles
    snapshot_fetched: Option<String>,
    last_action_error: Option<String>,
}

fn rfc3339(t: Option<OffsetDateTime>) -> Option<String> {
    t.and_then(|t| t.format(&Rfc3339).ok())
}

fn to_view(engine: &FleetEngine, st: &DeviceState) -> DeviceView {
    let (name, stream_url) = match engine.device_config(&st.id) {
        Ok(cfg) => (cfg.name.clone(), cfg.stream_url.clone()),
        Err(_) => (st.id.clone(), String::new()),
    };
    let stale_after = engine.poll_interval() * 3;
    let stale = match st.last_checked {
        Some(at) => OffsetDateTime::now_utc() - at > stale_after,
        None => true,
    };

    DeviceView {
        id: st.id.clone(),
        name,
        stream_url,
        service_reachable: st.service_reachable,
        uptime: st.service_status.as_ref().map(|s| format_uptime(s.uptime_seconds)),
        service_status: st.service_status.clone(),
        service_error: st.service_error.clone(),
        host_reachable: st.host_reachable,
        host_info: st.host_info.clone(),
        host_error: st.host_error.clone(),
        last_checked: rfc3339(st.last_checked),
        stale,
        snapshot_fetched: rfc3339(st.snapshot_fetched),
        last_action_error: st.last_action_error.clone(),
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let code = match &self {
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::InvalidAction(_) => StatusCode::BAD_REQUEST,
            EngineError::ActionFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            EngineError::SnapshotUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = match &self {
            EngineError::ActionFailed { state, .. } => {
                serde_json::json!({ "error": self.to_string(), "state": state })
            }
            _ => serde_json::json!({ "error": self.to_string() }),
        };
        (code, Json(body)).into_response()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub engine: FleetEngine,
    pub health_tracker: HealthTracker,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/api/cameras", get(get_cameras))
        .route("/api/{id}/status", get(get_camera))
        .route("/api/{id}/snapshot", get(get_snapshot))
        .route("/api/{id}/unit", get(get_unit))
        .route("/api/{id}/action/{action}", post(perform_action))
        .with_state(app_state)
}

// GET /system/health
async fn get_system_health(State(app): State<AppState>) -> Json<KernelHealth> {
    Json(app.health_tracker.get_health(&app.engine))
}

// GET /api/cameras
async fn get_cameras(State(app): State<AppState>) -> Json<Vec<DeviceView>> {
    let list = app.engine.list_devices().iter().map(|st| to_view(&app.engine, st)).collect();
    Json(list)
}

// GET /api/{id}/status
async fn get_camera(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeviceView>, EngineError> {
    let st = app.engine.get_device(&id)?;
    Ok(Json(to_view(&app.engine, &st)))
}

// GET /api/{id}/snapshot (proxy : évite les soucis SSL/CORS du navigateur avec les certifs du Pi)
async fn get_snapshot(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, EngineError> {
    let entry = app.engine.get_snapshot(&id).await?;
    let headers = [
        (header::CONTENT_TYPE, entry.content_type.clone()),
        (header::CACHE_CONTROL, "no-cache".to_string()),
    ];
    Ok((headers, entry.data.clone()).into_response())
}

// GET /api/{id}/unit
async fn get_unit(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, EngineError> {
    let unit = app.engine.unit_status(&id).await?;
    Ok(Json(serde_json::json!({ "id": id, "unit": unit })))
}

// POST /api/{id}/action/{action}
async fn perform_action(
    State(app): State<AppState>,
    Path((id, action)): Path<(String, String)>,
) -> Result<Json<DeviceView>, EngineError> {
    let st = app.engine.perform_action(&id, &action).await?;
    Ok(Json(to_view(&app.engine, &st)))
}

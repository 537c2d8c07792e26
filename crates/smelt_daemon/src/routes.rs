use crate::state::{AppState, QuantumEnvelope};
use axum::{
    extract::State,
    http::{Method, StatusCode},
    response::{
        sse::{Event, Sse},
        Json,
    },
    routing::{get, post},
    Router,
};
use std::convert::Infallible;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[cfg(test)]
pub fn make_router(state: AppState) -> Router {
    make_router_with_cors(state, "http://localhost:5173")
}

pub fn make_router_with_cors(state: AppState, cors_origin: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);
    let cors = match cors_origin.parse::<axum::http::HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin),
        Err(err) => {
            tracing::warn!(cors_origin, "invalid CORS origin, allowing any: {err}");
            cors.allow_origin(Any)
        }
    };

    Router::new()
        .route("/api/v1/status", get(status_handler))
        .route("/api/v1/stations", get(stations_handler))
        .route("/api/v1/config", get(config_handler))
        .route("/api/v1/stream", get(stream_handler))
        .route("/api/v1/save", post(save_handler))
        .route("/api/v1/pause", post(pause_handler))
        .route("/api/v1/resume", post(resume_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn status_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    let daemon = app_state.daemon.lock();
    let paused = app_state.paused.load(Ordering::Relaxed);
    Json(serde_json::json!({
        "scheduler": daemon.scheduler.status(),
        "last_quantum": daemon.last_report,
        "quanta": daemon.quanta,
        "clock": daemon.clock,
        "stations": daemon.world.station_count(),
        "paused": paused,
    }))
}

pub async fn stations_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    let daemon = app_state.daemon.lock();
    let tracking = daemon.scheduler.tracking();
    let stations: Vec<serde_json::Value> = daemon
        .world
        .summaries(&daemon.scheduler.config().station_whitelist)
        .into_iter()
        .map(|summary| {
            let tracker = tracking.get(summary.id);
            serde_json::json!({
                "station": summary,
                "tracked": tracker.is_some(),
                "cycles": tracker.map(|t| t.cycles),
                "fuel_debt": tracker.map(|t| t.ledger.fuel_debt()),
            })
        })
        .collect();
    Json(serde_json::json!({ "stations": stations }))
}

pub async fn config_handler(State(app_state): State<AppState>) -> Json<smelt_core::SmeltConfig> {
    let daemon = app_state.daemon.lock();
    Json(daemon.scheduler.config().clone())
}

pub async fn save_handler(
    State(app_state): State<AppState>,
) -> (StatusCode, Json<serde_json::Value>) {
    let pending = app_state.daemon.lock().pending_save();
    let Some(save) = pending else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": "no config path (started with --no-save?)"})),
        );
    };
    match save.write().await {
        Some(path) => (
            StatusCode::OK,
            Json(serde_json::json!({"path": path.display().to_string()})),
        ),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": "config save failed"})),
        ),
    }
}

pub async fn pause_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    app_state.paused.store(true, Ordering::Relaxed);
    Json(serde_json::json!({"paused": true}))
}

pub async fn resume_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    app_state.paused.store(false, Ordering::Relaxed);
    Json(serde_json::json!({"paused": false}))
}

/// Quantum reports batched every 250 ms, with a heartbeat carrying the
/// scheduler status once a second.
pub async fn stream_handler(
    State(app_state): State<AppState>,
) -> Sse<impl futures_core::Stream<Item = Result<Event, Infallible>>> {
    let mut rx = app_state.report_tx.subscribe();
    let daemon = app_state.daemon.clone();

    let stream = async_stream::stream! {
        let mut heartbeat = tokio::time::interval(Duration::from_secs(1));
        heartbeat.tick().await; // discard the immediate first tick
        let mut flush = tokio::time::interval(Duration::from_millis(250));
        flush.tick().await; // discard the immediate first tick
        let mut pending: Vec<QuantumEnvelope> = Vec::new();
        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Ok(envelope) => pending.push(envelope),
                        Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = flush.tick() => {
                    if !pending.is_empty() {
                        let data = serde_json::to_string(&pending).unwrap_or_default();
                        pending.clear();
                        yield Ok(Event::default().data(data));
                    }
                }
                _ = heartbeat.tick() => {
                    let status = daemon.lock().scheduler.status();
                    let hb = serde_json::json!({"heartbeat": true, "status": status});
                    yield Ok(Event::default().data(hb.to_string()));
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("ping"),
    )
}

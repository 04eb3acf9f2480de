pub mod drivers;
pub mod requests;
pub mod webhook;
pub mod ws;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::models::request::ParcelStatus;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(drivers::router())
        .merge(requests::router())
        .merge(webhook::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        // dashboards are served elsewhere and call this API cross-origin
        .layer(CorsLayer::permissive())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    drivers: usize,
    requests: usize,
    awaiting_driver: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let awaiting_driver = state
        .requests
        .iter()
        .filter(|entry| entry.status == ParcelStatus::ReadyForDriverMatching)
        .count();

    Json(HealthResponse {
        status: "ok",
        drivers: state.drivers.len(),
        requests: state.requests.len(),
        awaiting_driver,
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}

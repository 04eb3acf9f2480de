use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::engine::intake::{handle_incoming_message, IntakeOutcome};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/webhook/message", post(receive_message))
}

/// Inbound chat-transport webhook: one sender phone, one message body.
#[derive(Deserialize)]
pub struct InboundMessage {
    pub phone: String,
    pub text: String,
}

async fn receive_message(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<InboundMessage>,
) -> Json<IntakeOutcome> {
    let outcome = handle_incoming_message(&state, &payload.phone, &payload.text).await;
    Json(outcome)
}

//! Conversational parcel intake: turns the message stream from one phone
//! number into a structured delivery request, one field per step.

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::engine::send_best_effort;
use crate::models::request::{ParcelRequest, ParcelStatus, PaymentMethod};
use crate::phone;
use crate::state::AppState;

pub const PICKUP_PROMPT: &str =
    "📍 Where should we pick up the parcel from?\n\nPlease send the pickup location.";
pub const DROPOFF_PROMPT: &str =
    "📍 Where should the parcel be delivered to?\n\nPlease send the dropoff location.";
pub const DESCRIPTION_PROMPT: &str =
    "📦 What is being collected?\n\nPlease briefly describe the parcel.";
pub const PAYMENT_MENU: &str =
    "💳 How would you like to pay?\n\n1. Cash\n2. Speedpoint\n3. PayShap\n\nReply with 1, 2 or 3.";
pub const WELCOME_PROMPT: &str =
    "👋 Welcome to iDelivery!\n\nReply 1 to start a new parcel delivery request.";

pub fn confirmation_summary(method: PaymentMethod) -> String {
    format!(
        "✅ Parcel request received!\n\nPayment: {method}\nWe are looking for an available driver.\nYou'll be notified once a driver accepts."
    )
}

/// What a single inbound message did. Returned to the webhook caller and used
/// as the metrics outcome label.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IntakeOutcome {
    Ignored,
    Welcomed,
    Started { request_id: Uuid },
    Advanced { request_id: Uuid, status: ParcelStatus },
    Reprompted { request_id: Uuid },
}

impl IntakeOutcome {
    fn label(&self) -> &'static str {
        match self {
            IntakeOutcome::Ignored => "ignored",
            IntakeOutcome::Welcomed => "welcomed",
            IntakeOutcome::Started { .. } => "started",
            IntakeOutcome::Advanced { .. } => "advanced",
            IntakeOutcome::Reprompted { .. } => "reprompted",
        }
    }
}

/// The single entry point for inbound chat messages.
pub async fn handle_incoming_message(
    state: &AppState,
    raw_phone: &str,
    raw_text: &str,
) -> IntakeOutcome {
    let customer_phone = phone::canonicalize(raw_phone);
    let text = raw_text.trim();

    if customer_phone.is_empty() || text.is_empty() {
        return record_outcome(state, IntakeOutcome::Ignored);
    }

    // One intake step per phone at a time; this also makes the
    // cancel-then-create sequence in start_new_request race-free.
    let lock = state.phone_lock(&customer_phone);
    let outcome = {
        let _guard = lock.lock().await;

        if text == "1" {
            start_new_request(state, &customer_phone).await
        } else {
            advance_conversation(state, &customer_phone, text).await
        }
    };

    drop(lock);
    state.release_phone_lock(&customer_phone);

    record_outcome(state, outcome)
}

fn record_outcome(state: &AppState, outcome: IntakeOutcome) -> IntakeOutcome {
    state
        .metrics
        .intake_messages_total
        .with_label_values(&[outcome.label()])
        .inc();
    outcome
}

/// Cancels any in-progress collection for this phone, then opens a fresh
/// request at the first step. Sending "1" twice simply restarts.
async fn start_new_request(state: &AppState, customer_phone: &str) -> IntakeOutcome {
    if let Some(active) = find_active_request(state, customer_phone) {
        if let Some(cancelled) = mutate_request(state, active.id, |request| {
            request.status = ParcelStatus::Cancelled;
        }) {
            info!(request_id = %cancelled.id, phone = %customer_phone, "cancelled stale intake");
        }
    }

    let request = ParcelRequest::new_intake(customer_phone.to_string());
    let request_id = request.id;
    state.requests.insert(request_id, request.clone());
    state.publish_event(&request);

    info!(request_id = %request_id, phone = %customer_phone, "intake started");
    send_best_effort(state, customer_phone, PICKUP_PROMPT).await;

    IntakeOutcome::Started { request_id }
}

async fn advance_conversation(state: &AppState, customer_phone: &str, text: &str) -> IntakeOutcome {
    let Some(active) = find_active_request(state, customer_phone) else {
        send_best_effort(state, customer_phone, WELCOME_PROMPT).await;
        return IntakeOutcome::Welcomed;
    };

    match active.status {
        ParcelStatus::CollectingPickup => {
            step(state, active.id, customer_phone, DROPOFF_PROMPT, |request| {
                request.pickup_location = Some(text.to_string());
                request.status = ParcelStatus::CollectingDropoff;
            })
            .await
        }
        ParcelStatus::CollectingDropoff => {
            step(state, active.id, customer_phone, DESCRIPTION_PROMPT, |request| {
                request.dropoff_location = Some(text.to_string());
                request.status = ParcelStatus::CollectingDescription;
            })
            .await
        }
        ParcelStatus::CollectingDescription => {
            step(state, active.id, customer_phone, PAYMENT_MENU, |request| {
                request.parcel_description = Some(text.to_string());
                request.status = ParcelStatus::CollectingPayment;
            })
            .await
        }
        ParcelStatus::CollectingPayment => match PaymentMethod::from_menu_choice(text) {
            Some(method) => {
                let summary = confirmation_summary(method);
                step(state, active.id, customer_phone, &summary, |request| {
                    request.payment_method = Some(method);
                    request.status = ParcelStatus::ReadyForDriverMatching;
                })
                .await
            }
            None => {
                // Self-loop: bad menu choice never advances the state.
                send_best_effort(state, customer_phone, PAYMENT_MENU).await;
                IntakeOutcome::Reprompted { request_id: active.id }
            }
        },
        // Submitted or terminal: the user must send "1" to start over.
        _ => IntakeOutcome::Ignored,
    }
}

/// Applies one step's field mutation + status advance as a single locked
/// write, then sends the next prompt.
async fn step(
    state: &AppState,
    request_id: Uuid,
    customer_phone: &str,
    prompt: &str,
    mutation: impl FnOnce(&mut ParcelRequest),
) -> IntakeOutcome {
    let Some(updated) = mutate_request(state, request_id, mutation) else {
        return IntakeOutcome::Ignored;
    };

    info!(request_id = %request_id, status = ?updated.status, "intake advanced");
    send_best_effort(state, customer_phone, prompt).await;

    IntakeOutcome::Advanced {
        request_id,
        status: updated.status,
    }
}

fn mutate_request(
    state: &AppState,
    request_id: Uuid,
    mutation: impl FnOnce(&mut ParcelRequest),
) -> Option<ParcelRequest> {
    let updated = {
        let mut request = state.requests.get_mut(&request_id)?;
        mutation(&mut request);
        request.clone()
    };

    state.publish_event(&updated);
    Some(updated)
}

/// Most recent request for this phone still in an active collection state.
/// Ties on `created_at` break to the latest.
pub fn find_active_request(state: &AppState, customer_phone: &str) -> Option<ParcelRequest> {
    state
        .requests
        .iter()
        .filter(|entry| {
            entry.customer_phone == customer_phone && entry.status.is_active_collection()
        })
        .max_by_key(|entry| entry.created_at)
        .map(|entry| entry.value().clone())
}

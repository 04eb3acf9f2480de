use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::matching;
use crate::error::AppError;
use crate::models::request::{ParcelRequest, ParcelStatus, PaymentMethod};
use crate::phone;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(place_order))
        .route("/requests", get(list_by_phone))
        .route("/requests/open", get(list_open))
        .route("/requests/:id", get(get_request))
        .route("/requests/:id/accept", post(accept))
        .route("/requests/:id/pickup", post(pickup))
        .route("/requests/:id/arrived", post(arrived))
        .route("/requests/:id/complete", post(complete))
}

/// Customer-dashboard order: everything supplied up front, skips the
/// conversational collection steps entirely.
#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    pub customer_phone: String,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub pickup_location: String,
    pub dropoff_location: String,
    pub parcel_description: String,
    pub payment_method: PaymentMethod,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Deserialize)]
pub struct PhoneQuery {
    pub phone: String,
}

#[derive(Deserialize)]
pub struct AcceptRequest {
    pub driver_id: Uuid,
}

#[derive(Deserialize)]
pub struct PickupRequest {
    pub cost_of_goods: f64,
}

async fn place_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PlaceOrderRequest>,
) -> Result<Json<ParcelRequest>, AppError> {
    let customer_phone = phone::canonicalize(&payload.customer_phone);
    if customer_phone.is_empty() {
        return Err(AppError::BadRequest("customer_phone cannot be empty".to_string()));
    }

    if payload.pickup_location.trim().is_empty() || payload.dropoff_location.trim().is_empty() {
        return Err(AppError::BadRequest("pickup and dropoff are required".to_string()));
    }

    if payload.quantity < 1 {
        return Err(AppError::BadRequest("quantity must be at least 1".to_string()));
    }

    let request = ParcelRequest {
        id: Uuid::new_v4(),
        customer_phone,
        customer_id: payload.customer_id,
        customer_name: payload.customer_name,
        customer_email: payload.customer_email,
        status: ParcelStatus::ReadyForDriverMatching,
        pickup_location: Some(payload.pickup_location),
        dropoff_location: Some(payload.dropoff_location),
        parcel_description: Some(payload.parcel_description),
        payment_method: Some(payload.payment_method),
        quantity: payload.quantity,
        delivery_fee: None,
        cost_of_goods: None,
        payment_surcharge: None,
        final_total: None,
        assigned_driver_id: None,
        created_at: Utc::now(),
    };

    state.requests.insert(request.id, request.clone());
    state.publish_event(&request);

    Ok(Json(request))
}

async fn get_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ParcelRequest>, AppError> {
    let request = state
        .requests
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("request {id} not found")))?;

    Ok(Json(request.value().clone()))
}

/// All requests for one customer, newest first. The lookup key is the
/// canonical phone form, so any inbound formatting finds the same records.
async fn list_by_phone(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PhoneQuery>,
) -> Json<Vec<ParcelRequest>> {
    let key = phone::canonicalize(&query.phone);

    let mut requests: Vec<ParcelRequest> = state
        .requests
        .iter()
        .filter(|entry| entry.customer_phone == key)
        .map(|entry| entry.value().clone())
        .collect();

    requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(requests)
}

/// Requests visible to online drivers: ready for matching, nobody assigned.
async fn list_open(State(state): State<Arc<AppState>>) -> Json<Vec<ParcelRequest>> {
    let mut requests: Vec<ParcelRequest> = state
        .requests
        .iter()
        .filter(|entry| {
            entry.status == ParcelStatus::ReadyForDriverMatching
                && entry.assigned_driver_id.is_none()
        })
        .map(|entry| entry.value().clone())
        .collect();

    requests.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Json(requests)
}

async fn accept(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AcceptRequest>,
) -> Result<Json<ParcelRequest>, AppError> {
    let request = matching::accept_job(&state, id, payload.driver_id).await?;
    Ok(Json(request))
}

async fn pickup(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PickupRequest>,
) -> Result<Json<ParcelRequest>, AppError> {
    let request = matching::record_pickup(&state, id, payload.cost_of_goods).await?;
    Ok(Json(request))
}

async fn arrived(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ParcelRequest>, AppError> {
    let request = matching::notify_arrived(&state, id).await?;
    Ok(Json(request))
}

async fn complete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ParcelRequest>, AppError> {
    let request = matching::complete_order(&state, id).await?;
    Ok(Json(request))
}

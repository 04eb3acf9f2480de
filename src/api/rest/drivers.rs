use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver::{DriverProfile, DriverStatus, PaymentMethods, TransportType};
use crate::phone;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(create_driver).get(list_drivers))
        .route("/drivers/:id/status", patch(update_driver_status))
        .route("/drivers/:id/settings", patch(update_driver_settings))
}

#[derive(Deserialize)]
pub struct CreateDriverRequest {
    pub full_name: String,
    pub phone_number: String,
    pub area: Option<String>,
    pub transport_type: TransportType,
    pub base_delivery_fee: f64,
    pub payment_methods: Option<PaymentMethods>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: DriverStatus,
}

/// Driver-configurable pricing: base fee and per-method surcharges.
#[derive(Deserialize)]
pub struct UpdateSettingsRequest {
    pub base_delivery_fee: Option<f64>,
    pub payment_methods: Option<PaymentMethods>,
}

/// Surcharges feed final totals and earnings, so they get the same
/// finite/non-negative check as the base fee.
fn validate_payment_methods(methods: &PaymentMethods) -> Result<(), AppError> {
    let costs = [
        ("cash", methods.cash.cost),
        ("speedpoint", methods.speedpoint.cost),
        ("payshap", methods.payshap.cost),
    ];

    for (name, cost) in costs {
        if !cost.is_finite() || cost < 0.0 {
            return Err(AppError::BadRequest(format!(
                "{name} cost must be a non-negative amount"
            )));
        }
    }

    Ok(())
}

async fn create_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDriverRequest>,
) -> Result<Json<DriverProfile>, AppError> {
    if payload.full_name.trim().is_empty() {
        return Err(AppError::BadRequest("full_name cannot be empty".to_string()));
    }

    if !payload.base_delivery_fee.is_finite() || payload.base_delivery_fee < 0.0 {
        return Err(AppError::BadRequest(
            "base_delivery_fee must be a non-negative amount".to_string(),
        ));
    }

    if let Some(methods) = &payload.payment_methods {
        validate_payment_methods(methods)?;
    }

    let driver = DriverProfile {
        id: Uuid::new_v4(),
        full_name: payload.full_name,
        phone_number: phone::canonicalize(&payload.phone_number),
        area: payload.area,
        transport_type: payload.transport_type,
        // Drivers come up offline and opt in to receiving jobs.
        status: DriverStatus::Offline,
        active_jobs: 0,
        max_jobs: payload.transport_type.max_jobs(),
        base_delivery_fee: payload.base_delivery_fee,
        payment_methods: payload.payment_methods.unwrap_or_default(),
        rating: 0.0,
        total_earnings: 0.0,
        created_at: Utc::now(),
    };

    state.drivers.insert(driver.id, driver.clone());
    Ok(Json(driver))
}

async fn list_drivers(State(state): State<Arc<AppState>>) -> Json<Vec<DriverProfile>> {
    let drivers = state
        .drivers
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(drivers)
}

async fn update_driver_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<DriverProfile>, AppError> {
    let mut driver = state
        .drivers
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;

    driver.status = payload.status;

    Ok(Json(driver.clone()))
}

async fn update_driver_settings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateSettingsRequest>,
) -> Result<Json<DriverProfile>, AppError> {
    if let Some(fee) = payload.base_delivery_fee {
        if !fee.is_finite() || fee < 0.0 {
            return Err(AppError::BadRequest(
                "base_delivery_fee must be a non-negative amount".to_string(),
            ));
        }
    }

    if let Some(methods) = &payload.payment_methods {
        validate_payment_methods(methods)?;
    }

    let mut driver = state
        .drivers
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;

    if let Some(fee) = payload.base_delivery_fee {
        // Applies to future acceptances only; in-flight orders keep the fee
        // snapshotted when they were accepted.
        driver.base_delivery_fee = fee;
    }

    if let Some(methods) = payload.payment_methods {
        driver.payment_methods = methods;
    }

    Ok(Json(driver.clone()))
}

//! Driver-side job lifecycle: claim a ready request, record the pickup, flag
//! arrival, complete and accrue earnings. Every transition is a conditional
//! write under the record's map-entry lock, so racing callers serialize and
//! losers get a Conflict instead of corrupting the record.

use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::{pricing, send_best_effort};
use crate::error::AppError;
use crate::models::driver::DriverStatus;
use crate::models::request::{ParcelRequest, ParcelStatus};
use crate::state::AppState;

/// An online driver claims a request awaiting matching. Capacity is reserved
/// on the driver entry before the request transition; if the request was
/// already taken, the reservation is released and the caller gets a Conflict.
/// At most one driver ever wins a given request.
pub async fn accept_job(
    state: &AppState,
    request_id: Uuid,
    driver_id: Uuid,
) -> Result<ParcelRequest, AppError> {
    let base_fee = {
        let mut driver = state
            .drivers
            .get_mut(&driver_id)
            .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;

        if driver.status != DriverStatus::Online {
            return Err(AppError::Conflict("driver is offline".to_string()));
        }

        if driver.active_jobs >= driver.max_jobs {
            return Err(AppError::Conflict("driver is at capacity".to_string()));
        }

        driver.active_jobs += 1;
        driver.base_delivery_fee
    };

    let updated = {
        let Some(mut request) = state.requests.get_mut(&request_id) else {
            release_capacity(state, driver_id);
            return Err(AppError::NotFound(format!("request {request_id} not found")));
        };

        if request.status != ParcelStatus::ReadyForDriverMatching
            || request.assigned_driver_id.is_some()
        {
            drop(request);
            release_capacity(state, driver_id);
            return Err(AppError::Conflict("request already assigned".to_string()));
        }

        request.status = ParcelStatus::Assigned;
        request.assigned_driver_id = Some(driver_id);
        // Fee snapshot: a later change to the driver's base fee must not
        // retroactively reprice this order.
        request.delivery_fee = Some(base_fee);
        request.clone()
    };

    state.publish_event(&updated);
    state
        .metrics
        .job_transitions_total
        .with_label_values(&["accepted"])
        .inc();

    info!(
        request_id = %request_id,
        driver_id = %driver_id,
        delivery_fee = base_fee,
        "job accepted"
    );

    Ok(updated)
}

/// The driver has collected the parcel and entered the receipt total. Locks
/// in the payment surcharge and the final amount owed at the door.
pub async fn record_pickup(
    state: &AppState,
    request_id: Uuid,
    cost_of_goods: f64,
) -> Result<ParcelRequest, AppError> {
    if !cost_of_goods.is_finite() || cost_of_goods < 0.0 {
        return Err(AppError::BadRequest(
            "cost_of_goods must be a non-negative amount".to_string(),
        ));
    }

    let snapshot = state
        .requests
        .get(&request_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("request {request_id} not found")))?;

    if snapshot.status != ParcelStatus::Assigned {
        return Err(AppError::Conflict("request is not in an assigned state".to_string()));
    }

    let surcharge = snapshot
        .assigned_driver_id
        .and_then(|driver_id| state.drivers.get(&driver_id))
        .map(|driver| pricing::surcharge_for(&driver.payment_methods, snapshot.payment_method))
        .unwrap_or_else(|| {
            warn!(request_id = %request_id, "assigned driver missing; surcharge defaults to 0");
            0.0
        });

    let updated = {
        let mut request = state
            .requests
            .get_mut(&request_id)
            .ok_or_else(|| AppError::NotFound(format!("request {request_id} not found")))?;

        if request.status != ParcelStatus::Assigned {
            return Err(AppError::Conflict("request is not in an assigned state".to_string()));
        }

        let delivery_fee = request.delivery_fee.unwrap_or_default();
        request.cost_of_goods = Some(cost_of_goods);
        request.payment_surcharge = Some(surcharge);
        request.final_total = Some(pricing::final_total(delivery_fee, surcharge, cost_of_goods));
        request.status = ParcelStatus::PickedUp;
        request.clone()
    };

    state.publish_event(&updated);
    state
        .metrics
        .job_transitions_total
        .with_label_values(&["picked_up"])
        .inc();

    info!(
        request_id = %request_id,
        final_total = updated.final_total,
        "parcel picked up"
    );

    Ok(updated)
}

/// Marks the driver arrived at the dropoff, then tries to notify the
/// customer. The notification is fire-and-forget: the status change has
/// committed and a failed or impossible send never reverts it.
pub async fn notify_arrived(state: &AppState, request_id: Uuid) -> Result<ParcelRequest, AppError> {
    let updated = {
        let mut request = state
            .requests
            .get_mut(&request_id)
            .ok_or_else(|| AppError::NotFound(format!("request {request_id} not found")))?;

        if request.status != ParcelStatus::PickedUp {
            return Err(AppError::Conflict("request has not been picked up".to_string()));
        }

        request.status = ParcelStatus::ArrivedAtDropoff;
        request.clone()
    };

    state.publish_event(&updated);
    state
        .metrics
        .job_transitions_total
        .with_label_values(&["arrived"])
        .inc();
    info!(request_id = %request_id, "driver arrived at dropoff");

    match &updated.customer_email {
        Some(email) => {
            let notice = arrival_notice(&updated);
            send_best_effort(state, email, &notice).await;
        }
        None => info!(request_id = %request_id, "no email on file; skipping arrival notice"),
    }

    Ok(updated)
}

fn arrival_notice(request: &ParcelRequest) -> String {
    let name = request.customer_name.as_deref().unwrap_or("Customer");
    let dropoff = request
        .dropoff_location
        .as_deref()
        .unwrap_or("your delivery address");
    let description = request.parcel_description.as_deref().unwrap_or("your parcel");
    let total = request
        .final_total
        .map(pricing::display_amount)
        .unwrap_or_else(|| "N/A".to_string());

    format!(
        "Hi {name}, your driver has arrived at {dropoff} with {description}. Total due: {total}."
    )
}

/// Finishes the order and accrues the driver's earnings. The accrual happens
/// under the driver's map-entry lock, so concurrent completions for the same
/// driver never lose an update. Goods cost is reimbursement, not earnings.
pub async fn complete_order(state: &AppState, request_id: Uuid) -> Result<ParcelRequest, AppError> {
    let updated = {
        let mut request = state
            .requests
            .get_mut(&request_id)
            .ok_or_else(|| AppError::NotFound(format!("request {request_id} not found")))?;

        // PickedUp is accepted too, for drivers who skip the arrival tap.
        if !matches!(
            request.status,
            ParcelStatus::ArrivedAtDropoff | ParcelStatus::PickedUp
        ) {
            return Err(AppError::Conflict("request is not ready to complete".to_string()));
        }

        request.status = ParcelStatus::Completed;
        request.clone()
    };

    state.publish_event(&updated);

    // Earnings are monotonic and the prometheus counter rejects negative
    // increments, so a bad stored amount accrues nothing instead.
    let increment = pricing::earnings_increment(
        updated.delivery_fee.unwrap_or_default(),
        updated.payment_surcharge.unwrap_or_default(),
    )
    .max(0.0);

    if let Some(driver_id) = updated.assigned_driver_id {
        if let Some(mut driver) = state.drivers.get_mut(&driver_id) {
            driver.total_earnings += increment;
            driver.active_jobs = driver.active_jobs.saturating_sub(1);
        } else {
            warn!(request_id = %request_id, driver_id = %driver_id, "completed order for unknown driver");
        }
    }

    state.metrics.earnings_paid_total.inc_by(increment);
    state
        .metrics
        .job_transitions_total
        .with_label_values(&["completed"])
        .inc();

    info!(request_id = %request_id, earnings = increment, "order completed");

    Ok(updated)
}

fn release_capacity(state: &AppState, driver_id: Uuid) {
    if let Some(mut driver) = state.drivers.get_mut(&driver_id) {
        driver.active_jobs = driver.active_jobs.saturating_sub(1);
    }
}

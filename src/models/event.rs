use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::request::ParcelStatus;

/// Broadcast on every request status change; consumed by the websocket feed
/// so dashboards can refresh without polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEvent {
    pub request_id: Uuid,
    pub customer_phone: String,
    pub status: ParcelStatus,
    pub assigned_driver_id: Option<Uuid>,
    pub at: DateTime<Utc>,
}

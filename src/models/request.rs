use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a parcel request. Forward-only, except that `Cancelled` is
/// reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParcelStatus {
    CollectingPickup,
    CollectingDropoff,
    CollectingDescription,
    CollectingPayment,
    ReadyForDriverMatching,
    Assigned,
    PickedUp,
    ArrivedAtDropoff,
    Cancelled,
    Completed,
}

impl ParcelStatus {
    /// In-progress intake conversation, not yet submitted for matching.
    pub fn is_active_collection(&self) -> bool {
        matches!(
            self,
            ParcelStatus::CollectingPickup
                | ParcelStatus::CollectingDropoff
                | ParcelStatus::CollectingDescription
                | ParcelStatus::CollectingPayment
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentMethod {
    Cash,
    Speedpoint,
    PayShap,
}

impl PaymentMethod {
    /// Mapping used by the intake payment menu: 1=Cash, 2=Speedpoint, 3=PayShap.
    pub fn from_menu_choice(choice: &str) -> Option<Self> {
        match choice {
            "1" => Some(PaymentMethod::Cash),
            "2" => Some(PaymentMethod::Speedpoint),
            "3" => Some(PaymentMethod::PayShap),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Speedpoint => "Speedpoint",
            PaymentMethod::PayShap => "PayShap",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParcelRequest {
    pub id: Uuid,
    /// Canonical digit-string phone key; see `phone::canonicalize`.
    pub customer_phone: String,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub status: ParcelStatus,
    pub pickup_location: Option<String>,
    pub dropoff_location: Option<String>,
    pub parcel_description: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub quantity: u32,
    /// Snapshot of the driver's base fee at acceptance; never recomputed.
    pub delivery_fee: Option<f64>,
    pub cost_of_goods: Option<f64>,
    pub payment_surcharge: Option<f64>,
    pub final_total: Option<f64>,
    pub assigned_driver_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl ParcelRequest {
    /// Fresh intake request with all collected fields empty.
    pub fn new_intake(phone: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_phone: phone,
            customer_id: None,
            customer_name: None,
            customer_email: None,
            status: ParcelStatus::CollectingPickup,
            pickup_location: None,
            dropoff_location: None,
            parcel_description: None,
            payment_method: None,
            quantity: 1,
            delivery_fee: None,
            cost_of_goods: None,
            payment_surcharge: None,
            final_total: None,
            assigned_driver_id: None,
            created_at: Utc::now(),
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::request::PaymentMethod;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverStatus {
    Online,
    Offline,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    Bike,
    Motorcycle,
    Car,
}

impl TransportType {
    /// Capacity ceiling per transport type.
    pub fn max_jobs(&self) -> u8 {
        match self {
            TransportType::Bike => 2,
            TransportType::Motorcycle => 3,
            TransportType::Car => 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentMethodConfig {
    pub enabled: bool,
    pub cost: f64,
    /// PayShap receiving number, where applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

impl Default for PaymentMethodConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cost: 0.0,
            phone_number: None,
        }
    }
}

/// Fixed enum-keyed payment config rather than an open dictionary, so a typo'd
/// method name cannot slip past the compiler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentMethods {
    pub cash: PaymentMethodConfig,
    pub speedpoint: PaymentMethodConfig,
    pub payshap: PaymentMethodConfig,
}

impl PaymentMethods {
    pub fn config_for(&self, method: PaymentMethod) -> &PaymentMethodConfig {
        match method {
            PaymentMethod::Cash => &self.cash,
            PaymentMethod::Speedpoint => &self.speedpoint,
            PaymentMethod::PayShap => &self.payshap,
        }
    }
}

impl Default for PaymentMethods {
    fn default() -> Self {
        Self {
            cash: PaymentMethodConfig {
                enabled: true,
                cost: 0.0,
                phone_number: None,
            },
            speedpoint: PaymentMethodConfig::default(),
            payshap: PaymentMethodConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverProfile {
    pub id: Uuid,
    pub full_name: String,
    pub phone_number: String,
    pub area: Option<String>,
    pub transport_type: TransportType,
    pub status: DriverStatus,
    pub active_jobs: u8,
    pub max_jobs: u8,
    pub base_delivery_fee: f64,
    pub payment_methods: PaymentMethods,
    pub rating: f64,
    /// Mutated only by the atomic accrual on order completion.
    pub total_earnings: f64,
    pub created_at: DateTime<Utc>,
}

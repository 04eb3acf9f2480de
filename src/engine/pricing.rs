use crate::models::driver::PaymentMethods;
use crate::models::request::PaymentMethod;

/// Total owed by the customer at the door. Stored at full precision; rounding
/// happens only at display time.
pub fn final_total(delivery_fee: f64, payment_surcharge: f64, cost_of_goods: f64) -> f64 {
    delivery_fee + payment_surcharge + cost_of_goods
}

/// What the driver earns on completion. The goods cost is a pass-through
/// reimbursement and is excluded.
pub fn earnings_increment(delivery_fee: f64, payment_surcharge: f64) -> f64 {
    delivery_fee + payment_surcharge
}

/// Driver-configured surcharge for the chosen payment method. A disabled or
/// missing method contributes 0 rather than failing the order. Costs are
/// validated non-negative at the settings boundary; anything bad that slipped
/// into storage is treated as 0 here rather than discounting the order.
pub fn surcharge_for(methods: &PaymentMethods, method: Option<PaymentMethod>) -> f64 {
    match method {
        Some(method) => {
            let config = methods.config_for(method);
            if config.enabled { config.cost.max(0.0) } else { 0.0 }
        }
        None => 0.0,
    }
}

/// Rand amount for outbound notices, two decimal places.
pub fn display_amount(value: f64) -> String {
    format!("R{value:.2}")
}

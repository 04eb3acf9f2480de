use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use crate::messenger::Messenger;
use crate::models::driver::DriverProfile;
use crate::models::event::RequestEvent;
use crate::models::request::ParcelRequest;
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub requests: DashMap<Uuid, ParcelRequest>,
    pub drivers: DashMap<Uuid, DriverProfile>,
    /// Serializes intake handling per canonical phone, closing the
    /// read-then-cancel-then-create window in StartNewRequest.
    pub phone_locks: DashMap<String, Arc<Mutex<()>>>,
    pub request_events_tx: broadcast::Sender<RequestEvent>,
    pub messenger: Arc<dyn Messenger>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(event_buffer_size: usize, messenger: Arc<dyn Messenger>) -> Self {
        let (request_events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            requests: DashMap::new(),
            drivers: DashMap::new(),
            phone_locks: DashMap::new(),
            request_events_tx,
            messenger,
            metrics: Metrics::new(),
        }
    }

    pub fn phone_lock(&self, phone: &str) -> Arc<Mutex<()>> {
        self.phone_locks
            .entry(phone.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops a phone's lock entry once no handler holds or awaits it, so the
    /// registry does not grow with every number ever seen. `remove_if` runs
    /// its predicate under the shard lock, so a concurrent `phone_lock` clone
    /// cannot slip in between the count check and the removal.
    pub fn release_phone_lock(&self, phone: &str) {
        self.phone_locks
            .remove_if(phone, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Publish a status change to live subscribers. Lagging or absent
    /// receivers are fine; the store already holds the truth.
    pub fn publish_event(&self, request: &ParcelRequest) {
        let _ = self.request_events_tx.send(RequestEvent {
            request_id: request.id,
            customer_phone: request.customer_phone.clone(),
            status: request.status,
            assigned_driver_id: request.assigned_driver_id,
            at: Utc::now(),
        });
    }
}

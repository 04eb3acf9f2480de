pub mod intake;
pub mod matching;
pub mod pricing;

use tracing::warn;

use crate::state::AppState;

/// Outbound prompts and notices are best-effort: the state transition has
/// already committed by the time we get here, so a failed send is logged and
/// counted, never rolled back.
pub(crate) async fn send_best_effort(state: &AppState, destination: &str, text: &str) {
    match state.messenger.send(destination, text).await {
        Ok(()) => {
            state
                .metrics
                .outbound_sends_total
                .with_label_values(&["success"])
                .inc();
        }
        Err(err) => {
            state
                .metrics
                .outbound_sends_total
                .with_label_values(&["error"])
                .inc();
            warn!(destination = %destination, error = %err, "outbound send failed");
        }
    }
}

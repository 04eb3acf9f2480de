use async_trait::async_trait;
use mockall::automock;
use tracing::info;

use crate::error::AppError;

/// Outbound send capability. The destination is a canonical phone number or an
/// email address; delivery is best-effort and the core never retries. Transport
/// reliability lives with the transport, not here.
#[automock]
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, destination: &str, text: &str) -> Result<(), AppError>;
}

/// Default messenger: logs the outbound message. The real chat/email transport
/// is an external collaborator wired in at deployment.
pub struct LogMessenger;

#[async_trait]
impl Messenger for LogMessenger {
    async fn send(&self, destination: &str, text: &str) -> Result<(), AppError> {
        info!(destination = %destination, chars = text.len(), "outbound message");
        Ok(())
    }
}

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

pub mod twilio;

pub use twilio::TwilioGateway;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
    #[error("Invalid configuration for gateway: {0}")]
    InvalidConfiguration(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Gateway rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Outbound channel for alert messages, addressed by the check owner's phone.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send(&self, phone: &str, message: &str) -> Result<(), GatewayError>;
}

/// Gateway used when no SMS provider is configured: the alert only reaches
/// the worker's own log.
#[derive(Debug, Default)]
pub struct LogOnlyGateway;

#[async_trait]
impl NotificationGateway for LogOnlyGateway {
    async fn send(&self, phone: &str, message: &str) -> Result<(), GatewayError> {
        info!(phone, "Alert (no SMS gateway configured): {}", message);
        Ok(())
    }
}

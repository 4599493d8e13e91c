use async_trait::async_trait;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("recipient '{0}' rejected the message")]
    Rejected(String),
    #[error("mail transport unavailable: {0}")]
    Unavailable(String),
}

/// Transport used by the dispatcher to reach subscribers.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send_email(&self, recipient: &str, message: &str) -> Result<(), DeliveryError>;
}

/// Sender that only records the delivery in the service log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailSender;

#[async_trait]
impl NotificationSender for LogMailSender {
    async fn send_email(&self, recipient: &str, message: &str) -> Result<(), DeliveryError> {
        if recipient.trim().is_empty() {
            return Err(DeliveryError::Rejected(recipient.to_string()));
        }
        info!(recipient, message, "e-mail sent");
        Ok(())
    }
}

// src/utils/mail.rs

use async_trait::async_trait;

/// Outbound mail collaborator. Transport itself is out of scope; the
/// signup handler persists the confirmation code before calling this, so a
/// delivery failure never loses the code.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), String>;
}

/// Default mailer: writes the message to the log instead of a wire.
pub struct LogMailer {
    pub from: String,
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), String> {
        tracing::info!(
            from = %self.from,
            to = %recipient,
            subject = %subject,
            "Outgoing mail: {}",
            body
        );
        Ok(())
    }
}

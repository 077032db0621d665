//! Outbound email collaborator.
//!
//! Accounts with the email capability can be messaged through an
//! `EmailSender`. Delivery (SMTP, API, queue) is up to the implementation; the
//! crate only ships `LogEmailSender`, which logs the message and returns `Ok`.
use anyhow::Result;
use tracing::info;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailMessage {
    pub to_email: String,
    pub from_email: Option<String>,
    pub subject: String,
    pub body: String,
}

/// Email delivery abstraction.
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the message instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            from_email = message.from_email.as_deref().unwrap_or("-"),
            subject = %message.subject,
            "email send stub"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_sender_accepts_message() {
        let message = EmailMessage {
            to_email: "jane@example.com".to_string(),
            from_email: None,
            subject: "Hi".to_string(),
            body: "Body".to_string(),
        };
        assert!(LogEmailSender.send(&message).is_ok());
    }
}

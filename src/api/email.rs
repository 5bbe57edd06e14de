//! Outbound email dispatch for verification links.
//!
//! Registration enqueues nothing durable: the verification email is handed to
//! an `EmailSender` on a spawned task, fire-and-forget. A delivery failure is
//! logged and never surfaces to the register response; a user whose email
//! never arrives can wait for the token to expire and register again.
//!
//! The default sender for local dev is `LogEmailSender`, which logs the
//! payload and returns `Ok(())`. A real deployment implements `EmailSender`
//! over SMTP or a provider API.

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub subject: String,
    pub body: String,
}

/// Email delivery abstraction.
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error to have it logged.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the payload instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            subject = %message.subject,
            body = %message.body,
            "email send stub"
        );
        Ok(())
    }
}

/// Dispatch the verification email without blocking or failing the caller.
pub fn dispatch_verification(sender: Arc<dyn EmailSender>, to_email: String, verify_url: String) {
    tokio::spawn(async move {
        let message = EmailMessage {
            to_email,
            subject: "Verify your email".to_string(),
            body: format!("Welcome to Habita! Verify your email: {verify_url}"),
        };
        if let Err(err) = sender.send(&message) {
            error!(to_email = %message.to_email, "Failed to send verification email: {err}");
        }
    });
}

use async_trait::async_trait;
use tracing::info;

use crate::workflows::access::Role;

/// Rendered e-mail ready for a transactional mail provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail provider rejected the message with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("mail transport failed: {0}")]
    Transport(String),
    #[error("mail provider timed out")]
    TimedOut,
}

/// Role-specific confirmation message pointing at `confirm_link`.
pub fn confirmation_email(
    to: &str,
    role: Role,
    product: &str,
    confirm_link: &str,
) -> EmailMessage {
    let (subject, joined, activates) = match role {
        Role::Rep => (
            format!("Confirm your Rep Registration with {product}"),
            "joining as a Rep",
            "access",
        ),
        Role::Provider | Role::Admin => (
            format!("Confirm your Provider Registration with {product}"),
            "registering as a provider",
            "account",
        ),
    };

    let html = format!(
        "<h2>Welcome to {product}!</h2>\n\
         <p>Thank you for {joined}. Please <a href=\"{confirm_link}\">click here to confirm your \
         email</a> and activate your {activates}.</p>\n\
         <p>If the above link doesn't work, copy and paste this URL into your browser:</p>\n\
         <p>{confirm_link}</p>\n\
         <p>If you did not request this, please ignore this email.</p>\n"
    );
    let text = format!(
        "Thank you for {joined} with {product}.\n\
         To confirm your email and activate your {activates}, click the following link or copy it \
         into your browser:\n{confirm_link}"
    );

    EmailMessage {
        to: to.to_string(),
        subject,
        html,
        text,
    }
}

/// Writes messages to the log instead of sending them; for local runs without a mail provider.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.text,
            "mail transport is log-only; message not delivered"
        );
        Ok(())
    }
}

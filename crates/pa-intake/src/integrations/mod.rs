//! HTTP adapters for the payer (Availity) and transactional mail (Brevo) APIs.

pub mod availity;
pub mod brevo;

use std::time::Duration;

pub use availity::{AvailityCoverageClient, AvailityTokenClient};
pub use brevo::BrevoMailer;

#[derive(Debug, thiserror::Error)]
pub enum IntegrationError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Shared client settings for outbound calls.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, IntegrationError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("pa-intake/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

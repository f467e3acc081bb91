use async_trait::async_trait;

/// Client-credentials exchange for the payer API access token handed out at login.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, TokenError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("{body}")]
    Rejected { status: u16, body: String },
    #[error("{0}")]
    Transport(String),
    #[error("token response did not include an access_token")]
    MissingToken,
    #[error("token request timed out")]
    TimedOut,
}

/// Hands out a fixed token; used when no payer credentials are configured.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String, TokenError> {
        Ok(self.token.clone())
    }
}

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use crate::config::AvailityConfig;
use crate::workflows::accounts::tokens::{TokenError, TokenProvider};
use crate::workflows::intake::eligibility::{
    CoverageQuery, EligibilityGateway, EligibilityLookupError,
};

/// Coverage lookups against the Availity coverages endpoint.
#[derive(Debug, Clone)]
pub struct AvailityCoverageClient {
    http: Client,
    coverage_url: String,
}

impl AvailityCoverageClient {
    pub fn new(http: Client, config: &AvailityConfig) -> Self {
        Self {
            http,
            coverage_url: config.coverage_url.clone(),
        }
    }
}

#[async_trait]
impl EligibilityGateway for AvailityCoverageClient {
    async fn check_coverage(
        &self,
        credential: &str,
        query: &CoverageQuery,
    ) -> Result<Value, EligibilityLookupError> {
        let response = self
            .http
            .get(&self.coverage_url)
            .bearer_auth(credential)
            .query(query)
            .send()
            .await
            .map_err(lookup_error)?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(EligibilityLookupError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        response.json::<Value>().await.map_err(lookup_error)
    }
}

fn lookup_error(error: reqwest::Error) -> EligibilityLookupError {
    if error.is_timeout() {
        EligibilityLookupError::TimedOut
    } else {
        EligibilityLookupError::Transport(error.to_string())
    }
}

/// OAuth2 client-credentials exchange with the `hipaa` scope.
#[derive(Clone)]
pub struct AvailityTokenClient {
    http: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl AvailityTokenClient {
    pub fn new(http: Client, config: &AvailityConfig) -> Self {
        Self {
            http,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[async_trait]
impl TokenProvider for AvailityTokenClient {
    async fn access_token(&self) -> Result<String, TokenError> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", "hipaa"),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(token_error)?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(TokenError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let payload: TokenResponse = response.json().await.map_err(token_error)?;
        payload
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or(TokenError::MissingToken)
    }
}

fn token_error(error: reqwest::Error) -> TokenError {
    if error.is_timeout() {
        TokenError::TimedOut
    } else {
        TokenError::Transport(error.to_string())
    }
}

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use parking_lot::Mutex;
use serde_json::Value;

use crate::workflows::accounts::domain::RegisterRequest;
use crate::workflows::accounts::mailer::{EmailMessage, MailError, Mailer};
use crate::workflows::accounts::service::{AccountService, AccountSettings};
use crate::workflows::accounts::store::InMemoryAccountRepository;
use crate::workflows::accounts::tokens::{TokenError, TokenProvider};

pub(super) const CONFIRM_URL: &str = "http://localhost:8080/intake/auth/confirm";

#[derive(Default)]
pub(super) struct RecordingMailer {
    fail: bool,
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingMailer {
    pub(super) fn failing() -> Self {
        Self {
            fail: true,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().clone()
    }

    /// Token carried in the most recent confirmation link.
    pub(super) fn last_token(&self) -> String {
        let sent = self.sent.lock();
        let message = sent.last().expect("a message was sent");
        message
            .text
            .rsplit("token=")
            .next()
            .expect("link carries a token")
            .trim()
            .to_string()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::Rejected {
                status: 401,
                body: "Key not found".to_string(),
            });
        }
        self.sent.lock().push(message.clone());
        Ok(())
    }
}

pub(super) struct FakeTokens {
    outcome: Result<String, String>,
    calls: AtomicUsize,
}

impl FakeTokens {
    pub(super) fn issuing(token: &str) -> Self {
        Self {
            outcome: Ok(token.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(super) fn rejecting(body: &str) -> Self {
        Self {
            outcome: Err(body.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenProvider for FakeTokens {
    async fn access_token(&self) -> Result<String, TokenError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            Ok(token) => Ok(token.clone()),
            Err(body) => Err(TokenError::Rejected {
                status: 400,
                body: body.clone(),
            }),
        }
    }
}

pub(super) struct Harness {
    pub(super) service: Arc<AccountService<InMemoryAccountRepository>>,
    pub(super) repository: Arc<InMemoryAccountRepository>,
    pub(super) mailer: Arc<RecordingMailer>,
    pub(super) tokens: Arc<FakeTokens>,
}

pub(super) fn settings() -> AccountSettings {
    AccountSettings {
        confirm_url: CONFIRM_URL.to_string(),
        product_name: "PA Intake".to_string(),
        upstream_timeout: Duration::from_secs(10),
    }
}

pub(super) fn build_service() -> Harness {
    build_service_with(RecordingMailer::default(), FakeTokens::issuing("availity-abc"))
}

pub(super) fn build_service_with(mailer: RecordingMailer, tokens: FakeTokens) -> Harness {
    let repository = Arc::new(InMemoryAccountRepository::new());
    let mailer = Arc::new(mailer);
    let tokens = Arc::new(tokens);
    let service = AccountService::new(
        repository.clone(),
        mailer.clone(),
        tokens.clone(),
        settings(),
    );

    Harness {
        service: Arc::new(service),
        repository,
        mailer,
        tokens,
    }
}

pub(super) fn registration(email: &str, role: &str) -> RegisterRequest {
    RegisterRequest {
        email: email.to_string(),
        password: "s3cret".to_string(),
        role: role.to_string(),
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::domain::{
    normalize_email, random_token, LoginRequest, LoginResponse, RegisterRequest, UserAccount,
    CONFIRMATION_TOKEN_LEN, SESSION_TOKEN_LEN,
};
use super::mailer::{confirmation_email, MailError, Mailer};
use super::repository::AccountRepository;
use super::tokens::{TokenError, TokenProvider};
use crate::config::AdminSeed;
use crate::workflows::access::{Actor, Role, SessionResolver};
use crate::workflows::clock::{Clock, SystemClock};
use crate::workflows::RepositoryError;

/// Registration, e-mail confirmation, and login.
pub struct AccountService<A> {
    repository: Arc<A>,
    mailer: Arc<dyn Mailer>,
    tokens: Arc<dyn TokenProvider>,
    clock: Arc<dyn Clock>,
    settings: AccountSettings,
}

/// Values the account flows need from configuration.
#[derive(Debug, Clone)]
pub struct AccountSettings {
    pub confirm_url: String,
    pub product_name: String,
    pub upstream_timeout: Duration,
}

impl<A> AccountService<A>
where
    A: AccountRepository + 'static,
{
    pub fn new(
        repository: Arc<A>,
        mailer: Arc<dyn Mailer>,
        tokens: Arc<dyn TokenProvider>,
        settings: AccountSettings,
    ) -> Self {
        Self {
            repository,
            mailer,
            tokens,
            clock: Arc::new(SystemClock),
            settings,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate, send the confirmation e-mail, then store the pending account.
    ///
    /// Nothing is stored when the e-mail cannot be sent.
    pub async fn register(&self, request: RegisterRequest) -> Result<UserAccount, AccountError> {
        let role = Role::parse(&request.role)
            .filter(|role| role.self_registrable())
            .ok_or(AccountError::InvalidRole)?;
        let email = normalize_email(&request.email).ok_or(AccountError::InvalidEmail)?;
        if request.password.is_empty() {
            return Err(AccountError::MissingPassword);
        }
        if self.repository.fetch(&email)?.is_some() {
            return Err(AccountError::Duplicate);
        }

        let token = random_token(CONFIRMATION_TOKEN_LEN);
        let message = confirmation_email(
            &email,
            role,
            &self.settings.product_name,
            &self.confirmation_link(&token),
        );

        tokio::time::timeout(self.settings.upstream_timeout, self.mailer.send(&message))
            .await
            .unwrap_or(Err(MailError::TimedOut))
            .map_err(|error| {
                warn!(%error, role = %role, "confirmation e-mail not sent");
                AccountError::Mail(error)
            })?;

        let account = UserAccount {
            email,
            password: request.password,
            role,
            confirmed: false,
            created_at: self.clock.now(),
        };
        let stored = self
            .repository
            .insert(account, Some(token))
            .map_err(|error| match error {
                RepositoryError::Conflict => AccountError::Duplicate,
                other => AccountError::Repository(other),
            })?;

        info!(role = %stored.role, "registration accepted; awaiting confirmation");
        Ok(stored)
    }

    fn confirmation_link(&self, token: &str) -> String {
        let separator = if self.settings.confirm_url.contains('?') {
            '&'
        } else {
            '?'
        };
        format!("{}{}token={}", self.settings.confirm_url, separator, token)
    }

    pub fn confirm(&self, token: &str) -> Result<UserAccount, AccountError> {
        let account = self
            .repository
            .confirm(token.trim())
            .map_err(|error| match error {
                RepositoryError::NotFound => AccountError::InvalidConfirmationToken,
                other => AccountError::Repository(other),
            })?;

        info!(role = %account.role, "account confirmed");
        Ok(account)
    }

    /// Check credentials, exchange for a payer access token, and open a session.
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, AccountError> {
        let email = normalize_email(&request.email).ok_or(AccountError::InvalidCredentials)?;
        let account = self
            .repository
            .fetch(&email)?
            .filter(|account| account.password == request.password)
            .ok_or(AccountError::InvalidCredentials)?;
        if !account.confirmed {
            return Err(AccountError::EmailNotConfirmed);
        }

        let access_token =
            tokio::time::timeout(self.settings.upstream_timeout, self.tokens.access_token())
                .await
                .unwrap_or(Err(TokenError::TimedOut))
                .map_err(|error| {
                    warn!(%error, "payer token exchange failed");
                    AccountError::Token(error)
                })?;

        let session_token = random_token(SESSION_TOKEN_LEN);
        self.repository
            .open_session(&account.email, session_token.clone())?;

        info!(role = %account.role, "login succeeded");
        Ok(LoginResponse {
            user: account.summary(),
            availity_access_token: access_token,
            session_token,
        })
    }

    /// Create the configured admin as a confirmed account; an existing account is left alone.
    pub fn seed_admin(&self, seed: &AdminSeed) -> Result<(), AccountError> {
        let email = normalize_email(&seed.email).ok_or(AccountError::InvalidEmail)?;
        let account = UserAccount {
            email,
            password: seed.password.clone(),
            role: Role::Admin,
            confirmed: true,
            created_at: self.clock.now(),
        };

        match self.repository.insert(account, None) {
            Ok(_) => {
                info!("admin account seeded");
                Ok(())
            }
            Err(RepositoryError::Conflict) => {
                info!("admin account already present; seed skipped");
                Ok(())
            }
            Err(other) => Err(AccountError::Repository(other)),
        }
    }
}

impl<A> SessionResolver for AccountService<A>
where
    A: AccountRepository + 'static,
{
    fn resolve(&self, token: &str) -> Option<Actor> {
        match self.repository.session(token) {
            Ok(account) => account.map(|account| Actor::user(account.email, account.role)),
            Err(error) => {
                warn!(%error, "session lookup failed");
                None
            }
        }
    }
}

/// Error raised by the account service.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("Invalid role. Only provider or rep allowed.")]
    InvalidRole,
    #[error("A valid email address is required.")]
    InvalidEmail,
    #[error("Password is required.")]
    MissingPassword,
    #[error("User already exists.")]
    Duplicate,
    #[error("Registration failed: could not send confirmation email. Please contact support.")]
    Mail(#[source] MailError),
    #[error("Invalid confirmation token.")]
    InvalidConfirmationToken,
    #[error("Invalid credentials.")]
    InvalidCredentials,
    #[error("Email not confirmed.")]
    EmailNotConfirmed,
    #[error("Failed to get Availity token: {0}")]
    Token(#[source] TokenError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

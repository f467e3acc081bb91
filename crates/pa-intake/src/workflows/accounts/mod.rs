//! Provider and rep self-registration with e-mail confirmation, login, and session tokens.

pub mod domain;
pub mod mailer;
pub mod repository;
pub mod router;
pub mod service;
pub mod store;
pub mod tokens;

#[cfg(test)]
mod tests;

pub use domain::{
    normalize_email, ConfirmRequest, LoginRequest, LoginResponse, RegisterRequest, UserAccount,
    UserSummary,
};
pub use mailer::{confirmation_email, EmailMessage, LogMailer, MailError, Mailer};
pub use repository::AccountRepository;
pub use router::account_router;
pub use service::{AccountError, AccountService, AccountSettings};
pub use store::InMemoryAccountRepository;
pub use tokens::{StaticTokenProvider, TokenError, TokenProvider};

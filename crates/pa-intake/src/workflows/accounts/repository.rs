use super::domain::UserAccount;
use crate::workflows::RepositoryError;

/// Account, pending confirmation, and session storage.
pub trait AccountRepository: Send + Sync {
    /// Store a new account with its pending confirmation token. `Conflict` when the email exists.
    fn insert(
        &self,
        account: UserAccount,
        confirmation_token: Option<String>,
    ) -> Result<UserAccount, RepositoryError>;
    fn fetch(&self, email: &str) -> Result<Option<UserAccount>, RepositoryError>;
    /// Mark the account owning `token` confirmed. Tokens stay valid, so confirming twice succeeds.
    fn confirm(&self, token: &str) -> Result<UserAccount, RepositoryError>;
    fn open_session(&self, email: &str, session_token: String) -> Result<(), RepositoryError>;
    fn session(&self, session_token: &str) -> Result<Option<UserAccount>, RepositoryError>;
}

use std::collections::HashMap;

use parking_lot::RwLock;

use super::domain::UserAccount;
use super::repository::AccountRepository;
use crate::workflows::RepositoryError;

#[derive(Default)]
struct AccountTables {
    accounts: HashMap<String, UserAccount>,
    confirmations: HashMap<String, String>,
    sessions: HashMap<String, String>,
}

/// Process-local account store; all three tables change under one lock.
#[derive(Default)]
pub struct InMemoryAccountRepository {
    tables: RwLock<AccountTables>,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountRepository for InMemoryAccountRepository {
    fn insert(
        &self,
        account: UserAccount,
        confirmation_token: Option<String>,
    ) -> Result<UserAccount, RepositoryError> {
        let mut tables = self.tables.write();
        if tables.accounts.contains_key(&account.email) {
            return Err(RepositoryError::Conflict);
        }

        if let Some(token) = confirmation_token {
            tables.confirmations.insert(token, account.email.clone());
        }
        tables
            .accounts
            .insert(account.email.clone(), account.clone());
        Ok(account)
    }

    fn fetch(&self, email: &str) -> Result<Option<UserAccount>, RepositoryError> {
        Ok(self.tables.read().accounts.get(email).cloned())
    }

    fn confirm(&self, token: &str) -> Result<UserAccount, RepositoryError> {
        let mut tables = self.tables.write();
        let email = tables
            .confirmations
            .get(token)
            .cloned()
            .ok_or(RepositoryError::NotFound)?;
        let account = tables
            .accounts
            .get_mut(&email)
            .ok_or(RepositoryError::NotFound)?;
        account.confirmed = true;
        Ok(account.clone())
    }

    fn open_session(&self, email: &str, session_token: String) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write();
        if !tables.accounts.contains_key(email) {
            return Err(RepositoryError::NotFound);
        }
        tables.sessions.insert(session_token, email.to_string());
        Ok(())
    }

    fn session(&self, session_token: &str) -> Result<Option<UserAccount>, RepositoryError> {
        let tables = self.tables.read();
        Ok(tables
            .sessions
            .get(session_token)
            .and_then(|email| tables.accounts.get(email))
            .cloned())
    }
}

use super::domain::{Submission, SubmissionId};
use crate::workflows::RepositoryError;

/// Storage abstraction so the service module can be exercised in isolation.
///
/// `modify` is the only mutation path after insert: implementations must run `apply` with
/// exclusive access to the one record and persist the result only when `apply` succeeds.
pub trait SubmissionRepository: Send + Sync {
    fn insert(&self, submission: Submission) -> Result<Submission, RepositoryError>;
    fn fetch(&self, id: &SubmissionId) -> Result<Option<Submission>, RepositoryError>;
    /// All records in insertion order.
    fn list(&self) -> Result<Vec<Submission>, RepositoryError>;
    fn modify<T, E, F>(&self, id: &SubmissionId, apply: F) -> Result<T, E>
    where
        F: FnOnce(&mut Submission) -> Result<T, E>,
        E: From<RepositoryError>;
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;

use super::domain::{Submission, SubmissionId};
use super::repository::SubmissionRepository;
use crate::workflows::RepositoryError;

struct Slot {
    sequence: u64,
    submission: Submission,
}

/// Process-local submission table.
///
/// Each record sits behind its own mutex inside a sharded map: writers to one submission
/// serialize on that record while writers to other submissions proceed untouched.
#[derive(Default)]
pub struct InMemorySubmissionRepository {
    records: DashMap<SubmissionId, Arc<Mutex<Slot>>>,
    sequence: AtomicU64,
}

impl InMemorySubmissionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn slot(&self, id: &SubmissionId) -> Option<Arc<Mutex<Slot>>> {
        self.records.get(id).map(|entry| Arc::clone(entry.value()))
    }
}

impl SubmissionRepository for InMemorySubmissionRepository {
    fn insert(&self, submission: Submission) -> Result<Submission, RepositoryError> {
        match self.records.entry(submission.id.clone()) {
            Entry::Occupied(_) => Err(RepositoryError::Conflict),
            Entry::Vacant(vacant) => {
                let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
                vacant.insert(Arc::new(Mutex::new(Slot {
                    sequence,
                    submission: submission.clone(),
                })));
                Ok(submission)
            }
        }
    }

    fn fetch(&self, id: &SubmissionId) -> Result<Option<Submission>, RepositoryError> {
        Ok(self.slot(id).map(|slot| slot.lock().submission.clone()))
    }

    fn list(&self) -> Result<Vec<Submission>, RepositoryError> {
        let slots: Vec<Arc<Mutex<Slot>>> = self
            .records
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut ordered: Vec<(u64, Submission)> = slots
            .iter()
            .map(|slot| {
                let guard = slot.lock();
                (guard.sequence, guard.submission.clone())
            })
            .collect();
        ordered.sort_by_key(|(sequence, _)| *sequence);

        Ok(ordered
            .into_iter()
            .map(|(_, submission)| submission)
            .collect())
    }

    fn modify<T, E, F>(&self, id: &SubmissionId, apply: F) -> Result<T, E>
    where
        F: FnOnce(&mut Submission) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let slot = self.slot(id).ok_or(RepositoryError::NotFound)?;
        let mut guard = slot.lock();

        let mut draft = guard.submission.clone();
        let outcome = apply(&mut draft)?;
        guard.submission = draft;
        Ok(outcome)
    }
}

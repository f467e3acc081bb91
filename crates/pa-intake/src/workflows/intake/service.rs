use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use super::domain::{
    Document, DocumentCategory, DocumentView, PaRequest, PaStatus, StatusHistoryEntry,
    Submission, SubmissionFilter, SubmissionId,
};
use super::eligibility::{
    AutomatedEligibility, CoverageQuery, EligibilityGateway, EligibilityLookupError,
    EligibilityUpdate,
};
use super::report::{self, IntakeSummary};
use super::repository::SubmissionRepository;
use super::validation::{validate_request, ValidationError};
use crate::workflows::access::{AccessDenied, Action, Actor};
use crate::workflows::clock::{Clock, SystemClock};
use crate::workflows::RepositoryError;

/// Sentinel the dashboard sends to clear an assignment.
pub const UNASSIGNED: &str = "Unassigned";

/// Submission lifecycle: intake, review, assignment, eligibility, documents, and reporting.
pub struct IntakeService<R> {
    repository: Arc<R>,
    eligibility: Arc<dyn EligibilityGateway>,
    clock: Arc<dyn Clock>,
    lookup_timeout: Duration,
}

/// File received for attachment to a submission.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub filename: String,
    pub content: Vec<u8>,
    pub category: DocumentCategory,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkStatusFailure {
    pub submission_id: SubmissionId,
    pub error: String,
}

/// Per-submission results of a bulk status change.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkStatusOutcome {
    pub updated: Vec<SubmissionId>,
    pub failed: Vec<BulkStatusFailure>,
}

impl<R> IntakeService<R>
where
    R: SubmissionRepository + 'static,
{
    pub fn new(
        repository: Arc<R>,
        eligibility: Arc<dyn EligibilityGateway>,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            repository,
            eligibility,
            clock: Arc::new(SystemClock),
            lookup_timeout,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate and store a new request, attempting one coverage lookup when a credential is given.
    pub async fn create(
        &self,
        actor: &Actor,
        request: PaRequest,
        credential: Option<&str>,
    ) -> Result<Submission, IntakeError> {
        let today = self.clock.now().date_naive();
        let validated = validate_request(request, today)?;
        actor.authorize_create(&validated.provider_npi)?;

        let automated = match credential.map(str::trim).filter(|token| !token.is_empty()) {
            Some(token) => {
                let query = CoverageQuery {
                    provider_npi: validated.provider_npi.clone(),
                    member_id: validated.member_id.clone(),
                    payer_id: validated.insurance.clone(),
                    birth_date: validated.patient_dob.format("%Y-%m-%d").to_string(),
                };
                self.lookup_coverage(token, &query).await
            }
            None => AutomatedEligibility::skipped(),
        };

        let submission = Submission::open(
            SubmissionId::generate(),
            validated,
            automated,
            self.clock.now(),
        );
        let stored = self.repository.insert(submission)?;

        info!(
            submission_id = %stored.id,
            eligibility_lookup = ?stored.automated_eligibility.lookup,
            "prior authorization request submitted"
        );
        Ok(stored)
    }

    async fn lookup_coverage(
        &self,
        credential: &str,
        query: &CoverageQuery,
    ) -> AutomatedEligibility {
        let lookup = tokio::time::timeout(
            self.lookup_timeout,
            self.eligibility.check_coverage(credential, query),
        )
        .await
        .unwrap_or(Err(EligibilityLookupError::TimedOut));

        match lookup {
            Ok(payload) => AutomatedEligibility::succeeded(payload),
            Err(error) => {
                warn!(%error, "coverage lookup failed; storing error payload");
                AutomatedEligibility::failed(&error)
            }
        }
    }

    pub fn get(&self, actor: &Actor, id: &SubmissionId) -> Result<Submission, IntakeError> {
        let submission = self
            .repository
            .fetch(id)?
            .ok_or(IntakeError::NotFound)?;
        actor.authorize(Action::View, &submission)?;
        Ok(submission)
    }

    /// Submissions visible to `actor` that match `filter`, in creation order.
    pub fn list(
        &self,
        actor: &Actor,
        filter: &SubmissionFilter,
    ) -> Result<Vec<Submission>, IntakeError> {
        Ok(self
            .repository
            .list()?
            .into_iter()
            .filter(|submission| actor.can_view(submission) && filter.matches(submission))
            .collect())
    }

    pub fn update_status(
        &self,
        actor: &Actor,
        id: &SubmissionId,
        new_status: &str,
        note: Option<&str>,
    ) -> Result<Vec<StatusHistoryEntry>, IntakeError> {
        let status = parse_status(new_status)?;
        self.record_status(actor, id, status, note)
    }

    fn record_status(
        &self,
        actor: &Actor,
        id: &SubmissionId,
        status: PaStatus,
        note: Option<&str>,
    ) -> Result<Vec<StatusHistoryEntry>, IntakeError> {
        let now = self.clock.now();
        let history = self
            .repository
            .modify(id, |submission| -> Result<_, IntakeError> {
                actor.authorize(Action::UpdateStatus, submission)?;
                Ok(submission.record_status(status, note, now).to_vec())
            })?;

        info!(submission_id = %id, status = %status, "status updated");
        Ok(history)
    }

    /// Apply one status change to many submissions; failures are reported per ID.
    pub fn bulk_update_status(
        &self,
        actor: &Actor,
        ids: &[SubmissionId],
        new_status: &str,
        note: Option<&str>,
    ) -> Result<BulkStatusOutcome, IntakeError> {
        let status = parse_status(new_status)?;
        let mut outcome = BulkStatusOutcome::default();

        for id in ids {
            match self.record_status(actor, id, status, note) {
                Ok(_) => outcome.updated.push(id.clone()),
                Err(error) => outcome.failed.push(BulkStatusFailure {
                    submission_id: id.clone(),
                    error: error.to_string(),
                }),
            }
        }

        info!(
            status = %status,
            updated = outcome.updated.len(),
            failed = outcome.failed.len(),
            "bulk status update applied"
        );
        Ok(outcome)
    }

    /// Set or clear the responsible rep; returns the stored assignment.
    pub fn assign(
        &self,
        actor: &Actor,
        id: &SubmissionId,
        rep: &str,
    ) -> Result<Option<String>, IntakeError> {
        let rep = rep.trim();
        let assignment = if rep.is_empty() || rep.eq_ignore_ascii_case(UNASSIGNED) {
            None
        } else {
            Some(rep.to_string())
        };

        let stored = self
            .repository
            .modify(id, |submission| -> Result<_, IntakeError> {
                actor.authorize(Action::Assign, submission)?;
                submission.assigned_rep = assignment;
                Ok(submission.assigned_rep.clone())
            })?;

        info!(submission_id = %id, assigned = stored.is_some(), "assignment changed");
        Ok(stored)
    }

    pub fn update_eligibility(
        &self,
        actor: &Actor,
        id: &SubmissionId,
        update: &EligibilityUpdate,
    ) -> Result<Submission, IntakeError> {
        let updated = self
            .repository
            .modify(id, |submission| -> Result<_, IntakeError> {
                actor.authorize(Action::UpdateEligibility, submission)?;
                submission.apply_eligibility(update);
                Ok(submission.clone())
            })?;

        info!(
            submission_id = %id,
            checked = updated.eligibility.checked,
            method = updated.eligibility.method.label(),
            "manual eligibility recorded"
        );
        Ok(updated)
    }

    pub fn attach(
        &self,
        actor: &Actor,
        id: &SubmissionId,
        upload: DocumentUpload,
    ) -> Result<DocumentView, IntakeError> {
        let filename = upload.filename.trim().to_string();
        if filename.is_empty() {
            let error = ValidationError::MalformedUpload("file name is required".to_string());
            return Err(error.into());
        }

        let now = self.clock.now();
        let view = self
            .repository
            .modify(id, |submission| -> Result<_, IntakeError> {
                actor.authorize(Action::Attach, submission)?;
                let index = submission.attach(Document {
                    filename,
                    content: upload.content.into(),
                    category: upload.category,
                    uploaded_at: now,
                });
                Ok(DocumentView::of(index, &submission.documents()[index]))
            })?;

        info!(
            submission_id = %id,
            index = view.index,
            size_bytes = view.size_bytes,
            category = ?view.category,
            "document attached"
        );
        Ok(view)
    }

    pub fn document(
        &self,
        actor: &Actor,
        id: &SubmissionId,
        index: usize,
    ) -> Result<Document, IntakeError> {
        let submission = self.get(actor, id)?;
        submission
            .documents()
            .get(index)
            .cloned()
            .ok_or(IntakeError::DocumentNotFound { index })
    }

    pub fn summary(
        &self,
        actor: &Actor,
        filter: &SubmissionFilter,
    ) -> Result<IntakeSummary, IntakeError> {
        let submissions = self.list(actor, filter)?;
        Ok(report::summarize(&submissions))
    }

    pub fn export_csv(
        &self,
        actor: &Actor,
        filter: &SubmissionFilter,
    ) -> Result<Vec<u8>, IntakeError> {
        let submissions = self.list(actor, filter)?;
        Ok(report::export_csv(&submissions)?)
    }
}

pub(crate) fn parse_status(raw: &str) -> Result<PaStatus, ValidationError> {
    PaStatus::parse(raw).ok_or_else(|| ValidationError::UnknownStatus(raw.trim().to_string()))
}

/// Error raised by the intake service.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Submission not found.")]
    NotFound,
    #[error("Document {index} not found on this submission.")]
    DocumentNotFound { index: usize },
    #[error(transparent)]
    Forbidden(#[from] AccessDenied),
    #[error("a valid session token is required")]
    Unauthenticated,
    #[error(transparent)]
    Repository(RepositoryError),
    #[error("failed to render export: {0}")]
    Export(#[from] csv::Error),
}

impl From<RepositoryError> for IntakeError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound => IntakeError::NotFound,
            other => IntakeError::Repository(other),
        }
    }
}

//! Prior authorization intake: submission, status review, rep assignment, eligibility, and
//! supporting documents.
//!
//! Records live behind [`SubmissionRepository`]; [`IntakeService`] owns the workflow rules and
//! [`intake_router`] exposes them over HTTP.

pub mod domain;
pub mod eligibility;
pub mod report;
pub mod repository;
pub mod router;
pub mod service;
pub mod store;
pub mod validation;

#[cfg(test)]
pub(crate) mod tests;

pub use domain::{
    Document, DocumentCategory, DocumentView, PaRequest, PaStatus, StatusHistoryEntry,
    Submission, SubmissionFilter, SubmissionId, SubmissionView,
};
pub use eligibility::{
    AutomatedEligibility, CoverageQuery, EligibilityGateway, EligibilityLookup,
    EligibilityLookupError, EligibilityMethod, EligibilityUpdate, ManualEligibility,
    SKIPPED_ELIGIBILITY_NOTICE,
};
pub use report::{IntakeSummary, StatusCountEntry};
pub use repository::SubmissionRepository;
pub use router::{intake_router, IntakeState, SESSION_HEADER};
pub use service::{BulkStatusOutcome, DocumentUpload, IntakeError, IntakeService};
pub use store::InMemorySubmissionRepository;
pub use validation::ValidationError;

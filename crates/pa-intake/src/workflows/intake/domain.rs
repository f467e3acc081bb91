use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::eligibility::{
    AutomatedEligibility, EligibilityMethod, EligibilityUpdate, ManualEligibility,
};

/// Identifier wrapper for submitted PA requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(pub String);

impl SubmissionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fields a provider supplies when opening a PA request.
///
/// Every field defaults to empty so missing input surfaces as a validation error rather than a
/// deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaRequest {
    pub provider_npi: String,
    pub patient_name: String,
    pub patient_dob: String,
    pub insurance: String,
    pub member_id: String,
    pub service: String,
    pub diagnosis_code: String,
    pub notes: Option<String>,
}

/// Trimmed, parsed form of [`PaRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub provider_npi: String,
    pub patient_name: String,
    pub patient_dob: NaiveDate,
    pub insurance: String,
    pub member_id: String,
    pub service: String,
    pub diagnosis_code: String,
    pub notes: Option<String>,
}

/// Review status of a PA request. Any status may follow any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaStatus {
    Submitted,
    #[serde(rename = "In Review")]
    InReview,
    Approved,
    Denied,
}

impl PaStatus {
    pub const fn label(self) -> &'static str {
        match self {
            PaStatus::Submitted => "Submitted",
            PaStatus::InReview => "In Review",
            PaStatus::Approved => "Approved",
            PaStatus::Denied => "Denied",
        }
    }

    pub const fn ordered() -> [PaStatus; 4] {
        [
            PaStatus::Submitted,
            PaStatus::InReview,
            PaStatus::Approved,
            PaStatus::Denied,
        ]
    }

    /// Accepts the dashboard labels plus snake/compact spellings, case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .trim()
            .chars()
            .filter(|ch| !matches!(ch, ' ' | '_' | '-'))
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "submitted" => Some(PaStatus::Submitted),
            "inreview" => Some(PaStatus::InReview),
            "approved" => Some(PaStatus::Approved),
            "denied" => Some(PaStatus::Denied),
            _ => None,
        }
    }

    /// Approved and denied requests count toward turnaround.
    pub const fn is_decided(self) -> bool {
        matches!(self, PaStatus::Approved | PaStatus::Denied)
    }
}

impl fmt::Display for PaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: PaStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    #[default]
    Supporting,
    EligibilityEvidence,
}

impl DocumentCategory {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "" | "supporting" | "pa" => Some(DocumentCategory::Supporting),
            "eligibility_evidence" | "eligibility" | "evidence" => {
                Some(DocumentCategory::EligibilityEvidence)
            }
            _ => None,
        }
    }
}

/// Uploaded file owned by a single submission. Clones share the file bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Document {
    pub filename: String,
    pub content: Arc<[u8]>,
    pub category: DocumentCategory,
    pub uploaded_at: DateTime<Utc>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("filename", &self.filename)
            .field("size_bytes", &self.content.len())
            .field("category", &self.category)
            .field("uploaded_at", &self.uploaded_at)
            .finish()
    }
}

/// A PA request together with its review trail.
///
/// Status, history, and documents are append-only and only change through the methods below so
/// the current status always mirrors the last history entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub id: SubmissionId,
    pub provider_npi: String,
    pub patient_name: String,
    pub patient_dob: NaiveDate,
    pub insurance: String,
    pub member_id: String,
    pub service: String,
    pub diagnosis_code: String,
    pub notes: Option<String>,
    pub assigned_rep: Option<String>,
    pub eligibility: ManualEligibility,
    pub automated_eligibility: AutomatedEligibility,
    pub created_at: DateTime<Utc>,
    status: PaStatus,
    status_history: Vec<StatusHistoryEntry>,
    documents: Vec<Document>,
}

impl Submission {
    pub fn open(
        id: SubmissionId,
        request: ValidatedRequest,
        automated_eligibility: AutomatedEligibility,
        now: DateTime<Utc>,
    ) -> Self {
        let ValidatedRequest {
            provider_npi,
            patient_name,
            patient_dob,
            insurance,
            member_id,
            service,
            diagnosis_code,
            notes,
        } = request;

        Self {
            id,
            provider_npi,
            patient_name,
            patient_dob,
            insurance,
            member_id,
            service,
            diagnosis_code,
            notes,
            assigned_rep: None,
            eligibility: ManualEligibility::default(),
            automated_eligibility,
            created_at: now,
            status: PaStatus::Submitted,
            status_history: vec![StatusHistoryEntry {
                status: PaStatus::Submitted,
                timestamp: now,
            }],
            documents: Vec::new(),
        }
    }

    pub fn status(&self) -> PaStatus {
        self.status
    }

    pub fn status_history(&self) -> &[StatusHistoryEntry] {
        &self.status_history
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn eligibility_evidence(&self) -> impl Iterator<Item = &Document> {
        self.documents
            .iter()
            .filter(|document| document.category == DocumentCategory::EligibilityEvidence)
    }

    /// Append a status change; a non-blank note is appended to the notes blob as a timestamped line.
    pub fn record_status(
        &mut self,
        status: PaStatus,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> &[StatusHistoryEntry] {
        let timestamp = self
            .status_history
            .last()
            .map_or(now, |last| last.timestamp.max(now));

        self.status_history.push(StatusHistoryEntry { status, timestamp });
        self.status = status;

        if let Some(note) = note.map(str::trim).filter(|note| !note.is_empty()) {
            let line = format!("[{}] {}", timestamp.to_rfc3339(), note);
            match self.notes.as_mut() {
                Some(notes) if !notes.is_empty() => {
                    notes.push('\n');
                    notes.push_str(&line);
                }
                _ => self.notes = Some(line),
            }
        }

        &self.status_history
    }

    pub fn apply_eligibility(&mut self, update: &EligibilityUpdate) {
        update.apply_to(&mut self.eligibility);
    }

    /// Returns the index of the stored document.
    pub fn attach(&mut self, document: Document) -> usize {
        self.documents.push(document);
        self.documents.len() - 1
    }

    /// Hours from the first history entry to the latest approval or denial.
    pub fn turnaround_hours(&self) -> Option<f64> {
        let start = self.status_history.first()?.timestamp;
        let decided = self
            .status_history
            .iter()
            .rev()
            .find(|entry| entry.status.is_decided())?
            .timestamp;
        Some((decided - start).num_seconds() as f64 / 3600.0)
    }

    pub fn view(&self) -> SubmissionView {
        SubmissionView {
            id: self.id.clone(),
            provider_npi: self.provider_npi.clone(),
            patient_name: self.patient_name.clone(),
            patient_dob: self.patient_dob,
            insurance: self.insurance.clone(),
            member_id: self.member_id.clone(),
            service: self.service.clone(),
            diagnosis_code: self.diagnosis_code.clone(),
            notes: self.notes.clone(),
            status: self.status,
            status_history: self.status_history.clone(),
            documents: self
                .documents
                .iter()
                .enumerate()
                .map(|(index, document)| DocumentView::of(index, document))
                .collect(),
            assigned_rep: self.assigned_rep.clone(),
            eligibility_checked: self.eligibility.checked,
            eligibility_method: self.eligibility.method,
            eligibility_notes: self.eligibility.notes.clone(),
            eligibility_evidence: self
                .documents
                .iter()
                .enumerate()
                .filter(|(_, document)| document.category == DocumentCategory::EligibilityEvidence)
                .map(|(index, document)| DocumentView::of(index, document))
                .collect(),
            automated_eligibility: self.automated_eligibility.clone(),
            created_at: self.created_at,
        }
    }
}

/// Wire representation of a submission; document bodies are served separately.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionView {
    pub id: SubmissionId,
    pub provider_npi: String,
    pub patient_name: String,
    pub patient_dob: NaiveDate,
    pub insurance: String,
    pub member_id: String,
    pub service: String,
    pub diagnosis_code: String,
    pub notes: Option<String>,
    pub status: PaStatus,
    pub status_history: Vec<StatusHistoryEntry>,
    pub documents: Vec<DocumentView>,
    pub assigned_rep: Option<String>,
    pub eligibility_checked: bool,
    pub eligibility_method: EligibilityMethod,
    pub eligibility_notes: String,
    pub eligibility_evidence: Vec<DocumentView>,
    #[serde(flatten)]
    pub automated_eligibility: AutomatedEligibility,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentView {
    pub index: usize,
    pub filename: String,
    pub category: DocumentCategory,
    pub size_bytes: usize,
    pub uploaded_at: DateTime<Utc>,
}

impl DocumentView {
    pub fn of(index: usize, document: &Document) -> Self {
        Self {
            index,
            filename: document.filename.clone(),
            category: document.category,
            size_bytes: document.content.len(),
            uploaded_at: document.uploaded_at,
        }
    }
}

/// Dashboard filters applied on top of the caller's visible set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionFilter {
    pub status: Option<PaStatus>,
    pub assigned_rep: Option<String>,
    pub provider_npi: Option<String>,
}

impl SubmissionFilter {
    pub fn matches(&self, submission: &Submission) -> bool {
        if let Some(status) = self.status {
            if submission.status() != status {
                return false;
            }
        }

        if let Some(rep) = &self.assigned_rep {
            if submission.assigned_rep.as_deref() != Some(rep.as_str()) {
                return false;
            }
        }

        if let Some(provider) = &self.provider_npi {
            if &submission.provider_npi != provider {
                return false;
            }
        }

        true
    }
}

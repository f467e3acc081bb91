//! Automated (payer API) and manual (rep-entered) eligibility verification.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Placeholder stored when a submission arrives without a payer credential.
pub const SKIPPED_ELIGIBILITY_NOTICE: &str =
    "No Availity token provided. Skipped eligibility check.";

/// How a rep verified coverage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EligibilityMethod {
    #[default]
    #[serde(rename = "", alias = "None", alias = "none")]
    None,
    Availity,
    Phone,
    Fax,
    #[serde(rename = "Online Portal", alias = "Portal")]
    Portal,
    Other,
}

impl EligibilityMethod {
    pub const fn label(self) -> &'static str {
        match self {
            EligibilityMethod::None => "",
            EligibilityMethod::Availity => "Availity",
            EligibilityMethod::Phone => "Phone",
            EligibilityMethod::Fax => "Fax",
            EligibilityMethod::Portal => "Online Portal",
            EligibilityMethod::Other => "Other",
        }
    }
}

/// Rep-maintained verification fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManualEligibility {
    pub checked: bool,
    pub method: EligibilityMethod,
    pub notes: String,
}

/// Partial update: `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EligibilityUpdate {
    #[serde(default, rename = "eligibility_checked")]
    pub checked: Option<bool>,
    #[serde(default, rename = "eligibility_method")]
    pub method: Option<EligibilityMethod>,
    #[serde(default, rename = "eligibility_notes")]
    pub notes: Option<String>,
}

impl EligibilityUpdate {
    pub fn is_empty(&self) -> bool {
        self.checked.is_none() && self.method.is_none() && self.notes.is_none()
    }

    pub(crate) fn apply_to(&self, record: &mut ManualEligibility) {
        if let Some(checked) = self.checked {
            record.checked = checked;
        }
        if let Some(method) = self.method {
            record.method = method;
        }
        if let Some(notes) = &self.notes {
            record.notes = notes.clone();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityLookup {
    NotAttempted,
    Succeeded,
    Failed,
}

/// Outcome of the one automated lookup attempted at creation time.
///
/// `response` holds the payer payload verbatim, the captured error payload, or the skip notice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomatedEligibility {
    #[serde(rename = "eligibility_lookup")]
    pub lookup: EligibilityLookup,
    #[serde(rename = "eligibility_response")]
    pub response: Value,
}

impl AutomatedEligibility {
    pub fn skipped() -> Self {
        Self {
            lookup: EligibilityLookup::NotAttempted,
            response: Value::String(SKIPPED_ELIGIBILITY_NOTICE.to_string()),
        }
    }

    pub fn succeeded(response: Value) -> Self {
        Self {
            lookup: EligibilityLookup::Succeeded,
            response,
        }
    }

    pub fn failed(error: &EligibilityLookupError) -> Self {
        Self {
            lookup: EligibilityLookup::Failed,
            response: error.payload(),
        }
    }
}

/// Parameters sent to the coverage endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageQuery {
    pub provider_npi: String,
    pub member_id: String,
    pub payer_id: String,
    pub birth_date: String,
}

/// External coverage lookup keyed by provider, member, payer, and birth date.
#[async_trait]
pub trait EligibilityGateway: Send + Sync {
    async fn check_coverage(
        &self,
        credential: &str,
        query: &CoverageQuery,
    ) -> Result<Value, EligibilityLookupError>;
}

#[derive(Debug, thiserror::Error)]
pub enum EligibilityLookupError {
    #[error("coverage lookup rejected with status {status}")]
    Rejected { status: u16, body: String },
    #[error("coverage lookup failed: {0}")]
    Transport(String),
    #[error("coverage lookup timed out")]
    TimedOut,
}

impl EligibilityLookupError {
    /// JSON body persisted on the submission in place of a payer response.
    pub fn payload(&self) -> Value {
        match self {
            EligibilityLookupError::Rejected { status, body } => {
                json!({ "error": body, "status_code": status })
            }
            other => json!({ "error": other.to_string() }),
        }
    }
}

use chrono::NaiveDate;

use super::domain::{PaRequest, ValidatedRequest};

/// Input errors raised before a request touches the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("{field} must be a YYYY-MM-DD date, got '{value}'")]
    MalformedDate { field: &'static str, value: String },
    #[error("{field} cannot be in the future")]
    FutureDate { field: &'static str },
    #[error("unknown status '{0}'; expected one of Submitted, In Review, Approved, Denied")]
    UnknownStatus(String),
    #[error("unknown document category '{0}'")]
    UnknownCategory(String),
    #[error("malformed upload: {0}")]
    MalformedUpload(String),
}

fn required(field: &'static str, value: String) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn parse_date_of_birth(
    raw: &str,
    today: NaiveDate,
) -> Result<NaiveDate, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField("patient_dob"));
    }

    let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| {
        ValidationError::MalformedDate {
            field: "patient_dob",
            value: trimmed.to_string(),
        }
    })?;

    if date > today {
        return Err(ValidationError::FutureDate {
            field: "patient_dob",
        });
    }

    Ok(date)
}

/// Check required fields and parse the birth date relative to `today`.
pub(crate) fn validate_request(
    request: PaRequest,
    today: NaiveDate,
) -> Result<ValidatedRequest, ValidationError> {
    let PaRequest {
        provider_npi,
        patient_name,
        patient_dob,
        insurance,
        member_id,
        service,
        diagnosis_code,
        notes,
    } = request;

    Ok(ValidatedRequest {
        provider_npi: required("provider_npi", provider_npi)?,
        patient_name: required("patient_name", patient_name)?,
        patient_dob: parse_date_of_birth(&patient_dob, today)?,
        insurance: required("insurance", insurance)?,
        member_id: required("member_id", member_id)?,
        service: required("service", service)?,
        diagnosis_code: required("diagnosis_code", diagnosis_code)?,
        notes: notes
            .map(|notes| notes.trim().to_string())
            .filter(|notes| !notes.is_empty()),
    })
}

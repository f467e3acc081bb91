use std::collections::BTreeMap;

use serde::Serialize;

use super::domain::{PaStatus, Submission};

const UNASSIGNED_LABEL: &str = "Unassigned";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCountEntry {
    pub status: PaStatus,
    pub status_label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntakeSummary {
    pub total: usize,
    pub by_status: Vec<StatusCountEntry>,
    pub by_rep: BTreeMap<String, usize>,
    pub by_provider: BTreeMap<String, usize>,
    pub completed: usize,
    pub average_turnaround_hours: Option<f64>,
}

/// Aggregate dashboard counters over an already-filtered set of submissions.
pub fn summarize(submissions: &[Submission]) -> IntakeSummary {
    let by_status = PaStatus::ordered()
        .into_iter()
        .map(|status| StatusCountEntry {
            status,
            status_label: status.label(),
            count: submissions
                .iter()
                .filter(|submission| submission.status() == status)
                .count(),
        })
        .collect();

    let mut by_rep = BTreeMap::new();
    let mut by_provider = BTreeMap::new();
    for submission in submissions {
        let rep = submission
            .assigned_rep
            .clone()
            .unwrap_or_else(|| UNASSIGNED_LABEL.to_string());
        *by_rep.entry(rep).or_insert(0) += 1;
        *by_provider
            .entry(submission.provider_npi.clone())
            .or_insert(0) += 1;
    }

    let turnarounds: Vec<f64> = submissions
        .iter()
        .filter(|submission| submission.status().is_decided())
        .filter_map(Submission::turnaround_hours)
        .collect();

    let average_turnaround_hours = if turnarounds.is_empty() {
        None
    } else {
        Some(turnarounds.iter().sum::<f64>() / turnarounds.len() as f64)
    };

    IntakeSummary {
        total: submissions.len(),
        by_status,
        by_rep,
        by_provider,
        completed: submissions
            .iter()
            .filter(|submission| submission.status().is_decided())
            .count(),
        average_turnaround_hours,
    }
}

const EXPORT_HEADER: [&str; 14] = [
    "submission_id",
    "provider_npi",
    "patient_name",
    "patient_dob",
    "insurance",
    "member_id",
    "service",
    "diagnosis_code",
    "status",
    "assigned_rep",
    "eligibility_checked",
    "eligibility_method",
    "created_at",
    "turnaround_hours",
];

/// Render submissions as CSV, one row per submission in the given order.
pub fn export_csv(submissions: &[Submission]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(EXPORT_HEADER)?;

    for submission in submissions {
        let turnaround = submission
            .turnaround_hours()
            .map(|hours| format!("{hours:.2}"))
            .unwrap_or_default();
        let patient_dob = submission.patient_dob.format("%Y-%m-%d").to_string();
        let created_at = submission.created_at.to_rfc3339();

        writer.write_record([
            submission.id.as_str(),
            submission.provider_npi.as_str(),
            submission.patient_name.as_str(),
            patient_dob.as_str(),
            submission.insurance.as_str(),
            submission.member_id.as_str(),
            submission.service.as_str(),
            submission.diagnosis_code.as_str(),
            submission.status().label(),
            submission.assigned_rep.as_deref().unwrap_or(""),
            if submission.eligibility.checked {
                "true"
            } else {
                "false"
            },
            submission.eligibility.method.label(),
            created_at.as_str(),
            turnaround.as_str(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))
}

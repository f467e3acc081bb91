//! Prior-authorization intake: submissions, status tracking, rep assignment, eligibility
//! verification, and the account flows that gate them.

pub mod config;
pub mod error;
pub mod integrations;
pub mod telemetry;
pub mod workflows;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::workflows::access::{Actor, SessionResolver};
use crate::workflows::clock::Clock;
use crate::workflows::intake::domain::{PaRequest, Submission, SubmissionId};
use crate::workflows::intake::eligibility::{
    AutomatedEligibility, CoverageQuery, EligibilityGateway, EligibilityLookupError,
};
use crate::workflows::intake::repository::SubmissionRepository;
use crate::workflows::intake::store::InMemorySubmissionRepository;
use crate::workflows::intake::validation::validate_request;
use crate::workflows::intake::{intake_router, IntakeService, IntakeState};
use crate::workflows::RepositoryError;

pub(crate) fn timestamp(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 1, 9, 0, 0)
        .single()
        .expect("valid timestamp")
        + ChronoDuration::minutes(minutes)
}

pub(crate) fn sample_request() -> PaRequest {
    PaRequest {
        provider_npi: "doc@example.com".to_string(),
        patient_name: "Jane Doe".to_string(),
        patient_dob: "1980-04-12".to_string(),
        insurance: "AETNA".to_string(),
        member_id: "M123456".to_string(),
        service: "MRI Lumbar Spine".to_string(),
        diagnosis_code: "M54.5".to_string(),
        notes: Some("Chronic low back pain".to_string()),
    }
}

/// Submission opened at `timestamp(0)` without an eligibility lookup.
pub(crate) fn open_submission(request: PaRequest) -> Submission {
    let validated =
        validate_request(request, timestamp(0).date_naive()).expect("sample request is valid");
    Submission::open(
        SubmissionId::generate(),
        validated,
        AutomatedEligibility::skipped(),
        timestamp(0),
    )
}

/// Clock the tests move by hand.
pub(crate) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(crate) fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub(crate) fn advance_minutes(&self, minutes: i64) {
        *self.now.lock() += ChronoDuration::minutes(minutes);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Coverage gateway returning a canned result and recording each call.
pub(crate) struct FakeGateway {
    outcome: Result<Value, (u16, String)>,
    calls: Mutex<Vec<(String, CoverageQuery)>>,
}

impl FakeGateway {
    pub(crate) fn responding(payload: Value) -> Self {
        Self {
            outcome: Ok(payload),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn rejecting(status: u16, body: &str) -> Self {
        Self {
            outcome: Err((status, body.to_string())),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<(String, CoverageQuery)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl EligibilityGateway for FakeGateway {
    async fn check_coverage(
        &self,
        credential: &str,
        query: &CoverageQuery,
    ) -> Result<Value, EligibilityLookupError> {
        self.calls
            .lock()
            .push((credential.to_string(), query.clone()));
        match &self.outcome {
            Ok(payload) => Ok(payload.clone()),
            Err((status, body)) => Err(EligibilityLookupError::Rejected {
                status: *status,
                body: body.clone(),
            }),
        }
    }
}

/// Gateway that never answers within any reasonable timeout.
pub(crate) struct StalledGateway;

#[async_trait]
impl EligibilityGateway for StalledGateway {
    async fn check_coverage(
        &self,
        _credential: &str,
        _query: &CoverageQuery,
    ) -> Result<Value, EligibilityLookupError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(json!({ "late": true }))
    }
}

pub(crate) struct UnavailableRepository;

impl SubmissionRepository for UnavailableRepository {
    fn insert(&self, _submission: Submission) -> Result<Submission, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &SubmissionId) -> Result<Option<Submission>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(&self) -> Result<Vec<Submission>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn modify<T, E, F>(&self, _id: &SubmissionId, _apply: F) -> Result<T, E>
    where
        F: FnOnce(&mut Submission) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        Err(RepositoryError::Unavailable("database offline".to_string()).into())
    }
}

/// Session table keyed by literal token.
#[derive(Default)]
pub(crate) struct FixedSessions {
    sessions: Vec<(String, Actor)>,
}

impl FixedSessions {
    pub(crate) fn with(mut self, token: &str, actor: Actor) -> Self {
        self.sessions.push((token.to_string(), actor));
        self
    }
}

impl SessionResolver for FixedSessions {
    fn resolve(&self, token: &str) -> Option<Actor> {
        self.sessions
            .iter()
            .find(|(candidate, _)| candidate == token)
            .map(|(_, actor)| actor.clone())
    }
}

pub(crate) struct Harness {
    pub(crate) service: Arc<IntakeService<InMemorySubmissionRepository>>,
    pub(crate) repository: Arc<InMemorySubmissionRepository>,
    pub(crate) gateway: Arc<FakeGateway>,
    pub(crate) clock: Arc<ManualClock>,
}

pub(crate) fn build_service() -> Harness {
    build_service_with(FakeGateway::responding(
        json!({ "coverages": [{ "status": "Active Coverage" }] }),
    ))
}

pub(crate) fn build_service_with(gateway: FakeGateway) -> Harness {
    let repository = Arc::new(InMemorySubmissionRepository::new());
    let gateway = Arc::new(gateway);
    let clock = Arc::new(ManualClock::starting_at(timestamp(0)));
    let service = IntakeService::new(
        repository.clone(),
        gateway.clone(),
        Duration::from_secs(10),
    )
    .with_clock(clock.clone());

    Harness {
        service: Arc::new(service),
        repository,
        gateway,
        clock,
    }
}

pub(crate) fn router_for(
    service: Arc<IntakeService<InMemorySubmissionRepository>>,
    sessions: FixedSessions,
    require_session: bool,
) -> axum::Router {
    intake_router(IntakeState::new(
        service,
        Arc::new(sessions),
        require_session,
    ))
}

pub(crate) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(crate) async fn read_body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body")
        .to_vec()
}

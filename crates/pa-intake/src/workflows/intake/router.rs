use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Deserializer};
use serde_json::json;

use super::domain::{DocumentCategory, PaRequest, SubmissionFilter, SubmissionId};
use super::eligibility::{EligibilityMethod, EligibilityUpdate};
use super::repository::SubmissionRepository;
use super::service::{parse_status, DocumentUpload, IntakeError, IntakeService, UNASSIGNED};
use super::validation::ValidationError;
use crate::workflows::access::{Actor, SessionResolver};
use crate::workflows::extract::{bad_request, JsonOrForm, QueryParams};

/// Header carrying the session token issued at login.
pub const SESSION_HEADER: &str = "x-session-token";

pub const UPLOAD_LIMIT_BYTES: usize = 25 * 1024 * 1024;

/// Shared state for the intake routes.
pub struct IntakeState<R> {
    pub service: Arc<IntakeService<R>>,
    pub sessions: Arc<dyn SessionResolver>,
    pub require_session: bool,
}

impl<R> Clone for IntakeState<R> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            sessions: Arc::clone(&self.sessions),
            require_session: self.require_session,
        }
    }
}

impl<R> IntakeState<R> {
    pub fn new(
        service: Arc<IntakeService<R>>,
        sessions: Arc<dyn SessionResolver>,
        require_session: bool,
    ) -> Self {
        Self {
            service,
            sessions,
            require_session,
        }
    }

    /// A presented token must resolve; a missing one is only accepted on open deployments.
    fn actor(&self, headers: &HeaderMap) -> Result<Actor, IntakeError> {
        let token = headers
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|token| !token.is_empty());

        match token {
            Some(token) => self
                .sessions
                .resolve(token)
                .ok_or(IntakeError::Unauthenticated),
            None if self.require_session => Err(IntakeError::Unauthenticated),
            None => Ok(Actor::System),
        }
    }
}

/// Router exposing submission intake, review, and dashboard endpoints.
pub fn intake_router<R>(state: IntakeState<R>) -> Router
where
    R: SubmissionRepository + 'static,
{
    Router::new()
        .route("/intake/submit", post(submit_handler::<R>))
        .route("/intake/list", get(list_handler::<R>))
        .route("/intake/get", get(get_handler::<R>))
        .route("/intake/update-status", post(update_status_handler::<R>))
        .route(
            "/intake/bulk-update-status",
            post(bulk_update_status_handler::<R>),
        )
        .route(
            "/intake/upload-doc",
            post(upload_handler::<R>).layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES)),
        )
        .route("/intake/assign-rep", post(assign_handler::<R>))
        .route(
            "/intake/update-eligibility",
            post(update_eligibility_handler::<R>),
        )
        .route("/intake/document", get(document_handler::<R>))
        .route("/intake/summary", get(summary_handler::<R>))
        .route("/intake/export", get(export_handler::<R>))
        .with_state(state)
}

impl IntoResponse for IntakeError {
    fn into_response(self) -> Response {
        let status = match &self {
            IntakeError::Validation(_) => StatusCode::BAD_REQUEST,
            IntakeError::NotFound | IntakeError::DocumentNotFound { .. } => StatusCode::NOT_FOUND,
            IntakeError::Forbidden(_) => StatusCode::FORBIDDEN,
            IntakeError::Unauthenticated => StatusCode::UNAUTHORIZED,
            IntakeError::Repository(_) | IntakeError::Export(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then_some(token.trim())
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListParams {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    assigned_rep: Option<String>,
    #[serde(default)]
    provider_npi: Option<String>,
}

impl ListParams {
    /// Blank values and the dashboard's "All" option mean no filter.
    fn into_filter(self) -> Result<SubmissionFilter, ValidationError> {
        fn active(value: Option<String>) -> Option<String> {
            value
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty() && !value.eq_ignore_ascii_case("all"))
        }

        let status = active(self.status)
            .map(|status| parse_status(&status))
            .transpose()?;

        Ok(SubmissionFilter {
            status,
            assigned_rep: active(self.assigned_rep),
            provider_npi: active(self.provider_npi),
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmissionQuery {
    submission_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DocumentQuery {
    submission_id: String,
    index: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusChange {
    submission_id: String,
    new_status: String,
    #[serde(default, alias = "note")]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BulkStatusChange {
    #[serde(deserialize_with = "submission_ids")]
    submission_ids: Vec<String>,
    new_status: String,
    #[serde(default, alias = "note")]
    notes: Option<String>,
}

/// Accepts a JSON array or the comma separated list a form post carries.
fn submission_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Ids {
        Many(Vec<String>),
        Joined(String),
    }

    let ids = match Ids::deserialize(deserializer)? {
        Ids::Many(ids) => ids,
        Ids::Joined(joined) => joined.split(',').map(str::to_string).collect(),
    };

    Ok(ids
        .into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect())
}

#[derive(Debug, Deserialize)]
pub(crate) struct Assignment {
    submission_id: String,
    assigned_rep: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EligibilityChange {
    submission_id: String,
    #[serde(default)]
    eligibility_checked: Option<bool>,
    #[serde(default)]
    eligibility_method: Option<EligibilityMethod>,
    #[serde(default)]
    eligibility_notes: Option<String>,
}

pub(crate) async fn submit_handler<R>(
    State(state): State<IntakeState<R>>,
    headers: HeaderMap,
    JsonOrForm(request): JsonOrForm<PaRequest>,
) -> Response
where
    R: SubmissionRepository + 'static,
{
    let actor = match state.actor(&headers) {
        Ok(actor) => actor,
        Err(error) => return error.into_response(),
    };

    match state
        .service
        .create(&actor, request, bearer_token(&headers))
        .await
    {
        Ok(submission) => {
            let payload = json!({
                "message": "PA request submitted successfully.",
                "data": submission.view(),
            });
            (StatusCode::CREATED, Json(payload)).into_response()
        }
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn list_handler<R>(
    State(state): State<IntakeState<R>>,
    headers: HeaderMap,
    QueryParams(params): QueryParams<ListParams>,
) -> Result<Response, IntakeError>
where
    R: SubmissionRepository + 'static,
{
    let actor = state.actor(&headers)?;
    let filter = params.into_filter()?;
    let submissions: Vec<_> = state
        .service
        .list(&actor, &filter)?
        .iter()
        .map(|submission| submission.view())
        .collect();

    Ok(Json(json!({ "submissions": submissions })).into_response())
}

pub(crate) async fn get_handler<R>(
    State(state): State<IntakeState<R>>,
    headers: HeaderMap,
    QueryParams(query): QueryParams<SubmissionQuery>,
) -> Result<Response, IntakeError>
where
    R: SubmissionRepository + 'static,
{
    let actor = state.actor(&headers)?;
    let submission = state
        .service
        .get(&actor, &SubmissionId(query.submission_id))?;
    Ok(Json(json!({ "submission": submission.view() })).into_response())
}

pub(crate) async fn update_status_handler<R>(
    State(state): State<IntakeState<R>>,
    headers: HeaderMap,
    JsonOrForm(change): JsonOrForm<StatusChange>,
) -> Result<Response, IntakeError>
where
    R: SubmissionRepository + 'static,
{
    let actor = state.actor(&headers)?;
    let history = state.service.update_status(
        &actor,
        &SubmissionId(change.submission_id),
        &change.new_status,
        change.notes.as_deref(),
    )?;

    let payload = json!({
        "message": "Status updated",
        "status_history": history,
    });
    Ok(Json(payload).into_response())
}

pub(crate) async fn bulk_update_status_handler<R>(
    State(state): State<IntakeState<R>>,
    headers: HeaderMap,
    JsonOrForm(change): JsonOrForm<BulkStatusChange>,
) -> Result<Response, IntakeError>
where
    R: SubmissionRepository + 'static,
{
    let actor = state.actor(&headers)?;
    let ids: Vec<SubmissionId> = change
        .submission_ids
        .into_iter()
        .map(SubmissionId)
        .collect();
    let outcome = state.service.bulk_update_status(
        &actor,
        &ids,
        &change.new_status,
        change.notes.as_deref(),
    )?;

    let payload = json!({
        "message": format!("Updated {} of {} submissions", outcome.updated.len(), ids.len()),
        "updated": outcome.updated,
        "failed": outcome.failed,
    });
    Ok(Json(payload).into_response())
}

pub(crate) async fn upload_handler<R>(
    State(state): State<IntakeState<R>>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, IntakeError>
where
    R: SubmissionRepository + 'static,
{
    let actor = state.actor(&headers)?;
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => return Ok(bad_request(rejection.body_text())),
    };

    let mut submission_id = None;
    let mut category = DocumentCategory::default();
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ValidationError::MalformedUpload(err.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "submission_id" => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| ValidationError::MalformedUpload(err.body_text()))?;
                submission_id = Some(value.trim().to_string());
            }
            "category" => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| ValidationError::MalformedUpload(err.body_text()))?;
                category = DocumentCategory::parse(&value)
                    .ok_or_else(|| ValidationError::UnknownCategory(value.trim().to_string()))?;
            }
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content = field
                    .bytes()
                    .await
                    .map_err(|err| ValidationError::MalformedUpload(err.body_text()))?;
                file = Some((filename, content.to_vec()));
            }
            _ => {}
        }
    }

    let submission_id = submission_id
        .filter(|id| !id.is_empty())
        .ok_or(ValidationError::MissingField("submission_id"))?;
    let (filename, content) = file.ok_or(ValidationError::MissingField("file"))?;

    let view = state.service.attach(
        &actor,
        &SubmissionId(submission_id),
        DocumentUpload {
            filename,
            content,
            category,
        },
    )?;

    Ok(Json(json!({ "message": format!("Uploaded {}", view.filename) })).into_response())
}

pub(crate) async fn assign_handler<R>(
    State(state): State<IntakeState<R>>,
    headers: HeaderMap,
    JsonOrForm(assignment): JsonOrForm<Assignment>,
) -> Result<Response, IntakeError>
where
    R: SubmissionRepository + 'static,
{
    let actor = state.actor(&headers)?;
    let stored = state.service.assign(
        &actor,
        &SubmissionId(assignment.submission_id),
        &assignment.assigned_rep,
    )?;

    let message = format!(
        "Assigned rep set to {}.",
        stored.as_deref().unwrap_or(UNASSIGNED)
    );
    Ok(Json(json!({ "message": message })).into_response())
}

pub(crate) async fn update_eligibility_handler<R>(
    State(state): State<IntakeState<R>>,
    headers: HeaderMap,
    JsonOrForm(change): JsonOrForm<EligibilityChange>,
) -> Result<Response, IntakeError>
where
    R: SubmissionRepository + 'static,
{
    let actor = state.actor(&headers)?;
    let update = EligibilityUpdate {
        checked: change.eligibility_checked,
        method: change.eligibility_method,
        notes: change.eligibility_notes,
    };
    let submission =
        state
            .service
            .update_eligibility(&actor, &SubmissionId(change.submission_id), &update)?;

    let payload = json!({
        "message": "Eligibility updated",
        "submission": submission.view(),
    });
    Ok(Json(payload).into_response())
}

pub(crate) async fn document_handler<R>(
    State(state): State<IntakeState<R>>,
    headers: HeaderMap,
    QueryParams(query): QueryParams<DocumentQuery>,
) -> Result<Response, IntakeError>
where
    R: SubmissionRepository + 'static,
{
    let actor = state.actor(&headers)?;
    let document = state
        .service
        .document(&actor, &SubmissionId(query.submission_id), query.index)?;

    let content_type = mime_guess::from_path(&document.filename)
        .first_or_octet_stream()
        .to_string();
    let disposition = attachment_disposition(&document.filename);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document.content.to_vec(),
    )
        .into_response())
}

pub(crate) async fn summary_handler<R>(
    State(state): State<IntakeState<R>>,
    headers: HeaderMap,
    QueryParams(params): QueryParams<ListParams>,
) -> Result<Response, IntakeError>
where
    R: SubmissionRepository + 'static,
{
    let actor = state.actor(&headers)?;
    let filter = params.into_filter()?;
    let summary = state.service.summary(&actor, &filter)?;
    Ok(Json(summary).into_response())
}

pub(crate) async fn export_handler<R>(
    State(state): State<IntakeState<R>>,
    headers: HeaderMap,
    QueryParams(params): QueryParams<ListParams>,
) -> Result<Response, IntakeError>
where
    R: SubmissionRepository + 'static,
{
    let actor = state.actor(&headers)?;
    let filter = params.into_filter()?;
    let csv = state.service.export_csv(&actor, &filter)?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime::TEXT_CSV_UTF_8.to_string()),
            (
                header::CONTENT_DISPOSITION,
                attachment_disposition("pa_submissions.csv"),
            ),
        ],
        csv,
    )
        .into_response())
}

fn attachment_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|ch| if ch == '"' || ch.is_control() { '_' } else { ch })
        .collect();
    format!("attachment; filename=\"{safe}\"")
}

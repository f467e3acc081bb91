use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;

use super::domain::{ConfirmRequest, LoginRequest, RegisterRequest};
use super::repository::AccountRepository;
use super::service::{AccountError, AccountService};
use crate::workflows::extract::{JsonOrForm, QueryParams};

/// Router exposing registration, confirmation, and login.
pub fn account_router<A>(service: Arc<AccountService<A>>) -> Router
where
    A: AccountRepository + 'static,
{
    Router::new()
        .route("/intake/auth/register", post(register_handler::<A>))
        .route(
            "/intake/auth/confirm",
            post(confirm_handler::<A>).get(confirm_link_handler::<A>),
        )
        .route("/intake/auth/login", post(login_handler::<A>))
        .with_state(service)
}

impl IntoResponse for AccountError {
    fn into_response(self) -> Response {
        let status = match &self {
            AccountError::InvalidRole
            | AccountError::InvalidEmail
            | AccountError::MissingPassword
            | AccountError::Duplicate
            | AccountError::InvalidConfirmationToken => StatusCode::BAD_REQUEST,
            AccountError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AccountError::EmailNotConfirmed => StatusCode::FORBIDDEN,
            AccountError::Mail(_) | AccountError::Token(_) | AccountError::Repository(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub(crate) async fn register_handler<A>(
    State(service): State<Arc<AccountService<A>>>,
    JsonOrForm(request): JsonOrForm<RegisterRequest>,
) -> Result<Response, AccountError>
where
    A: AccountRepository + 'static,
{
    service.register(request).await?;
    let payload = json!({
        "message": "Registration accepted. Check your email to confirm.",
    });
    Ok((StatusCode::CREATED, Json(payload)).into_response())
}

pub(crate) async fn confirm_handler<A>(
    State(service): State<Arc<AccountService<A>>>,
    JsonOrForm(request): JsonOrForm<ConfirmRequest>,
) -> Result<Response, AccountError>
where
    A: AccountRepository + 'static,
{
    confirmed(&service, &request.token)
}

/// Target of the link in the confirmation e-mail.
pub(crate) async fn confirm_link_handler<A>(
    State(service): State<Arc<AccountService<A>>>,
    QueryParams(request): QueryParams<ConfirmRequest>,
) -> Result<Response, AccountError>
where
    A: AccountRepository + 'static,
{
    confirmed(&service, &request.token)
}

fn confirmed<A>(service: &AccountService<A>, token: &str) -> Result<Response, AccountError>
where
    A: AccountRepository + 'static,
{
    service.confirm(token)?;
    Ok(Json(json!({ "message": "Email confirmed! You can now log in." })).into_response())
}

pub(crate) async fn login_handler<A>(
    State(service): State<Arc<AccountService<A>>>,
    JsonOrForm(request): JsonOrForm<LoginRequest>,
) -> Result<Response, AccountError>
where
    A: AccountRepository + 'static,
{
    let response = service.login(request).await?;
    Ok(Json(response).into_response())
}

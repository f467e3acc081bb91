use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::workflows::access::{Actor, NoSessions, Role};
use crate::workflows::intake::domain::{PaStatus, SubmissionId};
use crate::workflows::intake::router::{submit_handler, SESSION_HEADER};
use crate::workflows::intake::{IntakeService, IntakeState};
use crate::workflows::extract::JsonOrForm;

fn json_post(uri: &str, payload: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&payload).expect("json body")))
        .expect("request builds")
}

fn form_post(uri: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request builds")
}

fn multipart_upload(submission_id: &str, filename: &str, category: Option<&str>) -> Request<Body> {
    let boundary = "intake-boundary";
    let mut body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"submission_id\"\r\n\r\n{submission_id}\r\n"
    );
    if let Some(category) = category {
        body.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"category\"\r\n\r\n{category}\r\n"
        ));
    }
    body.push_str(&format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n%PDF-1.7 chart\r\n--{boundary}--\r\n"
    ));

    Request::post("/intake/upload-doc")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .expect("request builds")
}

async fn submit_sample(router: &axum::Router) -> String {
    let response = router
        .clone()
        .oneshot(json_post(
            "/intake/submit",
            serde_json::to_value(sample_request()).expect("request serializes"),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);

    let payload = read_json_body(response).await;
    payload["data"]["id"]
        .as_str()
        .expect("submission id")
        .to_string()
}

#[tokio::test]
async fn submit_returns_created_with_wrapped_submission() {
    let harness = build_service();
    let router = router_for(harness.service.clone(), FixedSessions::default(), false);

    let response = router
        .oneshot(json_post(
            "/intake/submit",
            serde_json::to_value(sample_request()).expect("request serializes"),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["message"], json!("PA request submitted successfully."));
    assert_eq!(payload["data"]["status"], json!("Submitted"));
    assert_eq!(payload["data"]["patient_dob"], json!("1980-04-12"));
    assert_eq!(payload["data"]["eligibility_lookup"], json!("not_attempted"));
    assert_eq!(payload["data"]["assigned_rep"], Value::Null);
    assert_eq!(payload["data"]["status_history"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn submit_forwards_bearer_token_to_coverage_lookup() {
    let harness = build_service();
    let router = router_for(harness.service.clone(), FixedSessions::default(), false);

    let mut request = json_post(
        "/intake/submit",
        serde_json::to_value(sample_request()).expect("request serializes"),
    );
    request.headers_mut().insert(
        header::AUTHORIZATION,
        "Bearer availity-token".parse().expect("header value"),
    );

    let response = router.oneshot(request).await.expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["data"]["eligibility_lookup"], json!("succeeded"));

    let calls = harness.gateway.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "availity-token");
}

#[tokio::test]
async fn submit_accepts_form_posts_and_rejects_missing_fields() {
    let harness = build_service();
    let router = router_for(harness.service.clone(), FixedSessions::default(), false);

    let response = router
        .clone()
        .oneshot(form_post(
            "/intake/submit",
            "provider_npi=doc%40example.com&patient_name=Jane+Doe&patient_dob=1980-04-12\
             &insurance=AETNA&member_id=M1&service=MRI&diagnosis_code=M54.5",
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = router
        .oneshot(json_post("/intake/submit", json!({ "patient_name": "Jane Doe" })))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert_eq!(
        payload["error"],
        json!("missing required field: provider_npi")
    );
}

#[tokio::test]
async fn submit_handler_maps_repository_outage_to_internal_error() {
    let service = Arc::new(IntakeService::new(
        Arc::new(UnavailableRepository),
        Arc::new(FakeGateway::responding(json!({}))),
        Duration::from_secs(10),
    ));
    let state = IntakeState::new(service, Arc::new(NoSessions), false);

    let response = submit_handler::<UnavailableRepository>(
        State(state),
        axum::http::HeaderMap::new(),
        JsonOrForm(sample_request()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn list_and_get_wrap_payloads() {
    let harness = build_service();
    let router = router_for(harness.service.clone(), FixedSessions::default(), false);
    let id = submit_sample(&router).await;

    let response = router
        .clone()
        .oneshot(get("/intake/list"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["submissions"].as_array().map(Vec::len), Some(1));

    let response = router
        .clone()
        .oneshot(get("/intake/list?status=Approved"))
        .await
        .expect("route executes");
    let payload = read_json_body(response).await;
    assert_eq!(payload["submissions"], json!([]));

    let response = router
        .clone()
        .oneshot(get(&format!("/intake/get?submission_id={id}")))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["submission"]["id"], json!(id));

    let response = router
        .oneshot(get("/intake/get?submission_id=missing"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], json!("Submission not found."));
}

#[tokio::test]
async fn list_rejects_unknown_status_filter() {
    let harness = build_service();
    let router = router_for(harness.service.clone(), FixedSessions::default(), false);

    let response = router
        .oneshot(get("/intake/list?status=Escalated"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_status_accepts_dashboard_form_posts() {
    let harness = build_service();
    let router = router_for(harness.service.clone(), FixedSessions::default(), false);
    let id = submit_sample(&router).await;

    let response = router
        .clone()
        .oneshot(form_post(
            "/intake/update-status",
            &format!("submission_id={id}&new_status=In+Review&notes=Chart+requested"),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["message"], json!("Status updated"));
    assert_eq!(payload["status_history"].as_array().map(Vec::len), Some(2));
    assert_eq!(payload["status_history"][1]["status"], json!("In Review"));

    let response = router
        .clone()
        .oneshot(get(&format!("/intake/get?submission_id={id}")))
        .await
        .expect("route executes");
    let payload = read_json_body(response).await;
    let notes = payload["submission"]["notes"].as_str().expect("notes present");
    let mut lines = notes.lines();
    assert_eq!(lines.next(), Some("Chronic low back pain"));
    let appended = lines.next().expect("status note appended");
    assert!(appended.starts_with('['));
    assert!(appended.ends_with("] Chart requested"));

    let response = router
        .clone()
        .oneshot(form_post(
            "/intake/update-status",
            &format!("submission_id={id}&new_status=Escalated"),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = router
        .oneshot(json_post(
            "/intake/update-status",
            json!({ "submission_id": "missing", "new_status": "Approved" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bulk_update_accepts_comma_separated_form_ids() {
    let harness = build_service();
    let router = router_for(harness.service.clone(), FixedSessions::default(), false);
    let first = submit_sample(&router).await;
    let second = submit_sample(&router).await;

    let response = router
        .clone()
        .oneshot(form_post(
            "/intake/bulk-update-status",
            &format!(
                "submission_ids={first}%2Cmissing%2C{second}&new_status=Approved&notes=Batch+review"
            ),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["updated"], json!([first, second]));
    assert_eq!(payload["failed"][0]["submission_id"], json!("missing"));
    assert_eq!(payload["message"], json!("Updated 2 of 3 submissions"));

    let response = router
        .oneshot(get(&format!("/intake/get?submission_id={second}")))
        .await
        .expect("route executes");
    let payload = read_json_body(response).await;
    let notes = payload["submission"]["notes"].as_str().expect("notes present");
    assert!(notes.ends_with("] Batch review"));
}

#[tokio::test]
async fn assign_rep_reports_the_stored_value() {
    let harness = build_service();
    let router = router_for(harness.service.clone(), FixedSessions::default(), false);
    let id = submit_sample(&router).await;

    let response = router
        .clone()
        .oneshot(form_post(
            "/intake/assign-rep",
            &format!("submission_id={id}&assigned_rep=rep%40example.com"),
        ))
        .await
        .expect("route executes");
    let payload = read_json_body(response).await;
    assert_eq!(
        payload["message"],
        json!("Assigned rep set to rep@example.com.")
    );

    let response = router
        .clone()
        .oneshot(form_post(
            "/intake/assign-rep",
            &format!("submission_id={id}&assigned_rep=Unassigned"),
        ))
        .await
        .expect("route executes");
    let payload = read_json_body(response).await;
    assert_eq!(payload["message"], json!("Assigned rep set to Unassigned."));

    let response = router
        .clone()
        .oneshot(form_post("/intake/assign-rep", &format!("submission_id={id}")))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert!(payload["error"].is_string());

    let response = router
        .oneshot(form_post(
            "/intake/assign-rep",
            "submission_id=missing&assigned_rep=rep",
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_eligibility_returns_the_submission() {
    let harness = build_service();
    let router = router_for(harness.service.clone(), FixedSessions::default(), false);
    let id = submit_sample(&router).await;

    let response = router
        .clone()
        .oneshot(form_post(
            "/intake/update-eligibility",
            &format!(
                "submission_id={id}&eligibility_checked=true&eligibility_method=Online+Portal"
            ),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["submission"]["eligibility_checked"], json!(true));
    assert_eq!(
        payload["submission"]["eligibility_method"],
        json!("Online Portal")
    );
    assert_eq!(payload["submission"]["eligibility_notes"], json!(""));

    let response = router
        .oneshot(json_post(
            "/intake/update-eligibility",
            json!({ "submission_id": "missing", "eligibility_checked": true }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn upload_then_download_document() {
    let harness = build_service();
    let router = router_for(harness.service.clone(), FixedSessions::default(), false);
    let id = submit_sample(&router).await;

    let response = router
        .clone()
        .oneshot(multipart_upload(&id, "eligibility.pdf", Some("eligibility_evidence")))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["message"], json!("Uploaded eligibility.pdf"));

    let response = router
        .clone()
        .oneshot(get(&format!("/intake/get?submission_id={id}")))
        .await
        .expect("route executes");
    let payload = read_json_body(response).await;
    assert_eq!(
        payload["submission"]["eligibility_evidence"][0]["filename"],
        json!("eligibility.pdf")
    );

    let response = router
        .clone()
        .oneshot(get(&format!("/intake/document?submission_id={id}&index=0")))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/pdf"
    );
    assert_eq!(read_body_bytes(response).await, b"%PDF-1.7 chart".to_vec());

    let response = router
        .oneshot(multipart_upload("missing", "chart.pdf", None))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn summary_and_export_render_dashboard_views() {
    let harness = build_service();
    let router = router_for(harness.service.clone(), FixedSessions::default(), false);
    let id = submit_sample(&router).await;
    harness
        .service
        .update_status(&Actor::System, &SubmissionId(id.clone()), "Approved", None)
        .expect("approved");

    let response = router
        .clone()
        .oneshot(get("/intake/summary"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["total"], json!(1));
    assert_eq!(payload["completed"], json!(1));
    assert_eq!(payload["by_status"][2]["status_label"], json!("Approved"));
    assert_eq!(payload["by_status"][2]["count"], json!(1));

    let response = router
        .oneshot(get("/intake/export"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .expect("ascii header")
        .starts_with("text/csv"));
    let body = String::from_utf8(read_body_bytes(response).await).expect("utf8 csv");
    assert!(body.starts_with("submission_id,provider_npi"));
    assert!(body.contains(PaStatus::Approved.label()));
}

#[tokio::test]
async fn sessions_scope_the_visible_queue() {
    let harness = build_service();
    let open_router = router_for(harness.service.clone(), FixedSessions::default(), false);
    let id = submit_sample(&open_router).await;

    let sessions = FixedSessions::default()
        .with("doc-token", Actor::user("doc@example.com", Role::Provider))
        .with("rep-token", Actor::user("rep@example.com", Role::Rep));
    let router = router_for(harness.service.clone(), sessions, true);

    let response = router
        .clone()
        .oneshot(get("/intake/list"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = router
        .clone()
        .oneshot(
            Request::get("/intake/list")
                .header(SESSION_HEADER, "unknown")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    for (token, visible) in [("doc-token", 1), ("rep-token", 0)] {
        let response = router
            .clone()
            .oneshot(
                Request::get("/intake/list")
                    .header(SESSION_HEADER, token)
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json_body(response).await;
        assert_eq!(
            payload["submissions"].as_array().map(Vec::len),
            Some(visible)
        );
    }

    let mut request = form_post(
        "/intake/assign-rep",
        &format!("submission_id={id}&assigned_rep=rep%40example.com"),
    );
    request
        .headers_mut()
        .insert(SESSION_HEADER, "rep-token".parse().expect("header value"));
    let response = router.oneshot(request).await.expect("route executes");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

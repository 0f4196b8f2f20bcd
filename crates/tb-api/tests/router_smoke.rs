use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use tower::ServiceExt;

use tb_api::{create_router, test_state};
use tb_common::publish::RecordingPublisher;

fn app() -> axum::Router {
    create_router(test_state(Arc::new(RecordingPublisher::new())))
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn liveness_and_readiness_respond() {
    let response = app()
        .oneshot(Request::builder().uri("/livez").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app()
        .oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn draining_state_reports_service_unavailable() {
    let state = test_state(Arc::new(RecordingPublisher::new()));
    state
        .readiness
        .store(false, std::sync::atomic::Ordering::SeqCst);
    let app = create_router(state);

    let response = app
        .oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["error"], "shutting down");
}

#[tokio::test]
async fn cors_preflight_allows_any_origin() {
    let response = app()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/tenders")
                .header("origin", "https://frontend.example")
                .header("access-control-request-method", "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

#[tokio::test]
async fn out_of_range_limit_is_rejected_before_the_database() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/tenders?limit=0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("limit"));
}

#[tokio::test]
async fn malformed_date_filters_are_rejected() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/tenders?closing_from=whenever")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("closing_from"));
}

#[tokio::test]
async fn non_numeric_tender_ids_are_a_client_error() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/tenders/not-a-number")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let response = app()
        .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let response = app()
        .oneshot(Request::builder().uri("/livez").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn preference_saves_require_an_email() {
    let response = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/user/preferences")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"email":"   ","categories":["ict"]}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "email is required");
}

// tests/analyze_e2e.rs
// Drives the full router in-process with the external parser disabled,
// so every request exercises the fallback analyzer deterministically.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use tonebridge::api::router;
use tonebridge::config::TonebridgeConfig;
use tonebridge::kb::KnowledgeBase;
use tonebridge::state::create_app_state_with_kb;

fn test_config() -> TonebridgeConfig {
    let mut config = TonebridgeConfig::from_env();
    config.parser_enabled = false;
    config
}

fn test_router() -> axum::Router {
    let config = test_config();
    let kb = Arc::new(KnowledgeBase::builtin());
    router(Arc::new(create_app_state_with_kb(kb, &config)))
}

async fn post_analyze(app: axum::Router, payload: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/analyze-and-suggest")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_withdrawn_message_end_to_end() {
    let app = test_router();
    let (status, body) = post_analyze(
        app,
        json!({
            "text": "I'm fine, whatever. Forget it.",
            "userId": "u-e2e-1"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tone"]["classification"], "withdrawn");

    // Distribution is a full probability vector over all eight tones
    let distribution = body["tone"]["distribution"].as_object().unwrap();
    assert_eq!(distribution.len(), 8);
    let sum: f64 = distribution.values().map(|v| v.as_f64().unwrap()).sum();
    assert!((sum - 1.0).abs() < 1e-3, "distribution sums to {sum}");

    // Suggestions are present and bounded
    let suggestions = body["suggestions"].as_array().unwrap();
    assert!(!suggestions.is_empty());
    assert!(suggestions.len() <= 3);
    for s in suggestions {
        assert!(s["text"].as_str().is_some_and(|t| !t.is_empty()));
        assert!(s["category"].as_str().is_some());
    }

    // Bucket weights renormalize to one
    let buckets = &body["toneBuckets"];
    let bucket_sum = buckets["clear"].as_f64().unwrap()
        + buckets["caution"].as_f64().unwrap()
        + buckets["alert"].as_f64().unwrap();
    assert!((bucket_sum - 1.0).abs() < 1e-3);

    assert!(body.get("safetyEscalation").is_none());
}

#[tokio::test]
async fn test_safety_escalation_bypasses_pipeline() {
    let app = test_router();
    let (status, body) = post_analyze(
        app,
        json!({
            "text": "Sometimes I just want to end it all",
            "userId": "u-e2e-2",
            "sessionId": "s-safety"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tone"]["classification"], "safety_concern");
    assert_eq!(body["safetyEscalation"]["type"], "self_harm");
    assert!(body["safetyEscalation"]["message"]
        .as_str()
        .is_some_and(|m| !m.is_empty()));

    // All bucket mass lands on alert
    assert!(body["toneBuckets"]["alert"].as_f64().unwrap() > 0.99);

    // Exactly one safety suggestion, no ranked advice
    let suggestions = body["suggestions"].as_array().unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0]["category"], "safety");
}

#[tokio::test]
async fn test_session_smoothing_suppresses_flip() {
    let app = test_router();
    let payload_angry = json!({
        "text": "I am so angry at you, you ALWAYS do this!!",
        "userId": "u-e2e-3",
        "sessionId": "s-smooth"
    });
    let payload_flat = json!({
        "text": "okay sure.",
        "userId": "u-e2e-3",
        "sessionId": "s-smooth"
    });

    let (status, body) = post_analyze(app.clone(), payload_angry).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tone"]["classification"], "angry");

    // A weak follow-up inside the hysteresis band keeps the session tone
    let (status, body) = post_analyze(app, payload_flat).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tone"]["classification"], "angry");
}

#[tokio::test]
async fn test_empty_advice_library_falls_back() {
    let config = test_config();
    let mut kb = KnowledgeBase::builtin();
    kb.advice.clear();
    let app = router(Arc::new(create_app_state_with_kb(Arc::new(kb), &config)));

    let (status, body) = post_analyze(
        app,
        json!({
            "text": "I feel sad and alone tonight",
            "userId": "u-e2e-4"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let suggestions = body["suggestions"].as_array().unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0]["category"], "reflection");
}

#[tokio::test]
async fn test_empty_text_rejected() {
    let app = test_router();
    let (status, body) = post_analyze(
        app,
        json!({
            "text": "   ",
            "userId": "u-e2e-5"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert!(body["message"].as_str().is_some());
}

#[tokio::test]
async fn test_overlength_text_rejected() {
    let app = test_router();
    let (status, _body) = post_analyze(
        app,
        json!({
            "text": "a".repeat(2001),
            "userId": "u-e2e-6"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_user_id_rejected() {
    let app = test_router();
    let (status, _body) = post_analyze(
        app,
        json!({
            "text": "hello",
            "userId": ""
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_reports_breaker_state() {
    let app = test_router();
    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["parser_circuit_open"], false);
}

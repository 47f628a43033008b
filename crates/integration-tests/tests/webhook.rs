//! Webhook secret checks.

#![allow(clippy::unwrap_used)]

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use secrecy::SecretString;
use tower::ServiceExt;

use stockbot_integration_tests::{WEBHOOK_SECRET, offline_state};
use stockbot_server::routes::routes;
use stockbot_server::security::{WEBHOOK_SECRET_HEADER, WebhookAuthenticator, WebhookDecision};

#[test]
fn test_decisions_with_secret() {
    let auth = WebhookAuthenticator::new(Some(SecretString::from(WEBHOOK_SECRET)));
    assert!(auth.is_enforced());
    assert_eq!(auth.authenticate(Some(WEBHOOK_SECRET)), WebhookDecision::Authorized);
    assert_eq!(auth.authenticate(Some("webhook-shared-toke")), WebhookDecision::Rejected);
    assert_eq!(auth.authenticate(Some("")), WebhookDecision::Rejected);
    assert_eq!(auth.authenticate(None), WebhookDecision::Rejected);
}

#[test]
fn test_decisions_without_secret() {
    for secret in [None, Some(SecretString::from(""))] {
        let auth = WebhookAuthenticator::new(secret);
        assert!(!auth.is_enforced());
        assert_eq!(auth.authenticate(None), WebhookDecision::Authorized);
        assert_eq!(auth.authenticate(Some("anything")), WebhookDecision::Authorized);
    }
}

fn update_request(secret: Option<&str>) -> Request<Body> {
    let mut builder = Request::post("/webhook/telegram");
    if let Some(secret) = secret {
        builder = builder.header(WEBHOOK_SECRET_HEADER, secret);
    }
    builder
        .body(Body::from(
            r#"{"update_id":9,"message":{"chat":{"id":77},"from":{"id":5},"text":"/help"}}"#,
        ))
        .unwrap()
}

#[tokio::test]
async fn test_http_rejects_before_dispatch() {
    let response = routes()
        .with_state(offline_state())
        .oneshot(update_request(Some("wrong")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_http_replies_in_body() {
    let response = routes()
        .with_state(offline_state())
        .oneshot(update_request(Some(WEBHOOK_SECRET)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let reply: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(reply["method"], "sendMessage");
    assert_eq!(reply["chat_id"], 77);
    assert!(reply["text"].as_str().unwrap().contains("/items"));
}

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use medbot_agents::AgentConfig;
use medbot_api::{build_app, ApiConfig, DEFAULT_API_KEY};
use medbot_core::FALLBACK_RESPONSE;
use medbot_tests::sample_agent_config;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> Router {
    build_app(&sample_agent_config(), &ApiConfig::default()).expect("app should build")
}

fn chat_request(text: &str, api_key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/v1/chat")
        .header("content-type", "application/json");
    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }
    builder
        .body(Body::from(json!({ "text": text }).to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let parsed = body_json(response).await;
    assert_eq!(parsed["status"], "ok");
    assert_eq!(parsed["catalog"]["intents"], 6);
    assert_eq!(parsed["embedder"], "hash-fallback");
    assert!(parsed["burn_enabled"].is_boolean());
}

#[tokio::test]
async fn chat_requires_api_key() {
    let response = app()
        .oneshot(chat_request("I have a fever", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn chat_answers_from_the_matching_pool() {
    let response = app()
        .oneshot(chat_request("I have a fever", Some(DEFAULT_API_KEY)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let parsed = body_json(response).await;
    assert_eq!(parsed["intent"], "fever");
    assert_eq!(parsed["outcome"]["kind"], "matched");

    let reply = parsed["reply_text"].as_str().unwrap();
    let catalog = medbot_core::IntentCatalog::from_path(medbot_tests::sample_catalog_path())
        .unwrap();
    assert!(catalog.lookup("fever").contains(&reply));
    assert!(parsed["candidates"].as_array().is_some_and(|c| !c.is_empty()));
}

#[tokio::test]
async fn blank_question_gets_the_fallback() {
    let response = app()
        .oneshot(chat_request("   ", Some(DEFAULT_API_KEY)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let parsed = body_json(response).await;
    assert_eq!(parsed["reply_text"], FALLBACK_RESPONSE);
    assert_eq!(parsed["outcome"]["kind"], "no_confident_intent");
    assert!(parsed["intent"].is_null());
}

#[tokio::test]
async fn off_topic_questions_get_the_fallback() {
    let app = app();
    for question in [
        "what is the capital of France",
        "who won the football game",
        "how do I bake bread",
    ] {
        let response = app
            .clone()
            .oneshot(chat_request(question, Some(DEFAULT_API_KEY)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let parsed = body_json(response).await;
        assert_eq!(parsed["reply_text"], FALLBACK_RESPONSE, "{question}");
        assert_eq!(parsed["outcome"]["kind"], "no_confident_intent", "{question}");
        assert!(parsed["intent"].is_null());
    }
}

#[tokio::test]
async fn malformed_body_gets_a_json_error() {
    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat")
        .header("content-type", "application/json")
        .header("x-api-key", DEFAULT_API_KEY)
        .body(Body::from("{\"text\": 42"))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert!(response.status().is_client_error());

    let parsed = body_json(response).await;
    assert_eq!(parsed["error"], "invalid_request");
    assert!(!parsed["message"].as_str().unwrap().contains("line"));
}

#[tokio::test]
async fn oversized_question_is_rejected() {
    let text = "a".repeat(2_001);
    let response = app()
        .oneshot(chat_request(&text, Some(DEFAULT_API_KEY)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn intents_lists_catalog_order() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/v1/intents")
                .header("x-api-key", DEFAULT_API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let parsed = body_json(response).await;
    assert_eq!(parsed["tag_order"][0], "fever");
    assert_eq!(parsed["tag_order"][1], "high temperature");
}

#[test]
fn invalid_catalog_refuses_to_start() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("intents.json");
    std::fs::write(
        &path,
        r#"{"intents": [
            {"tag": "fever", "patterns": ["hot"], "responses": ["Take rest."]},
            {"tag": "fever", "patterns": ["warm"], "responses": ["Drink water."]}
        ]}"#,
    )
    .unwrap();

    let config = AgentConfig {
        catalog_path: path,
        ..AgentConfig::default()
    };
    assert!(build_app(&config, &ApiConfig::default()).is_err());
}

#[test]
fn empty_response_pool_refuses_to_start() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("intents.json");
    std::fs::write(
        &path,
        r#"{"intents": [{"tag": "fever", "patterns": ["hot"], "responses": []}]}"#,
    )
    .unwrap();

    let config = AgentConfig {
        catalog_path: path,
        ..AgentConfig::default()
    };
    assert!(build_app(&config, &ApiConfig::default()).is_err());
}

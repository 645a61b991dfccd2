use std::{sync::Arc, time::Duration};

use moodquiz_lib::{
    analysis::{ClassifierError, EmotionAnalyzer, EmotionClassifier, HttpClassifier, RetryPolicy},
    models::Emotion,
};
use serde_json::json;
use wiremock::{
    matchers::{body_bytes, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

const MODEL_PATH: &str = "/models/facial-expression";

fn classifier(server: &MockServer, token: Option<&str>) -> HttpClassifier {
    HttpClassifier::new(
        format!("{}{MODEL_PATH}", server.uri()),
        token.map(str::to_string),
        Duration::from_secs(5),
    )
    .unwrap()
}

fn loading() -> ResponseTemplate {
    ResponseTemplate::new(503).set_body_json(json!({
        "error": "Model motheecreator/vit-Facial-Expression-Recognition is currently loading",
        "estimated_time": 4.2
    }))
}

fn scores() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!([
        { "label": "surprise", "score": 0.6 },
        { "label": "fear", "score": 0.3 },
        { "label": "neutral", "score": 0.1 }
    ]))
}

#[tokio::test]
async fn posts_raw_bytes_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .and(header("authorization", "Bearer hf_test"))
        .and(header("content-type", "application/octet-stream"))
        .and(body_bytes(b"fake-png".to_vec()))
        .respond_with(scores())
        .expect(1)
        .mount(&server)
        .await;

    let labels = classifier(&server, Some("hf_test"))
        .classify(b"fake-png")
        .await
        .unwrap();

    assert_eq!(labels.len(), 3);
    assert_eq!(labels[0].label, "surprise");
}

#[tokio::test]
async fn loading_body_is_reported_as_loading() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(loading())
        .mount(&server)
        .await;

    let err = classifier(&server, None).classify(b"img").await.unwrap_err();

    assert!(matches!(
        err,
        ClassifierError::Loading {
            estimated_time: Some(t)
        } if (t - 4.2).abs() < f64::EPSILON
    ));
}

#[tokio::test]
async fn server_errors_are_api_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = classifier(&server, None).classify(b"img").await.unwrap_err();

    assert!(matches!(err, ClassifierError::Api { status: 500, .. }));
}

#[tokio::test]
async fn analyzer_waits_out_model_loading() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(loading())
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(scores())
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("frame.png");
    std::fs::write(&image, b"frame").unwrap();

    let retry = RetryPolicy {
        max_retries: 5,
        base_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(100),
    };
    let analyzer = EmotionAnalyzer::new(Arc::new(classifier(&server, None)), retry);

    let started = std::time::Instant::now();
    let outcome = analyzer.analyze(&image).await;

    assert!(!outcome.is_fallback());
    assert_eq!(outcome.dominant(), Emotion::Surprise);
    assert_eq!(outcome.emotions().surprise, 60.0);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
    // 20ms then 40ms of backoff
    assert!(started.elapsed() >= Duration::from_millis(60));
}

#[tokio::test]
async fn analyzer_falls_back_when_service_stays_down() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("frame.png");
    std::fs::write(&image, b"frame").unwrap();

    let analyzer =
        EmotionAnalyzer::new(Arc::new(classifier(&server, None)), RetryPolicy::immediate(5));
    let outcome = analyzer.analyze(&image).await;

    assert!(outcome.is_fallback());
    assert_eq!(outcome.emotions().neutral, 100.0);
    assert_eq!(outcome.dominant(), Emotion::Neutral);
    assert_eq!(server.received_requests().await.unwrap().len(), 6);
}

//! Contract tests for the Telegram transport against a mock Bot API.

use habit_reminders::{Notifier, NotifyError, TelegramNotifier};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_send_posts_chat_id_and_text() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/botTEST-TOKEN/sendMessage"))
        .and(body_json(json!({
            "chat_id": "chat_id",
            "text": "Time for your habit: action"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": { "message_id": 1 }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let notifier = TelegramNotifier::with_api_url("TEST-TOKEN", mock_server.uri());
    let result = notifier.send("chat_id", "Time for your habit: action").await;

    assert!(result.is_ok(), "send should succeed: {:?}", result);
}

#[tokio::test]
async fn test_api_error_is_reported() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/botTEST-TOKEN/sendMessage"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: chat not found"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let notifier = TelegramNotifier::with_api_url("TEST-TOKEN", format!("{}/", mock_server.uri()));
    let err = notifier.send("", "hello").await.unwrap_err();

    match err {
        NotifyError::Rejected { status, description } => {
            assert_eq!(status, 400);
            assert_eq!(description, "Bad Request: chat not found");
        }
        other => panic!("expected Rejected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_non_json_error_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&mock_server)
        .await;

    let notifier = TelegramNotifier::with_api_url("TEST-TOKEN", mock_server.uri());
    let err = notifier.send("42", "hello").await.unwrap_err();

    assert!(matches!(err, NotifyError::Rejected { status: 502, .. }));
}

#[tokio::test]
async fn test_unreachable_api_is_http_error() {
    // Port 1 is reserved; nothing should accept connections there.
    let notifier = TelegramNotifier::with_api_url("TEST-TOKEN", "http://127.0.0.1:1");
    let err = notifier.send("42", "hello").await.unwrap_err();

    assert!(matches!(err, NotifyError::Http(_)));
}

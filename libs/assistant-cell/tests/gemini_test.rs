use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use assistant_cell::models::{ToolResult, TurnPayload};
use assistant_cell::services::{Dialogue, GeminiClient, GeminiDialogue};
use assistant_cell::ModelErrorKind;
use shared_config::AppConfig;
use shared_utils::test_utils::TestConfig;

const GENERATE_PATH: &str = "/models/gemini-test:generateContent";

fn config_for(mock_server: &MockServer) -> AppConfig {
    let mut config = TestConfig::default().to_app_config();
    config.gemini_base_url = mock_server.uri();
    config
}

fn dialogue_for(config: &AppConfig) -> GeminiDialogue {
    GeminiDialogue::new(Arc::new(GeminiClient::new(config)), "You are a receptionist.")
}

fn candidate(parts: Value) -> Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": parts },
            "finishReason": "STOP"
        }]
    })
}

#[tokio::test]
async fn sends_prompt_tools_and_key_then_reads_function_calls() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header("x-goog-api-key", "test-gemini-key"))
        .and(body_partial_json(json!({
            "systemInstruction": { "parts": [{ "text": "You are a receptionist." }] },
            "contents": [{ "role": "user", "parts": [{ "text": "Is 10am free?" }] }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate(json!([
            { "text": "Let me check." },
            { "functionCall": { "name": "checkAvailability", "args": {} }, "thoughtSignature": "sig-1" }
        ]))))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut dialogue = dialogue_for(&config_for(&mock_server));
    let response = dialogue
        .send(&TurnPayload::Text("Is 10am free?".to_string()))
        .await
        .unwrap();

    assert_eq!(response.text.as_deref(), Some("Let me check."));
    assert_eq!(response.tool_invocations.len(), 1);
    assert_eq!(response.tool_invocations[0].name, "checkAvailability");
    assert!(!response.tool_invocations[0].id.is_empty());

    let received = mock_server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&received[0].body).unwrap();
    let declared: Vec<&str> = body["tools"][0]["functionDeclarations"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|declaration| declaration["name"].as_str())
        .collect();
    assert_eq!(declared, vec!["bookAppointment", "checkAvailability"]);
}

#[tokio::test]
async fn tool_results_replay_history_verbatim() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate(json!([
            { "functionCall": { "id": "fc-7", "name": "checkAvailability", "args": {} }, "thoughtSignature": "sig-1" }
        ]))))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate(json!([
            { "text": "10am is free." }
        ]))))
        .mount(&mock_server)
        .await;

    let mut dialogue = dialogue_for(&config_for(&mock_server));
    let first = dialogue
        .send(&TurnPayload::Text("Is 10am free?".to_string()))
        .await
        .unwrap();
    assert_eq!(first.tool_invocations[0].id, "fc-7");

    let second = dialogue
        .send(&TurnPayload::ToolResults(vec![ToolResult {
            id: "fc-7".to_string(),
            name: "checkAvailability".to_string(),
            result: "{\"busySlots\":[]}".to_string(),
        }]))
        .await
        .unwrap();
    assert_eq!(second.text.as_deref(), Some("10am is free."));
    assert_eq!(dialogue.history().len(), 4);

    let received = mock_server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&received[1].body).unwrap();
    let contents = body["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 3);
    assert_eq!(contents[1]["role"], "model");
    assert_eq!(contents[1]["parts"][0]["thoughtSignature"], "sig-1");
    assert_eq!(
        contents[2],
        json!({
            "role": "user",
            "parts": [{
                "functionResponse": {
                    "id": "fc-7",
                    "name": "checkAvailability",
                    "response": { "result": "{\"busySlots\":[]}" }
                }
            }]
        })
    );
}

#[tokio::test]
async fn generated_call_ids_are_not_sent_back() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate(json!([
            { "functionCall": { "name": "checkAvailability", "args": {} } }
        ]))))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate(json!([{ "text": "done" }]))))
        .mount(&mock_server)
        .await;

    let mut dialogue = dialogue_for(&config_for(&mock_server));
    let first = dialogue
        .send(&TurnPayload::Text("hi".to_string()))
        .await
        .unwrap();
    let generated = first.tool_invocations[0].id.clone();

    dialogue
        .send(&TurnPayload::ToolResults(vec![ToolResult {
            id: generated,
            name: "checkAvailability".to_string(),
            result: "ok".to_string(),
        }]))
        .await
        .unwrap();

    let received = mock_server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&received[1].body).unwrap();
    let response = &body["contents"][2]["parts"][0]["functionResponse"];
    assert_eq!(response["name"], "checkAvailability");
    assert!(response.get("id").is_none());
}

#[tokio::test]
async fn failed_send_leaves_history_untouched() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": { "code": 503, "message": "The model is overloaded.", "status": "UNAVAILABLE" }
        })))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate(json!([{ "text": "Hello!" }]))))
        .mount(&mock_server)
        .await;

    let mut dialogue = dialogue_for(&config_for(&mock_server));
    let payload = TurnPayload::Text("hi".to_string());

    let err = dialogue.send(&payload).await.unwrap_err();
    assert_eq!(err.kind, ModelErrorKind::Overloaded);
    assert!(dialogue.history().is_empty());

    let response = dialogue.send(&payload).await.unwrap();
    assert_eq!(response.text.as_deref(), Some("Hello!"));
    assert_eq!(dialogue.history().len(), 2);

    let received = mock_server.received_requests().await.unwrap();
    assert_eq!(received[0].body, received[1].body);
}

#[tokio::test]
async fn rejected_key_is_a_configuration_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": 400,
                "message": "API key not valid. Please pass a valid API key.",
                "status": "INVALID_ARGUMENT",
                "details": [{ "@type": "type.googleapis.com/google.rpc.ErrorInfo", "reason": "API_KEY_INVALID" }]
            }
        })))
        .mount(&mock_server)
        .await;

    let mut dialogue = dialogue_for(&config_for(&mock_server));
    let err = dialogue
        .send(&TurnPayload::Text("hi".to_string()))
        .await
        .unwrap_err();

    assert_eq!(err.kind, ModelErrorKind::Configuration);
    assert_eq!(err.status, Some(400));
}

#[tokio::test]
async fn unreadable_success_body_is_invalid_response() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
        .mount(&mock_server)
        .await;

    let mut dialogue = dialogue_for(&config_for(&mock_server));
    let err = dialogue
        .send(&TurnPayload::Text("hi".to_string()))
        .await
        .unwrap_err();

    assert_eq!(err.kind, ModelErrorKind::InvalidResponse);
}

#[tokio::test]
async fn unreachable_model_is_a_connectivity_error() {
    let mut config = TestConfig::default().to_app_config();
    config.gemini_base_url = "http://127.0.0.1:1".to_string();

    let mut dialogue = dialogue_for(&config);
    let result = dialogue.send(&TurnPayload::Text("hi".to_string())).await;

    assert_matches!(result, Err(ref err) if err.kind == ModelErrorKind::Connectivity);
}

#[tokio::test]
async fn blocked_reply_is_left_out_of_history() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        })))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate(json!([{ "text": "Hello!" }]))))
        .mount(&mock_server)
        .await;

    let mut dialogue = dialogue_for(&config_for(&mock_server));
    let blocked = dialogue
        .send(&TurnPayload::Text("first".to_string()))
        .await
        .unwrap();
    assert_eq!(blocked.text, None);
    assert!(!blocked.has_tool_invocations());
    assert!(dialogue.history().is_empty());

    dialogue
        .send(&TurnPayload::Text("second".to_string()))
        .await
        .unwrap();

    let received = mock_server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&received[1].body).unwrap();
    assert_eq!(
        body["contents"],
        json!([{ "role": "user", "parts": [{ "text": "second" }] }])
    );
}

#[tokio::test]
async fn unanswered_calls_are_closed_before_the_next_message() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate(json!([
            { "functionCall": { "id": "fc-1", "name": "checkAvailability", "args": {} } }
        ]))))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate(json!([{ "text": "Sure." }]))))
        .mount(&mock_server)
        .await;

    let mut dialogue = dialogue_for(&config_for(&mock_server));
    dialogue
        .send(&TurnPayload::Text("first".to_string()))
        .await
        .unwrap();
    dialogue
        .send(&TurnPayload::Text("second".to_string()))
        .await
        .unwrap();

    let received = mock_server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&received[1].body).unwrap();
    let contents = body["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 3);
    assert_eq!(contents[1]["parts"][0]["functionCall"]["id"], "fc-1");

    let parts = contents[2]["parts"].as_array().unwrap();
    assert_eq!(contents[2]["role"], "user");
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0]["functionResponse"]["id"], "fc-1");
    assert_eq!(parts[0]["functionResponse"]["name"], "checkAvailability");
    assert!(parts[0]["functionResponse"]["response"]["result"]
        .as_str()
        .unwrap()
        .starts_with("Error: Not executed."));
    assert_eq!(parts[1], json!({ "text": "second" }));
}

#[tokio::test]
async fn undelivered_tool_results_are_sent_with_the_next_message() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate(json!([
            { "functionCall": { "id": "fc-1", "name": "bookAppointment", "args": {} } }
        ]))))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": { "code": 503, "message": "The model is overloaded.", "status": "UNAVAILABLE" }
        })))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate(json!([{ "text": "You're booked." }]))))
        .mount(&mock_server)
        .await;

    let mut dialogue = dialogue_for(&config_for(&mock_server));
    dialogue
        .send(&TurnPayload::Text("book me".to_string()))
        .await
        .unwrap();
    let booked = "Success: Appointment booked for 2030-03-25T10:00:00Z. Confirmation email sent to jane@x.com.";
    dialogue
        .send(&TurnPayload::ToolResults(vec![ToolResult {
            id: "fc-1".to_string(),
            name: "bookAppointment".to_string(),
            result: booked.to_string(),
        }]))
        .await
        .unwrap_err();
    dialogue
        .send(&TurnPayload::Text("did it work?".to_string()))
        .await
        .unwrap();

    let received = mock_server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&received[2].body).unwrap();
    let parts = body["contents"][2]["parts"].as_array().unwrap();
    assert_eq!(parts[0]["functionResponse"]["response"]["result"], booked);
    assert_eq!(parts[1], json!({ "text": "did it work?" }));
    assert_eq!(dialogue.history().len(), 4);
}

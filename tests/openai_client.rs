//! Wire-level tests of `OpenAiClient` against a local mock server.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rustutor_gateway::llm::{
    CompletionClient, CompletionError, CompletionRequest, Message, OpenAiClient,
};

fn request() -> CompletionRequest {
    CompletionRequest {
        model: "gpt-4o-mini".into(),
        messages: vec![Message::system("Be helpful."), Message::user("hi")],
        temperature: 0.3,
    }
}

fn client_for(server: &MockServer) -> OpenAiClient {
    OpenAiClient::new("test-key")
        .unwrap()
        .with_base_url(format!("{}/v1/chat/completions", server.uri()))
}

#[tokio::test]
async fn sends_bearer_key_and_extracts_first_choice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "messages": [
                {"role": "system", "content": "Be helpful."},
                {"role": "user", "content": "hi"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [
                {"message": {"role": "assistant", "content": "hello there"}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = client_for(&server).complete(request()).await.unwrap();
    assert_eq!(reply, "hello there");
}

#[tokio::test]
async fn non_success_status_surfaces_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let err = client_for(&server).complete(request()).await.unwrap_err();
    match err {
        CompletionError::Api { status, body } => {
            assert_eq!(status.as_u16(), 429);
            assert_eq!(body, "slow down");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn empty_choice_list_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let err = client_for(&server).complete(request()).await.unwrap_err();
    assert!(matches!(err, CompletionError::NoChoices));
}

//! End-to-end chat exchanges against a loopback SSE server.

mod support;

use netpeek::{ChatClient, ChatSession, Config, ExchangeState, NetpeekError, Role};
use support::{content_delta, dead_endpoint, Reply, TestServer};

const KEY_ENV: &str = "NETPEEK_IT_CHAT_KEY";

fn config_for(url: String) -> Config {
    std::env::set_var(KEY_ENV, "test-token");
    Config {
        chat_url: url,
        model: "test-model".to_string(),
        temperature: 0.3,
        api_key_env: KEY_ENV.to_string(),
        ..Config::default()
    }
}

fn last_content(session: &ChatSession) -> String {
    session.transcript().turns().last().expect("turn").content.clone()
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_streamed_fragments_accumulate() {
    let server = TestServer::start(vec![Reply::event_stream(vec![
        content_delta("Hi"),
        content_delta(" there"),
        b"data: [DONE]\n\n".to_vec(),
    ])])
    .await;
    let client = ChatClient::new(&config_for(server.endpoint("/v2/chat")));
    let mut session = ChatSession::new();

    let mut printed = String::new();
    client
        .send(&mut session, "hello", |f| printed.push_str(f))
        .await
        .expect("exchange");

    assert_eq!(last_content(&session), "Hi there");
    assert_eq!(printed, "Hi there");
    assert_eq!(session.state(), ExchangeState::Completed);
    assert!(session.accepts_input());
}

#[tokio::test]
async fn test_request_shape() {
    let server = TestServer::start(vec![Reply::event_stream(vec![b"data: [DONE]\n".to_vec()])]).await;
    let client = ChatClient::new(&config_for(server.endpoint("/v2/chat")));
    let mut session = ChatSession::new();
    client.send(&mut session, "ping?", |_| {}).await.expect("exchange");

    let requests = server.requests().await;
    let req = &requests[0];
    assert_eq!(req.method, "POST");
    assert_eq!(req.path, "/v2/chat");
    assert_eq!(req.header("authorization"), Some("Bearer test-token"));
    assert_eq!(req.header("accept"), Some("text/event-stream"));
    assert_eq!(req.header("content-type"), Some("application/json"));

    let body = req.json();
    assert_eq!(body["model"], "test-model");
    assert_eq!(body["stream"], true);
    assert!((body["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
    assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(body["messages"][0]["content"], "ping?");
}

#[tokio::test]
async fn test_second_exchange_sends_full_history() {
    let server = TestServer::start(vec![
        Reply::event_stream(vec![content_delta("first reply")]),
        Reply::event_stream(vec![content_delta("second reply")]),
    ])
    .await;
    let client = ChatClient::new(&config_for(server.endpoint("/v2/chat")));
    let mut session = ChatSession::new();
    client.send(&mut session, "one", |_| {}).await.expect("first");
    client.send(&mut session, "two", |_| {}).await.expect("second");

    let requests = server.requests().await;
    let messages = requests[1].json()["messages"].clone();
    let messages = messages.as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["content"], "first reply");
    assert_eq!(messages[2]["content"], "two");

    let turns = session.transcript().turns();
    assert_eq!(turns.len(), 4);
    assert_eq!(turns[3].role, Role::Assistant);
    assert_eq!(turns[3].content, "second reply");
}

#[tokio::test]
async fn test_malformed_line_between_events_is_skipped() {
    let server = TestServer::start(vec![Reply::event_stream(vec![
        content_delta("A"),
        b"data: not-json\n\n".to_vec(),
        b": keep-alive\n\n".to_vec(),
        content_delta("B"),
    ])])
    .await;
    let client = ChatClient::new(&config_for(server.endpoint("/v2/chat")));
    let mut session = ChatSession::new();
    client.send(&mut session, "q", |_| {}).await.expect("exchange");
    assert_eq!(last_content(&session), "AB");
}

#[tokio::test]
async fn test_multibyte_character_split_across_writes() {
    let event = content_delta("señor 🦀");
    let crab = event.windows(4).position(|w| w == "🦀".as_bytes()).expect("crab");
    let server = TestServer::start(vec![Reply::event_stream(vec![
        event[..crab + 2].to_vec(),
        event[crab + 2..].to_vec(),
    ])])
    .await;
    let client = ChatClient::new(&config_for(server.endpoint("/v2/chat")));
    let mut session = ChatSession::new();
    client.send(&mut session, "q", |_| {}).await.expect("exchange");
    assert_eq!(last_content(&session), "señor 🦀");
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_http_500_overwrites_assistant_turn() {
    let server = TestServer::start(vec![Reply::json(500, r#"{"message":"internal"}"#)]).await;
    let client = ChatClient::new(&config_for(server.endpoint("/v2/chat")));
    let mut session = ChatSession::new();

    let err = client.send(&mut session, "q", |_| {}).await.unwrap_err();
    assert!(matches!(err, NetpeekError::HttpStatusFailure { status: 500 }));
    assert_eq!(last_content(&session), "Error: API error: 500");
    assert_eq!(session.state(), ExchangeState::Failed);
    assert_eq!(session.transcript().turns()[0].content, "q");
}

#[tokio::test]
async fn test_connection_refused_reports_network_error() {
    let client = ChatClient::new(&config_for(dead_endpoint().await));
    let mut session = ChatSession::new();
    let err = client.send(&mut session, "q", |_| {}).await.unwrap_err();
    assert!(matches!(err, NetpeekError::NetworkFailure(_)));
    assert!(last_content(&session).starts_with("Error: network error:"));
}

#[tokio::test]
async fn test_session_usable_after_failure() {
    let server = TestServer::start(vec![
        Reply::empty(503),
        Reply::event_stream(vec![content_delta("recovered")]),
    ])
    .await;
    let client = ChatClient::new(&config_for(server.endpoint("/v2/chat")));
    let mut session = ChatSession::new();

    assert!(client.send(&mut session, "first", |_| {}).await.is_err());
    client.send(&mut session, "second", |_| {}).await.expect("second");

    let turns = session.transcript().turns();
    assert_eq!(turns[1].content, "Error: API error: 503");
    assert_eq!(turns[3].content, "recovered");

    // The failed turn is part of the history sent with the retry.
    let requests = server.requests().await;
    assert_eq!(requests[1].json()["messages"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_submission_rejected_while_in_flight() {
    let config = config_for(dead_endpoint().await);
    let client = ChatClient::new(&config);
    let mut session = ChatSession::new();
    let _pending = session.begin("still waiting").expect("first exchange");

    let err = client.send(&mut session, "impatient", |_| {}).await.unwrap_err();
    assert!(matches!(err, NetpeekError::ExchangeInFlight));
    assert_eq!(session.transcript().len(), 2);
    assert_eq!(session.state(), ExchangeState::Sending);
    assert!(last_content(&session).is_empty());
}

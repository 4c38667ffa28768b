//! Drives both engine adapters against a one-shot local HTTP responder.

use std::time::Duration;

use futures::{StreamExt, TryStreamExt};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use volley_core::config::EngineConfig;
use volley_core::conversation::{ConversationTurn, Message};
use volley_core::engine::{BulkEngine, StreamingEngine};
use volley_core::error::VolleyError;
use volley_core::prompt::SamplingConfig;
use volley_interaction::{ChatStreamEngine, CompletionsEngine};

/// Accepts one connection, captures the request body as JSON, and writes
/// `parts` back with a short pause between them.
async fn serve_once(parts: Vec<Vec<u8>>) -> (EngineConfig, JoinHandle<Value>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let body = read_request_body(&mut socket).await;

        for part in parts {
            socket.write_all(&part).await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let _ = socket.shutdown().await;

        serde_json::from_slice(&body).unwrap()
    });

    let config = EngineConfig {
        base_url: format!("http://{addr}/v1"),
        api_key: "test-key".to_string(),
        model: "test-model".to_string(),
        connect_timeout_secs: 5,
        request_timeout_secs: 30,
        fragment_timeout_secs: 5,
        ..EngineConfig::default()
    };
    (config, handle)
}

async fn read_request_body(socket: &mut tokio::net::TcpStream) -> Vec<u8> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let read = socket.read(&mut chunk).await.unwrap();
        assert!(read > 0, "client closed before sending headers");
        buffer.extend_from_slice(&chunk[..read]);
        if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buffer[..header_end]).to_lowercase();
    assert!(headers.contains("authorization: bearer test-key"));
    let content_length: usize = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .map(|v| v.trim().parse().unwrap())
        .unwrap_or(0);

    while buffer.len() < header_end + content_length {
        let read = socket.read(&mut chunk).await.unwrap();
        assert!(read > 0, "client closed mid-body");
        buffer.extend_from_slice(&chunk[..read]);
    }
    buffer[header_end..header_end + content_length].to_vec()
}

fn json_response(status: &str, extra_headers: &str, body: &Value) -> Vec<u8> {
    let body = body.to_string();
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n{extra_headers}Connection: close\r\n\r\n{body}",
        body.len()
    )
    .into_bytes()
}

fn sse_headers() -> Vec<u8> {
    b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n"
        .to_vec()
}

fn chunk(data: &str) -> Vec<u8> {
    format!("{:x}\r\n{data}\r\n", data.len()).into_bytes()
}

fn delta_event(content: &str) -> String {
    format!(
        "data: {}\n\n",
        json!({"object": "chat.completion.chunk", "choices": [{"index": 0, "delta": {"content": content}}]})
    )
}

#[tokio::test]
async fn test_completions_engine_reorders_choices_by_index() {
    let response = json!({
        "object": "text_completion",
        "choices": [
            {"index": 1, "text": " two", "finish_reason": "stop"},
            {"index": 0, "text": " one", "finish_reason": "stop"}
        ]
    });
    let (config, server) = serve_once(vec![json_response("200 OK", "", &response)]).await;

    let engine = CompletionsEngine::new(&config).unwrap();
    let prompts = vec!["first".to_string(), "second".to_string()];
    let sampling = SamplingConfig {
        max_tokens: 64,
        ..SamplingConfig::default()
    };
    let outputs = engine.generate(&prompts, &sampling).await.unwrap();

    assert_eq!(outputs[0].prompt, "first");
    assert_eq!(outputs[0].text, " one");
    assert_eq!(outputs[1].prompt, "second");
    assert_eq!(outputs[1].text, " two");

    let request = server.await.unwrap();
    assert_eq!(request["model"], "test-model");
    assert_eq!(request["prompt"], json!(["first", "second"]));
    assert_eq!(request["max_tokens"], 64);
    assert_eq!(request["stream"], false);
}

#[tokio::test]
async fn test_completions_engine_maps_overload_to_retryable_error() {
    let body = json!({"object": "error", "message": "server overloaded", "code": 503});
    let (config, _server) = serve_once(vec![json_response(
        "503 Service Unavailable",
        "Retry-After: 3\r\n",
        &body,
    )])
    .await;

    let engine = CompletionsEngine::new(&config).unwrap();
    let err = engine
        .generate(&["x".to_string()], &SamplingConfig::default())
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
    assert!(err.to_string().contains("server overloaded"));
}

#[tokio::test]
async fn test_unreachable_server_is_engine_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = EngineConfig {
        base_url: format!("http://{addr}/v1"),
        connect_timeout_secs: 2,
        ..EngineConfig::default()
    };
    let engine = CompletionsEngine::new(&config).unwrap();
    let err = engine
        .generate(&["x".to_string()], &SamplingConfig::default())
        .await
        .unwrap_err();

    assert!(matches!(err, VolleyError::EngineUnavailable { .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_completions_body_cut_short_is_engine_unavailable() {
    let partial = r#"{"object": "text_completion""#;
    let head = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 500\r\nConnection: close\r\n\r\n{partial}"
    );
    let (config, _server) = serve_once(vec![head.into_bytes()]).await;

    let engine = CompletionsEngine::new(&config).unwrap();
    let err = engine
        .generate(&["x".to_string()], &SamplingConfig::default())
        .await
        .unwrap_err();

    assert!(matches!(err, VolleyError::EngineUnavailable { .. }), "{err:?}");
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_completions_malformed_body_is_engine_error() {
    let body = "this is not json";
    let reply = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let (config, _server) = serve_once(vec![reply.into_bytes()]).await;

    let engine = CompletionsEngine::new(&config).unwrap();
    let err = engine
        .generate(&["x".to_string()], &SamplingConfig::default())
        .await
        .unwrap_err();

    assert!(matches!(err, VolleyError::EngineError { .. }), "{err:?}");
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_chat_stream_reassembles_events_split_across_chunks() {
    let first = delta_event("Hello");
    let (head, tail) = first.split_at(12);
    let rest = format!("{}{}data: [DONE]\n\n", delta_event(", "), delta_event("world"));

    let (config, server) = serve_once(vec![
        sse_headers(),
        chunk(": keep-alive\n\n"),
        chunk(head),
        chunk(tail),
        chunk(&rest),
        b"0\r\n\r\n".to_vec(),
    ])
    .await;

    let engine = ChatStreamEngine::new(&config).unwrap();
    let history = vec![
        ConversationTurn::user("hi", None),
        ConversationTurn::assistant("hello"),
    ];
    let stream = engine
        .generate_stream(&history, &Message::text("greet the world"), &SamplingConfig::default())
        .await
        .unwrap();
    let fragments: Vec<String> = stream.try_collect().await.unwrap();

    assert_eq!(fragments, vec!["Hello", ", ", "world"]);

    let request = server.await.unwrap();
    assert_eq!(request["stream"], true);
    assert_eq!(
        request["messages"],
        json!([
            {"role": "user", "content": "hi"},
            {"role": "assistant", "content": "hello"},
            {"role": "user", "content": "greet the world"}
        ])
    );
}

#[tokio::test]
async fn test_chat_stream_dropped_connection_is_partial_stream() {
    // No terminating zero-length chunk: the body ends early.
    let (config, _server) = serve_once(vec![
        sse_headers(),
        chunk(&delta_event("The answer")),
        chunk(&delta_event(" is")),
    ])
    .await;

    let engine = ChatStreamEngine::new(&config).unwrap();
    let items: Vec<_> = engine
        .generate_stream(&[], &Message::text("question"), &SamplingConfig::default())
        .await
        .unwrap()
        .collect()
        .await;

    let (fragments, errors): (Vec<_>, Vec<_>) = items.into_iter().partition(|i| i.is_ok());
    let text: String = fragments.into_iter().map(|f| f.unwrap()).collect();
    assert_eq!(text, "The answer is");
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors[0].as_ref().unwrap_err(),
        VolleyError::PartialStream { .. }
    ));
}

#[tokio::test]
async fn test_chat_stream_rejected_request_fails_before_streaming() {
    let body = json!({"error": {"message": "model not found", "type": "invalid_request_error"}});
    let (config, _server) =
        serve_once(vec![json_response("404 Not Found", "", &body)]).await;

    let engine = ChatStreamEngine::new(&config).unwrap();
    let err = match engine
        .generate_stream(&[], &Message::text("hi"), &SamplingConfig::default())
        .await
    {
        Ok(_) => panic!("expected the request to be rejected"),
        Err(err) => err,
    };

    assert!(!err.is_retryable());
    assert!(err.to_string().contains("HTTP 404"));
    assert!(err.to_string().contains("model not found"));
}

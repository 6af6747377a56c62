#![cfg(feature = "http")]

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_dynatrace_sink::error::TransportError;
use tracing_dynatrace_sink::http::{ingest_endpoint, DynatraceHttpClient, DynatraceTransport};
use tracing_dynatrace_sink::sink::LogTransport;
use tracing_dynatrace_sink::{BatchFormatter, EventFormatter, EventFormatterConfig, LogEvent, LogLevel};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "dt0c01.SAMPLE.SECRET";

fn body() -> Vec<u8> {
    let formatter = EventFormatter::new(EventFormatterConfig::new("svc", "host1", "test", "attr.")).unwrap();
    let line = formatter
        .format_to_string(&LogEvent::new(LogLevel::Error, "boom").with_property("user", "alice"))
        .unwrap();
    BatchFormatter::default().format_to_vec([line])
}

#[tokio::test]
async fn posts_json_with_api_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/logs/ingest"))
        .and(header("Authorization", format!("Api-Token {}", TOKEN).as_str()))
        .and(header("Content-Type", "application/json; charset=utf-8"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = DynatraceHttpClient::new(TOKEN).unwrap();
    let status = client
        .post(&ingest_endpoint(&server.uri()), body(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(status.as_u16(), 204);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let sent: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(sent[0]["content"], "boom");
    assert_eq!(sent[0]["attr.user"], "alice");
}

#[tokio::test]
async fn client_returns_error_statuses_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let client = DynatraceHttpClient::new(TOKEN).unwrap();
    let status = client
        .post(&server.uri(), body(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(status.as_u16(), 400);
}

#[tokio::test]
async fn transport_treats_rejection_as_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let transport = DynatraceTransport::new(
        DynatraceHttpClient::new(TOKEN).unwrap(),
        ingest_endpoint(&server.uri()),
    );
    let err = transport.send_batch(body()).await.unwrap_err();
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn transport_accepts_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/logs/ingest"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let transport: Arc<dyn LogTransport> = Arc::new(DynatraceTransport::new(
        DynatraceHttpClient::new(TOKEN).unwrap(),
        ingest_endpoint(&server.uri()),
    ));
    transport.send_batch(body()).await.unwrap();
}

#[tokio::test]
async fn cancellation_aborts_slow_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let transport = DynatraceTransport::new(
        DynatraceHttpClient::new(TOKEN).unwrap(),
        ingest_endpoint(&server.uri()),
    );
    let cancel = transport.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let client = DynatraceHttpClient::new(TOKEN).unwrap();
    let direct = CancellationToken::new();
    let direct_trigger = direct.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        direct_trigger.cancel();
    });

    let result = client.post(&server.uri(), body(), &direct).await;
    assert!(matches!(result, Err(TransportError::Cancelled)));

    let err = transport.send_batch(body()).await.unwrap_err();
    assert!(err.to_string().contains("cancelled"));
}

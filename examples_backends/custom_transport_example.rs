use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};
use tracing_dynatrace_sink::{
    init::{init_tracing_with_transport, LayerConfig},
    selflog::JsonStderrSelfLog,
    sink::LogTransport,
    BatchFormatter, EventFormatter, EventFormatterConfig,
};

/// Example of plugging in a custom transport by implementing the
/// `LogTransport` trait directly, e.g. to forward batches to a local
/// collector instead of calling Dynatrace.
struct StdoutTransport;

#[async_trait]
impl LogTransport for StdoutTransport {
    async fn send_batch(&self, body: Vec<u8>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        println!("[batch] {}", String::from_utf8_lossy(&body));
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let formatter = EventFormatter::new(
        EventFormatterConfig::new("custom-transport-demo", "localhost", "dev", "attr."),
    )
    .expect("valid formatter config")
    .with_self_log(Arc::new(JsonStderrSelfLog));

    init_tracing_with_transport(
        Arc::new(StdoutTransport),
        formatter,
        BatchFormatter::default(),
        LayerConfig::default(),
    )
    .expect("install subscriber");

    info!("custom transport example started");
    error!(trace_id = "4bf92f3577b34da6a3ce929d0e0e4736", "simulated error sent via custom transport");

    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
}

use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

use tracing_dynatrace_sink::init::{init_tracing_with_transport, LayerConfig};
use tracing_dynatrace_sink::noop::NoopTransport;
use tracing_dynatrace_sink::{BatchFormatter, EventFormatter, EventFormatterConfig};

#[tokio::main]
async fn main() {
    let formatter = EventFormatter::new(
        EventFormatterConfig::new("auth-service", "127.0.0.1", "staging", "attr.")
            .with_attribute("service.namespace", "identity"),
    )
    .expect("valid formatter config");

    init_tracing_with_transport(
        Arc::new(NoopTransport::default()),
        formatter,
        BatchFormatter::default(),
        LayerConfig::default(),
    )
    .expect("install subscriber");

    info!("starting service");

    error!(
        user_id = 42,
        reason = "invalid password",
        "authentication failed"
    );

    sleep(Duration::from_secs(2)).await;
}

use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{error, Level};

use tracing_dynatrace_sink::init::{init_tracing_with_transport, LayerConfig};
use tracing_dynatrace_sink::noop::NoopTransport;
use tracing_dynatrace_sink::{BatchFormatter, EventFormatter, EventFormatterConfig};

#[tokio::main]
async fn main() {
    let formatter = EventFormatter::new(
        EventFormatterConfig::new("load-test", "localhost", "bench", "attr.")
            .with_attribute("team", "platform"),
    )
    .expect("valid formatter config");

    let layer_config = LayerConfig {
        channel_buffer: 50_000,
        batch_size: 1_000,
        flush_interval: Duration::from_millis(200),
        max_level: Level::ERROR,
        enable_stdout: false,
        ..LayerConfig::default()
    };

    init_tracing_with_transport(
        Arc::new(NoopTransport::default()),
        formatter,
        BatchFormatter::new(64 * 1024),
        layer_config,
    )
    .expect("install subscriber");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, tags = ?["a", "b"], "custom load test error");
    }

    let elapsed = start.elapsed();
    println!("custom config: formatted {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    sleep(Duration::from_secs(2)).await;
}

use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::error;

use tracing_dynatrace_sink::init::{init_tracing_with_transport, LayerConfig};
use tracing_dynatrace_sink::noop::NoopTransport;
use tracing_dynatrace_sink::{BatchFormatter, EventFormatter, EventFormatterConfig};

#[tokio::main]
async fn main() {
    let formatter = EventFormatter::new(EventFormatterConfig::new("load-test", "localhost", "bench", "attr."))
        .expect("valid formatter config");

    let stats = init_tracing_with_transport(
        Arc::new(NoopTransport::default()),
        formatter,
        BatchFormatter::default(),
        LayerConfig {
            enable_stdout: false,
            ..LayerConfig::default()
        },
    )
    .expect("install subscriber");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "default load test error");
    }

    let elapsed = start.elapsed();
    println!("default config: formatted {} events in {:?} (~{:.0} ev/s), dropped {}",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64(),
        stats.dropped_events.load(std::sync::atomic::Ordering::Relaxed),
    );

    // Give background task a little time to drain the channel
    sleep(Duration::from_secs(2)).await;
}

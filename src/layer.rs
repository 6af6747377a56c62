use crate::batch::BatchFormatter;
use crate::formatter::EventFormatter;
use crate::property::PropertyValue;
use crate::record::{LogEvent, LogLevel, MessageTemplate};
use crate::selflog::{Diagnostic, SelfLog};
use crate::sink::LogTransport;
use chrono::Utc;
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Counters shared between a [`DynatraceLayer`] and its background task.
#[derive(Debug, Clone, Default)]
pub struct LayerStats {
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Formatted and successfully enqueued into the channel.
    pub enqueued_events: Arc<AtomicU64>,
    /// Dropped because the channel was full or closed.
    pub dropped_events: Arc<AtomicU64>,
    /// Batches accepted by the transport.
    pub sent_batches: Arc<AtomicU64>,
    /// Batches the transport failed to deliver.
    pub failed_batches: Arc<AtomicU64>,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Buffering and filtering knobs of [`DynatraceLayer`].
#[derive(Clone, Debug)]
pub struct LayerOptions {
    pub channel_buffer: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
    /// Most verbose level that is shipped.
    pub max_level: Level,
    /// Add the event target as a `target` property.
    pub include_target: bool,
}

impl Default for LayerOptions {
    fn default() -> Self {
        Self {
            channel_buffer: 1024,
            batch_size: 128,
            flush_interval: Duration::from_secs(1),
            max_level: Level::INFO,
            include_target: true,
        }
    }
}

/// `tracing_subscriber` layer that formats events as Dynatrace log lines
/// and hands them to a background task, which batches them and ships each
/// batch through a [`LogTransport`].
///
/// Formatting happens on the application thread; network I/O is fully
/// decoupled from it via a bounded channel. When the channel is full new
/// lines are dropped and counted.
pub struct DynatraceLayer {
    formatter: Arc<EventFormatter>,
    sender: mpsc::Sender<String>,
    max_level: Level,
    include_target: bool,
    stats: LayerStats,
}

impl DynatraceLayer {
    /// Create a new layer and spawn the background batching task.
    ///
    /// Minimal thresholds are enforced for the channel size, batch size
    /// and flush interval to avoid degenerate configurations. Must be
    /// called from within a Tokio runtime.
    ///
    /// The task flushes when `batch_size` lines are buffered, on every
    /// `flush_interval` tick, and once more when the layer is dropped.
    pub fn new(
        formatter: Arc<EventFormatter>,
        batch_formatter: BatchFormatter,
        transport: Arc<dyn LogTransport>,
        options: LayerOptions,
    ) -> (Self, JoinHandle<()>) {
        let buffer = options.channel_buffer.max(16);
        let batch_size = options.batch_size.max(1);
        let flush_interval = options.flush_interval.max(Duration::from_millis(10));

        let (tx, mut rx) = mpsc::channel::<String>(buffer);
        let stats = LayerStats::default();
        let stats_bg = stats.clone();
        let self_log = formatter.self_log();

        let handle = tokio::spawn(async move {
            let mut batch: Vec<String> = Vec::with_capacity(batch_size);
            let mut ticker = time::interval(flush_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    line = rx.recv() => match line {
                        Some(line) => {
                            batch.push(line);
                            if batch.len() >= batch_size {
                                send_batch(&*transport, &batch_formatter, &mut batch, &*self_log, &stats_bg).await;
                            }
                        }
                        None => {
                            send_batch(&*transport, &batch_formatter, &mut batch, &*self_log, &stats_bg).await;
                            if let Err(e) = transport.flush().await {
                                self_log.write(Diagnostic::new(format!("error flushing log transport: {}", e)));
                            }
                            break;
                        }
                    },
                    _ = ticker.tick() => {
                        send_batch(&*transport, &batch_formatter, &mut batch, &*self_log, &stats_bg).await;
                    }
                }
            }
        });

        (
            Self {
                formatter,
                sender: tx,
                max_level: options.max_level,
                include_target: options.include_target,
                stats,
            },
            handle,
        )
    }

    /// Handle to the layer's counters; stays valid after the layer has
    /// been moved into a subscriber.
    pub fn stats(&self) -> LayerStats {
        self.stats.clone()
    }
}

async fn send_batch(
    transport: &dyn LogTransport,
    batch_formatter: &BatchFormatter,
    batch: &mut Vec<String>,
    self_log: &dyn SelfLog,
    stats: &LayerStats,
) {
    if batch.is_empty() {
        return;
    }

    let body = batch_formatter.format_to_vec(batch.iter());
    let count = batch.len();
    batch.clear();

    // every line was over the size limit
    if body.is_empty() {
        return;
    }

    match transport.send_batch(body).await {
        Ok(()) => bump(&stats.sent_batches),
        Err(e) => {
            bump(&stats.failed_batches);
            self_log.write(Diagnostic::new(format!(
                "error sending log batch of {} events, batch dropped: {}",
                count, e
            )));
        }
    }
}

impl<S> Layer<S> for DynatraceLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        bump(&self.stats.total_events);
        let meta = event.metadata();
        if *meta.level() > self.max_level {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        if self.include_target {
            visitor
                .properties
                .push(("target".to_string(), meta.target().into()));
        }

        let record = LogEvent {
            timestamp: Utc::now(),
            level: LogLevel::from(meta.level()),
            message_template: MessageTemplate::literal(visitor.message.as_deref().unwrap_or_default()),
            properties: visitor.properties,
            exception: visitor.exception,
        };

        // formatting failures are already reported by the formatter
        let Some(line) = self.formatter.format_to_string(&record) else {
            return;
        };

        match self.sender.try_send(line) {
            Ok(()) => bump(&self.stats.enqueued_events),
            Err(_) => bump(&self.stats.dropped_events),
        }
    }
}

/// Collects event fields: `message` becomes the template text,
/// `exception`/`error` the exception detail, the rest properties in
/// record order.
#[derive(Default)]
pub struct FieldVisitor {
    pub message: Option<String>,
    pub exception: Option<String>,
    pub properties: Vec<(String, PropertyValue)>,
}

impl FieldVisitor {
    fn push(&mut self, field: &Field, value: PropertyValue) {
        self.properties.push((field.name().to_string(), value));
    }

    fn is_exception(field: &Field) -> bool {
        matches!(field.name(), "exception" | "error")
    }
}

/// `Display` of an error followed by each of its sources, `: `-separated.
fn error_chain(error: &(dyn Error + 'static)) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else if Self::is_exception(field) {
            self.exception = Some(value.to_string());
        } else {
            self.push(field, value.into());
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, value.into());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        let text = error_chain(value);
        if Self::is_exception(field) {
            self.exception = Some(text);
        } else {
            self.push(field, text.into());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let text = format!("{:?}", value);
        if field.name() == "message" {
            self.message = Some(text);
        } else if Self::is_exception(field) {
            self.exception = Some(text);
        } else {
            self.push(field, text.into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::EventFormatterConfig;
    use crate::selflog::MemorySelfLog;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::Registry;

    #[derive(Default)]
    struct RecordingTransport {
        bodies: Mutex<Vec<Vec<u8>>>,
        fail: bool,
    }

    #[async_trait]
    impl LogTransport for RecordingTransport {
        async fn send_batch(&self, body: Vec<u8>) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.bodies.lock().unwrap().push(body);
            if self.fail {
                Err("backend unavailable".into())
            } else {
                Ok(())
            }
        }
    }

    fn formatter(log: &Arc<MemorySelfLog>) -> Arc<EventFormatter> {
        let config = EventFormatterConfig::new("svc", "host1", "test", "props.");
        Arc::new(EventFormatter::new(config).unwrap().with_self_log(log.clone()))
    }

    fn options() -> LayerOptions {
        LayerOptions {
            flush_interval: Duration::from_secs(3600),
            include_target: false,
            ..LayerOptions::default()
        }
    }

    fn parse(body: &[u8]) -> Vec<serde_json::Value> {
        serde_json::from_slice::<serde_json::Value>(body)
            .unwrap()
            .as_array()
            .unwrap()
            .clone()
    }

    #[tokio::test]
    async fn ships_events_on_shutdown() {
        let log = MemorySelfLog::new();
        let transport = Arc::new(RecordingTransport::default());
        let (layer, handle) = DynatraceLayer::new(
            formatter(&log),
            BatchFormatter::default(),
            transport.clone(),
            options(),
        );
        let stats = layer.stats();

        tracing::subscriber::with_default(Registry::default().with(layer), || {
            tracing::info!(user = "alice", count = 3, "user logged in");
            tracing::debug!("filtered out");
            tracing::error!(trace_id = "abc123", exception = "disk full", "write failed");
        });
        handle.await.unwrap();

        let bodies = transport.bodies.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        let events = parse(&bodies[0]);
        assert_eq!(events.len(), 2);

        assert_eq!(events[0]["level"], "Information");
        assert_eq!(events[0]["content"], "user logged in");
        assert_eq!(events[0]["props.user"], "alice");
        assert_eq!(events[0]["props.count"], "3");

        assert_eq!(events[1]["level"], "Error");
        assert_eq!(events[1]["content"], "write failed\ndisk full");
        assert_eq!(events[1]["trace_id"], "abc123");

        assert_eq!(stats.total_events.load(Ordering::Relaxed), 3);
        assert_eq!(stats.enqueued_events.load(Ordering::Relaxed), 2);
        assert_eq!(stats.sent_batches.load(Ordering::Relaxed), 1);
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn flushes_when_batch_is_full() {
        let log = MemorySelfLog::new();
        let transport = Arc::new(RecordingTransport::default());
        let (layer, handle) = DynatraceLayer::new(
            formatter(&log),
            BatchFormatter::default(),
            transport.clone(),
            LayerOptions {
                batch_size: 2,
                ..options()
            },
        );

        tracing::subscriber::with_default(Registry::default().with(layer), || {
            for i in 0..5 {
                tracing::warn!(i, "event {}", i);
            }
        });
        handle.await.unwrap();

        let bodies = transport.bodies.lock().unwrap();
        let sizes: Vec<usize> = bodies.iter().map(|b| parse(b).len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(parse(&bodies[2])[0]["content"], "event 4");
    }

    #[tokio::test]
    async fn failed_batches_are_reported_and_dropped() {
        let log = MemorySelfLog::new();
        let transport = Arc::new(RecordingTransport {
            fail: true,
            ..RecordingTransport::default()
        });
        let (layer, handle) = DynatraceLayer::new(
            formatter(&log),
            BatchFormatter::default(),
            transport.clone(),
            options(),
        );
        let stats = layer.stats();

        tracing::subscriber::with_default(Registry::default().with(layer), || {
            tracing::error!("lost");
        });
        handle.await.unwrap();

        assert_eq!(transport.bodies.lock().unwrap().len(), 1);
        assert_eq!(stats.failed_batches.load(Ordering::Relaxed), 1);
        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].error.contains("backend unavailable"));
        assert_eq!(entries[0].message_template, None);
    }

    #[tokio::test]
    async fn oversized_lines_never_reach_the_transport() {
        let log = MemorySelfLog::new();
        let transport = Arc::new(RecordingTransport::default());
        let (layer, handle) = DynatraceLayer::new(
            formatter(&log),
            BatchFormatter::new(64),
            transport.clone(),
            options(),
        );

        tracing::subscriber::with_default(Registry::default().with(layer), || {
            tracing::info!(payload = %"x".repeat(500), "big");
        });
        handle.await.unwrap();

        assert!(transport.bodies.lock().unwrap().is_empty());
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn error_fields_become_exception_with_sources() {
        #[derive(Debug)]
        struct RequestFailed(std::io::Error);

        impl fmt::Display for RequestFailed {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("request failed")
            }
        }

        impl Error for RequestFailed {
            fn source(&self) -> Option<&(dyn Error + 'static)> {
                Some(&self.0)
            }
        }

        let log = MemorySelfLog::new();
        let transport = Arc::new(RecordingTransport::default());
        let (layer, handle) = DynatraceLayer::new(
            formatter(&log),
            BatchFormatter::default(),
            transport.clone(),
            LayerOptions {
                include_target: true,
                ..options()
            },
        );

        let err = RequestFailed(std::io::Error::new(std::io::ErrorKind::Other, "timed out"));
        tracing::subscriber::with_default(Registry::default().with(layer), || {
            tracing::error!(error = &err as &(dyn Error + 'static), "call failed");
        });
        handle.await.unwrap();

        let bodies = transport.bodies.lock().unwrap();
        let event = &parse(&bodies[0])[0];
        assert_eq!(event["content"], "call failed\nrequest failed: timed out");
        assert_eq!(event["props.target"], module_path!());
    }

    #[test]
    fn error_chain_joins_sources() {
        let inner = std::io::Error::new(std::io::ErrorKind::Other, "inner");
        assert_eq!(error_chain(&inner), "inner");
    }
}

use crate::batch::{BatchFormatter, DEFAULT_EVENT_BODY_LIMIT_BYTES};
use crate::error::ConfigError;
use crate::formatter::{EventFormatter, EventFormatterConfig};
use crate::layer::{DynatraceLayer, LayerOptions, LayerStats};
use crate::sink::LogTransport;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the logging layer.
///
/// Controls the size of the internal buffer, the maximum number of lines
/// per batch sent to the transport, how often a partial batch is flushed,
/// which levels are shipped, and whether events are also printed to the
/// console through a `fmt` layer.
///
/// **Fields**
/// - `channel_buffer`: maximum number of formatted lines queued before new
///   ones are dropped.
/// - `batch_size`: number of lines per batch.
/// - `flush_interval`: maximum time between flushes even when the batch
///   is not full.
/// - `max_level`: most verbose level that is shipped.
/// - `include_target`: if `true`, the event target is shipped as a
///   `target` property.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   added on top of [`DynatraceLayer`].
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub channel_buffer: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub max_level: Level,
    pub include_target: bool,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 1024,
            batch_size: 128,
            flush_interval: Duration::from_secs(1),
            max_level: Level::INFO,
            include_target: true,
            enable_stdout: true,
        }
    }
}

impl LayerConfig {
    fn options(&self) -> LayerOptions {
        LayerOptions {
            channel_buffer: self.channel_buffer,
            batch_size: self.batch_size,
            flush_interval: self.flush_interval,
            max_level: self.max_level,
            include_target: self.include_target,
        }
    }
}

/// Everything needed to ship logs to one Dynatrace environment.
#[derive(Clone, Debug)]
pub struct DynatraceSinkConfig {
    /// Ingest endpoint, or the bare environment URL.
    pub ingest_url: String,
    pub access_token: String,
    pub formatter: EventFormatterConfig,
    pub event_body_limit_bytes: usize,
    pub layer: LayerConfig,
}

impl DynatraceSinkConfig {
    /// Build a configuration from the `DT_*` variables in [`crate::env`].
    ///
    /// Missing values are left blank and rejected later by
    /// [`init_tracing`]; the host name falls back to `HOSTNAME`, then
    /// `localhost`. An unparsable body limit falls back to
    /// [`DEFAULT_EVENT_BODY_LIMIT_BYTES`].
    pub fn from_env() -> Self {
        use crate::env::*;

        let host_name = env_opt(DT_HOST_NAME_ENV)
            .or_else(|| env_opt("HOSTNAME"))
            .unwrap_or_else(|| "localhost".to_string());

        let formatter = EventFormatterConfig {
            application_id: env_or(DT_APPLICATION_ID_ENV, ""),
            host_name,
            environment: env_or(DT_ENVIRONMENT_ENV, ""),
            properties_prefix: env_or(DT_PROPERTIES_PREFIX_ENV, DEFAULT_PROPERTIES_PREFIX),
            custom_attributes: parse_attributes(&env_or(DT_CUSTOM_ATTRIBUTES_ENV, "")),
        };

        let event_body_limit_bytes = env_opt(DT_EVENT_BODY_LIMIT_ENV)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_EVENT_BODY_LIMIT_BYTES);

        Self {
            ingest_url: env_or(DT_LOGS_INGEST_URL_ENV, ""),
            access_token: env_or(DT_API_TOKEN_ENV, ""),
            formatter,
            event_body_limit_bytes,
            layer: LayerConfig::default(),
        }
    }
}

/// Error returned when the global subscriber cannot be installed.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Initialize the global `tracing` subscriber with a [`DynatraceLayer`]
/// shipping through `transport`.
///
/// **Parameters**
/// - `transport`: implementation of [`LogTransport`] that receives batch
///   bodies.
/// - `formatter`: renders each event; its self-diagnostics channel also
///   receives batch delivery failures.
/// - `batch_formatter`: assembles request bodies.
/// - `config`: [`LayerConfig`] controlling buffering and batching.
///
/// **Returns**
/// - the layer's [`LayerStats`] counters.
///
/// Must be called from within a Tokio runtime.
pub fn init_tracing_with_transport(
    transport: Arc<dyn LogTransport>,
    formatter: EventFormatter,
    batch_formatter: BatchFormatter,
    config: LayerConfig,
) -> Result<LayerStats, InitError> {
    let (layer, _handle) = DynatraceLayer::new(
        Arc::new(formatter),
        batch_formatter,
        transport,
        config.options(),
    );
    let stats = layer.stats();

    // The two subscriber shapes have different types, so each branch
    // installs its own.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(stats)
}

/// Initialize tracing with a Dynatrace HTTP transport built from `config`.
///
/// **Errors**
/// - [`InitError::Config`] if an identity setting, the ingest URL or the
///   access token is blank.
/// - [`InitError::Subscriber`] if a global subscriber is already set.
#[cfg(feature = "http")]
pub fn init_tracing(config: DynatraceSinkConfig) -> Result<LayerStats, InitError> {
    use crate::http::{ingest_endpoint, DynatraceHttpClient, DynatraceTransport};

    crate::error::require_non_blank("ingest_url", &config.ingest_url)?;
    let formatter = EventFormatter::new(config.formatter)?;
    let client = DynatraceHttpClient::new(&config.access_token)?;
    let transport = DynatraceTransport::new(client, ingest_endpoint(&config.ingest_url));

    init_tracing_with_transport(
        Arc::new(transport),
        formatter,
        BatchFormatter::new(config.event_body_limit_bytes),
        config.layer,
    )
}

/// Read the configuration from the environment and initialize tracing.
///
/// Equivalent to `init_tracing(DynatraceSinkConfig::from_env())`. This is
/// the recommended entrypoint for typical microservices.
#[cfg(feature = "http")]
pub fn init_tracing_from_env() -> Result<LayerStats, InitError> {
    init_tracing(DynatraceSinkConfig::from_env())
}

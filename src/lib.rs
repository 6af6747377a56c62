//! Ship `tracing` events to the Dynatrace log ingest API.
//!
//! Each event is rendered by [`EventFormatter`] as one flat JSON object,
//! nested properties flattened into dotted keys. Lines are buffered by
//! [`DynatraceLayer`] and joined by [`BatchFormatter`] into a JSON array
//! request body, leaving out lines over the per-event size limit.

pub mod batch;
pub mod env;
pub mod error;
pub mod formatter;
pub mod property;
pub mod record;
pub mod selflog;
pub mod sink;
pub mod layer;

#[cfg(feature = "http")]
pub mod http;

pub mod init;
pub mod noop;

pub use batch::{BatchFormatter, DEFAULT_EVENT_BODY_LIMIT_BYTES};
pub use error::{ConfigError, FormatError};
pub use formatter::{EventFormatter, EventFormatterConfig};
pub use layer::{DynatraceLayer, LayerOptions, LayerStats};
pub use property::{PropertyValue, ScalarValue, ROOT_PROPERTIES};
pub use record::{LogEvent, LogLevel, MessageTemplate};
pub use sink::LogTransport;

use crate::error::{require_non_blank, ConfigError, FormatError};
use crate::property::flatten_properties;
use crate::record::LogEvent;
use crate::selflog::{self, Diagnostic, SelfLog};
use std::fmt::Write as _;
use std::io;
use std::sync::Arc;

/// Identity and enrichment settings for [`EventFormatter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFormatterConfig {
    /// Written as `application.id` on every line.
    pub application_id: String,
    /// Written as `host.name` on every line.
    pub host_name: String,
    /// Written as `environment` on every line.
    pub environment: String,
    /// Prepended to every bound property key outside the reserved root set.
    pub properties_prefix: String,
    /// Extra `key: value` pairs appended to every line, in this order.
    pub custom_attributes: Vec<(String, String)>,
}

impl EventFormatterConfig {
    pub fn new(
        application_id: impl Into<String>,
        host_name: impl Into<String>,
        environment: impl Into<String>,
        properties_prefix: impl Into<String>,
    ) -> Self {
        Self {
            application_id: application_id.into(),
            host_name: host_name.into(),
            environment: environment.into(),
            properties_prefix: properties_prefix.into(),
            custom_attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_attributes.push((key.into(), value.into()));
        self
    }
}

/// Renders [`LogEvent`]s as single-line Dynatrace JSON objects.
///
/// Field order is fixed: `timestamp`, `level`, `application.id`,
/// `host.name`, `environment`, `content`, the flattened
/// event properties and finally the custom attributes. Every value except
/// `timestamp` is a JSON string.
///
/// The formatter is immutable after construction and can be shared across
/// threads as long as each call gets its own output.
pub struct EventFormatter {
    application_id: String,
    host_name: String,
    environment: String,
    properties_prefix: String,
    custom_attributes: Vec<(String, String)>,
    self_log: Arc<dyn SelfLog>,
}

impl EventFormatter {
    /// Validate `config` and build a formatter reporting to stderr.
    ///
    /// **Errors**
    /// - [`ConfigError::Blank`] if the application id, host name,
    ///   environment or properties prefix is blank.
    pub fn new(config: EventFormatterConfig) -> Result<Self, ConfigError> {
        require_non_blank("application_id", &config.application_id)?;
        require_non_blank("host_name", &config.host_name)?;
        require_non_blank("environment", &config.environment)?;
        require_non_blank("properties_prefix", &config.properties_prefix)?;

        Ok(Self {
            application_id: config.application_id,
            host_name: config.host_name,
            environment: config.environment,
            properties_prefix: config.properties_prefix,
            custom_attributes: config.custom_attributes,
            self_log: selflog::stderr(),
        })
    }

    /// Send diagnostics for dropped events to `self_log` instead of stderr.
    pub fn with_self_log(mut self, self_log: Arc<dyn SelfLog>) -> Self {
        self.self_log = self_log;
        self
    }

    /// Channel dropped events are reported to.
    pub fn self_log(&self) -> Arc<dyn SelfLog> {
        Arc::clone(&self.self_log)
    }

    /// Write `event` to `output` as one JSON line.
    ///
    /// The line is built in a scratch buffer and handed to `output` in a
    /// single `write_all`, so `output` never sees a partial object. If
    /// rendering or writing fails the event is dropped and one
    /// [`Diagnostic`] is recorded; the error is not returned.
    pub fn format(&self, event: &LogEvent, output: &mut dyn io::Write) {
        let result = self.render(event).and_then(|mut line| {
            line.push('\n');
            output.write_all(line.as_bytes())?;
            Ok(())
        });

        if let Err(e) = result {
            self.report(event, &e);
        }
    }

    /// Render `event` without a trailing line break.
    ///
    /// Returns `None` (after recording a [`Diagnostic`]) when the event
    /// cannot be formatted.
    pub fn format_to_string(&self, event: &LogEvent) -> Option<String> {
        match self.render(event) {
            Ok(line) => Some(line),
            Err(e) => {
                self.report(event, &e);
                None
            }
        }
    }

    fn render(&self, event: &LogEvent) -> Result<String, FormatError> {
        let mut buf = String::with_capacity(256);

        write!(buf, "{{\"timestamp\":{}", event.timestamp.timestamp_millis())?;
        write_field(&mut buf, "level", event.level.as_str())?;
        write_field(&mut buf, "application.id", &self.application_id)?;
        write_field(&mut buf, "host.name", &self.host_name)?;
        write_field(&mut buf, "environment", &self.environment)?;
        write_field(&mut buf, "content", &event.content()?)?;

        flatten_properties(&event.properties, &self.properties_prefix, &mut |key: &str, value: &str| {
            write_field(&mut buf, key, value)
        })?;

        for (key, value) in &self.custom_attributes {
            write_field(&mut buf, key, value)?;
        }

        buf.push('}');
        Ok(buf)
    }

    fn report(&self, event: &LogEvent, error: &FormatError) {
        self.self_log.write(Diagnostic::event(
            event.timestamp,
            event.message_template.text(),
            error,
        ));
    }
}

fn write_field(buf: &mut String, key: &str, value: &str) -> Result<(), FormatError> {
    buf.push(',');
    buf.push_str(&serde_json::to_string(key)?);
    buf.push(':');
    buf.push_str(&serde_json::to_string(value)?);
    Ok(())
}

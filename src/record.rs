use crate::property::PropertyValue;
use chrono::{DateTime, Utc};
use std::fmt::{self, Write as _};

/// Severity of a [`LogEvent`], named the way Dynatrace expects it in the
/// `level` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Verbose,
    Debug,
    Information,
    Warning,
    Error,
    Fatal,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Verbose => "Verbose",
            LogLevel::Debug => "Debug",
            LogLevel::Information => "Information",
            LogLevel::Warning => "Warning",
            LogLevel::Error => "Error",
            LogLevel::Fatal => "Fatal",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&tracing::Level> for LogLevel {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::ERROR => LogLevel::Error,
            tracing::Level::WARN => LogLevel::Warning,
            tracing::Level::INFO => LogLevel::Information,
            tracing::Level::DEBUG => LogLevel::Debug,
            _ => LogLevel::Verbose,
        }
    }
}

/// Message text with `{Name}` holes bound to event properties.
///
/// `{{` and `}}` stand for literal braces. A hole may carry a `@`/`$`
/// hint and a `,alignment` or `:format` suffix; both are ignored for
/// lookup. String values are substituted in double quotes unless the hole
/// uses the `:l` format. Holes naming an unknown property, and a trailing
/// unterminated hole, are rendered verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    text: String,
}

impl MessageTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Template that renders back to exactly `text`, with no holes.
    pub fn literal(text: &str) -> Self {
        Self {
            text: text.replace('{', "{{").replace('}', "}}"),
        }
    }

    /// Raw template text, as written at the call site.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Render the template against `properties`.
    ///
    /// Fails only when a substituted value's `Display` implementation
    /// reports an error.
    pub fn render(&self, properties: &[(String, PropertyValue)]) -> Result<String, fmt::Error> {
        let mut out = String::with_capacity(self.text.len());
        let mut rest = self.text.as_str();

        while let Some(pos) = rest.find(|c: char| c == '{' || c == '}') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];

            if tail.starts_with("{{") || tail.starts_with("}}") {
                out.push_str(&tail[..1]);
                rest = &tail[2..];
                continue;
            }
            if tail.starts_with('}') {
                out.push('}');
                rest = &tail[1..];
                continue;
            }

            let Some(end) = tail.find('}') else {
                out.push_str(tail);
                return Ok(out);
            };
            let hole = &tail[..=end];
            let token = &hole[1..hole.len() - 1];
            match (lookup(properties, hole_name(token)), hole_format(token)) {
                (Some(PropertyValue::Scalar(scalar)), Some("l")) => write!(out, "{}", scalar)?,
                (Some(value), _) => write!(out, "{}", value)?,
                (None, _) => out.push_str(hole),
            }
            rest = &tail[end + 1..];
        }

        out.push_str(rest);
        Ok(out)
    }
}

impl From<&str> for MessageTemplate {
    fn from(text: &str) -> Self {
        MessageTemplate::new(text)
    }
}

impl From<String> for MessageTemplate {
    fn from(text: String) -> Self {
        MessageTemplate::new(text)
    }
}

fn hole_name(token: &str) -> &str {
    let token = token.trim_start_matches(|c: char| c == '@' || c == '$');
    let end = token.find(|c: char| c == ',' || c == ':').unwrap_or(token.len());
    token[..end].trim()
}

fn hole_format(token: &str) -> Option<&str> {
    token.split_once(':').map(|(_, format)| format.trim())
}

fn lookup<'a>(properties: &'a [(String, PropertyValue)], name: &str) -> Option<&'a PropertyValue> {
    properties
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value)
}

/// One structured log record, as handed to
/// [`EventFormatter`](crate::formatter::EventFormatter).
///
/// Properties keep their insertion order; it is the order they appear in
/// the formatted line.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message_template: MessageTemplate,
    pub properties: Vec<(String, PropertyValue)>,
    /// Text of the error attached to the event, if any.
    pub exception: Option<String>,
}

impl LogEvent {
    /// Event stamped with the current time and no properties.
    pub fn new(level: LogLevel, message_template: impl Into<MessageTemplate>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message_template: message_template.into(),
            properties: Vec::new(),
            exception: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }

    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    /// Rendered message, followed by a line break and the exception text
    /// when one is attached.
    pub fn content(&self) -> Result<String, fmt::Error> {
        let mut content = self.message_template.render(&self.properties)?;
        if let Some(exception) = &self.exception {
            content.push('\n');
            content.push_str(exception);
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props() -> Vec<(String, PropertyValue)> {
        vec![
            ("user".to_string(), "alice".into()),
            ("count".to_string(), 3i64.into()),
        ]
    }

    #[test]
    fn renders_plain_text() {
        let t = MessageTemplate::new("hello");
        assert_eq!(t.render(&props()).unwrap(), "hello");
    }

    #[test]
    fn substitutes_holes() {
        let t = MessageTemplate::new("user {user} did {count} things");
        assert_eq!(t.render(&props()).unwrap(), "user \"alice\" did 3 things");
    }

    #[test]
    fn ignores_hints_and_formats() {
        let t = MessageTemplate::new("{@user} {count:000} {count,5}");
        assert_eq!(t.render(&props()).unwrap(), "\"alice\" 3 3");
    }

    #[test]
    fn literal_format_leaves_strings_unquoted() {
        let t = MessageTemplate::new("hello {user:l} / {user} / {count:l}");
        assert_eq!(t.render(&props()).unwrap(), "hello alice / \"alice\" / 3");
    }

    #[test]
    fn unknown_and_unterminated_holes_are_verbatim() {
        let t = MessageTemplate::new("{missing} and {user");
        assert_eq!(t.render(&props()).unwrap(), "{missing} and {user");
    }

    #[test]
    fn escaped_braces() {
        let t = MessageTemplate::new("{{literal}} }");
        assert_eq!(t.render(&props()).unwrap(), "{literal} }");
    }

    #[test]
    fn literal_templates_render_verbatim() {
        let t = MessageTemplate::literal("map {user} -> {}");
        assert_eq!(t.text(), "map {{user}} -> {{}}");
        assert_eq!(t.render(&props()).unwrap(), "map {user} -> {}");
    }

    #[test]
    fn content_appends_exception() {
        let event = LogEvent::new(LogLevel::Error, "boom").with_exception("io error: denied");
        assert_eq!(event.content().unwrap(), "boom\nio error: denied");
    }

    #[test]
    fn maps_tracing_levels() {
        assert_eq!(LogLevel::from(&tracing::Level::TRACE), LogLevel::Verbose);
        assert_eq!(LogLevel::from(&tracing::Level::INFO), LogLevel::Information);
        assert_eq!(LogLevel::from(&tracing::Level::WARN).to_string(), "Warning");
    }
}

//! Environment variable names used by this crate for convenient
//! configuration of the sink from microservices.
//!
//! These are purely helpers; the formatter and transport types remain
//! decoupled from environment access.

/// Full ingest URL, or just the environment URL
/// (e.g. `https://abc12345.live.dynatrace.com`).
pub const DT_LOGS_INGEST_URL_ENV: &str = "DT_LOGS_INGEST_URL";

/// API token with the `logs.ingest` scope.
pub const DT_API_TOKEN_ENV: &str = "DT_API_TOKEN";

/// Value of the `application.id` field.
pub const DT_APPLICATION_ID_ENV: &str = "DT_APPLICATION_ID";

/// Value of the `host.name` field. Falls back to `HOSTNAME`.
pub const DT_HOST_NAME_ENV: &str = "DT_HOST_NAME";

/// Value of the `environment` field. Required.
pub const DT_ENVIRONMENT_ENV: &str = "DT_ENVIRONMENT";

/// Prefix for bound property keys.
pub const DT_PROPERTIES_PREFIX_ENV: &str = "DT_PROPERTIES_PREFIX";

/// Extra attributes as `key=value` pairs separated by commas.
pub const DT_CUSTOM_ATTRIBUTES_ENV: &str = "DT_CUSTOM_ATTRIBUTES";

/// Per-event size limit in bytes.
pub const DT_EVENT_BODY_LIMIT_ENV: &str = "DT_EVENT_BODY_LIMIT_BYTES";

/// Prefix used when [`DT_PROPERTIES_PREFIX_ENV`] is unset.
pub const DEFAULT_PROPERTIES_PREFIX: &str = "attr.";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read an environment variable, treating unset and blank the same.
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse `key=value,key2=value2` into ordered pairs.
///
/// Entries without `=` or with a blank key are skipped; keys and values
/// are trimmed.
pub fn parse_attributes(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|entry| {
            let (key, value) = entry.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                None
            } else {
                Some((key.to_string(), value.trim().to_string()))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_attributes_in_order() {
        assert_eq!(
            parse_attributes("team = core, tier=gold,broken,=x,empty="),
            vec![
                ("team".to_string(), "core".to_string()),
                ("tier".to_string(), "gold".to_string()),
                ("empty".to_string(), String::new()),
            ]
        );
        assert!(parse_attributes("").is_empty());
    }

    #[test]
    fn env_or_falls_back() {
        assert_eq!(env_or("TRACING_DYNATRACE_SINK_UNSET_VAR", "fallback"), "fallback");
        assert_eq!(env_opt("TRACING_DYNATRACE_SINK_UNSET_VAR"), None);
    }
}

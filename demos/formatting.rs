//! Formats a couple of events by hand and prints the resulting batch.

use tracing_dynatrace_sink::{
    BatchFormatter, EventFormatter, EventFormatterConfig, LogEvent, LogLevel, PropertyValue,
};

fn main() {
    let formatter = EventFormatter::new(
        EventFormatterConfig::new("svc", "host1", "prod", "props."),
    )
    .expect("valid formatter config");

    let events = [
        LogEvent::new(LogLevel::Information, "hello {user}").with_property("user", "alice"),
        LogEvent::new(LogLevel::Warning, "cart updated")
            .with_property("items", PropertyValue::Sequence(vec!["apple".into(), "pear".into()]))
            .with_property(
                "cart",
                PropertyValue::structure(vec![("id", 7i64.into()), ("total", 12.5f64.into())]),
            )
            .with_property("trace_id", "4bf92f3577b34da6a3ce929d0e0e4736"),
    ];

    let lines: Vec<String> = events
        .iter()
        .filter_map(|event| formatter.format_to_string(event))
        .collect();
    for line in &lines {
        println!("{}", line);
    }

    let body = BatchFormatter::default().format_to_vec(&lines);
    println!("{}", String::from_utf8_lossy(&body));
}

use crate::error::FormatError;
use std::fmt::{self, Write as _};
use std::sync::Arc;

/// Top-level property keys that carry trace and host correlation data.
///
/// They are written under their own name, never behind the configured
/// properties prefix, so Dynatrace can link the log line to the matching
/// trace, process group and host.
pub const ROOT_PROPERTIES: &[&str] = &[
    // trace
    "trace_id",
    "span_id",
    "trace_sampled",
    // process
    "dt.entity.process_group_instance",
    // host
    "dt.entity.host",
    "dt.host_group",
    "dt.host_group.id",
];

/// Returns `true` if `key` is one of the reserved [`ROOT_PROPERTIES`].
pub fn is_root_property(key: &str) -> bool {
    ROOT_PROPERTIES.contains(&key)
}

/// A leaf value bound to a log event.
///
/// Scalars are always written to the wire as JSON strings, whatever their
/// original type.
#[derive(Clone)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    Str(String),
    /// Any value rendered through its `Display` implementation.
    Display(Arc<dyn fmt::Display + Send + Sync>),
}

impl ScalarValue {
    /// Wrap an arbitrary displayable value.
    pub fn display<T>(value: T) -> Self
    where
        T: fmt::Display + Send + Sync + 'static,
    {
        ScalarValue::Display(Arc::new(value))
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => Ok(()),
            ScalarValue::Bool(v) => write!(f, "{}", v),
            ScalarValue::I64(v) => write!(f, "{}", v),
            ScalarValue::U64(v) => write!(f, "{}", v),
            ScalarValue::F64(v) => write!(f, "{}", v),
            ScalarValue::Str(v) => f.write_str(v),
            ScalarValue::Display(v) => write!(f, "{}", v),
        }
    }
}

impl fmt::Debug for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => f.write_str("Null"),
            ScalarValue::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            ScalarValue::I64(v) => f.debug_tuple("I64").field(v).finish(),
            ScalarValue::U64(v) => f.debug_tuple("U64").field(v).finish(),
            ScalarValue::F64(v) => f.debug_tuple("F64").field(v).finish(),
            ScalarValue::Str(v) => f.debug_tuple("Str").field(v).finish(),
            ScalarValue::Display(_) => f.write_str("Display(..)"),
        }
    }
}

/// Recursive value bound to a log event property.
#[derive(Debug, Clone)]
pub enum PropertyValue {
    Scalar(ScalarValue),
    Sequence(Vec<PropertyValue>),
    Structure {
        type_tag: Option<String>,
        fields: Vec<(String, PropertyValue)>,
    },
    Dictionary(Vec<(ScalarValue, PropertyValue)>),
}

impl PropertyValue {
    /// Build an untagged structure from `(name, value)` pairs.
    pub fn structure<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, PropertyValue)>,
    {
        PropertyValue::Structure {
            type_tag: None,
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Write a scalar for a message template: strings in double quotes with
/// embedded quotes backslash-escaped, everything else as-is.
fn write_quoted(f: &mut fmt::Formatter<'_>, scalar: &ScalarValue) -> fmt::Result {
    match scalar {
        ScalarValue::Str(v) => {
            f.write_char('"')?;
            f.write_str(&v.replace('"', "\\\""))?;
            f.write_char('"')
        }
        other => write!(f, "{}", other),
    }
}

/// Text form used when a property is substituted into a message template.
///
/// String scalars are quoted at every nesting level; use
/// [`ScalarValue`]'s own `Display` for the bare text.
impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Scalar(s) => write_quoted(f, s),
            PropertyValue::Sequence(items) => {
                f.write_char('[')?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_char(']')
            }
            PropertyValue::Structure { type_tag, fields } => {
                if let Some(tag) = type_tag {
                    write!(f, "{} ", tag)?;
                }
                f.write_str("{ ")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                f.write_str(" }")
            }
            PropertyValue::Dictionary(entries) => {
                f.write_char('[')?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_char('(')?;
                    write_quoted(f, key)?;
                    write!(f, ": {})", value)?;
                }
                f.write_char(']')
            }
        }
    }
}

macro_rules! scalar_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for ScalarValue {
                fn from(v: $ty) -> Self {
                    ScalarValue::$variant(v.into())
                }
            }

            impl From<$ty> for PropertyValue {
                fn from(v: $ty) -> Self {
                    PropertyValue::Scalar(ScalarValue::$variant(v.into()))
                }
            }
        )*
    };
}

scalar_from! {
    bool => Bool,
    i32 => I64,
    i64 => I64,
    u32 => U64,
    u64 => U64,
    f64 => F64,
    String => Str,
    &str => Str,
}

impl From<ScalarValue> for PropertyValue {
    fn from(v: ScalarValue) -> Self {
        PropertyValue::Scalar(v)
    }
}

impl From<Vec<PropertyValue>> for PropertyValue {
    fn from(v: Vec<PropertyValue>) -> Self {
        PropertyValue::Sequence(v)
    }
}

impl From<serde_json::Value> for PropertyValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => PropertyValue::Scalar(ScalarValue::Null),
            Value::Bool(b) => b.into(),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    i.into()
                } else if let Some(u) = n.as_u64() {
                    u.into()
                } else {
                    n.as_f64().unwrap_or_default().into()
                }
            }
            Value::String(s) => s.into(),
            Value::Array(items) => {
                PropertyValue::Sequence(items.into_iter().map(PropertyValue::from).collect())
            }
            Value::Object(map) => PropertyValue::Dictionary(
                map.into_iter()
                    .map(|(k, v)| (ScalarValue::Str(k), PropertyValue::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Flat key a top-level property is written under.
pub fn top_level_key(key: &str, prefix: &str) -> String {
    if is_root_property(key) {
        key.to_string()
    } else {
        format!("{}{}", prefix, key)
    }
}

/// Flatten one top-level property into `(flat_key, value)` string pairs.
///
/// `emit` is called once per scalar leaf, in tree order. Sequences use the
/// zero-based element index as key segment, structures the field name and
/// dictionaries the rendered entry key. The prefix and the root-key
/// exemption only apply to `key` itself, never to nested segments.
pub fn flatten_property<F>(
    key: &str,
    value: &PropertyValue,
    prefix: &str,
    emit: &mut F,
) -> Result<(), FormatError>
where
    F: FnMut(&str, &str) -> Result<(), FormatError>,
{
    let mut flat_key = top_level_key(key, prefix);
    let mut scratch = String::new();
    flatten_into(&mut flat_key, value, &mut scratch, emit)
}

/// Flatten every property of an ordered property list.
pub fn flatten_properties<'a, I, F>(
    properties: I,
    prefix: &str,
    emit: &mut F,
) -> Result<(), FormatError>
where
    I: IntoIterator<Item = &'a (String, PropertyValue)>,
    F: FnMut(&str, &str) -> Result<(), FormatError>,
{
    for (key, value) in properties {
        flatten_property(key, value, prefix, emit)?;
    }
    Ok(())
}

/// Collect the flattened pairs of one property.
pub fn flatten(
    key: &str,
    value: &PropertyValue,
    prefix: &str,
) -> Result<Vec<(String, String)>, FormatError> {
    let mut pairs = Vec::new();
    flatten_property(key, value, prefix, &mut |k: &str, v: &str| {
        pairs.push((k.to_string(), v.to_string()));
        Ok(())
    })?;
    Ok(pairs)
}

fn flatten_into<F>(
    flat_key: &mut String,
    value: &PropertyValue,
    scratch: &mut String,
    emit: &mut F,
) -> Result<(), FormatError>
where
    F: FnMut(&str, &str) -> Result<(), FormatError>,
{
    match value {
        PropertyValue::Scalar(scalar) => {
            scratch.clear();
            write!(scratch, "{}", scalar)?;
            emit(flat_key.as_str(), scratch.as_str())
        }
        PropertyValue::Sequence(items) => {
            for (index, item) in items.iter().enumerate() {
                let len = flat_key.len();
                write!(flat_key, ".{}", index)?;
                flatten_into(flat_key, item, scratch, emit)?;
                flat_key.truncate(len);
            }
            Ok(())
        }
        PropertyValue::Structure { fields, .. } => {
            for (name, field) in fields {
                let len = flat_key.len();
                flat_key.push('.');
                flat_key.push_str(name);
                flatten_into(flat_key, field, scratch, emit)?;
                flat_key.truncate(len);
            }
            Ok(())
        }
        PropertyValue::Dictionary(entries) => {
            for (entry_key, entry) in entries {
                let len = flat_key.len();
                write!(flat_key, ".{}", entry_key)?;
                flatten_into(flat_key, entry, scratch, emit)?;
                flat_key.truncate(len);
            }
            Ok(())
        }
    }
}

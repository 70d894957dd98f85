use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// `createdAt` exactly as the store handed it over.
///
/// Writers have been inconsistent over time: native store timestamps, ISO
/// strings from browser clients, epoch millis from scripts. Arithmetic only
/// happens after [`CreatedAt::normalize`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum CreatedAt {
    /// Store-native timestamp (`{seconds, nanoseconds}` or a `timestamptz`).
    Native(DateTime<Utc>),
    /// Free-form string, parsed on demand.
    Text(String),
    /// Epoch milliseconds.
    Millis(i64),
    #[default]
    Missing,
    Unrecognized(Value),
}

/// Why a `createdAt` value could not be turned into an instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimestampError {
    Missing,
    Unparseable(String),
    OutOfRange(i64),
    Unrecognized(String),
}

impl fmt::Display for TimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampError::Missing => write!(f, "createdAt missing"),
            TimestampError::Unparseable(s) => write!(f, "createdAt not parseable: {s:?}"),
            TimestampError::OutOfRange(ms) => write!(f, "createdAt out of range: {ms}ms"),
            TimestampError::Unrecognized(raw) => write!(f, "createdAt has unknown shape: {raw}"),
        }
    }
}

impl std::error::Error for TimestampError {}

impl CreatedAt {
    /// Resolve to an absolute UTC instant.
    ///
    /// Preference order: native timestamp, then string parse, then raw
    /// epoch-millis conversion. Anything else is an error rather than an
    /// invalid instant.
    pub fn normalize(&self) -> Result<DateTime<Utc>, TimestampError> {
        match self {
            CreatedAt::Native(dt) => Ok(*dt),
            CreatedAt::Text(s) => {
                parse_text(s).ok_or_else(|| TimestampError::Unparseable(s.clone()))
            }
            CreatedAt::Millis(ms) => Utc
                .timestamp_millis_opt(*ms)
                .single()
                .ok_or(TimestampError::OutOfRange(*ms)),
            CreatedAt::Missing => Err(TimestampError::Missing),
            CreatedAt::Unrecognized(v) => Err(TimestampError::Unrecognized(v.to_string())),
        }
    }
}

/// `datetime-local` inputs produce the minute-precision forms.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
];

fn parse_text(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Offset-less forms are read as UTC.
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    ["%Y-%m-%d", "%Y/%m/%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn native_from_object(map: &serde_json::Map<String, Value>) -> Option<DateTime<Utc>> {
    let secs = map
        .get("seconds")
        .or_else(|| map.get("_seconds"))?
        .as_i64()?;
    let nanos = map
        .get("nanoseconds")
        .or_else(|| map.get("_nanoseconds"))
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let nanos = u32::try_from(nanos).ok()?;
    Utc.timestamp_opt(secs, nanos).single()
}

impl From<Value> for CreatedAt {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => CreatedAt::Missing,
            Value::String(s) => CreatedAt::Text(s),
            Value::Number(n) => {
                if let Some(ms) = n.as_i64() {
                    CreatedAt::Millis(ms)
                } else if let Some(f) = n.as_f64().filter(|f| f.is_finite()) {
                    CreatedAt::Millis(f.trunc() as i64)
                } else {
                    CreatedAt::Unrecognized(Value::Number(n))
                }
            }
            Value::Object(map) => match native_from_object(&map) {
                Some(dt) => CreatedAt::Native(dt),
                None => CreatedAt::Unrecognized(Value::Object(map)),
            },
            other => CreatedAt::Unrecognized(other),
        }
    }
}

impl From<CreatedAt> for Value {
    fn from(c: CreatedAt) -> Self {
        match c {
            CreatedAt::Native(dt) => json!({
                "seconds": dt.timestamp(),
                "nanoseconds": dt.timestamp_subsec_nanos(),
            }),
            CreatedAt::Text(s) => Value::String(s),
            CreatedAt::Millis(ms) => json!(ms),
            CreatedAt::Missing => Value::Null,
            CreatedAt::Unrecognized(v) => v,
        }
    }
}

impl From<DateTime<Utc>> for CreatedAt {
    fn from(dt: DateTime<Utc>) -> Self {
        CreatedAt::Native(dt)
    }
}

use chrono::NaiveDate;
use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::domain::models::PostProcess;

impl PostProcess {
    pub fn apply(&self, payload: Value) -> Value {
        match self {
            PostProcess::TemporalFilter { field, cutoff } => filter_by_date(payload, field, *cutoff),
        }
    }
}

/// Parses the leading `YYYY-MM-DD` of a date-like string.
pub fn parse_leading_date(raw: &str) -> Option<NaiveDate> {
    let head: String = raw.chars().take(10).collect();
    NaiveDate::parse_from_str(&head, "%Y-%m-%d").ok()
}

/// Drops dated records earlier than `cutoff`.
///
/// A top-level array is filtered directly. A top-level object has each of its
/// array values filtered when that array holds dated records. Objects carrying
/// `field` with a missing or unparseable date are dropped; elements that are
/// not objects, or objects without `field`, are kept. Anything else comes back
/// unchanged.
pub fn filter_by_date(value: Value, field: &str, cutoff: NaiveDate) -> Value {
    match value {
        Value::Array(items) => {
            let before = items.len();
            let kept = retain_dated(items, field, cutoff);
            debug!("Date filter on '{}' >= {}: {} -> {} entries", field, cutoff, before, kept.len());
            Value::Array(kept)
        }
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, val) in map {
                let val = match val {
                    Value::Array(items) if holds_dated_records(&items, field) => {
                        let before = items.len();
                        let kept = retain_dated(items, field, cutoff);
                        debug!(
                            "Date filter on '{}[].{}' >= {}: {} -> {} entries",
                            key, field, cutoff, before, kept.len()
                        );
                        Value::Array(kept)
                    }
                    other => other,
                };
                out.insert(key, val);
            }
            Value::Object(out)
        }
        other => other,
    }
}

fn holds_dated_records(items: &[Value], field: &str) -> bool {
    items
        .iter()
        .find_map(Value::as_object)
        .map_or(false, |record| record.contains_key(field))
}

fn retain_dated(items: Vec<Value>, field: &str, cutoff: NaiveDate) -> Vec<Value> {
    items
        .into_iter()
        .filter(|item| match item.as_object().and_then(|record| record.get(field)) {
            Some(date) => date
                .as_str()
                .and_then(parse_leading_date)
                .map_or(false, |d| d >= cutoff),
            None => true,
        })
        .collect()
}

/// Replaces every number in `value` with its decimal-comma rendering,
/// keeping containers and key order intact.
pub fn encode_locale_numbers(value: Value) -> Value {
    match value {
        Value::Number(n) => Value::String(format_decimal_comma(&n)),
        Value::Array(items) => Value::Array(items.into_iter().map(encode_locale_numbers).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, encode_locale_numbers(v)))
                .collect(),
        ),
        other => other,
    }
}

/// `5.83 -> "5,83"`, `10.0 -> "10"`, `0.005 -> "0"`.
///
/// Floats are rounded to two decimals with ties going to the even cent.
pub fn format_decimal_comma(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    let f = n.as_f64().unwrap_or_default();
    let mut rounded = (f * 100.0).round_ties_even() / 100.0;
    if rounded == 0.0 {
        // avoids "-0"
        rounded = 0.0;
    }
    let text = format!("{:.2}", rounded);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    text.replace('.', ",")
}

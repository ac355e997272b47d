use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use crate::domain::date_window::YearMonth;

/// Login identity and secret. `Debug` never prints either value.
#[derive(Clone)]
pub struct Credentials {
    pub identity: String,
    pub secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &"<redacted>")
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingWindow {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub anchor_month: YearMonth,
}

impl ReportingWindow {
    /// True when the window is exactly its anchor month.
    pub fn is_whole_month(&self) -> bool {
        self.start_date == self.anchor_month.first_day()
            && self.end_date == self.anchor_month.last_day()
    }

    /// Label used in artifact names: `YYYY-MM` for month windows,
    /// `YYYY-MM-DD_YYYY-MM-DD` otherwise.
    pub fn period_label(&self) -> String {
        if self.is_whole_month() {
            self.anchor_month.to_string()
        } else {
            format!("{}_{}", self.start_date, self.end_date)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Single(String),
    Multi(Vec<String>),
}

/// Ordered query parameters. Multi-valued keys are emitted once per value
/// under the same name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: Vec<(String, ParamValue)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, replacing an earlier value in place so ordering stays stable.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.put(key, ParamValue::Single(value.into()))
    }

    pub fn set_multi<I, S>(&mut self, key: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.put(key, ParamValue::Multi(values.into_iter().map(Into::into).collect()))
    }

    fn put(&mut self, key: &str, value: ParamValue) -> &mut Self {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Flattened `(key, value)` pairs in insertion order.
    pub fn pairs(&self) -> Vec<(&str, &str)> {
        let mut out = Vec::new();
        for (key, value) in &self.entries {
            match value {
                ParamValue::Single(v) => out.push((key.as_str(), v.as_str())),
                ParamValue::Multi(vs) => {
                    out.extend(vs.iter().map(|v| (key.as_str(), v.as_str())))
                }
            }
        }
        out
    }

    /// Percent-encoded query string (`a=1&status%5B%5D=x&status%5B%5D=y`).
    pub fn encode(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs())
            .finish()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Post-processing applied to a fetched payload before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostProcess {
    TemporalFilter { field: String, cutoff: NaiveDate },
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotifySpec {
    pub report_type: String,
    pub extra_metadata: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct HarvestResult {
    pub report_type: String,
    pub output_key: String,
    pub payload: Value,
    pub retrieved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WindowSummary {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub anchor_month: String,
}

impl From<&ReportingWindow> for WindowSummary {
    fn from(w: &ReportingWindow) -> Self {
        Self {
            start_date: w.start_date,
            end_date: w.end_date,
            anchor_month: w.anchor_month.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationPayload {
    pub run_id: Uuid,
    pub employer_id: String,
    pub window: WindowSummary,
    pub report_type: String,
    pub timestamp: DateTime<Utc>,
    pub report: Value,
    #[serde(flatten)]
    pub extra_metadata: Map<String, Value>,
}

/// What the notifier did with a payload. Failures never become errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered(u16),
    NotConfigured,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestSummary {
    pub run_id: Uuid,
    pub persisted: Vec<String>,
    pub skipped: Vec<String>,
    pub notified: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_valued_keys_repeat_under_one_name() {
        let mut params = QueryParams::new();
        params
            .set("traffic", "all")
            .set_multi("status[]", ["sponsored", "expired"])
            .set("tier", "");
        assert_eq!(
            params.encode(),
            "traffic=all&status%5B%5D=sponsored&status%5B%5D=expired&tier="
        );
    }

    #[test]
    fn set_replaces_in_place() {
        let mut params = QueryParams::new();
        params.set("sort", "date-desc").set("per_page", "100").set("sort", "city-asc");
        assert_eq!(params.pairs(), vec![("sort", "city-asc"), ("per_page", "100")]);
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = Credentials { identity: "ops@example.com".into(), secret: "hunter2".into() };
        let shown = format!("{:?}", creds);
        assert!(!shown.contains("hunter2"));
        assert!(!shown.contains("ops@example.com"));
    }

    #[test]
    fn period_label_depends_on_window_shape() {
        let month: YearMonth = "2025-11".parse().unwrap();
        let whole = crate::domain::date_window::month_window(month);
        assert_eq!(whole.period_label(), "2025-11");

        let week = ReportingWindow {
            start_date: NaiveDate::from_ymd_opt(2025, 11, 10).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 11, 16).unwrap(),
            anchor_month: month,
        };
        assert_eq!(week.period_label(), "2025-11-10_2025-11-16");
    }
}

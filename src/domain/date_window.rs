use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::domain::models::ReportingWindow;

/// Which reporting period a run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowMode {
    #[default]
    CurrentMonth,
    PreviousMonth,
    LastCompleteWeek,
}

impl FromStr for WindowMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "current-month" | "current_month" => Ok(Self::CurrentMonth),
            "previous-month" | "previous_month" => Ok(Self::PreviousMonth),
            "last-complete-week" | "last_complete_week" | "week" => Ok(Self::LastCompleteWeek),
            other => Err(format!(
                "unknown window mode '{}' (expected current-month, previous-month or last-complete-week)",
                other
            )),
        }
    }
}

/// A calendar month, stored as its first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth(NaiveDate);

impl YearMonth {
    pub fn containing(date: NaiveDate) -> Self {
        Self(date - Duration::days(date.day0() as i64))
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    pub fn last_day(&self) -> NaiveDate {
        // 32 days past the 1st always lands in the following month.
        let next = self.0 + Duration::days(32);
        next - Duration::days(next.day() as i64)
    }

    pub fn previous(&self) -> Self {
        Self::containing(self.0 - Duration::days(1))
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.0.year(), self.0.month())
    }
}

impl FromStr for YearMonth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        NaiveDate::parse_from_str(&format!("{}-01", trimmed), "%Y-%m-%d")
            .map(Self)
            .map_err(|e| format!("invalid month '{}', expected YYYY-MM: {}", trimmed, e))
    }
}

/// Window covering a whole calendar month, anchored on that month.
pub fn month_window(month: YearMonth) -> ReportingWindow {
    ReportingWindow {
        start_date: month.first_day(),
        end_date: month.last_day(),
        anchor_month: month,
    }
}

/// Resolves the reporting window for `mode` relative to `reference`.
///
/// The reference instant is interpreted in UTC. For the week mode the result is
/// Monday through Sunday of the week before the reference's ISO week, anchored
/// on the month its Sunday falls in.
pub fn resolve(mode: WindowMode, reference: DateTime<Utc>) -> ReportingWindow {
    let today = reference.date_naive();
    let window = match mode {
        WindowMode::CurrentMonth => month_window(YearMonth::containing(today)),
        WindowMode::PreviousMonth => month_window(YearMonth::containing(today).previous()),
        WindowMode::LastCompleteWeek => {
            let this_monday =
                today - Duration::days(today.weekday().num_days_from_monday() as i64);
            let start_date = this_monday - Duration::days(7);
            let end_date = this_monday - Duration::days(1);
            ReportingWindow {
                start_date,
                end_date,
                anchor_month: YearMonth::containing(end_date),
            }
        }
    };
    debug!(
        "Resolved {:?} window for {}: {} .. {} (anchor {})",
        mode, today, window.start_date, window.end_date, window.anchor_month
    );
    window
}

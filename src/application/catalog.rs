use chrono::NaiveDate;
use serde_json::{Map, Value};
use tracing::debug;

use crate::domain::models::{NotifySpec, PostProcess, QueryParams, ReportingWindow};

/// Run-level inputs every parameter builder sees.
#[derive(Debug, Clone)]
pub struct CatalogContext {
    pub employer_id: String,
    pub window: ReportingWindow,
    pub job_board_ids: Vec<String>,
    pub tiles_job_board_id: String,
    pub statuses: Vec<String>,
    pub earliest_daily_date: NaiveDate,
}

/// Grouping used by the `by_dynamic_field` breakdowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimension {
    pub key: &'static str,
    pub label: &'static str,
    pub sort: &'static str,
}

pub const CATEGORY: Dimension = Dimension { key: "tagged_category_id", label: "tagged_category", sort: "date-desc" };
pub const TITLE: Dimension = Dimension { key: "title", label: "title", sort: "applies-desc" };
pub const CITY: Dimension = Dimension { key: "city", label: "city", sort: "applies-desc" };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    HeroMetrics,
    ByMonth,
    ByDynamicField(Dimension),
    ByWeek,
    ByDay,
    BySourceIndex,
    TilesByDay,
}

/// A report ready to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportDefinition {
    pub report_type: String,
    pub endpoint_path: String,
    pub params: QueryParams,
    pub output_key: String,
    pub post_process: Option<PostProcess>,
    pub notify: Option<NotifySpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlannedReport {
    Run(ReportDefinition),
    Skipped { report_type: String, reason: String },
}

impl ReportKind {
    pub fn report_type(&self) -> &'static str {
        match self {
            ReportKind::HeroMetrics => "hero_metrics",
            ReportKind::ByMonth => "by_month",
            ReportKind::ByDynamicField(_) => "by_dynamic_field",
            ReportKind::ByWeek => "by_week",
            ReportKind::ByDay => "by_day",
            ReportKind::BySourceIndex => "by_source_index",
            ReportKind::TilesByDay => "tiles_by_day",
        }
    }

    fn endpoint_path(&self, employer_id: &str) -> String {
        match self {
            ReportKind::TilesByDay => {
                format!("/api/dashboards/employer/{}/{}", employer_id, self.report_type())
            }
            _ => format!("/api/reports/employer/{}/{}", employer_id, self.report_type()),
        }
    }

    pub fn plan(&self, ctx: &CatalogContext) -> PlannedReport {
        let w = &ctx.window;
        let month = w.anchor_month.to_string();
        let period = w.period_label();
        let year = w.anchor_month.year();

        let mut post_process = None;
        let mut notify = None;

        let (params, output_key) = match self {
            ReportKind::HeroMetrics => {
                let mut p = QueryParams::new();
                p.set("selected_month", month.as_str())
                    .set("devise", "all")
                    .set("publisher_type", "all")
                    .set("traffic", "all_wo_organic")
                    .set("channel_type", "programmatic")
                    .set("job_group_stats_source", "data");
                (p, format!("hero_metrics_{}", month))
            }
            ReportKind::ByMonth => {
                let mut p = common_params(&ctx.statuses);
                set_year_range(&mut p, year);
                (p, format!("by_month_{}", year))
            }
            ReportKind::ByDynamicField(dim) => {
                let mut p = common_params(&ctx.statuses);
                p.set("pjg", "false");
                set_year_range(&mut p, year);
                p.set("dynamic_field", dim.key)
                    .set("start_date", w.start_date.to_string())
                    .set("end_date", w.end_date.to_string())
                    .set("per_page", "100")
                    .set("sort", dim.sort);
                let mut extra = Map::new();
                extra.insert("dimension".into(), Value::String(dim.key.to_string()));
                notify = Some(NotifySpec {
                    report_type: format!("by_dynamic_field_{}", dim.label),
                    extra_metadata: extra,
                });
                (p, format!("by_dynamic_field_{}_{}", dim.label, period))
            }
            ReportKind::ByWeek => {
                let mut p = common_params(&ctx.statuses);
                p.set("start_date", w.start_date.to_string())
                    .set("end_date", w.end_date.to_string());
                (p, format!("by_week_{}", period))
            }
            ReportKind::ByDay => {
                if w.end_date < ctx.earliest_daily_date {
                    let reason = format!(
                        "window {} .. {} lies entirely before the first day with daily data ({})",
                        w.start_date, w.end_date, ctx.earliest_daily_date
                    );
                    debug!("Planned by_day as skipped: {}", reason);
                    return PlannedReport::Skipped { report_type: self.report_type().to_string(), reason };
                }
                let start = w.start_date.max(ctx.earliest_daily_date);
                let mut p = common_params(&ctx.statuses);
                p.set("start_date", start.to_string())
                    .set("end_date", w.end_date.to_string());
                notify = Some(NotifySpec { report_type: "by_day".into(), extra_metadata: Map::new() });
                (p, format!("by_day_{}", period))
            }
            ReportKind::BySourceIndex => {
                let mut p = QueryParams::new();
                p.set("start_date", w.start_date.to_string())
                    .set("end_date", w.end_date.to_string())
                    .set_multi("status[]", ctx.statuses.iter().cloned())
                    .set("traffic", "all")
                    .set("job_group_stats_source", "data");
                if !ctx.job_board_ids.is_empty() {
                    // Upstream expects this exact (misspelled) key.
                    p.set_multi("job_boords[]", ctx.job_board_ids.iter().cloned());
                }
                (p, format!("by_source_index_{}", period))
            }
            ReportKind::TilesByDay => {
                let mut p = QueryParams::new();
                p.set("selected_month", month.as_str())
                    .set("job_board_id", ctx.tiles_job_board_id.as_str());
                post_process = Some(PostProcess::TemporalFilter {
                    field: "date".into(),
                    cutoff: ctx.earliest_daily_date,
                });
                (p, format!("tiles_by_day_{}", month))
            }
        };

        PlannedReport::Run(ReportDefinition {
            report_type: self.report_type().to_string(),
            endpoint_path: self.endpoint_path(&ctx.employer_id),
            params,
            output_key,
            post_process,
            notify,
        })
    }
}

/// Parameters shared by the by_month / by_week / by_day / by_dynamic_field reports.
fn common_params(statuses: &[String]) -> QueryParams {
    let mut p = QueryParams::new();
    p.set("devise", "all")
        .set("job_group_stats_source", "data")
        .set("traffic", "all_wo_organic")
        .set("sort", "date-desc")
        .set("publisher_type", "all")
        .set("account_manager_id", "all")
        .set("job_group_status", "data")
        .set("tier", "")
        .set("selected_certified_filter", "all_sponsored")
        .set("boomerang", "all")
        .set("sales_manager_id", "all")
        .set("salesforce_name", "all")
        .set_multi("status[]", statuses.iter().cloned());
    p
}

fn set_year_range(p: &mut QueryParams, year: i32) {
    p.set("start_month", format!("{}-1-1", year))
        .set("end_month", format!("{}-12-31", year));
}

/// Ordered report list. Order is execution order.
#[derive(Debug, Clone)]
pub struct ReportCatalog {
    entries: Vec<ReportKind>,
}

impl ReportCatalog {
    pub fn new(entries: Vec<ReportKind>) -> Self {
        Self { entries }
    }

    pub fn standard() -> Self {
        Self::new(vec![
            ReportKind::HeroMetrics,
            ReportKind::ByMonth,
            ReportKind::ByDynamicField(CATEGORY),
            ReportKind::ByDynamicField(TITLE),
            ReportKind::ByDynamicField(CITY),
            ReportKind::ByWeek,
            ReportKind::ByDay,
            ReportKind::BySourceIndex,
            ReportKind::TilesByDay,
        ])
    }

    pub fn entries(&self) -> &[ReportKind] {
        &self.entries
    }

    pub fn plan(&self, ctx: &CatalogContext) -> Vec<PlannedReport> {
        debug!("Planning {} catalog entries for employer {}", self.entries.len(), ctx.employer_id);
        self.entries.iter().map(|kind| kind.plan(ctx)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{date_window::month_window, models::ParamValue};
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn ctx(month: &str) -> CatalogContext {
        CatalogContext {
            employer_id: "27620".into(),
            window: month_window(month.parse().unwrap()),
            job_board_ids: vec![],
            tiles_job_board_id: "".into(),
            statuses: vec!["sponsored".into(), "expired".into()],
            earliest_daily_date: NaiveDate::from_ymd_opt(2025, 11, 17).unwrap(),
        }
    }

    fn run(planned: PlannedReport) -> ReportDefinition {
        match planned {
            PlannedReport::Run(def) => def,
            PlannedReport::Skipped { reason, .. } => panic!("unexpected skip: {}", reason),
        }
    }

    #[test]
    fn standard_catalog_keeps_execution_order() {
        let planned = ReportCatalog::standard().plan(&ctx("2025-12"));
        let keys: Vec<String> = planned.into_iter().map(|p| run(p).output_key).collect();
        assert_eq!(
            keys,
            vec![
                "hero_metrics_2025-12",
                "by_month_2025",
                "by_dynamic_field_tagged_category_2025-12",
                "by_dynamic_field_title_2025-12",
                "by_dynamic_field_city_2025-12",
                "by_week_2025-12",
                "by_day_2025-12",
                "by_source_index_2025-12",
                "tiles_by_day_2025-12",
            ]
        );
    }

    #[test]
    fn by_day_is_skipped_before_daily_data_exists() {
        let planned = ReportKind::ByDay.plan(&ctx("2025-10"));
        assert!(matches!(planned, PlannedReport::Skipped { ref report_type, .. } if report_type == "by_day"));
    }

    #[test]
    fn planning_a_skip_logs_nothing_at_info_level() {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let planned = tracing::subscriber::with_default(subscriber, || ReportKind::ByDay.plan(&ctx("2025-10")));

        assert!(matches!(planned, PlannedReport::Skipped { .. }));
        assert!(buffer.0.lock().unwrap().is_empty());
    }

    #[test]
    fn by_day_start_is_clamped_to_earliest_daily_date() {
        let def = run(ReportKind::ByDay.plan(&ctx("2025-11")));
        assert_eq!(def.params.get("start_date"), Some(&ParamValue::Single("2025-11-17".into())));
        assert_eq!(def.params.get("end_date"), Some(&ParamValue::Single("2025-11-30".into())));
        assert_eq!(def.notify.unwrap().report_type, "by_day");
    }

    #[test]
    fn breakdowns_differ_only_in_dimension_and_sort() {
        let c = ctx("2025-12");
        let a = run(ReportKind::ByDynamicField(CATEGORY).plan(&c));
        let b = run(ReportKind::ByDynamicField(CITY).plan(&c));
        let differing: Vec<&str> = a
            .params
            .pairs()
            .into_iter()
            .zip(b.params.pairs())
            .filter(|(x, y)| x != y)
            .map(|(x, _)| x.0)
            .collect();
        assert_eq!(differing, vec!["sort", "dynamic_field"]);
        assert_eq!(a.endpoint_path, "/api/reports/employer/27620/by_dynamic_field");
        assert_eq!(
            b.notify.unwrap().extra_metadata.get("dimension"),
            Some(&Value::String("city".into()))
        );
    }

    #[test]
    fn hero_metrics_uses_anchor_month_for_week_windows() {
        let mut c = ctx("2025-12");
        c.window.start_date = NaiveDate::from_ymd_opt(2025, 12, 8).unwrap();
        c.window.end_date = NaiveDate::from_ymd_opt(2025, 12, 14).unwrap();
        let def = run(ReportKind::HeroMetrics.plan(&c));
        assert_eq!(def.params.get("selected_month"), Some(&ParamValue::Single("2025-12".into())));
        assert_eq!(def.output_key, "hero_metrics_2025-12");
        let week = run(ReportKind::ByWeek.plan(&c));
        assert_eq!(week.output_key, "by_week_2025-12-08_2025-12-14");
    }

    #[test]
    fn source_index_repeats_job_board_key_verbatim() {
        let mut c = ctx("2025-12");
        c.job_board_ids = vec!["ac-571".into(), "ac-9".into()];
        let def = run(ReportKind::BySourceIndex.plan(&c));
        assert!(def.params.encode().contains("job_boords%5B%5D=ac-571&job_boords%5B%5D=ac-9"));

        let without = run(ReportKind::BySourceIndex.plan(&ctx("2025-12")));
        assert!(without.params.get("job_boords[]").is_none());
    }

    #[test]
    fn tiles_by_day_is_filtered_from_earliest_daily_date() {
        let def = run(ReportKind::TilesByDay.plan(&ctx("2025-11")));
        assert_eq!(def.endpoint_path, "/api/dashboards/employer/27620/tiles_by_day");
        assert_eq!(
            def.post_process,
            Some(PostProcess::TemporalFilter {
                field: "date".into(),
                cutoff: NaiveDate::from_ymd_opt(2025, 11, 17).unwrap()
            })
        );
    }
}

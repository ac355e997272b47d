use std::sync::Arc;
use chrono::{DateTime, Utc};
use tracing::{info, debug};
use uuid::Uuid;
use crate::{
    application::{
        catalog::{CatalogContext, ReportCatalog},
        harvest_service::{HarvestService, RunContext},
    },
    config::HarvestConfig,
    domain::{
        date_window::{self, month_window},
        error::HarvestError,
        models::{HarvestSummary, ReportingWindow},
    },
    infrastructure::{
        file_sink::JsonFileSink,
        http_session::HttpSessionAuthenticator,
        webhook::WebhookNotifier,
    },
};

/// One harvesting pass: resolve the window, plan the catalog, execute it.
pub struct HarvestRunner {
    config: HarvestConfig,
    service: HarvestService,
    catalog: ReportCatalog,
}

impl HarvestRunner {
    pub fn new(config: HarvestConfig) -> Self {
        debug!("Initializing harvest runner");
        let settings = &config.settings;

        let authenticator = Arc::new(HttpSessionAuthenticator::new(settings));
        let sink = Arc::new(JsonFileSink::new(settings.output_dir.clone()));
        let notifier = Arc::new(WebhookNotifier::new(config.webhook_url.clone(), settings.webhook_timeout));
        debug!("HTTP authenticator, file sink and webhook notifier initialized");

        let service = HarvestService::new(authenticator, sink, notifier);
        Self { config, service, catalog: ReportCatalog::standard() }
    }

    pub fn with_service(config: HarvestConfig, service: HarvestService, catalog: ReportCatalog) -> Self {
        Self { config, service, catalog }
    }

    /// A month override wins over the configured window mode.
    pub fn resolve_window(&self, now: DateTime<Utc>) -> ReportingWindow {
        match self.config.month_override {
            Some(month) => {
                info!("Using explicit month override {}", month);
                month_window(month)
            }
            None => date_window::resolve(self.config.window_mode, now),
        }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> Result<HarvestSummary, HarvestError> {
        let window = self.resolve_window(now);
        info!("Starting harvest for employer {} and period {} ({} .. {})",
            self.config.employer_id, window.period_label(), window.start_date, window.end_date);

        let catalog_ctx = CatalogContext {
            employer_id: self.config.employer_id.clone(),
            window,
            job_board_ids: self.config.job_board_ids.clone(),
            tiles_job_board_id: self.config.tiles_job_board_id.clone(),
            statuses: self.config.settings.statuses.clone(),
            earliest_daily_date: self.config.settings.earliest_daily_date,
        };
        let plan = self.catalog.plan(&catalog_ctx);

        let run_ctx = RunContext {
            run_id: Uuid::new_v4(),
            employer_id: self.config.employer_id.clone(),
            window,
        };

        self.service.run(&self.config.credentials, &plan, &run_ctx).await
    }
}

use std::sync::Arc;
use chrono::Utc;
use tracing::{info, debug, error, warn};
use uuid::Uuid;
use crate::application::catalog::{PlannedReport, ReportDefinition};
use crate::domain::{
    error::HarvestError,
    models::{Credentials, DeliveryOutcome, HarvestResult, HarvestSummary, NotificationPayload, ReportingWindow},
    ports::{Notifier, ReportSession, ResultSink, SessionAuthenticator},
    transforms::encode_locale_numbers,
};

/// Identifies the run in notification payloads.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub employer_id: String,
    pub window: ReportingWindow,
}

pub struct HarvestService {
    authenticator: Arc<dyn SessionAuthenticator>,
    sink: Arc<dyn ResultSink>,
    notifier: Arc<dyn Notifier>,
}

impl HarvestService {
    pub fn new(
        authenticator: Arc<dyn SessionAuthenticator>,
        sink: Arc<dyn ResultSink>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            authenticator,
            sink,
            notifier,
        }
    }

    /// Authenticates once, then executes `plan` in order against that session.
    ///
    /// The first fetch or persistence failure stops the run. The session is
    /// released on every path once authentication has succeeded.
    pub async fn run(
        &self,
        credentials: &Credentials,
        plan: &[PlannedReport],
        ctx: &RunContext,
    ) -> Result<HarvestSummary, HarvestError> {
        info!("Starting harvest run {} for employer {} ({} .. {})",
            ctx.run_id, ctx.employer_id, ctx.window.start_date, ctx.window.end_date);

        debug!("Authenticating before {} catalog entries", plan.len());
        let mut session = self.authenticator.authenticate(credentials).await
            .map_err(|e| {
                error!("Authentication failed, no reports fetched: {}", e);
                e
            })?;
        info!("Session established");

        let outcome = self.execute_plan(session.as_ref(), plan, ctx).await;

        debug!("Releasing session");
        session.release().await;

        match &outcome {
            Ok(summary) => info!("✅ Harvest run {} complete - {} persisted, {} skipped, {} notified",
                summary.run_id, summary.persisted.len(), summary.skipped.len(), summary.notified),
            Err(e) => error!("Harvest run {} aborted: {}", ctx.run_id, e),
        }
        outcome
    }

    async fn execute_plan(
        &self,
        session: &dyn ReportSession,
        plan: &[PlannedReport],
        ctx: &RunContext,
    ) -> Result<HarvestSummary, HarvestError> {
        let mut summary = HarvestSummary {
            run_id: ctx.run_id,
            persisted: Vec::new(),
            skipped: Vec::new(),
            notified: 0,
        };

        for (i, entry) in plan.iter().enumerate() {
            match entry {
                PlannedReport::Skipped { report_type, reason } => {
                    info!("[{}/{}] skipped {} by policy: {}", i + 1, plan.len(), report_type, reason);
                    summary.skipped.push(report_type.clone());
                }
                PlannedReport::Run(def) => {
                    debug!("[{}/{}] executing {} -> {}", i + 1, plan.len(), def.report_type, def.output_key);
                    let result = self.execute(session, def).await?;
                    summary.persisted.push(result.output_key.clone());

                    if self.notify(def, &result, ctx).await {
                        summary.notified += 1;
                    }
                }
            }
        }

        Ok(summary)
    }

    async fn execute(&self, session: &dyn ReportSession, def: &ReportDefinition) -> Result<HarvestResult, HarvestError> {
        let payload = session.get_json(&def.report_type, &def.endpoint_path, &def.params).await
            .map_err(|e| {
                error!("Failed to fetch {} ({}): {}", def.report_type, def.output_key, e);
                e
            })?;
        let retrieved_at = Utc::now();

        let payload = match &def.post_process {
            Some(transform) => {
                debug!("Applying {:?} to {}", transform, def.output_key);
                transform.apply(payload)
            }
            None => payload,
        };

        let result = HarvestResult {
            report_type: def.report_type.clone(),
            output_key: def.output_key.clone(),
            payload,
            retrieved_at,
        };

        self.sink.persist(&result).await
            .map_err(|e| {
                error!("Failed to persist {}: {}", result.output_key, e);
                e
            })?;
        info!("Stored {}", result.output_key);

        Ok(result)
    }

    /// Returns true when the webhook accepted the payload.
    async fn notify(&self, def: &ReportDefinition, result: &HarvestResult, ctx: &RunContext) -> bool {
        let Some(spec) = &def.notify else {
            return false;
        };

        let payload = NotificationPayload {
            run_id: ctx.run_id,
            employer_id: ctx.employer_id.clone(),
            window: (&ctx.window).into(),
            report_type: spec.report_type.clone(),
            timestamp: Utc::now(),
            report: encode_locale_numbers(result.payload.clone()),
            extra_metadata: spec.extra_metadata.clone(),
        };

        match self.notifier.deliver(&payload).await {
            DeliveryOutcome::Delivered(status) => {
                info!("Notified {} (HTTP {})", spec.report_type, status);
                true
            }
            DeliveryOutcome::NotConfigured => {
                debug!("No webhook configured, {} not forwarded", spec.report_type);
                false
            }
            DeliveryOutcome::Failed(reason) => {
                warn!("Notification for {} not delivered: {}", spec.report_type, reason);
                false
            }
        }
    }
}

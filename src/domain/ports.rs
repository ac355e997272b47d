use async_trait::async_trait;
use crate::domain::{
    error::HarvestError,
    models::{Credentials, DeliveryOutcome, HarvestResult, NotificationPayload, QueryParams},
};

#[async_trait]
pub trait SessionAuthenticator: Send + Sync {
    /// Logs in and exports the session into a request-only capability.
    async fn authenticate(&self, credentials: &Credentials) -> Result<Box<dyn ReportSession>, HarvestError>;
}

#[async_trait]
pub trait ReportSession: Send + Sync {
    /// GETs `path` with `params` and parses the body as JSON.
    async fn get_json(&self, report: &str, path: &str, params: &QueryParams) -> Result<serde_json::Value, HarvestError>;

    /// Frees the underlying clients. Safe to call more than once.
    async fn release(&mut self);
}

#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn persist(&self, result: &HarvestResult) -> Result<(), HarvestError>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, payload: &NotificationPayload) -> DeliveryOutcome;
}

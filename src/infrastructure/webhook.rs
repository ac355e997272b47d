use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};
use crate::domain::{
    error::HarvestError,
    models::{DeliveryOutcome, NotificationPayload},
    ports::Notifier,
};

/// Fire-and-forget JSON POST. At most one attempt per payload.
pub struct WebhookNotifier {
    client: Client,
    url: Option<String>,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(url: Option<String>, timeout: Duration) -> Self {
        let url = url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty());
        match &url {
            Some(u) => info!("Webhook notifier enabled: {}", u),
            None => info!("No appcast_hook / APPCAST_HOOK set, webhook delivery disabled"),
        }
        Self {
            client: Client::new(),
            url,
            timeout,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    async fn post(&self, url: &str, payload: &NotificationPayload) -> Result<u16, HarvestError> {
        let response = self.client
            .post(url)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| HarvestError::NotificationDelivery(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            let body = response.text().await.unwrap_or_else(|_| "<unreadable body>".to_string());
            Err(HarvestError::NotificationDelivery(format!(
                "HTTP {}: {}",
                status,
                HarvestError::excerpt(&body)
            )))
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn deliver(&self, payload: &NotificationPayload) -> DeliveryOutcome {
        let Some(url) = self.url.as_deref() else {
            debug!("Webhook skipped for {}: no endpoint configured", payload.report_type);
            return DeliveryOutcome::NotConfigured;
        };

        info!("Sending {} report to webhook", payload.report_type);
        match self.post(url, payload).await {
            Ok(status) => {
                info!("Webhook accepted {}: HTTP {}", payload.report_type, status);
                DeliveryOutcome::Delivered(status)
            }
            Err(e) => {
                warn!("Webhook delivery for {} failed: {}", payload.report_type, e);
                DeliveryOutcome::Failed(e.to_string())
            }
        }
    }
}

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication error: {0}")]
    Authentication(#[from] AuthError),

    #[error("Report fetch error for '{report}' (GET {endpoint}?{query}): status {status}: {excerpt}")]
    ReportFetch {
        report: String,
        endpoint: String,
        query: String,
        status: String,
        excerpt: String,
    },

    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Only ever built inside the notifier; logged there and never returned.
    #[error("Notification delivery error: {0}")]
    NotificationDelivery(String),
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("authenticated signal not observed within {}s (credentials rejected or session never became valid)", .0.as_secs())]
    Timeout(Duration),

    #[error("login flow changed: expected field '{field}' during {step} step was not offered (passwordless or redesigned login?)")]
    MissingField { step: &'static str, field: String },

    #[error("login rejected during {step} step with status {status}")]
    Rejected { step: &'static str, status: u16 },

    #[error("transport failure during login: {0}")]
    Transport(String),
}

impl HarvestError {
    /// Shortens a response body so it fits in a single log line.
    pub fn excerpt(body: &str) -> String {
        const LIMIT: usize = 500;
        let trimmed = body.trim();
        match trimmed.char_indices().nth(LIMIT) {
            Some((idx, _)) => format!("{}…", &trimmed[..idx]),
            None => trimmed.to_string(),
        }
    }
}

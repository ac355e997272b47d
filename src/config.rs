use chrono::NaiveDate;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use crate::domain::{
    date_window::{WindowMode, YearMonth},
    error::HarvestError,
    models::Credentials,
};

pub const DEFAULT_BASE_URL: &str = "https://appcast-de.appcast.io";
pub const DEFAULT_EMPLOYER_ID: &str = "27620";
pub const DEFAULT_OUTPUT_DIR: &str = "data";
pub const STATUSES: [&str; 5] = ["sponsored", "unsponsored", "expired", "aggregated", "suspended"];

/// First day the dashboard serves daily granularity for.
pub const EARLIEST_DAILY_DATE: NaiveDate = match NaiveDate::from_ymd_opt(2025, 11, 17) {
    Some(date) => date,
    None => panic!("earliest daily date is not a valid calendar date"),
};

/// Immutable per-run constants, injected at startup.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub base_url: String,
    pub login_path: String,
    pub user_info_path: String,
    pub statuses: Vec<String>,
    pub earliest_daily_date: NaiveDate,
    pub auth_timeout: Duration,
    pub request_timeout: Duration,
    pub webhook_timeout: Duration,
    pub output_dir: PathBuf,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            login_path: "/cc/user-sessions/login".to_string(),
            user_info_path: "/api/info/user".to_string(),
            statuses: STATUSES.iter().map(|s| s.to_string()).collect(),
            earliest_daily_date: EARLIEST_DAILY_DATE,
            auth_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
            webhook_timeout: Duration::from_secs(20),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub credentials: Credentials,
    pub employer_id: String,
    pub job_board_ids: Vec<String>,
    pub tiles_job_board_id: String,
    pub webhook_url: Option<String>,
    pub month_override: Option<YearMonth>,
    pub window_mode: WindowMode,
    pub settings: RunSettings,
}

impl HarvestConfig {
    pub fn from_env() -> Result<Self, HarvestError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; missing credentials fail here,
    /// before anything touches the network.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, HarvestError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let identity = non_empty("APPCAST_EMAIL");
        let secret = lookup("APPCAST_PASSWORD").filter(|v| !v.is_empty());
        let credentials = match (identity, secret) {
            (Some(identity), Some(secret)) => Credentials { identity, secret },
            _ => {
                return Err(HarvestError::Configuration(
                    "APPCAST_EMAIL and/or APPCAST_PASSWORD are not set".to_string(),
                ))
            }
        };

        let employer_id = non_empty("APPCAST_EMPLOYER_ID").unwrap_or_else(|| DEFAULT_EMPLOYER_ID.to_string());

        let job_board_ids: Vec<String> = lookup("APPCAST_JOB_BOARD_IDS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let tiles_job_board_id = non_empty("APPCAST_TILES_JOB_BOARD_ID").unwrap_or_default();

        let webhook_url = non_empty("appcast_hook").or_else(|| non_empty("APPCAST_HOOK"));

        let month_override = non_empty("APPCAST_MONTH")
            .map(|raw| raw.parse::<YearMonth>())
            .transpose()
            .map_err(HarvestError::Configuration)?;

        let window_mode = non_empty("APPCAST_WINDOW")
            .map(|raw| raw.parse::<WindowMode>())
            .transpose()
            .map_err(HarvestError::Configuration)?
            .unwrap_or_default();

        let mut settings = RunSettings::default();
        if let Some(base_url) = non_empty("APPCAST_BASE_URL") {
            settings.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(dir) = non_empty("APPCAST_OUTPUT_DIR") {
            settings.output_dir = PathBuf::from(dir);
        }
        if let Some(raw) = non_empty("APPCAST_AUTH_TIMEOUT_SECS") {
            let secs: u64 = raw.parse().map_err(|e| {
                HarvestError::Configuration(format!("invalid APPCAST_AUTH_TIMEOUT_SECS '{}': {}", raw, e))
            })?;
            settings.auth_timeout = Duration::from_secs(secs);
        }

        info!("Configuration loaded: employer={}, window={:?}, month_override={:?}, job_boards={}, webhook={}",
            employer_id,
            window_mode,
            month_override.map(|m| m.to_string()),
            job_board_ids.len(),
            if webhook_url.is_some() { "configured" } else { "not set" });
        debug!("Run settings: {:?}", settings);

        Ok(Self {
            credentials,
            employer_id,
            job_board_ids,
            tiles_job_board_id,
            webhook_url,
            month_override,
            window_mode,
            settings,
        })
    }
}

use appcast_harvest::{config::HarvestConfig, harvest_runner::HarvestRunner};
use std::process::ExitCode;
use tracing::{info, error};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("appcast_harvest=debug,reqwest=warn,hyper=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting Appcast report harvest");

    let config = match HarvestConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let runner = HarvestRunner::new(config);
    match runner.run(chrono::Utc::now()).await {
        Ok(summary) => {
            info!("Done: {} artifacts written, {} reports skipped by policy",
                summary.persisted.len(), summary.skipped.len());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Harvest failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use crate::domain::{error::HarvestError, models::HarvestResult, ports::ResultSink};

/// Writes each result as pretty-printed JSON to `<dir>/<output_key>.json`.
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        debug!("Initializing JSON file sink in {}", dir.display());
        Self { dir }
    }

    pub fn path_for(&self, output_key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", output_key))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ResultSink for JsonFileSink {
    async fn persist(&self, result: &HarvestResult) -> Result<(), HarvestError> {
        tokio::fs::create_dir_all(&self.dir).await
            .map_err(|e| {
                error!("Failed to create output directory {}: {}", self.dir.display(), e);
                HarvestError::Persistence(format!("{}: {}", self.dir.display(), e))
            })?;

        let text = serde_json::to_string_pretty(&result.payload)
            .map_err(|e| HarvestError::Persistence(e.to_string()))?;

        let path = self.path_for(&result.output_key);
        tokio::fs::write(&path, text).await
            .map_err(|e| {
                error!("Failed to write {}: {}", path.display(), e);
                HarvestError::Persistence(format!("{}: {}", path.display(), e))
            })?;

        info!("Saved to {}", path.display());
        Ok(())
    }
}

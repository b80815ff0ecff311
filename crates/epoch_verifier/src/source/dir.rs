//! Epoch datasets stored as JSON files: `<root>/<epoch>/{budgets,allocations,rewards,epoch_info}.json`.
//!
//! Files may hold the bare record array or the backend's response envelope.

use crate::data::RawEpochData;
use crate::source::{assemble, unwrap_envelope, DataSource, SourceError, DATASETS};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Clone, Debug)]
pub struct JsonDirSource {
    root: PathBuf,
}

impl JsonDirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<root>/<epoch>` when it exists, else `<root>` itself (a single-epoch export).
    pub fn epoch_dir(&self, epoch: u64) -> PathBuf {
        let nested = self.root.join(epoch.to_string());
        if nested.is_dir() {
            nested
        } else {
            self.root.clone()
        }
    }

    /// Write datasets as pretty JSON under `<root>/<epoch>/`. Returns that directory.
    pub fn write_epoch(
        root: &Path,
        epoch: u64,
        raw: &RawEpochData,
    ) -> Result<PathBuf, SourceError> {
        let dir = root.join(epoch.to_string());
        std::fs::create_dir_all(&dir)?;
        let values = [&raw.budgets, &raw.allocations, &raw.rewards, &raw.epoch_info];
        for (name, value) in DATASETS.iter().zip(values) {
            let path = dir.join(format!("{name}.json"));
            let body = serde_json::to_string_pretty(value).map_err(|source| SourceError::Json {
                path: path.clone(),
                source,
            })?;
            std::fs::write(&path, body)?;
        }
        Ok(dir)
    }
}

impl DataSource for JsonDirSource {
    fn fetch_epoch(&self, epoch: u64) -> Result<RawEpochData, SourceError> {
        let dir = self.epoch_dir(epoch);
        debug!(dir = %dir.display(), epoch, "reading epoch datasets");
        assemble(epoch, |dataset| read_dataset(&dir, dataset))
    }
}

fn read_dataset(dir: &Path, dataset: &str) -> Result<Option<serde_json::Value>, SourceError> {
    let path = dir.join(format!("{dataset}.json"));
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)?;
    let value =
        serde_json::from_str(&content).map_err(|source| SourceError::Json { path, source })?;
    Ok(Some(unwrap_envelope(dataset, value)))
}

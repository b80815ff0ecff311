//! Data sources: where one epoch's raw datasets come from.
//!
//! The engine only consumes [`RawEpochData`]; parsing and validation happen
//! in [`Context::from_raw`](crate::data::Context::from_raw).

mod cache;
mod dir;
mod http;

pub use cache::{Cache, CacheError};
pub use dir::JsonDirSource;
pub use http::{HttpConfig, HttpSource};

use crate::data::RawEpochData;
use std::path::PathBuf;
use thiserror::Error;

/// Dataset names, in the order they are fetched. Also the JSON file stems
/// used by [`JsonDirSource`].
pub const DATASETS: [&str; 4] = ["budgets", "allocations", "rewards", "epoch_info"];

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("epoch {epoch}: missing dataset {dataset}")]
    MissingDataset { epoch: u64, dataset: &'static str },
    #[error("request: {0}")]
    Request(#[from] reqwest::Error),
    #[error("cache: {0}")]
    Cache(#[from] CacheError),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api error: status {0} body {1}")]
    Api(u16, String),
    #[error("decode {endpoint}: {source}")]
    Decode {
        endpoint: String,
        source: serde_json::Error,
    },
    #[error("offline mode: no cached data for {0}")]
    OfflineMiss(String),
}

/// Backend responses wrap the record arrays in an object keyed by the dataset
/// name. `epoch_info` is never wrapped.
fn envelope_key(dataset: &str) -> Option<&str> {
    match dataset {
        "budgets" | "allocations" | "rewards" => Some(dataset),
        _ => None,
    }
}

/// `{"budgets": [...]}` becomes `[...]`; anything else is returned as is.
pub(crate) fn unwrap_envelope(dataset: &str, value: serde_json::Value) -> serde_json::Value {
    match (value, envelope_key(dataset)) {
        (serde_json::Value::Object(mut map), Some(key)) if map.contains_key(key) => {
            map.remove(key).unwrap_or(serde_json::Value::Null)
        }
        (value, _) => value,
    }
}

/// Supplies the complete raw datasets for one epoch.
pub trait DataSource {
    fn fetch_epoch(&self, epoch: u64) -> Result<RawEpochData, SourceError>;
}

/// Assemble [`RawEpochData`] from datasets keyed by name, failing on the first absent one.
pub(crate) fn assemble(
    epoch: u64,
    mut lookup: impl FnMut(&'static str) -> Result<Option<serde_json::Value>, SourceError>,
) -> Result<RawEpochData, SourceError> {
    let mut take = |dataset: &'static str| -> Result<serde_json::Value, SourceError> {
        lookup(dataset)?.ok_or(SourceError::MissingDataset { epoch, dataset })
    };
    Ok(RawEpochData {
        budgets: take(DATASETS[0])?,
        allocations: take(DATASETS[1])?,
        rewards: take(DATASETS[2])?,
        epoch_info: take(DATASETS[3])?,
    })
}

//! Backend API client with rate limiting, retries and an optional response cache.

use crate::data::RawEpochData;
use crate::source::cache::Cache;
use crate::source::{assemble, unwrap_envelope, DataSource, SourceError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::runtime::Runtime;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const RATE_LIMIT_MS: u64 = 200;
const MAX_RETRIES: u32 = 3;
const RETRY_BACKOFF_MS: u64 = 500;
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug)]
pub struct HttpConfig {
    pub base_url: String,
    pub rate_limit_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    /// Serve only from the cache; never touch the network.
    pub offline: bool,
}

impl HttpConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            rate_limit_ms: RATE_LIMIT_MS,
            max_retries: MAX_RETRIES,
            retry_backoff_ms: RETRY_BACKOFF_MS,
            offline: false,
        }
    }
}

/// Request path for a dataset.
fn endpoint(dataset: &str, epoch: u64) -> Option<String> {
    let path = match dataset {
        "budgets" => format!("/rewards/budgets/epoch/{epoch}"),
        "allocations" => format!("/allocations/epoch/{epoch}?includeZeroAllocations=true"),
        "rewards" => format!("/rewards/proposals/epoch/{epoch}"),
        "epoch_info" => format!("/epochs/info/{epoch}"),
        _ => return None,
    };
    Some(path)
}

/// Fetches epoch datasets over HTTP. Owns a small tokio runtime so callers stay synchronous.
pub struct HttpSource {
    config: HttpConfig,
    client: Option<reqwest::Client>,
    cache: Option<Cache>,
    last_request: Mutex<Option<OffsetDateTime>>,
    request_count: AtomicU64,
    runtime: Runtime,
}

impl HttpSource {
    pub fn new(config: HttpConfig, cache: Option<Cache>) -> Result<Self, SourceError> {
        url::Url::parse(&config.base_url)?;
        let client = if config.offline {
            None
        } else {
            Some(
                reqwest::Client::builder()
                    .use_rustls_tls()
                    .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                    .build()?,
            )
        };
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            config,
            client,
            cache,
            last_request: Mutex::new(None),
            request_count: AtomicU64::new(0),
            runtime,
        })
    }

    /// Network requests made so far (cache hits excluded).
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = (OffsetDateTime::now_utc() - prev).whole_milliseconds();
            let need = i128::from(self.config.rate_limit_ms);
            if elapsed < need {
                let wait = u64::try_from(need - elapsed).unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(wait)).await;
            }
        }
        *last = Some(OffsetDateTime::now_utc());
    }

    async fn get_body(&self, epoch: u64, path: &str) -> Result<String, SourceError> {
        let url = self.url_for(path);
        let key = Cache::key_for(&url);
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(&key)? {
                debug!(%path, "cache hit");
                return Ok(cached);
            }
        }
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| SourceError::OfflineMiss(path.to_string()))?;

        let mut last_err = None;
        for attempt in 0..=self.config.max_retries {
            self.rate_limit().await;
            match client.get(&url).send().await {
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    self.request_count.fetch_add(1, Ordering::Relaxed);
                    if status.is_success() {
                        if let Some(cache) = &self.cache {
                            if let Err(e) = cache.put(&key, epoch, path, &body) {
                                warn!(%path, error = %e, "cache write failed");
                            }
                        }
                        return Ok(body);
                    }
                    last_err = Some(SourceError::Api(status.as_u16(), body));
                }
                Err(e) => last_err = Some(SourceError::Request(e)),
            }
            if attempt < self.config.max_retries {
                let ms = self.config.retry_backoff_ms * (1 << attempt);
                warn!(%path, attempt, ms, "retry after error");
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
        }
        Err(last_err.unwrap_or_else(|| SourceError::Api(0, "no attempt made".to_string())))
    }

    async fn fetch_dataset(
        &self,
        epoch: u64,
        dataset: &str,
    ) -> Result<Option<serde_json::Value>, SourceError> {
        let Some(path) = endpoint(dataset, epoch) else {
            return Ok(None);
        };
        let body = self.get_body(epoch, &path).await?;
        let value = serde_json::from_str(&body).map_err(|source| SourceError::Decode {
            endpoint: path,
            source,
        })?;
        Ok(Some(unwrap_envelope(dataset, value)))
    }

    async fn fetch_all(&self, epoch: u64) -> Result<RawEpochData, SourceError> {
        let mut datasets = std::collections::HashMap::new();
        for dataset in crate::source::DATASETS {
            if let Some(value) = self.fetch_dataset(epoch, dataset).await? {
                datasets.insert(dataset, value);
            }
        }
        assemble(epoch, |dataset| Ok(datasets.remove(dataset)))
    }
}

impl DataSource for HttpSource {
    fn fetch_epoch(&self, epoch: u64) -> Result<RawEpochData, SourceError> {
        let raw = self.runtime.block_on(self.fetch_all(epoch))?;
        info!(
            epoch,
            requests = self.request_count(),
            offline = self.config.offline,
            "epoch datasets fetched"
        );
        Ok(raw)
    }
}

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration as StdDuration;

use rand::Rng;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::config::FdcConfig;
use crate::error::ApiError;
use crate::fdc::dto::{FdcSearchQuery, FdcSearchResponse};

const SEARCH_PATH: &str = "/foods/search";
const BODY_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum FdcError {
    #[error("food data provider API key is not configured")]
    MissingApiKey,
    #[error("food data provider request timed out")]
    Timeout,
    #[error("food data provider request failed: {0}")]
    Transport(String),
    #[error("food data provider returned status {status}: {body}")]
    UpstreamStatus { status: u16, body: String },
    #[error("food data provider returned an unreadable body: {0}")]
    Decode(String),
}

impl From<FdcError> for ApiError {
    fn from(err: FdcError) -> Self {
        match err {
            FdcError::MissingApiKey => ApiError::ProviderUnavailable,
            FdcError::UpstreamStatus { status, .. } => ApiError::Upstream {
                status: Some(status),
            },
            FdcError::Timeout | FdcError::Transport(_) | FdcError::Decode(_) => {
                ApiError::Upstream { status: None }
            }
        }
    }
}

#[derive(Debug, Clone)]
struct CachedResponse {
    response: FdcSearchResponse,
    expires_at: OffsetDateTime,
}

/// Client for the FoodData Central search API. Holds a short-lived response
/// cache so identical queries inside the TTL don't spend another upstream
/// call; the cache is an optimization only and never serves stale-past-TTL
/// entries.
pub struct FdcClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    cache_ttl: Duration,
    cache: Mutex<HashMap<String, CachedResponse>>,
}

impl FdcClient {
    pub fn new(config: &FdcConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(StdDuration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            cache_ttl: Duration::seconds(config.cache_ttl_seconds as i64),
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Run one validated search against the provider. Fails fast with
    /// `MissingApiKey` before any network or cache access when no credential
    /// is configured.
    pub async fn search(&self, query: &FdcSearchQuery) -> Result<FdcSearchResponse, FdcError> {
        let api_key = self.api_key.as_deref().ok_or(FdcError::MissingApiKey)?;

        let key = cache_key(query);
        if let Some(hit) = self.lookup_at(&key, OffsetDateTime::now_utc()) {
            debug!(query = %query.query, "fdc response cache hit");
            return Ok(hit);
        }

        debug!(
            query = %query.query,
            page_size = query.page_size,
            page_number = query.page_number,
            "querying food data provider"
        );
        let response = self
            .http
            .get(format!("{}{}", self.base_url, SEARCH_PATH))
            .query(&request_params(api_key, query))
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(status_error(status, body.as_ref()));
        }

        let decoded: FdcSearchResponse =
            serde_json::from_slice(body.as_ref()).map_err(|e| FdcError::Decode(e.to_string()))?;
        self.store_at(key, decoded.clone(), OffsetDateTime::now_utc());
        Ok(decoded)
    }

    fn lookup_at(&self, key: &str, now: OffsetDateTime) -> Option<FdcSearchResponse> {
        let cache = self.lock();
        cache
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.response.clone())
    }

    fn store_at(&self, key: String, response: FdcSearchResponse, now: OffsetDateTime) {
        // Jitter spreads expiries so identical queries issued together don't
        // all refetch in the same instant.
        let jitter_cap = (self.cache_ttl.whole_seconds() / 10).max(0);
        let jitter = Duration::seconds(rand::thread_rng().gen_range(0..=jitter_cap));
        let mut cache = self.lock();
        cache.retain(|_, entry| entry.expires_at > now);
        cache.insert(
            key,
            CachedResponse {
                response,
                expires_at: now + self.cache_ttl + jitter,
            },
        );
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CachedResponse>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn cache_key(query: &FdcSearchQuery) -> String {
    format!(
        "{}|{}|{}|{}",
        query.query,
        query.page_size,
        query.page_number,
        query.data_type.as_deref().unwrap_or("")
    )
}

fn request_params(api_key: &str, query: &FdcSearchQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("api_key", api_key.to_owned()),
        ("query", query.query.clone()),
        ("pageSize", query.page_size.to_string()),
        ("pageNumber", query.page_number.to_string()),
    ];
    if let Some(data_type) = &query.data_type {
        params.push(("dataType", data_type.clone()));
    }
    params
}

fn map_transport_error(error: reqwest::Error) -> FdcError {
    if error.is_timeout() {
        FdcError::Timeout
    } else {
        FdcError::Transport(error.to_string())
    }
}

fn status_error(status: StatusCode, body: &[u8]) -> FdcError {
    FdcError::UpstreamStatus {
        status: status.as_u16(),
        body: body_preview(body),
    }
}

fn body_preview(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let compact = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if compact.chars().count() > BODY_PREVIEW_CHARS {
        let truncated: String = compact.chars().take(BODY_PREVIEW_CHARS).collect();
        format!("{truncated}...")
    } else {
        compact
    }
}

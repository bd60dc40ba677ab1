//! Pendo API client.
//!
//! Provides the Remote Query Executor (`POST /api/v1/aggregation`) and the
//! simple-entity lookups used by the catalog tools.
//!
//! # API Reference
//!
//! - Base URL: `https://app.pendo.io` (configurable for EU/US1 instances)
//! - Authentication: `x-pendo-integration-key: <key>`
//! - Aggregations: `POST /api/v1/aggregation`
//! - Entities: `GET /api/v1/{page,feature,tracktype,segment,visitor/{id},account/{id}}`
//!
//! Catalog lists (pages, features, track types, segments) are cached with
//! `moka`; per-id visitor and account lookups always hit the API.

mod aggregation;
mod cache;
mod types;

pub use aggregation::{backoff_delay, classify_response, parse_retry_after};
pub use types::*;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use pendo_insights_core::{
    AccountId, AggregationRequest, AppId, FeatureId, QueryOutcome, TransportErrorKind, VisitorId,
};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::{PendoConfig, with_trailing_slash};
use crate::query::AnalyticsBackend;

use aggregation::classify_send_error;
use cache::{CacheValue, cache_key};

const AGGREGATION_PATH: &str = "/api/v1/aggregation";
const CACHE_CAPACITY: u64 = 256;

/// Errors that can occur when calling the Pendo entity endpoints.
#[derive(Debug, Error)]
pub enum PendoError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limited by Pendo.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Integration key rejected.
    #[error("Unauthorized: integration key rejected")]
    Unauthorized,
}

impl PendoError {
    /// The transport classification of this error. `NotFound` is a
    /// legitimate answer rather than a transport failure.
    #[must_use]
    pub fn transport_kind(&self) -> Option<TransportErrorKind> {
        match self {
            Self::Http(e) => Some(classify_send_error(e)),
            Self::Api { .. } => Some(TransportErrorKind::ServerError),
            Self::RateLimited(_) => Some(TransportErrorKind::RateLimited),
            Self::Parse(_) => Some(TransportErrorKind::MalformedResponse),
            Self::Unauthorized => Some(TransportErrorKind::Unauthorized),
            Self::NotFound(_) => None,
        }
    }
}

/// Pendo API client.
///
/// Cheap to clone; all clones share one connection pool and one cache.
#[derive(Clone)]
pub struct PendoClient {
    inner: Arc<PendoClientInner>,
}

struct PendoClientInner {
    client: reqwest::Client,
    base_url: Url,
    max_retries: u32,
    cache: Cache<String, CacheValue>,
}

impl PendoClient {
    /// Create a new Pendo API client.
    ///
    /// # Errors
    ///
    /// Returns error if the integration key is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &PendoConfig) -> Result<Self, PendoError> {
        let mut headers = HeaderMap::new();

        let mut key = HeaderValue::from_str(config.integration_key())
            .map_err(|e| PendoError::Parse(format!("Invalid integration key format: {e}")))?;
        key.set_sensitive(true);
        headers.insert("x-pendo-integration-key", key);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(config.cache_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(PendoClientInner {
                client,
                base_url: with_trailing_slash(config.api_base.clone()),
                max_retries: config.max_retries,
                cache,
            }),
        })
    }

    /// Base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    // =========================================================================
    // Aggregation
    // =========================================================================

    /// Run one aggregation pipeline and classify the result.
    ///
    /// Never fails: transport problems come back as
    /// [`QueryOutcome::TransportError`]. Rate-limited and server errors are
    /// retried up to the configured limit before giving up.
    #[instrument(skip(self, request), fields(request_name = %request.pipeline().name()))]
    pub async fn run_aggregation(&self, request: &AggregationRequest) -> QueryOutcome {
        let url = match self.url(AGGREGATION_PATH, None) {
            Ok(url) => url,
            Err(e) => {
                return QueryOutcome::transport_error(TransportErrorKind::Network, e.to_string());
            }
        };
        let body = request.to_wire();
        debug!(pipeline = %body, "Sending aggregation");

        let mut attempt = 0;
        loop {
            let (outcome, retry_after) = self.send_aggregation(&url, &body).await;
            match &outcome {
                QueryOutcome::TransportError { kind, message }
                    if kind.is_transient() && attempt < self.inner.max_retries =>
                {
                    let delay = backoff_delay(attempt, retry_after);
                    warn!(
                        kind = %kind,
                        error = %message,
                        attempt = attempt + 1,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Transient aggregation failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                QueryOutcome::TransportError { kind, message } => {
                    warn!(kind = %kind, error = %message, "Aggregation failed");
                    return outcome;
                }
                QueryOutcome::Rows(rows) => {
                    debug!(rows = rows.len(), "Aggregation returned rows");
                    return outcome;
                }
                QueryOutcome::Empty => {
                    debug!("Aggregation returned no rows");
                    return outcome;
                }
            }
        }
    }

    async fn send_aggregation(&self, url: &Url, body: &Value) -> (QueryOutcome, Option<Duration>) {
        let response = match self.inner.client.post(url.clone()).json(body).send().await {
            Ok(response) => response,
            Err(e) => {
                return (
                    QueryOutcome::transport_error(classify_send_error(&e), e.to_string()),
                    None,
                );
            }
        };

        let status = response.status().as_u16();
        let retry_after = parse_retry_after(
            response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok()),
        );

        match response.text().await {
            Ok(text) => (classify_response(status, &text), retry_after),
            Err(e) => (
                QueryOutcome::transport_error(
                    TransportErrorKind::MalformedResponse,
                    format!("Failed to read response body: {e}"),
                ),
                retry_after,
            ),
        }
    }

    // =========================================================================
    // Catalog lists (cached)
    // =========================================================================

    /// List tagged pages.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_pages(&self, app_id: Option<&AppId>) -> Result<Vec<Page>, PendoError> {
        let key = cache_key("pages", app_id.map(AppId::as_str));
        if let Some(CacheValue::Pages(pages)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for pages");
            return Ok(pages);
        }

        let pages: Vec<Page> = self.get("/api/v1/page", app_id).await?;
        self.inner
            .cache
            .insert(key, CacheValue::Pages(pages.clone()))
            .await;
        Ok(pages)
    }

    /// List tagged features.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_features(&self, app_id: Option<&AppId>) -> Result<Vec<Feature>, PendoError> {
        let key = cache_key("features", app_id.map(AppId::as_str));
        if let Some(CacheValue::Features(features)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for features");
            return Ok(features);
        }

        let features: Vec<Feature> = self.get("/api/v1/feature", app_id).await?;
        self.inner
            .cache
            .insert(key, CacheValue::Features(features.clone()))
            .await;
        Ok(features)
    }

    /// List track event types.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_track_types(
        &self,
        app_id: Option<&AppId>,
    ) -> Result<Vec<TrackType>, PendoError> {
        let key = cache_key("tracktypes", app_id.map(AppId::as_str));
        if let Some(CacheValue::TrackTypes(track_types)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for track types");
            return Ok(track_types);
        }

        let track_types: Vec<TrackType> = self.get("/api/v1/tracktype", app_id).await?;
        self.inner
            .cache
            .insert(key, CacheValue::TrackTypes(track_types.clone()))
            .await;
        Ok(track_types)
    }

    /// List saved segments.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_segments(&self) -> Result<Vec<Segment>, PendoError> {
        let key = cache_key("segments", None);
        if let Some(CacheValue::Segments(segments)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for segments");
            return Ok(segments);
        }

        let segments: Vec<Segment> = self.get("/api/v1/segment", None).await?;
        self.inner
            .cache
            .insert(key, CacheValue::Segments(segments.clone()))
            .await;
        Ok(segments)
    }

    // =========================================================================
    // Single entities (not cached)
    // =========================================================================

    /// Get one feature by id.
    ///
    /// # Errors
    ///
    /// Returns `PendoError::NotFound` if the feature does not exist, or an
    /// error if the API request fails.
    #[instrument(skip(self), fields(feature_id = %id))]
    pub async fn get_feature(&self, id: &FeatureId) -> Result<Feature, PendoError> {
        let path = format!("/api/v1/feature/{}", urlencoding::encode(id.as_str()));
        let value: Value = self.get(&path, None).await?;
        single_entity(value, &format!("feature {id}"))
    }

    /// Get one visitor by id.
    ///
    /// # Errors
    ///
    /// Returns `PendoError::NotFound` if the visitor does not exist, or an
    /// error if the API request fails.
    #[instrument(skip(self), fields(visitor_id = %id))]
    pub async fn get_visitor(&self, id: &VisitorId) -> Result<Visitor, PendoError> {
        let path = format!("/api/v1/visitor/{}", urlencoding::encode(id.as_str()));
        let value: Value = self.get(&path, None).await?;
        single_entity(value, &format!("visitor {id}"))
    }

    /// Get one account by id.
    ///
    /// # Errors
    ///
    /// Returns `PendoError::NotFound` if the account does not exist, or an
    /// error if the API request fails.
    #[instrument(skip(self), fields(account_id = %id))]
    pub async fn get_account(&self, id: &AccountId) -> Result<Account, PendoError> {
        let path = format!("/api/v1/account/{}", urlencoding::encode(id.as_str()));
        let value: Value = self.get(&path, None).await?;
        single_entity(value, &format!("account {id}"))
    }

    // =========================================================================
    // Plumbing
    // =========================================================================

    fn url(&self, path: &str, app_id: Option<&AppId>) -> Result<Url, PendoError> {
        let mut url = self
            .inner
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| PendoError::Parse(format!("Invalid request URL for {path}: {e}")))?;
        if let Some(app_id) = app_id {
            url.query_pairs_mut().append_pair("appId", app_id.as_str());
        }
        Ok(url)
    }

    /// Execute a GET request to the Pendo API.
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        app_id: Option<&AppId>,
    ) -> Result<T, PendoError> {
        let url = self.url(path, app_id)?;
        let response = self.inner.client.get(url).send().await?;
        self.handle_response(response).await
    }

    /// Handle API response and parse JSON.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, PendoError> {
        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| PendoError::Parse(format!("Failed to parse response: {e}")));
        }

        Err(self.parse_error(response).await)
    }

    /// Parse error response from the Pendo API.
    async fn parse_error(&self, response: reqwest::Response) -> PendoError {
        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(60);
            return PendoError::RateLimited(retry_after);
        }

        if status == 401 || status == 403 {
            return PendoError::Unauthorized;
        }

        if status == 404 {
            return PendoError::NotFound("Resource not found".to_string());
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        PendoError::Api { status, message }
    }
}

/// Entity endpoints answer with either one object or a one-element array.
fn single_entity<T: DeserializeOwned>(value: Value, what: &str) -> Result<T, PendoError> {
    let value = match value {
        Value::Array(items) => items
            .into_iter()
            .next()
            .ok_or_else(|| PendoError::NotFound(what.to_string()))?,
        Value::Null => return Err(PendoError::NotFound(what.to_string())),
        other => other,
    };
    serde_json::from_value(value).map_err(|e| PendoError::Parse(format!("Invalid {what}: {e}")))
}

impl std::fmt::Debug for PendoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendoClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("max_retries", &self.inner.max_retries)
            .finish_non_exhaustive()
    }
}

impl AnalyticsBackend for PendoClient {
    fn aggregate(&self, request: &AggregationRequest) -> impl Future<Output = QueryOutcome> + Send {
        self.run_aggregation(request)
    }

    fn list_pages(
        &self,
        app_id: Option<&AppId>,
    ) -> impl Future<Output = Result<Vec<Page>, PendoError>> + Send {
        Self::list_pages(self, app_id)
    }

    fn list_features(
        &self,
        app_id: Option<&AppId>,
    ) -> impl Future<Output = Result<Vec<Feature>, PendoError>> + Send {
        Self::list_features(self, app_id)
    }

    fn get_feature(&self, id: &FeatureId) -> impl Future<Output = Result<Feature, PendoError>> + Send {
        Self::get_feature(self, id)
    }

    fn list_track_types(
        &self,
        app_id: Option<&AppId>,
    ) -> impl Future<Output = Result<Vec<TrackType>, PendoError>> + Send {
        Self::list_track_types(self, app_id)
    }

    fn list_segments(&self) -> impl Future<Output = Result<Vec<Segment>, PendoError>> + Send {
        Self::list_segments(self)
    }

    fn get_visitor(&self, id: &VisitorId) -> impl Future<Output = Result<Visitor, PendoError>> + Send {
        Self::get_visitor(self, id)
    }

    fn get_account(&self, id: &AccountId) -> impl Future<Output = Result<Account, PendoError>> + Send {
        Self::get_account(self, id)
    }
}

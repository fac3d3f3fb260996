//! Adafruit IO feed client and the uploader that fans readings out to feeds.

use crate::error::{MonitorError, Result};
use crate::metrics::data::{MetricKind, Reading};
use async_trait::async_trait;
use futures_util::future::join_all;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Adafruit IO REST API root.
pub const AIO_BASE_URL: &str = "https://io.adafruit.com/api/v2";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Feed metadata returned by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedInfo {
    pub key: String,
    #[serde(default)]
    pub name: String,
}

/// A cloud service accepting scalar values per feed.
#[async_trait]
pub trait FeedClient: Send + Sync {
    /// Look up a feed, failing with a request error if it does not exist.
    async fn feed_info(&self, key: &str) -> Result<FeedInfo>;

    /// Push one value to a feed.
    async fn send(&self, key: &str, value: f64) -> Result<()>;
}

/// Client for the Adafruit IO v2 REST API.
pub struct AdafruitClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    key: String,
}

impl AdafruitClient {
    pub fn new(username: impl Into<String>, key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(AIO_BASE_URL, username, key)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        username: impl Into<String>,
        key: impl Into<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("pif451/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            key: key.into(),
        })
    }

    fn feed_url(&self, feed: &str) -> String {
        format!("{}/{}/feeds/{}", self.base_url, self.username, feed)
    }
}

/// Map an HTTP status to the monitor's error taxonomy.
fn check_status(status: StatusCode, feed: &str) -> Result<()> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        Err(MonitorError::throttled(format!("feed '{}': {}", feed, status)))
    } else if !status.is_success() {
        Err(MonitorError::request_error(format!("feed '{}': {}", feed, status)))
    } else {
        Ok(())
    }
}

#[async_trait]
impl FeedClient for AdafruitClient {
    async fn feed_info(&self, key: &str) -> Result<FeedInfo> {
        let response = self
            .http
            .get(self.feed_url(key))
            .header("X-AIO-Key", &self.key)
            .send()
            .await?;
        check_status(response.status(), key)?;
        Ok(response.json::<FeedInfo>().await?)
    }

    async fn send(&self, key: &str, value: f64) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/data", self.feed_url(key)))
            .header("X-AIO-Key", &self.key)
            .json(&serde_json::json!({ "value": value }))
            .send()
            .await?;
        check_status(response.status(), key)
    }
}

/// Stand-in client that only logs, used by the demo mode.
#[derive(Debug, Default)]
pub struct LoggingFeedClient;

#[async_trait]
impl FeedClient for LoggingFeedClient {
    async fn feed_info(&self, key: &str) -> Result<FeedInfo> {
        Ok(FeedInfo {
            key: key.to_string(),
            name: key.to_string(),
        })
    }

    async fn send(&self, key: &str, value: f64) -> Result<()> {
        info!(feed = key, value, "Fake upload");
        Ok(())
    }
}

/// Round to `places` decimals.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

/// Sends every value of a reading to its feed.
pub struct FeedUploader {
    client: Arc<dyn FeedClient>,
    feeds: Vec<(MetricKind, String)>,
    rounding: u32,
}

impl FeedUploader {
    pub fn new(client: Arc<dyn FeedClient>, feeds: Vec<(MetricKind, String)>, rounding: u32) -> Self {
        Self {
            client,
            feeds,
            rounding,
        }
    }

    pub fn feeds(&self) -> &[(MetricKind, String)] {
        &self.feeds
    }

    /// Check that every configured feed exists.
    pub async fn verify_feeds(&self) -> Result<()> {
        for (kind, key) in &self.feeds {
            let info = self.client.feed_info(key).await?;
            debug!(metric = %kind, feed = %info.key, "Feed verified");
        }
        Ok(())
    }

    /// Values that would be uploaded for `reading`, rounded.
    pub fn prepare(&self, reading: &Reading) -> Vec<(String, f64)> {
        self.feeds
            .iter()
            .filter_map(|(kind, key)| {
                reading
                    .get(*kind)
                    .map(|value| (key.clone(), round_to(value, self.rounding)))
            })
            .collect()
    }

    /// Upload all values concurrently and wait for every send to finish.
    ///
    /// A request error takes precedence over throttling.
    pub async fn upload(&self, reading: &Reading) -> Result<Vec<(String, f64)>> {
        let values = self.prepare(reading);
        let results = join_all(
            values
                .iter()
                .map(|(key, value)| self.client.send(key, *value)),
        )
        .await;

        let mut throttled = None;
        for result in results {
            match result {
                Ok(()) => {}
                Err(err) if err.is_throttling() => {
                    throttled.get_or_insert(err);
                }
                Err(err) => return Err(err),
            }
        }

        match throttled {
            Some(err) => Err(err),
            None => Ok(values),
        }
    }
}

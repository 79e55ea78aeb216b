//! HTTP fetcher speaking the config service's REST protocol.

use super::{ConfigFetcher, FetchedConfig, Notification, PollOutcome};
use crate::error::{ConfigError, Result, TransportError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// HTTP-based configuration fetcher.
///
/// Issues `GET {meta_url}/configs/{app_id}/{cluster}/{namespace}` for full
/// payloads and `GET {meta_url}/notifications/v2` for long-polling. The two
/// calls use separate timeouts: the long poll is held open by the server, so
/// its timeout must exceed the server's hold time.
///
/// # Examples
///
/// ```rust,no_run
/// use hotswap_settings::sources::HttpFetcher;
/// use std::time::Duration;
///
/// # fn example() -> hotswap_settings::error::Result<()> {
/// let fetcher = HttpFetcher::builder()
///     .with_meta_url("http://config.example.com:8080")
///     .with_app_id("billing")
///     .with_cluster("default")
///     .with_polling_timeout(Duration::from_secs(90))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct HttpFetcher {
    meta_url: String,
    app_id: String,
    cluster: String,
    client: Client,
    fetch_timeout: Duration,
    polling_timeout: Duration,
}

impl HttpFetcher {
    /// Create a new builder for constructing an HTTP fetcher.
    pub fn builder() -> HttpFetcherBuilder {
        HttpFetcherBuilder::new()
    }

    /// Fetch a namespace, optionally telling the server which release the
    /// caller already holds.
    ///
    /// `releasekey` and `messages` are only sent when both are supplied.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, a non-success status or a body
    /// that does not match the protocol.
    pub async fn fetch_release(
        &self,
        namespace: &str,
        release_key: Option<&str>,
        messages: Option<&str>,
    ) -> std::result::Result<FetchedConfig, TransportError> {
        let url = self.config_url(namespace);
        let mut request = self.client.get(&url).timeout(self.fetch_timeout);

        if let (Some(release_key), Some(messages)) = (release_key, messages) {
            request = request.query(&[("releasekey", release_key), ("messages", messages)]);
        }

        let response = request.send().await.map_err(|e| TransportError::Request {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url,
                status: status.as_u16(),
            });
        }

        decode_body(&url, response).await
    }

    /// URL of the full-configuration endpoint for `namespace`.
    pub fn config_url(&self, namespace: &str) -> String {
        format!(
            "{}/configs/{}/{}/{}",
            self.meta_url, self.app_id, self.cluster, namespace
        )
    }

    /// URL of the long-poll endpoint (query string excluded).
    pub fn notifications_url(&self) -> String {
        format!("{}/notifications/v2", self.meta_url)
    }

    /// Query parameters of a long-poll request for `cursor`.
    fn notifications_query(
        &self,
        cursor: &[Notification],
    ) -> std::result::Result<Vec<(&'static str, String)>, TransportError> {
        let notifications =
            serde_json::to_string(cursor).map_err(|e| TransportError::Encode {
                url: self.notifications_url(),
                reason: e.to_string(),
            })?;

        Ok(vec![
            ("appId", self.app_id.clone()),
            ("cluster", self.cluster.clone()),
            ("notifications", notifications),
        ])
    }
}

#[async_trait]
impl ConfigFetcher for HttpFetcher {
    async fn fetch_config(
        &self,
        namespace: &str,
    ) -> std::result::Result<FetchedConfig, TransportError> {
        self.fetch_release(namespace, None, None).await
    }

    async fn poll_notifications(
        &self,
        cursor: &[Notification],
    ) -> std::result::Result<PollOutcome, TransportError> {
        let url = self.notifications_url();
        let query = self.notifications_query(cursor)?;

        let response = self
            .client
            .get(&url)
            .query(&query)
            .timeout(self.polling_timeout)
            .send()
            .await
            .map_err(|e| TransportError::Request {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            return Ok(PollOutcome::NotChanged);
        }
        if !status.is_success() {
            return Err(TransportError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let changed: Vec<Notification> = decode_body(&url, response).await?;
        Ok(PollOutcome::Changed(changed))
    }

    fn name(&self) -> String {
        format!("http:{}", self.meta_url)
    }
}

async fn decode_body<T: DeserializeOwned>(
    url: &str,
    response: reqwest::Response,
) -> std::result::Result<T, TransportError> {
    response.json::<T>().await.map_err(|e| TransportError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// Builder for constructing an `HttpFetcher`.
pub struct HttpFetcherBuilder {
    meta_url: Option<String>,
    app_id: Option<String>,
    cluster: String,
    fetch_timeout: Duration,
    polling_timeout: Duration,
}

impl HttpFetcherBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            meta_url: None,
            app_id: None,
            cluster: "default".to_string(),
            fetch_timeout: Duration::from_secs(3),
            polling_timeout: Duration::from_secs(90),
        }
    }

    /// Set the base URL of the configuration service.
    pub fn with_meta_url(mut self, meta_url: impl Into<String>) -> Self {
        self.meta_url = Some(meta_url.into());
        self
    }

    /// Set the application identifier.
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    /// Set the cluster name.
    ///
    /// Default is `default`.
    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = cluster.into();
        self
    }

    /// Set the timeout for full-configuration fetches.
    ///
    /// Default is 3 seconds.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Set the timeout for long-poll requests.
    ///
    /// Default is 90 seconds.
    pub fn with_polling_timeout(mut self, timeout: Duration) -> Self {
        self.polling_timeout = timeout;
        self
    }

    /// Build the HTTP fetcher.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No meta URL or app id is provided
    /// - The HTTP client cannot be constructed
    pub fn build(self) -> Result<HttpFetcher> {
        let meta_url = self
            .meta_url
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::MissingParameter("meta_url"))?;
        let app_id = self
            .app_id
            .filter(|id| !id.is_empty())
            .ok_or(ConfigError::MissingParameter("app_id"))?;

        let client = Client::builder()
            .build()
            .map_err(|e| ConfigError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(HttpFetcher {
            meta_url: meta_url.trim_end_matches('/').to_string(),
            app_id,
            cluster: self.cluster,
            client,
            fetch_timeout: self.fetch_timeout,
            polling_timeout: self.polling_timeout,
        })
    }
}

impl Default for HttpFetcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

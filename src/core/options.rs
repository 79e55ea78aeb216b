//! Connection options for the remote configuration service.

use crate::error::{ConfigError, Result};
use config::{Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Environment variable consulted when no `meta_url` is configured.
pub const META_URL_ENV: &str = "APOLLO_META_URL";

/// Prefix for environment variables merged by [`RemoteOptions::load`].
pub const ENV_PREFIX: &str = "APOLLO";

/// Options recognized when binding settings to a remote namespace.
///
/// Durations are expressed in whole seconds so they can be written in files
/// and environment variables directly.
///
/// # Examples
///
/// ```rust
/// use hotswap_settings::core::RemoteOptions;
///
/// let options = RemoteOptions::default()
///     .with_meta_url("http://config.local:8080")
///     .with_app_id("billing");
///
/// assert_eq!(options.cluster, "default");
/// assert_eq!(options.namespace, "application");
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemoteOptions {
    /// Base URL of the configuration service
    pub meta_url: Option<String>,
    /// Application identifier registered with the service
    pub app_id: Option<String>,
    /// Deployment cluster name
    pub cluster: String,
    /// Namespace an overlay binds to
    pub namespace: String,
    /// Seconds to sleep between poll cycles
    pub polling_interval: u64,
    /// Long-poll request timeout in seconds
    pub polling_timeout: u64,
    /// Config fetch request timeout in seconds
    pub fetch_timeout: u64,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self {
            meta_url: None,
            app_id: None,
            cluster: "default".to_string(),
            namespace: "application".to_string(),
            polling_interval: 2,
            polling_timeout: 90,
            fetch_timeout: 3,
        }
    }
}

impl RemoteOptions {
    /// Load options from an optional file and `APOLLO_*` environment variables.
    ///
    /// The file format is picked from its extension (yaml, toml or json).
    /// Environment variables override file values, e.g. `APOLLO_APP_ID` sets
    /// `app_id` and `APOLLO_POLLING_INTERVAL` sets `polling_interval`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value has the wrong type.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let built = builder
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()
            .map_err(|e| ConfigError::LoadError(format!("Failed to build options: {}", e)))?;

        built
            .try_deserialize::<RemoteOptions>()
            .map_err(|e| ConfigError::LoadError(format!("Failed to deserialize options: {}", e)))
    }

    /// Set the service base URL.
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
    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = cluster.into();
        self
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the polling interval in seconds.
    pub fn with_polling_interval(mut self, seconds: u64) -> Self {
        self.polling_interval = seconds;
        self
    }

    /// Set the long-poll timeout in seconds.
    pub fn with_polling_timeout(mut self, seconds: u64) -> Self {
        self.polling_timeout = seconds;
        self
    }

    /// The configured base URL, or the `APOLLO_META_URL` environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingParameter`] when neither is set.
    pub fn resolve_meta_url(&self) -> Result<String> {
        self.meta_url
            .clone()
            .filter(|url| !url.is_empty())
            .or_else(|| std::env::var(META_URL_ENV).ok().filter(|url| !url.is_empty()))
            .ok_or(ConfigError::MissingParameter("meta_url"))
    }

    /// The configured application identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingParameter`] when unset.
    pub fn resolve_app_id(&self) -> Result<String> {
        self.app_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or(ConfigError::MissingParameter("app_id"))
    }

    /// Time between poll cycles.
    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval)
    }

    /// Long-poll request timeout.
    pub fn polling_timeout(&self) -> Duration {
        Duration::from_secs(self.polling_timeout)
    }

    /// Config fetch request timeout.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let options = RemoteOptions::default();
        assert_eq!(options.meta_url, None);
        assert_eq!(options.cluster, "default");
        assert_eq!(options.namespace, "application");
        assert_eq!(options.polling_interval(), Duration::from_secs(2));
        assert_eq!(options.polling_timeout(), Duration::from_secs(90));
        assert_eq!(options.fetch_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_missing_app_id() {
        let options = RemoteOptions::default().with_meta_url("http://localhost:8080");
        assert!(matches!(
            options.resolve_app_id(),
            Err(ConfigError::MissingParameter("app_id"))
        ));
    }

    #[test]
    fn test_explicit_meta_url_wins() {
        let options = RemoteOptions::default().with_meta_url("http://explicit:8080");
        assert_eq!(options.resolve_meta_url().unwrap(), "http://explicit:8080");
    }

    #[test]
    fn test_load_from_yaml_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("remote.yaml");
        fs::write(
            &path,
            r#"
meta_url: "http://config.local:8080"
app_id: "billing"
namespace: "payments"
polling_interval: 5
"#,
        )
        .unwrap();

        let options = RemoteOptions::load(Some(&path)).unwrap();
        assert_eq!(options.meta_url.as_deref(), Some("http://config.local:8080"));
        assert_eq!(options.app_id.as_deref(), Some("billing"));
        assert_eq!(options.namespace, "payments");
        assert_eq!(options.polling_interval, 5);
        assert_eq!(options.cluster, "default");
        assert_eq!(options.polling_timeout, 90);
    }

    #[test]
    fn test_load_missing_file() {
        let result = RemoteOptions::load(Some(Path::new("/nonexistent/remote.yaml")));
        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }
}

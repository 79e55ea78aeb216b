//! Long-polling client for the remote configuration service.
//!
//! A [`PollingClient`] keeps one snapshot per configured namespace, follows the
//! service's change notifications on a background task and hands every new
//! snapshot to the namespace's subscribers in priority order.

mod poller;
mod subscriber;

pub use subscriber::{Subscriber, SubscriberAction};

pub(crate) use subscriber::panic_message;

use crate::core::ConfigSnapshot;
use crate::error::{ConfigError, Result};
use crate::sources::{ConfigFetcher, FetchedConfig, NEVER_POLLED, Notification, PollOutcome};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use poller::PollerHandle;
use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;
use subscriber::SubscriberRegistry;
use tracing::{debug, error, info, warn};

#[cfg(feature = "metrics")]
use crate::metrics::ConfigMetrics;

#[cfg(feature = "http")]
use crate::core::RemoteOptions;
#[cfg(feature = "http")]
use crate::sources::HttpFetcher;

/// Type alias for the hook receiving subscriber failures.
type ErrorHandler = Arc<dyn Fn(&str, &ConfigError) + Send + Sync>;

/// Client that keeps namespace snapshots in sync with the remote service.
///
/// Cloning is cheap and every clone drives the same state. At most one
/// polling worker runs per client; it is spawned on the ambient tokio runtime
/// by [`start_polling`](Self::start_polling).
///
/// # Examples
///
/// ```rust,no_run
/// use hotswap_settings::client::{PollingClient, Subscriber};
/// use hotswap_settings::sources::HttpFetcher;
///
/// # async fn example() -> hotswap_settings::error::Result<()> {
/// let fetcher = HttpFetcher::builder()
///     .with_meta_url("http://config.example.com:8080")
///     .with_app_id("billing")
///     .build()?;
///
/// let client = PollingClient::builder()
///     .with_fetcher(fetcher)
///     .with_namespaces(["application", "database"])
///     .build()?;
///
/// client.add_subscriber(Subscriber::new("database", |snapshot| {
///     println!("database namespace now has {} keys", snapshot.len());
///     Ok(())
/// }))?;
///
/// client.start_polling()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PollingClient {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    fetcher: Arc<dyn ConfigFetcher>,
    namespaces: Vec<String>,
    polling_interval: Duration,
    snapshots: HashMap<String, ArcSwap<ConfigSnapshot>>,
    cursor: Mutex<HashMap<String, i64>>,
    subscribers: SubscriberRegistry,
    error_handler: Option<ErrorHandler>,
    poller: Mutex<Option<PollerHandle>>,
    /// Serializes update cycles so subscribers never see two at once
    cycle: tokio::sync::Mutex<()>,
    #[cfg(feature = "metrics")]
    metrics: Option<ConfigMetrics>,
}

impl PollingClient {
    /// Create a new builder for constructing a polling client.
    pub fn builder() -> PollingClientBuilder {
        PollingClientBuilder::new()
    }

    /// Build an HTTP-backed client for the single namespace named in `options`.
    ///
    /// # Errors
    ///
    /// Returns an error if `meta_url` (after the environment fallback) or
    /// `app_id` is missing.
    #[cfg(feature = "http")]
    pub fn from_options(options: &RemoteOptions) -> Result<Self> {
        let fetcher = HttpFetcher::builder()
            .with_meta_url(options.resolve_meta_url()?)
            .with_app_id(options.resolve_app_id()?)
            .with_cluster(options.cluster.clone())
            .with_fetch_timeout(options.fetch_timeout())
            .with_polling_timeout(options.polling_timeout())
            .build()?;

        Self::builder()
            .with_fetcher(fetcher)
            .with_namespaces([options.namespace.clone()])
            .with_polling_interval(options.polling_interval())
            .build()
    }

    /// Namespaces this client serves, in configuration order.
    pub fn namespaces(&self) -> &[String] {
        &self.inner.namespaces
    }

    /// Whether `namespace` is served by this client.
    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.inner.snapshots.contains_key(namespace)
    }

    /// Time slept between poll cycles.
    pub fn polling_interval(&self) -> Duration {
        self.inner.polling_interval
    }

    /// Current snapshot of a namespace, or `None` for unknown namespaces.
    ///
    /// Before the first successful fetch the snapshot is empty.
    pub fn snapshot(&self, namespace: &str) -> Option<Arc<ConfigSnapshot>> {
        self.inner.snapshots.get(namespace).map(|slot| slot.load_full())
    }

    /// Current raw value of `key` in `namespace`.
    pub fn get(&self, namespace: &str, key: &str) -> Option<String> {
        self.inner
            .snapshots
            .get(namespace)
            .and_then(|slot| slot.load().value(key).map(str::to_string))
    }

    /// Release key of the last payload fetched for `namespace`.
    pub fn release_key(&self, namespace: &str) -> Option<String> {
        self.inner
            .snapshots
            .get(namespace)
            .and_then(|slot| slot.load().release_key().map(str::to_string))
    }

    /// Last notification id seen for `namespace` (`-1` when never advanced).
    pub fn notification_id(&self, namespace: &str) -> i64 {
        self.inner
            .cursor
            .lock()
            .get(namespace)
            .copied()
            .unwrap_or(NEVER_POLLED)
    }

    /// Number of registered subscribers across all namespaces.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Register a subscriber.
    ///
    /// Safe to call before or after polling starts; the next notification of
    /// the namespace includes the new subscriber.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownNamespace`] if the subscriber's namespace
    /// is not served by this client.
    pub fn add_subscriber(&self, subscriber: Subscriber) -> Result<()> {
        self.check_namespace(subscriber.namespace())?;
        debug!(
            namespace = subscriber.namespace(),
            priority = subscriber.priority(),
            "subscriber registered"
        );
        self.inner.subscribers.register(subscriber);

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.inner.metrics {
            metrics.update_subscriber_count(self.inner.subscribers.len() as i64);
        }

        Ok(())
    }

    /// Fail with [`ConfigError::UnknownNamespace`] unless `namespace` is served.
    pub fn check_namespace(&self, namespace: &str) -> Result<()> {
        if self.has_namespace(namespace) {
            Ok(())
        } else {
            Err(ConfigError::UnknownNamespace {
                namespace: namespace.to_string(),
                known: self.inner.namespaces.clone(),
            })
        }
    }

    /// Diff a fetched payload against the stored snapshot and publish the result.
    ///
    /// The new snapshot replaces the old one atomically; readers see either
    /// the old or the new state, never a mix. Subscribers are not notified;
    /// see [`notify`](Self::notify).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownNamespace`] for namespaces not served.
    pub fn update(&self, namespace: &str, fetched: FetchedConfig) -> Result<Arc<ConfigSnapshot>> {
        let slot = self
            .inner
            .snapshots
            .get(namespace)
            .ok_or_else(|| ConfigError::UnknownNamespace {
                namespace: namespace.to_string(),
                known: self.inner.namespaces.clone(),
            })?;

        let mut published = None;
        slot.rcu(|current| {
            let next = Arc::new(current.advance(
                fetched.release_key.clone(),
                fetched.configurations.clone(),
            ));
            published = Some(Arc::clone(&next));
            next
        });

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.inner.metrics {
            metrics.record_namespace_update(namespace);
        }

        Ok(published.unwrap_or_else(|| slot.load_full()))
    }

    /// Hand the current snapshot of `namespace` to its subscribers.
    ///
    /// Subscribers run synchronously, highest priority first. A subscriber
    /// that fails or panics is logged and reported to the error handler; the
    /// remaining subscribers still run.
    pub fn notify(&self, namespace: &str) {
        let Some(snapshot) = self.snapshot(namespace) else {
            warn!(namespace, "notify requested for unknown namespace");
            return;
        };

        self.inner.subscribers.dispatch(&snapshot, |subscriber, err| {
            error!(
                namespace,
                priority = subscriber.priority(),
                error = %err,
                "subscriber failed"
            );

            #[cfg(feature = "metrics")]
            if let Some(metrics) = &self.inner.metrics {
                metrics.record_subscriber_failure();
                if matches!(err, ConfigError::Validation(_)) {
                    metrics.record_validation_failure();
                }
            }

            if let Some(handler) = &self.inner.error_handler {
                let handled = catch_unwind(AssertUnwindSafe(|| handler(namespace, &err)));
                if let Err(payload) = handled {
                    error!(
                        namespace,
                        panic = %panic_message(payload.as_ref()),
                        "error handler panicked"
                    );
                }
            }
        });
    }

    /// Run a single poll cycle on the calling task.
    ///
    /// Long-polls with the current cursor and, for every namespace the server
    /// reports as changed, fetches it, publishes the diffed snapshot, advances
    /// the cursor and notifies subscribers. Failures are logged and swallowed;
    /// a namespace whose fetch fails keeps its cursor and is retried by the
    /// next cycle.
    pub async fn poll_once(&self) {
        let _cycle = self.inner.cycle.lock().await;

        if self.inner.namespaces.is_empty() {
            return;
        }

        let request = self.notification_request();

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.inner.metrics {
            metrics.record_poll();
            metrics.update_config_age();
        }

        let outcome = match self.inner.fetcher.poll_notifications(&request).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(
                    fetcher = %self.inner.fetcher.name(),
                    error = %err,
                    "long polling failed"
                );

                #[cfg(feature = "metrics")]
                if let Some(metrics) = &self.inner.metrics {
                    metrics.record_poll_failure();
                }
                return;
            }
        };

        match outcome {
            PollOutcome::NotChanged => {
                debug!("configuration has not changed");
            }
            PollOutcome::Changed(changed) => {
                for notification in changed {
                    if let Err(err) = self.refresh(&notification).await {
                        warn!(
                            namespace = %notification.namespace_name,
                            notification_id = notification.notification_id,
                            error = %err,
                            "namespace refresh failed"
                        );
                    }
                }
            }
        }
    }

    async fn refresh(&self, notification: &Notification) -> Result<()> {
        let namespace = notification.namespace_name.as_str();
        self.check_namespace(namespace)?;

        #[cfg(feature = "metrics")]
        let timer = self.inner.metrics.as_ref().map(|m| m.start_fetch());

        let fetched = self.inner.fetcher.fetch_config(namespace).await;

        #[cfg(feature = "metrics")]
        if let (Some(metrics), Some(timer)) = (&self.inner.metrics, timer) {
            metrics.record_fetch(timer, namespace, fetched.is_ok());
        }

        let snapshot = self.update(namespace, fetched?)?;
        self.inner
            .cursor
            .lock()
            .insert(namespace.to_string(), notification.notification_id);

        info!(
            namespace,
            notification_id = notification.notification_id,
            release_key = snapshot.release_key().unwrap_or_default(),
            changed = snapshot.changed_keys().count(),
            "namespace updated"
        );

        self.notify(namespace);
        Ok(())
    }

    /// Cursor entries for every namespace, in configuration order.
    fn notification_request(&self) -> Vec<Notification> {
        let cursor = self.inner.cursor.lock();
        self.inner
            .namespaces
            .iter()
            .map(|namespace| {
                Notification::new(
                    namespace.clone(),
                    cursor.get(namespace).copied().unwrap_or(NEVER_POLLED),
                )
            })
            .collect()
    }

    /// Start the background polling worker.
    ///
    /// Calling this while a worker is running does nothing. After
    /// [`stop_polling`](Self::stop_polling) a fresh worker is spawned.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Runtime`] when called outside a tokio runtime.
    pub fn start_polling(&self) -> Result<()> {
        let mut poller = self.inner.poller.lock();
        if poller.as_ref().is_some_and(PollerHandle::is_live) {
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            ConfigError::Runtime(format!("Polling requires a tokio runtime: {}", e))
        })?;

        info!(
            fetcher = %self.inner.fetcher.name(),
            namespaces = ?self.inner.namespaces,
            "starting polling"
        );
        *poller = Some(PollerHandle::spawn(self, &runtime));
        Ok(())
    }

    /// Ask the polling worker to stop.
    ///
    /// The worker exits before its next cycle; a long poll already in flight
    /// is not interrupted, so this may take up to the polling timeout to take
    /// effect.
    pub fn stop_polling(&self) {
        if let Some(poller) = self.inner.poller.lock().as_ref() {
            poller.cancel();
        }
    }

    /// Stop the polling worker and wait for it to exit.
    pub async fn shutdown(&self) {
        let poller = self.inner.poller.lock().take();
        if let Some(poller) = poller {
            poller.stop().await;
        }
    }

    /// Whether a polling worker is currently running.
    pub fn is_polling(&self) -> bool {
        self.inner
            .poller
            .lock()
            .as_ref()
            .is_some_and(PollerHandle::is_live)
    }
}

impl fmt::Debug for PollingClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollingClient")
            .field("fetcher", &self.inner.fetcher.name())
            .field("namespaces", &self.inner.namespaces)
            .field("polling_interval", &self.inner.polling_interval)
            .field("subscribers", &self.inner.subscribers.len())
            .finish()
    }
}

/// Builder for constructing a `PollingClient`.
pub struct PollingClientBuilder {
    fetcher: Option<Arc<dyn ConfigFetcher>>,
    namespaces: Vec<String>,
    polling_interval: Duration,
    subscribers: Vec<Subscriber>,
    error_handler: Option<ErrorHandler>,
    #[cfg(feature = "metrics")]
    metrics: Option<ConfigMetrics>,
}

impl PollingClientBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            fetcher: None,
            namespaces: vec!["application".to_string()],
            polling_interval: Duration::from_secs(2),
            subscribers: Vec::new(),
            error_handler: None,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Set the fetcher used to talk to the remote service.
    pub fn with_fetcher<F: ConfigFetcher + 'static>(mut self, fetcher: F) -> Self {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    /// Set a shared fetcher.
    pub fn with_shared_fetcher(mut self, fetcher: Arc<dyn ConfigFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Set the namespaces to follow.
    ///
    /// Default is `["application"]`. Duplicates are ignored; an empty list
    /// yields a client whose worker only sleeps.
    pub fn with_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.namespaces.clear();
        for namespace in namespaces {
            let namespace = namespace.into();
            if !self.namespaces.contains(&namespace) {
                self.namespaces.push(namespace);
            }
        }
        self
    }

    /// Set the time slept between poll cycles.
    ///
    /// Default is 2 seconds.
    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = interval;
        self
    }

    /// Register a subscriber at construction time.
    pub fn with_subscriber(mut self, subscriber: Subscriber) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Set a hook receiving every subscriber failure with its namespace.
    ///
    /// Validation errors raised by settings overlays arrive here.
    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, &ConfigError) + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Record polling metrics.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: ConfigMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the polling client.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No fetcher is provided
    /// - A subscriber names a namespace the client does not serve
    pub fn build(self) -> Result<PollingClient> {
        let fetcher = self
            .fetcher
            .ok_or(ConfigError::MissingParameter("fetcher"))?;

        let snapshots = self
            .namespaces
            .iter()
            .map(|namespace| {
                (
                    namespace.clone(),
                    ArcSwap::from_pointee(ConfigSnapshot::empty(namespace.clone())),
                )
            })
            .collect();

        let client = PollingClient {
            inner: Arc::new(ClientInner {
                fetcher,
                namespaces: self.namespaces,
                polling_interval: self.polling_interval,
                snapshots,
                cursor: Mutex::new(HashMap::new()),
                subscribers: SubscriberRegistry::new(),
                error_handler: self.error_handler,
                poller: Mutex::new(None),
                cycle: tokio::sync::Mutex::new(()),
                #[cfg(feature = "metrics")]
                metrics: self.metrics,
            }),
        };

        for subscriber in self.subscribers {
            client.add_subscriber(subscriber)?;
        }

        Ok(client)
    }
}

impl Default for PollingClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

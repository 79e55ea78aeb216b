//! Remote fetcher trait and the wire types it exchanges.

use crate::error::TransportError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Notification id meaning "this namespace has never been polled".
pub const NEVER_POLLED: i64 = -1;

/// A `{namespace, notification id}` pair, both as sent in the long-poll
/// request and as returned for namespaces that changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Namespace the id refers to
    pub namespace_name: String,
    /// Server-assigned notification id
    pub notification_id: i64,
}

impl Notification {
    /// Create a notification entry.
    pub fn new(namespace: impl Into<String>, notification_id: i64) -> Self {
        Self {
            namespace_name: namespace.into(),
            notification_id,
        }
    }
}

/// Result of a long-poll call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing changed before the server-side hold expired.
    NotChanged,
    /// These namespaces changed, listed in server order.
    Changed(Vec<Notification>),
}

/// Full configuration payload of one namespace.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FetchedConfig {
    /// Server version token for this payload
    #[serde(rename = "releaseKey")]
    pub release_key: String,
    /// Raw key/value pairs
    #[serde(rename = "configurations")]
    pub configurations: HashMap<String, String>,
}

impl FetchedConfig {
    /// Build a payload from key/value pairs.
    pub fn new<K, V>(release_key: impl Into<String>, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            release_key: release_key.into(),
            configurations: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Trait for the two remote calls a polling client needs.
///
/// Implement this trait to talk to a different transport or to script
/// responses in tests. Implementations hold no state beyond their connection;
/// retries and scheduling belong to the polling client.
#[async_trait]
pub trait ConfigFetcher: Send + Sync {
    /// Fetch the full configuration of a namespace.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure or a non-success status.
    async fn fetch_config(&self, namespace: &str) -> Result<FetchedConfig, TransportError>;

    /// Long-poll for namespaces whose notification id moved past `cursor`.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure or any status other than success
    /// and "not modified".
    async fn poll_notifications(
        &self,
        cursor: &[Notification],
    ) -> Result<PollOutcome, TransportError>;

    /// Get a human-readable name for this fetcher (for logging/debugging).
    fn name(&self) -> String;
}

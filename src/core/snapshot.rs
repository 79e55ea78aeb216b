//! Per-namespace key/value snapshots and the change diff between them.

use std::collections::HashMap;

/// A single configuration value together with its change marker.
///
/// `changed` is true when the value differs from the one held for the same key
/// before the update cycle that produced this snapshot, or when the key is new.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValue {
    /// Raw string value as served by the remote service
    pub value: String,
    /// Whether this cycle changed the value
    pub changed: bool,
}

impl ConfigValue {
    /// Create a value with an explicit change marker.
    pub fn new(value: impl Into<String>, changed: bool) -> Self {
        Self {
            value: value.into(),
            changed,
        }
    }
}

/// The full key/value state of one namespace after an update cycle.
///
/// Snapshots are immutable once published; every update cycle produces a new
/// one through [`ConfigSnapshot::advance`].
///
/// Keys removed on the server are never forgotten: a key missing from a later
/// fetch keeps its last value (with `changed == false`) for the lifetime of the
/// client. The notification protocol carries no deletion events, so removals
/// cannot be told apart from keys that simply were not served.
///
/// # Examples
///
/// ```rust
/// use hotswap_settings::core::ConfigSnapshot;
/// use std::collections::HashMap;
///
/// let first = ConfigSnapshot::empty("application")
///     .advance("r1", HashMap::from([("timeout".to_string(), "30".to_string())]));
/// assert!(first.is_changed("timeout"));
///
/// let second = first.advance("r2", HashMap::from([("timeout".to_string(), "30".to_string())]));
/// assert!(!second.is_changed("timeout"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSnapshot {
    namespace: String,
    release_key: Option<String>,
    values: HashMap<String, ConfigValue>,
}

impl ConfigSnapshot {
    /// An empty snapshot for a namespace that has never been fetched.
    pub fn empty(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            release_key: None,
            values: HashMap::new(),
        }
    }

    /// Compute the snapshot that follows `self` once `raw` has been fetched.
    ///
    /// Every key in `raw` is marked changed if it is new or its value differs
    /// from the one held in `self`. Keys only present in `self` are carried
    /// over unchanged.
    pub fn advance(
        &self,
        release_key: impl Into<String>,
        raw: HashMap<String, String>,
    ) -> ConfigSnapshot {
        let mut values: HashMap<String, ConfigValue> = self
            .values
            .iter()
            .map(|(key, old)| (key.clone(), ConfigValue::new(old.value.clone(), false)))
            .collect();

        for (key, new_value) in raw {
            let changed = match self.values.get(&key) {
                Some(old) if old.value == new_value => false,
                Some(old) => {
                    tracing::debug!(
                        namespace = %self.namespace,
                        key = %key,
                        old = %old.value,
                        new = %new_value,
                        "config value updated"
                    );
                    true
                }
                None => {
                    tracing::debug!(
                        namespace = %self.namespace,
                        key = %key,
                        new = %new_value,
                        "config value added"
                    );
                    true
                }
            };
            values.insert(key, ConfigValue::new(new_value, changed));
        }

        ConfigSnapshot {
            namespace: self.namespace.clone(),
            release_key: Some(release_key.into()),
            values,
        }
    }

    /// Namespace this snapshot belongs to.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Release key of the payload that produced this snapshot.
    pub fn release_key(&self) -> Option<&str> {
        self.release_key.as_deref()
    }

    /// Look up a key.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    /// Look up the raw value of a key.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|v| v.value.as_str())
    }

    /// Whether the last cycle changed `key`. Unknown keys report `false`.
    pub fn is_changed(&self, key: &str) -> bool {
        self.values.get(key).is_some_and(|v| v.changed)
    }

    /// Keys changed by the last cycle, in no particular order.
    pub fn changed_keys(&self) -> impl Iterator<Item = &str> {
        self.values
            .iter()
            .filter(|(_, v)| v.changed)
            .map(|(k, _)| k.as_str())
    }

    /// Iterate over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of keys held.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the snapshot holds no keys.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

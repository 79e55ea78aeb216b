//! Namespace subscribers and their priority-ordered dispatch.

use crate::core::ConfigSnapshot;
use crate::error::{ConfigError, Result};
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Callback invoked with a namespace snapshot after every update cycle.
pub type SubscriberAction = Arc<dyn Fn(&ConfigSnapshot) -> Result<()> + Send + Sync>;

/// A callback bound to one namespace of a polling client.
///
/// Subscribers with a higher priority run first; equal priorities run in
/// registration order. Subscribers live as long as the client.
///
/// # Examples
///
/// ```rust
/// use hotswap_settings::client::Subscriber;
///
/// let subscriber = Subscriber::new("application", |snapshot| {
///     if let Some(timeout) = snapshot.value("timeout") {
///         println!("timeout is now {}", timeout);
///     }
///     Ok(())
/// })
/// .with_priority(10);
///
/// assert_eq!(subscriber.priority(), 10);
/// ```
#[derive(Clone)]
pub struct Subscriber {
    namespace: String,
    priority: i32,
    action: SubscriberAction,
}

impl Subscriber {
    /// Create a subscriber with priority 0.
    pub fn new<F>(namespace: impl Into<String>, action: F) -> Self
    where
        F: Fn(&ConfigSnapshot) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            namespace: namespace.into(),
            priority: 0,
            action: Arc::new(action),
        }
    }

    /// Set the dispatch priority (higher runs first).
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Namespace this subscriber listens to.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Dispatch priority.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Run the action, turning a panic into an error.
    fn invoke(&self, snapshot: &ConfigSnapshot) -> Result<()> {
        catch_unwind(AssertUnwindSafe(|| (self.action)(snapshot)))
            .unwrap_or_else(|payload| Err(ConfigError::Subscriber(panic_message(payload.as_ref()))))
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("namespace", &self.namespace)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Registry of subscribers for all namespaces of one client.
///
/// Registration may happen from any thread while the polling worker is
/// running; a dispatch in progress keeps the list it started with.
pub(crate) struct SubscriberRegistry {
    subscribers: RwLock<Vec<Subscriber>>,
}

impl SubscriberRegistry {
    pub(crate) fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn register(&self, subscriber: Subscriber) {
        self.subscribers.write().push(subscriber);
    }

    /// Subscribers of `namespace` in dispatch order.
    pub(crate) fn for_namespace(&self, namespace: &str) -> Vec<Subscriber> {
        let mut selected: Vec<Subscriber> = self
            .subscribers
            .read()
            .iter()
            .filter(|s| s.namespace == namespace)
            .cloned()
            .collect();
        // sort_by_key is stable: equal priorities keep registration order
        selected.sort_by_key(|s| std::cmp::Reverse(s.priority));
        selected
    }

    /// Invoke every subscriber of the snapshot's namespace.
    ///
    /// A failing subscriber is reported through `on_failure` and does not stop
    /// the ones after it.
    pub(crate) fn dispatch<F>(&self, snapshot: &ConfigSnapshot, mut on_failure: F)
    where
        F: FnMut(&Subscriber, ConfigError),
    {
        for subscriber in self.for_namespace(snapshot.namespace()) {
            if let Err(err) = subscriber.invoke(snapshot) {
                on_failure(&subscriber, err);
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.read().len()
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

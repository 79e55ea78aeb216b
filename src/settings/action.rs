//! Change actions filtered by the fields they watch.

use crate::client::panic_message;
use crate::error::{ConfigError, Result};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::error;

/// Which field updates trigger a change action.
///
/// # Examples
///
/// ```rust
/// use hotswap_settings::settings::WatchedFields;
///
/// let watched = WatchedFields::fields(["timeout", "retries"]);
/// assert!(!watched.is_all());
/// assert!(WatchedFields::All.is_all());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchedFields {
    /// Fire after every update cycle, whether or not a field changed.
    All,
    /// Fire only when at least one of these fields changed.
    Fields(BTreeSet<String>),
}

impl WatchedFields {
    /// Watch the given field names.
    pub fn fields<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Fields(names.into_iter().map(Into::into).collect())
    }

    /// Whether this watches every cycle.
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

/// Type alias for change action callbacks.
type Action<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A registered change action.
pub struct WatchedFieldAction<T> {
    watched: WatchedFields,
    priority: i32,
    action: Action<T>,
}

impl<T> WatchedFieldAction<T> {
    /// Create an action.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyWatchedFields`] for an empty field set.
    pub fn new<F>(watched: WatchedFields, priority: i32, action: F) -> Result<Self>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        if let WatchedFields::Fields(fields) = &watched {
            if fields.is_empty() {
                return Err(ConfigError::EmptyWatchedFields);
            }
        }

        Ok(Self {
            watched,
            priority,
            action: Arc::new(action),
        })
    }

    /// Fields this action watches.
    pub fn watched(&self) -> &WatchedFields {
        &self.watched
    }

    /// Dispatch priority (higher runs first).
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Whether a cycle that updated `updated` should fire this action.
    pub fn fires_for(&self, updated: &BTreeSet<String>) -> bool {
        match &self.watched {
            WatchedFields::All => true,
            WatchedFields::Fields(fields) => !fields.is_disjoint(updated),
        }
    }
}

impl<T> Clone for WatchedFieldAction<T> {
    fn clone(&self) -> Self {
        Self {
            watched: self.watched.clone(),
            priority: self.priority,
            action: Arc::clone(&self.action),
        }
    }
}

/// Ordered list of change actions owned by one overlay.
pub(crate) struct ActionList<T> {
    actions: RwLock<Vec<WatchedFieldAction<T>>>,
}

impl<T> ActionList<T> {
    pub(crate) fn new() -> Self {
        Self {
            actions: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn register(&self, action: WatchedFieldAction<T>) {
        self.actions.write().push(action);
    }

    pub(crate) fn len(&self) -> usize {
        self.actions.read().len()
    }

    /// Run every action whose watched fields intersect `updated`, highest
    /// priority first. Returns how many actions ran.
    ///
    /// A panicking action is logged and the remaining actions still run.
    pub(crate) fn run(&self, settings: &T, updated: &BTreeSet<String>) -> usize {
        let mut ordered = self.actions.read().clone();
        ordered.sort_by_key(|a| std::cmp::Reverse(a.priority));

        let mut fired = 0;
        for action in ordered.iter().filter(|a| a.fires_for(updated)) {
            fired += 1;
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| (action.action)(settings))) {
                error!(
                    priority = action.priority,
                    watched = ?action.watched,
                    panic = %panic_message(payload.as_ref()),
                    "change action panicked"
                );
            }
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn updated(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_empty_watch_set_rejected() {
        let result = WatchedFieldAction::<()>::new(WatchedFields::fields(Vec::<String>::new()), 0, |_| {});
        assert!(matches!(result, Err(ConfigError::EmptyWatchedFields)));
    }

    #[test]
    fn test_fires_for() {
        let all = WatchedFieldAction::<()>::new(WatchedFields::All, 0, |_| {}).unwrap();
        let some = WatchedFieldAction::<()>::new(WatchedFields::fields(["x"]), 0, |_| {}).unwrap();

        assert!(all.fires_for(&updated(&[])));
        assert!(all.fires_for(&updated(&["y"])));
        assert!(some.fires_for(&updated(&["x", "y"])));
        assert!(!some.fires_for(&updated(&["y"])));
        assert!(!some.fires_for(&updated(&[])));
    }

    #[test]
    fn test_run_orders_by_priority() {
        let list = ActionList::<()>::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for priority in [5, 1, 10, 5] {
            let log = Arc::clone(&log);
            list.register(
                WatchedFieldAction::new(WatchedFields::All, priority, move |_| {
                    log.lock().push(priority);
                })
                .unwrap(),
            );
        }

        assert_eq!(list.run(&(), &updated(&[])), 4);
        assert_eq!(*log.lock(), vec![10, 5, 5, 1]);
    }

    #[test]
    fn test_equal_priority_keeps_registration_order() {
        let list = ActionList::<()>::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            list.register(
                WatchedFieldAction::new(WatchedFields::All, 0, move |_| log.lock().push(tag)).unwrap(),
            );
        }

        list.run(&(), &updated(&[]));
        assert_eq!(*log.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_panicking_action_does_not_stop_others() {
        let list = ActionList::<()>::new();
        let ran = Arc::new(Mutex::new(false));

        list.register(
            WatchedFieldAction::new(WatchedFields::All, 10, |_| panic!("action failed")).unwrap(),
        );
        let ran_clone = Arc::clone(&ran);
        list.register(
            WatchedFieldAction::new(WatchedFields::All, 0, move |_| *ran_clone.lock() = true).unwrap(),
        );

        assert_eq!(list.run(&(), &updated(&[])), 2);
        assert!(*ran.lock());
    }

    #[test]
    fn test_filtered_actions_skip() {
        let list = ActionList::<()>::new();
        list.register(WatchedFieldAction::new(WatchedFields::fields(["x"]), 0, |_| {}).unwrap());
        list.register(WatchedFieldAction::new(WatchedFields::fields(["y"]), 0, |_| {}).unwrap());

        assert_eq!(list.run(&(), &updated(&["x"])), 1);
        assert_eq!(list.len(), 2);
    }
}

//! Typed settings bound to one namespace of a polling client.
//!
//! A [`SettingsOverlay`] holds a [`LiveSettings`] value behind `arc-swap`.
//! Each time its namespace is refreshed, changed keys are written into the
//! matching fields and the overlay's change actions run, filtered by the
//! fields they watch.

mod action;
mod fields;

pub use action::{WatchedFieldAction, WatchedFields};
pub use fields::{FieldSetter, FieldTable, LiveSettings};

use crate::client::{PollingClient, Subscriber};
use crate::core::{ConfigSnapshot, RemoteOptions, Validate};
use crate::error::{ConfigError, Result, ValidationError};
use action::ActionList;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Type alias for validator functions.
type Validator<T> = Arc<dyn Fn(&T) -> std::result::Result<(), ValidationError> + Send + Sync>;

/// Typed settings kept in sync with a remote namespace.
///
/// Reads are lock-free and never observe a half-applied update.
///
/// # Examples
///
/// ```rust,no_run
/// use hotswap_settings::prelude::*;
///
/// #[derive(Debug, Clone)]
/// struct HttpSettings {
///     timeout: u64,
/// }
///
/// impl LiveSettings for HttpSettings {
///     fn fields() -> FieldTable<Self> {
///         FieldTable::new().field("timeout", |s: &mut Self, v: u64| s.timeout = v)
///     }
/// }
///
/// # async fn example() -> Result<()> {
/// let options = RemoteOptions::default()
///     .with_meta_url("http://config.example.com:8080")
///     .with_app_id("billing");
///
/// let settings = SettingsOverlay::builder(HttpSettings { timeout: 30 })
///     .with_options(options)
///     .build()?;
///
/// settings.on_change(WatchedFields::fields(["timeout"]), |s: &HttpSettings| {
///     println!("timeout is now {}", s.timeout);
/// })?;
///
/// println!("current timeout: {}", settings.get().timeout);
/// # Ok(())
/// # }
/// ```
pub struct SettingsOverlay<T> {
    state: Arc<OverlayState<T>>,
    client: PollingClient,
    namespace: String,
}

struct OverlayState<T> {
    current: ArcSwap<T>,
    fields: FieldTable<T>,
    actions: ActionList<T>,
    validator: Option<Validator<T>>,
    /// Fields changed by a rejected cycle, retried on the next one
    pending: Mutex<BTreeSet<String>>,
}

impl<T: LiveSettings> SettingsOverlay<T> {
    /// Create a builder starting from `initial` settings.
    pub fn builder(initial: T) -> SettingsOverlayBuilder<T> {
        SettingsOverlayBuilder::new(initial)
    }

    /// Get a reference-counted handle to the current settings.
    pub fn get(&self) -> Arc<T> {
        self.state.current.load_full()
    }

    /// Namespace this overlay is bound to.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The polling client feeding this overlay.
    pub fn client(&self) -> &PollingClient {
        &self.client
    }

    /// Number of registered change actions.
    pub fn action_count(&self) -> usize {
        self.state.actions.len()
    }

    /// Register a change action with priority 0.
    ///
    /// See [`on_change_with_priority`](Self::on_change_with_priority).
    ///
    /// # Errors
    ///
    /// Returns an error if `watched` is an empty set or names no known field.
    pub fn on_change<F>(&self, watched: WatchedFields, action: F) -> Result<()>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.on_change_with_priority(watched, 0, action)
    }

    /// Register a change action.
    ///
    /// After each update cycle, actions run highest priority first and
    /// receive the updated settings. An action watching specific fields only
    /// runs when one of them changed in that cycle; [`WatchedFields::All`]
    /// runs after every cycle.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyWatchedFields`] for an empty set, and
    /// [`ConfigError::UnknownWatchedFields`] when none of the watched names is
    /// a field of `T`.
    pub fn on_change_with_priority<F>(
        &self,
        watched: WatchedFields,
        priority: i32,
        action: F,
    ) -> Result<()>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let action = WatchedFieldAction::new(watched, priority, action)?;

        if let WatchedFields::Fields(names) = action.watched() {
            if !names.iter().any(|name| self.state.fields.contains(name)) {
                return Err(ConfigError::UnknownWatchedFields {
                    watched: names.iter().cloned().collect(),
                    known: self.state.fields.names().map(str::to_string).collect(),
                });
            }
        }

        debug!(
            namespace = %self.namespace,
            priority,
            watched = ?action.watched(),
            "change action registered"
        );
        self.state.actions.register(action);
        Ok(())
    }
}

impl<T: LiveSettings> OverlayState<T> {
    /// Apply one namespace snapshot, then run the matching change actions.
    ///
    /// Every changed key that names a field is written through its setter,
    /// together with any field left pending by a rejected cycle. If any
    /// setter or the validator fails, nothing is stored, no action runs, the
    /// attempted fields stay pending and the error is returned.
    fn apply(&self, snapshot: &ConfigSnapshot) -> Result<()> {
        let pending = self.pending.lock().clone();
        let current = self.current.load_full();
        let mut next = (*current).clone();
        let mut attempted = BTreeSet::new();
        let mut updated = BTreeSet::new();
        let mut errors = Vec::new();

        for name in self.fields.names() {
            let Some(value) = snapshot.get(name) else {
                continue;
            };
            if !value.changed && !pending.contains(name) {
                continue;
            }

            attempted.insert(name.to_string());
            match self.fields.apply(&mut next, name, &value.value) {
                Some(Ok(())) => {
                    updated.insert(name.to_string());
                }
                Some(Err(err)) => errors.push(err),
                None => {}
            }
        }

        let rejected = match errors.len() {
            0 => None,
            1 => Some(errors.remove(0)),
            _ => Some(ValidationError::Multiple(errors)),
        };
        if let Some(err) = rejected {
            return Err(self.reject(snapshot, attempted, err));
        }

        let settings = if updated.is_empty() {
            current
        } else {
            if let Some(validator) = &self.validator {
                if let Err(err) = validator(&next) {
                    return Err(self.reject(snapshot, attempted, err));
                }
            }
            let next = Arc::new(next);
            self.current.store(Arc::clone(&next));
            info!(
                namespace = snapshot.namespace(),
                fields = ?updated,
                "settings updated"
            );
            next
        };
        self.pending.lock().clear();

        let fired = self.actions.run(&settings, &updated);
        debug!(namespace = snapshot.namespace(), fired, "change actions dispatched");
        Ok(())
    }

    fn reject(
        &self,
        snapshot: &ConfigSnapshot,
        attempted: BTreeSet<String>,
        err: ValidationError,
    ) -> ConfigError {
        debug!(
            namespace = snapshot.namespace(),
            pending = ?attempted,
            "update cycle rejected"
        );
        *self.pending.lock() = attempted;
        err.into()
    }
}

impl<T> fmt::Debug for SettingsOverlay<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsOverlay")
            .field("namespace", &self.namespace)
            .field("fields", &self.state.fields)
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

/// Builder for binding a `SettingsOverlay`.
///
/// # Examples
///
/// ```rust,no_run
/// use hotswap_settings::prelude::*;
/// # use hotswap_settings::sources::ConfigFetcher;
///
/// #[derive(Debug, Clone, Default)]
/// struct Limits {
///     max_requests: u32,
/// }
///
/// impl LiveSettings for Limits {
///     fn fields() -> FieldTable<Self> {
///         FieldTable::new().field("max_requests", |s: &mut Self, v: u32| s.max_requests = v)
///     }
/// }
///
/// # async fn example(fetcher: impl ConfigFetcher + 'static) -> Result<()> {
/// // One client shared by overlays on different namespaces
/// let client = PollingClient::builder()
///     .with_fetcher(fetcher)
///     .with_namespaces(["application", "limits"])
///     .build()?;
///
/// let limits = SettingsOverlay::builder(Limits::default())
///     .with_client(client.clone())
///     .with_namespace("limits")
///     .with_validation(|l: &Limits| {
///         if l.max_requests == 0 {
///             return Err(ValidationError::invalid_field("max_requests", "must be > 0"));
///         }
///         Ok(())
///     })
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct SettingsOverlayBuilder<T> {
    initial: T,
    options: RemoteOptions,
    namespace: Option<String>,
    client: Option<PollingClient>,
    priority: i32,
    validator: Option<Validator<T>>,
    start_polling: bool,
}

impl<T: LiveSettings> SettingsOverlayBuilder<T> {
    /// Create a new builder with default options.
    pub fn new(initial: T) -> Self {
        Self {
            initial,
            options: RemoteOptions::default(),
            namespace: None,
            client: None,
            priority: 0,
            validator: None,
            start_polling: true,
        }
    }

    /// Use these connection options.
    ///
    /// They are only used to create a client when none is injected, except
    /// for `namespace`, which is always honored unless overridden with
    /// [`with_namespace`](Self::with_namespace).
    pub fn with_options(mut self, options: RemoteOptions) -> Self {
        self.options = options;
        self
    }

    /// Bind to this namespace instead of the one in the options.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Share an existing client instead of creating one.
    pub fn with_client(mut self, client: PollingClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Subscriber priority of this overlay on its client.
    ///
    /// Default is 0.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Add a validation function that every update must pass.
    ///
    /// The initial settings are validated at [`build`](Self::build) too.
    pub fn with_validation<F>(mut self, validator: F) -> Self
    where
        F: Fn(&T) -> std::result::Result<(), ValidationError> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Validate updates with the settings type's [`Validate`] implementation.
    pub fn validated(self) -> Self
    where
        T: Validate,
    {
        self.with_validation(T::validate)
    }

    /// Whether `build` starts the client's polling worker.
    ///
    /// Default is `true`. Disable it to drive the client manually with
    /// [`PollingClient::poll_once`].
    pub fn with_start_polling(mut self, start: bool) -> Self {
        self.start_polling = start;
        self
    }

    /// Bind the overlay.
    ///
    /// Resolves the namespace, resolves or creates the client, checks the
    /// namespace is served by it, registers the overlay as a subscriber and
    /// starts polling.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No client is injected and `meta_url` or `app_id` is missing
    /// - The namespace is not served by the client
    /// - The initial settings fail validation
    /// - Polling is started outside a tokio runtime
    pub fn build(self) -> Result<SettingsOverlay<T>> {
        let namespace = self
            .namespace
            .unwrap_or_else(|| self.options.namespace.clone());

        let client = match self.client {
            Some(client) => client,
            None => Self::create_client(&self.options, &namespace)?,
        };
        client.check_namespace(&namespace)?;

        if let Some(validator) = &self.validator {
            validator(&self.initial)?;
        }

        let state = Arc::new(OverlayState {
            current: ArcSwap::from_pointee(self.initial),
            fields: T::fields(),
            actions: ActionList::new(),
            validator: self.validator,
            pending: Mutex::new(BTreeSet::new()),
        });

        let subscriber_state = Arc::clone(&state);
        client.add_subscriber(
            Subscriber::new(namespace.clone(), move |snapshot| subscriber_state.apply(snapshot))
                .with_priority(self.priority),
        )?;

        if self.start_polling {
            client.start_polling()?;
        }

        info!(
            namespace = %namespace,
            fields = state.fields.len(),
            "settings overlay bound"
        );

        Ok(SettingsOverlay {
            state,
            client,
            namespace,
        })
    }

    #[cfg(feature = "http")]
    fn create_client(options: &RemoteOptions, namespace: &str) -> Result<PollingClient> {
        let options = options.clone().with_namespace(namespace);
        let client = PollingClient::from_options(&options)?;
        info!(
            namespace,
            cluster = %options.cluster,
            "created polling client for settings overlay"
        );
        Ok(client)
    }

    #[cfg(not(feature = "http"))]
    fn create_client(_options: &RemoteOptions, _namespace: &str) -> Result<PollingClient> {
        Err(ConfigError::MissingParameter("client"))
    }
}

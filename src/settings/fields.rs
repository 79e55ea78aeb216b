//! Per-field setter tables for typed settings.

use crate::error::ValidationError;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Setter coercing a raw remote value into one field.
pub type FieldSetter<T> = Box<dyn Fn(&mut T, &str) -> Result<(), ValidationError> + Send + Sync>;

/// A settings type whose fields can be kept live from a remote namespace.
///
/// [`fields`](Self::fields) is called once when an overlay is bound; updates
/// then look setters up by key without any runtime reflection.
///
/// # Examples
///
/// ```rust
/// use hotswap_settings::settings::{FieldTable, LiveSettings};
///
/// #[derive(Debug, Clone)]
/// struct HttpSettings {
///     timeout: u64,
///     base_path: String,
/// }
///
/// impl LiveSettings for HttpSettings {
///     fn fields() -> FieldTable<Self> {
///         FieldTable::new()
///             .field("timeout", |s: &mut Self, v: u64| s.timeout = v)
///             .field("base_path", |s: &mut Self, v: String| s.base_path = v)
///     }
/// }
/// ```
pub trait LiveSettings: Clone + Send + Sync + 'static {
    /// Setter table for every field that may be updated remotely.
    fn fields() -> FieldTable<Self>;
}

/// Mapping from field name to a typed setter, in declaration order.
pub struct FieldTable<T> {
    order: Vec<String>,
    setters: HashMap<String, FieldSetter<T>>,
}

impl<T> FieldTable<T> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            setters: HashMap::new(),
        }
    }

    /// Add a field parsed with [`FromStr`].
    ///
    /// A value that fails to parse is reported as
    /// [`ValidationError::InvalidField`] naming this field.
    pub fn field<V, F>(self, name: &str, assign: F) -> Self
    where
        V: FromStr,
        V::Err: fmt::Display,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let field = name.to_string();
        self.field_with(name, move |target, raw| {
            let value = raw.parse::<V>().map_err(|e| {
                ValidationError::invalid_field(field.clone(), format!("cannot parse {:?}: {}", raw, e))
            })?;
            assign(target, value);
            Ok(())
        })
    }

    /// Add a field whose raw value is a JSON document.
    pub fn json_field<V, F>(self, name: &str, assign: F) -> Self
    where
        V: DeserializeOwned,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let field = name.to_string();
        self.field_with(name, move |target, raw| {
            let value = serde_json::from_str::<V>(raw).map_err(|e| {
                ValidationError::invalid_field(field.clone(), format!("invalid JSON: {}", e))
            })?;
            assign(target, value);
            Ok(())
        })
    }

    /// Add a field with a custom coercion.
    ///
    /// Declaring the same name twice keeps the later setter.
    pub fn field_with<F>(mut self, name: &str, setter: F) -> Self
    where
        F: Fn(&mut T, &str) -> Result<(), ValidationError> + Send + Sync + 'static,
    {
        if self.setters.insert(name.to_string(), Box::new(setter)).is_none() {
            self.order.push(name.to_string());
        }
        self
    }

    /// Field names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Whether `name` is a declared field.
    pub fn contains(&self, name: &str) -> bool {
        self.setters.contains_key(name)
    }

    /// Number of declared fields.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no field is declared.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Apply `raw` to field `name` of `target`.
    ///
    /// Returns `None` when the field is not declared.
    pub fn apply(&self, target: &mut T, name: &str, raw: &str) -> Option<Result<(), ValidationError>> {
        self.setters.get(name).map(|setter| setter(target, raw))
    }
}

impl<T> Default for FieldTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for FieldTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldTable").field("fields", &self.order).finish()
    }
}

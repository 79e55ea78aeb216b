//! Error types for hotswap-settings.

use std::fmt;

/// Result type alias for hotswap-settings operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when binding or driving live settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required connection parameter was not supplied.
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    /// The namespace is not served by the polling client.
    #[error("Namespace '{namespace}' is not one of the client namespaces {known:?}")]
    UnknownNamespace {
        /// The namespace that was requested
        namespace: String,
        /// Namespaces the client was configured with
        known: Vec<String>,
    },

    /// A change action was registered with an empty watched-field set.
    #[error("Watched fields can not be empty")]
    EmptyWatchedFields,

    /// None of the watched fields exist on the settings type.
    #[error("Watched fields {watched:?} not in settings fields {known:?}")]
    UnknownWatchedFields {
        /// Fields the action asked to watch
        watched: Vec<String>,
        /// Fields the settings type declares
        known: Vec<String>,
    },

    /// The polling worker could not be started.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Failed to load options from a file or the environment.
    #[error("Failed to load options: {0}")]
    LoadError(String),

    /// Talking to the remote configuration service failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A remote value did not fit the local settings schema.
    #[error("Configuration validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A subscriber callback panicked.
    #[error("Subscriber failed: {0}")]
    Subscriber(String),

    /// Generic error for other cases.
    #[error("Configuration error: {0}")]
    Other(String),
}

/// Failures talking to the remote configuration service.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The request could not be sent or timed out.
    #[error("HTTP request to {url} failed: {reason}")]
    Request {
        /// Requested URL
        url: String,
        /// Underlying failure
        reason: String,
    },

    /// The server answered with an unexpected status.
    #[error("HTTP request to {url} failed with status {status}")]
    Status {
        /// Requested URL
        url: String,
        /// Status code returned by the server
        status: u16,
    },

    /// The response body was not what the protocol promises.
    #[error("Malformed response from {url}: {reason}")]
    Decode {
        /// Requested URL
        url: String,
        /// Why decoding failed
        reason: String,
    },

    /// The request could not be built from local state.
    #[error("Failed to encode request to {url}: {reason}")]
    Encode {
        /// Target URL
        url: String,
        /// Why encoding failed
        reason: String,
    },
}

/// Validation error raised when a value cannot be applied to a settings field.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Custom validation error with a message.
    Custom(String),

    /// A specific field has an invalid value.
    InvalidField {
        /// The field name
        field: String,
        /// The reason why it's invalid
        reason: String,
    },

    /// Multiple validation errors occurred.
    Multiple(Vec<ValidationError>),
}

impl ValidationError {
    /// Create a custom validation error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Create an invalid field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Names of every field mentioned by this error.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Self::Custom(_) => Vec::new(),
            Self::InvalidField { field, .. } => vec![field.as_str()],
            Self::Multiple(errors) => errors.iter().flat_map(|e| e.fields()).collect(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(msg) => write!(f, "{}", msg),
            Self::InvalidField { field, reason } => {
                write!(f, "Field '{}' is invalid: {}", field, reason)
            }
            Self::Multiple(errors) => {
                writeln!(f, "Multiple validation errors:")?;
                for (i, err) in errors.iter().enumerate() {
                    writeln!(f, "  {}. {}", i + 1, err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ValidationError {}

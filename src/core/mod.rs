//! Core data model and options.

mod options;
mod snapshot;
mod validation;

pub use options::{ENV_PREFIX, META_URL_ENV, RemoteOptions};
pub use snapshot::{ConfigSnapshot, ConfigValue};
pub use validation::Validate;

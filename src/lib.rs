//! # hotswap-settings
//!
//! Typed settings kept live by long-polling a remote configuration service.
//!
//! ## Overview
//!
//! `hotswap-settings` binds a plain Rust struct to one namespace of an
//! Apollo-compatible configuration service:
//! - A [`PollingClient`](client::PollingClient) long-polls the service on a
//!   background task and keeps a snapshot per namespace
//! - Each refresh is diffed key by key, so only values that actually changed
//!   are reported
//! - A [`SettingsOverlay`](settings::SettingsOverlay) writes changed keys into
//!   typed fields and runs change actions filtered by the fields they watch
//! - Reads are lock-free (`arc-swap`) and never see a half-applied update
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hotswap_settings::prelude::*;
//!
//! #[derive(Debug, Clone)]
//! struct ServerSettings {
//!     timeout: u64,
//!     greeting: String,
//! }
//!
//! impl LiveSettings for ServerSettings {
//!     fn fields() -> FieldTable<Self> {
//!         FieldTable::new()
//!             .field("timeout", |s: &mut Self, v: u64| s.timeout = v)
//!             .field("greeting", |s: &mut Self, v: String| s.greeting = v)
//!     }
//! }
//!
//! # async fn example() -> Result<()> {
//! // meta_url falls back to APOLLO_META_URL when unset
//! let options = RemoteOptions::default().with_app_id("billing");
//!
//! let settings = SettingsOverlay::builder(ServerSettings {
//!     timeout: 30,
//!     greeting: "hello".to_string(),
//! })
//! .with_options(options)
//! .build()?;
//!
//! settings.on_change(WatchedFields::fields(["timeout"]), |s: &ServerSettings| {
//!     println!("timeout changed to {}", s.timeout);
//! })?;
//!
//! // Zero-cost reads (no locks!)
//! println!("greeting: {}", settings.get().greeting);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `http` (default): the reqwest-based [`HttpFetcher`](sources::HttpFetcher)
//! - `metrics`: OpenTelemetry metrics for the polling client

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod client;
pub mod core;
pub mod error;
pub mod settings;
pub mod sources;

#[cfg(feature = "metrics")]
pub mod metrics;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::client::{PollingClient, Subscriber};
    pub use crate::core::{ConfigSnapshot, RemoteOptions, Validate};
    pub use crate::error::{ConfigError, Result, ValidationError};
    pub use crate::settings::{FieldTable, LiveSettings, SettingsOverlay, WatchedFields};
}

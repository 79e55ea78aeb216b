//! Built-in metrics for the polling client.
//!
//! Provides OpenTelemetry metrics tracking:
//! - Poll cycles and poll failures
//! - Config fetch duration
//! - Namespace updates
//! - Subscriber and validation failures
//! - Active subscribers and configuration age
//!
//! # Examples
//!
//! ```rust,no_run
//! use hotswap_settings::client::PollingClient;
//! use hotswap_settings::metrics::ConfigMetrics;
//! use opentelemetry::global;
//! # use hotswap_settings::sources::ConfigFetcher;
//!
//! # fn example(fetcher: impl ConfigFetcher + 'static) -> hotswap_settings::error::Result<()> {
//! let client = PollingClient::builder()
//!     .with_fetcher(fetcher)
//!     .with_metrics(ConfigMetrics::new(global::meter("my-app")))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod config_metrics;

pub use config_metrics::ConfigMetrics;

//! Remote configuration fetchers.

mod config_fetcher;

#[cfg(feature = "http")]
mod http;

pub use config_fetcher::{ConfigFetcher, FetchedConfig, NEVER_POLLED, Notification, PollOutcome};

#[cfg(feature = "http")]
pub use http::{HttpFetcher, HttpFetcherBuilder};

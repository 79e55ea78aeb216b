//! Example keeping typed settings live from a remote configuration service.
//!
//! Point it at a running service before starting:
//!
//! ```text
//! APOLLO_META_URL=http://localhost:8080 APOLLO_APP_ID=billing \
//!     cargo run --example live_settings
//! ```
//!
//! Then edit `timeout`, `greeting` or `upstreams` in the `application`
//! namespace and watch the changes arrive.

use hotswap_settings::prelude::*;
use std::time::Duration;

#[derive(Debug, Clone)]
struct ServiceSettings {
    timeout: u64,
    greeting: String,
    upstreams: Vec<String>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            timeout: 30,
            greeting: "hello".to_string(),
            upstreams: vec!["127.0.0.1:9000".to_string()],
        }
    }
}

impl LiveSettings for ServiceSettings {
    fn fields() -> FieldTable<Self> {
        FieldTable::new()
            .field("timeout", |s: &mut Self, v: u64| s.timeout = v)
            .field("greeting", |s: &mut Self, v: String| s.greeting = v)
            .json_field("upstreams", |s: &mut Self, v: Vec<String>| s.upstreams = v)
    }
}

impl Validate for ServiceSettings {
    fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.timeout == 0 || self.timeout > 300 {
            return Err(ValidationError::invalid_field(
                "timeout",
                "must be between 1 and 300 seconds",
            ));
        }
        if self.upstreams.is_empty() {
            return Err(ValidationError::invalid_field(
                "upstreams",
                "at least one upstream is required",
            ));
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Live Settings Example ===\n");

    // APOLLO_* environment variables override anything loaded from a file
    let options = RemoteOptions::load(None)?;
    println!("✓ Options loaded");
    println!("  Cluster: {}", options.cluster);
    println!("  Namespace: {}", options.namespace);
    println!("  Polling interval: {:?}", options.polling_interval());
    println!();

    let settings = SettingsOverlay::builder(ServiceSettings::default())
        .with_options(options)
        .validated()
        .build()?;
    println!("✓ Settings bound, polling started");

    settings.on_change(WatchedFields::fields(["timeout"]), |s: &ServiceSettings| {
        println!("→ timeout changed: {}s", s.timeout);
    })?;

    settings.on_change_with_priority(
        WatchedFields::fields(["upstreams"]),
        10,
        |s: &ServiceSettings| {
            println!("→ upstreams changed: {:?}", s.upstreams);
        },
    )?;

    settings.on_change(WatchedFields::All, |s: &ServiceSettings| {
        println!("→ update cycle finished, greeting is {:?}", s.greeting);
    })?;

    println!("\nWatching for changes (Ctrl+C to exit)...\n");

    let mut ticker = tokio::time::interval(Duration::from_secs(10));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                let current = settings.get();
                println!(
                    "Current: timeout={}s greeting={:?} upstreams={:?}",
                    current.timeout, current.greeting, current.upstreams
                );
            }
        }
    }

    println!("\nShutting down...");
    settings.client().shutdown().await;
    println!("✓ Polling stopped");

    Ok(())
}

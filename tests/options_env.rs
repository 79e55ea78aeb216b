//! Integration tests for options read from `APOLLO_*` environment variables.
//!
//! The process environment is shared by every test in this binary, so each
//! test holds `ENV_LOCK` while it touches it.

use hotswap_settings::core::META_URL_ENV;
use hotswap_settings::prelude::*;
use parking_lot::{Mutex, MutexGuard};
use std::io::Write;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Sets or clears variables and restores their previous values on drop.
struct EnvGuard {
    saved: Vec<(&'static str, Option<String>)>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvGuard {
    fn new() -> Self {
        Self {
            saved: Vec::new(),
            _lock: ENV_LOCK.lock(),
        }
    }

    fn set(&mut self, key: &'static str, value: &str) {
        self.save(key);
        // SAFETY: ENV_LOCK serializes every environment access in this binary.
        unsafe { std::env::set_var(key, value) };
    }

    fn remove(&mut self, key: &'static str) {
        self.save(key);
        // SAFETY: see `set`.
        unsafe { std::env::remove_var(key) };
    }

    fn save(&mut self, key: &'static str) {
        if !self.saved.iter().any(|(saved, _)| *saved == key) {
            self.saved.push((key, std::env::var(key).ok()));
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in self.saved.drain(..).rev() {
            // SAFETY: the lock is still held until this guard is gone.
            unsafe {
                match value {
                    Some(value) => std::env::set_var(key, value),
                    None => std::env::remove_var(key),
                }
            }
        }
    }
}

#[test]
fn test_meta_url_falls_back_to_environment() {
    let mut env = EnvGuard::new();
    env.set(META_URL_ENV, "http://env-meta:8080");

    let options = RemoteOptions::default().with_app_id("billing");
    assert_eq!(options.resolve_meta_url().unwrap(), "http://env-meta:8080");
}

#[test]
fn test_explicit_meta_url_wins_over_environment() {
    let mut env = EnvGuard::new();
    env.set(META_URL_ENV, "http://env-meta:8080");

    let options = RemoteOptions::default().with_meta_url("http://explicit:8080");
    assert_eq!(options.resolve_meta_url().unwrap(), "http://explicit:8080");
}

#[test]
fn test_missing_meta_url_without_environment() {
    let mut env = EnvGuard::new();
    env.remove(META_URL_ENV);

    let result = RemoteOptions::default().resolve_meta_url();
    assert!(matches!(result, Err(ConfigError::MissingParameter("meta_url"))));

    env.set(META_URL_ENV, "");
    let result = RemoteOptions::default().resolve_meta_url();
    assert!(matches!(result, Err(ConfigError::MissingParameter("meta_url"))));
}

#[test]
fn test_environment_overrides_file_values() {
    let mut env = EnvGuard::new();
    env.remove(META_URL_ENV);
    env.set("APOLLO_APP_ID", "env-app");
    env.set("APOLLO_POLLING_INTERVAL", "7");

    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(file, "app_id: file-app").unwrap();
    writeln!(file, "polling_interval: 5").unwrap();
    writeln!(file, "cluster: blue").unwrap();
    file.flush().unwrap();

    let options = RemoteOptions::load(Some(file.path())).unwrap();

    assert_eq!(options.app_id.as_deref(), Some("env-app"));
    assert_eq!(options.polling_interval, 7);
    assert_eq!(options.cluster, "blue");
    assert_eq!(options.meta_url, None);
}

#[cfg(feature = "http")]
mod overlay {
    use super::*;

    #[derive(Debug, Clone, Default)]
    struct Limits {
        max_connections: i64,
    }

    impl LiveSettings for Limits {
        fn fields() -> FieldTable<Self> {
            FieldTable::new().field("max_connections", |s: &mut Self, v: i64| {
                s.max_connections = v
            })
        }
    }

    #[test]
    fn test_overlay_binds_with_meta_url_from_environment() {
        let mut env = EnvGuard::new();
        env.set(META_URL_ENV, "http://env-meta:8080");

        let overlay = SettingsOverlay::builder(Limits::default())
            .with_options(RemoteOptions::default().with_app_id("billing"))
            .with_start_polling(false)
            .build()
            .unwrap();

        assert_eq!(overlay.namespace(), "application");
        assert!(format!("{:?}", overlay.client()).contains("http://env-meta:8080"));
        assert!(!overlay.client().is_polling());
        assert_eq!(overlay.get().max_connections, 0);
    }

    #[test]
    fn test_overlay_without_meta_url_fails() {
        let mut env = EnvGuard::new();
        env.remove(META_URL_ENV);

        let result = SettingsOverlay::builder(Limits::default())
            .with_options(RemoteOptions::default().with_app_id("billing"))
            .with_start_polling(false)
            .build();

        assert!(matches!(result, Err(ConfigError::MissingParameter("meta_url"))));
    }
}

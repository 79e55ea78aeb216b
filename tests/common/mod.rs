//! Scripted fetcher shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use hotswap_settings::error::TransportError;
use hotswap_settings::sources::{ConfigFetcher, FetchedConfig, Notification, PollOutcome};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

/// Fetcher replaying queued responses.
///
/// Once the poll queue is empty every poll answers `NotChanged`; once a
/// namespace's config queue is empty its fetches fail with a 404.
#[derive(Default)]
pub struct ScriptedFetcher {
    polls: Mutex<VecDeque<Result<PollOutcome, TransportError>>>,
    configs: Mutex<HashMap<String, VecDeque<Result<FetchedConfig, TransportError>>>>,
    poll_requests: Mutex<Vec<Vec<Notification>>>,
    fetch_requests: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_changed(&self, changes: &[(&str, i64)]) {
        let notifications = changes
            .iter()
            .map(|(namespace, id)| Notification::new(*namespace, *id))
            .collect();
        self.polls
            .lock()
            .push_back(Ok(PollOutcome::Changed(notifications)));
    }

    pub fn push_not_changed(&self) {
        self.polls.lock().push_back(Ok(PollOutcome::NotChanged));
    }

    pub fn push_poll_error(&self) {
        self.polls.lock().push_back(Err(TransportError::Request {
            url: "scripted://notifications/v2".to_string(),
            reason: "connection reset".to_string(),
        }));
    }

    pub fn push_config(&self, namespace: &str, release_key: &str, pairs: &[(&str, &str)]) {
        self.configs
            .lock()
            .entry(namespace.to_string())
            .or_default()
            .push_back(Ok(FetchedConfig::new(release_key, pairs.iter().copied())));
    }

    pub fn push_config_error(&self, namespace: &str) {
        self.configs
            .lock()
            .entry(namespace.to_string())
            .or_default()
            .push_back(Err(TransportError::Status {
                url: format!("scripted://configs/{}", namespace),
                status: 500,
            }));
    }

    pub fn poll_requests(&self) -> Vec<Vec<Notification>> {
        self.poll_requests.lock().clone()
    }

    pub fn fetch_requests(&self) -> Vec<String> {
        self.fetch_requests.lock().clone()
    }

    pub fn pending_polls(&self) -> usize {
        self.polls.lock().len()
    }
}

#[async_trait]
impl ConfigFetcher for ScriptedFetcher {
    async fn fetch_config(&self, namespace: &str) -> Result<FetchedConfig, TransportError> {
        self.fetch_requests.lock().push(namespace.to_string());
        self.configs
            .lock()
            .get_mut(namespace)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(TransportError::Status {
                    url: format!("scripted://configs/{}", namespace),
                    status: 404,
                })
            })
    }

    async fn poll_notifications(
        &self,
        cursor: &[Notification],
    ) -> Result<PollOutcome, TransportError> {
        self.poll_requests.lock().push(cursor.to_vec());
        self.polls
            .lock()
            .pop_front()
            .unwrap_or(Ok(PollOutcome::NotChanged))
    }

    fn name(&self) -> String {
        "scripted".to_string()
    }
}

//! Background long-polling worker.

use super::{ClientInner, PollingClient};
use std::sync::Weak;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Handle for the running polling worker of a client.
#[derive(Debug)]
pub(crate) struct PollerHandle {
    cancel_token: CancellationToken,
    join_handle: JoinHandle<()>,
}

impl PollerHandle {
    /// Spawn the worker loop for `client` on `runtime`.
    pub(crate) fn spawn(client: &PollingClient, runtime: &tokio::runtime::Handle) -> Self {
        let cancel_token = CancellationToken::new();
        let join_handle = runtime.spawn(run(
            std::sync::Arc::downgrade(&client.inner),
            cancel_token.clone(),
        ));

        Self {
            cancel_token,
            join_handle,
        }
    }

    /// Whether the worker is still expected to run further cycles.
    pub(crate) fn is_live(&self) -> bool {
        !self.cancel_token.is_cancelled() && !self.join_handle.is_finished()
    }

    /// Ask the worker to exit after its current cycle.
    pub(crate) fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Cancel the worker and wait for it to exit.
    pub(crate) async fn stop(self) {
        self.cancel_token.cancel();
        // Wait for the task to finish, ignoring any join errors
        let _ = self.join_handle.await;
    }
}

/// Main polling loop.
///
/// The loop only holds a weak reference between cycles, so dropping every
/// handle to the client ends it. Cancellation is observed before each cycle
/// and while sleeping; an in-flight long poll always runs to completion.
async fn run(client: Weak<ClientInner>, cancel_token: CancellationToken) {
    info!("polling worker started");

    loop {
        if cancel_token.is_cancelled() {
            break;
        }

        let Some(inner) = client.upgrade() else {
            debug!("polling client dropped");
            break;
        };
        let client = PollingClient { inner };
        client.poll_once().await;
        let interval = client.polling_interval();
        drop(client);

        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    info!("polling worker stopped");
}

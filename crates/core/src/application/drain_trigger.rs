// Queue Drain Trigger
// Replays the offline queue whenever connectivity comes back

use crate::application::dispatcher::{ReplayOutcome, TaskDispatcher};
use crate::application::shutdown::ShutdownToken;
use crate::port::ConnectivityWatch;
use std::sync::Arc;
use tracing::{debug, info};

/// Background listener for online transitions
pub struct QueueDrainTrigger {
    dispatcher: Arc<TaskDispatcher>,
    connectivity: ConnectivityWatch,
}

impl QueueDrainTrigger {
    pub fn new(dispatcher: Arc<TaskDispatcher>, connectivity: ConnectivityWatch) -> Self {
        Self {
            dispatcher,
            connectivity,
        }
    }

    /// Run until shutdown (should be spawned in tokio::spawn)
    ///
    /// Drains once at startup if already online with queued work, then on
    /// every offline -> online transition.
    pub async fn run(mut self, mut shutdown: ShutdownToken) {
        info!(online = self.connectivity.is_online(), "Queue drain trigger started");

        if self.connectivity.is_online() && !self.dispatcher.queue().is_empty().await {
            self.replay("startup").await;
        }

        loop {
            tokio::select! {
                _ = shutdown.wait() => {
                    info!("Queue drain trigger shutting down");
                    break;
                }
                changed = self.connectivity.changed() => match changed {
                    Some(true) => self.replay("reconnected").await,
                    Some(false) => info!("Connectivity lost, new failures will be queued"),
                    None => {
                        debug!("Connectivity source closed, stopping drain trigger");
                        break;
                    }
                },
            }
        }
    }

    async fn replay(&self, reason: &str) {
        info!(reason = reason, "Replaying offline queue");
        match self.dispatcher.process_offline_queue().await {
            ReplayOutcome::Completed(report) => info!(
                reason = reason,
                attempted = report.attempted,
                succeeded = report.succeeded,
                failed = report.failed,
                "Offline queue replay complete"
            ),
            ReplayOutcome::Skipped(skip) => {
                debug!(reason = reason, skipped = skip.as_str(), "Offline queue replay skipped")
            }
        }
    }
}

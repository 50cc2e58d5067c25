//! Background loop driving the engine.

use std::sync::Arc;
use std::time::Duration;

use stepflow_handlers::HandlerRegistry;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::store::RuntimeStore;

use super::tick_all;

/// Ticks every runtime at a fixed interval until cancelled.
pub struct Scheduler {
    store: Arc<RuntimeStore>,
    registry: Arc<HandlerRegistry>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(store: Arc<RuntimeStore>, registry: Arc<HandlerRegistry>, interval: Duration) -> Self {
        Self {
            store,
            registry,
            interval,
        }
    }

    /// Run until the token fires. Tick failures are logged once at onset and
    /// demoted to debug while they persist, so a dead datastore does not
    /// flood the log at every interval.
    pub async fn run(self, token: CancellationToken) {
        tokio::select! {
            _ = token.cancelled() => {
                info!("scheduler stopped");
                return;
            }
            _ = self.store.wait_ready() => {}
        }
        info!(interval = ?self.interval, "scheduler running");

        let mut failing = false;
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = sleep(self.interval) => {}
            }
            let ticked = tokio::select! {
                _ = token.cancelled() => break,
                ticked = tick_all(&self.store, &self.registry) => ticked,
            };
            match ticked {
                Ok(_) => {
                    if failing {
                        info!("tick recovered");
                        failing = false;
                    }
                }
                Err(err) if failing => debug!(error = %err, "tick still failing"),
                Err(err) => {
                    error!(error = %err, "tick failed");
                    failing = true;
                }
            }
        }
        info!("scheduler stopped");
    }
}

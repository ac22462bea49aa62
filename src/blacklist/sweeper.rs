use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::clock::Clock;
use crate::database::BlacklistStore;
use crate::error::CatalogResult;

/// Periodically deactivates lapsed blacklist entries
#[derive(Clone)]
pub struct ExpirySweeper {
    store: Arc<dyn BlacklistStore>,
    clock: Arc<dyn Clock>,
}

impl ExpirySweeper {
    pub fn new(store: Arc<dyn BlacklistStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// One idempotent pass; returns how many entries were deactivated
    pub async fn run_once(&self) -> CatalogResult<u64> {
        let touched = self.store.deactivate_expired(self.clock.now()).await?;
        if touched > 0 {
            info!(deactivated = touched, "Expired blacklist entries deactivated");
        } else {
            debug!("No expired blacklist entries");
        }
        Ok(touched)
    }

    /// Run forever on `interval`. The first pass happens immediately.
    pub async fn start_periodic_sweep(&self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);

        loop {
            ticker.tick().await;

            if let Err(e) = self.run_once().await {
                error!("Blacklist expiry sweep failed: {}", e);
            }
        }
    }

    pub fn spawn(self, interval: Duration) -> JoinHandle<()> {
        info!(interval_secs = interval.as_secs(), "Starting blacklist expiry sweeper");
        tokio::spawn(async move { self.start_periodic_sweep(interval).await })
    }
}

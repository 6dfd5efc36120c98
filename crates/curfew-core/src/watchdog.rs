//! Window watchdog

use curfew_util::{Clock, format_datetime_full};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::AvailabilityScheduler;

/// Re-checks the allowed window while the service is Online
pub struct Watchdog {
    scheduler: Arc<AvailabilityScheduler>,
    clock: Arc<dyn Clock>,
    initial_delay: Duration,
    interval: Duration,
}

impl Watchdog {
    pub fn new(
        scheduler: Arc<AvailabilityScheduler>,
        clock: Arc<dyn Clock>,
        initial_delay: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            scheduler,
            clock,
            initial_delay,
            interval,
        }
    }

    /// Resolve the first time the window is found closed.
    ///
    /// Never checks before `initial_delay` has elapsed.
    pub async fn wait_for_close(&self) {
        tokio::time::sleep(self.initial_delay).await;
        loop {
            let now = self.clock.now();
            if !self.scheduler.is_allowed(&now) {
                info!(time = %format_datetime_full(&now), "Allowed window closed");
                return;
            }
            debug!(time = %format_datetime_full(&now), "Window still open");
            tokio::time::sleep(self.interval).await;
        }
    }

    /// Watch until the window closes (then notify `closed`) or until
    /// `token` is cancelled.
    pub async fn run(self, token: CancellationToken, closed: oneshot::Sender<()>) {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("Watchdog cancelled");
            }
            _ = self.wait_for_close() => {
                let _ = closed.send(());
            }
        }
    }
}

//! Shutdown coordination.

use crate::error::Result;
use crate::types::Event;
use std::sync::PoisonError;
use std::sync::atomic::Ordering;

use super::CampaignEngine;

impl CampaignEngine {
    /// Gracefully shut down the engine
    ///
    /// 1. Stops accepting new executions
    /// 2. Cancels running executions (they stop before their next outer batch)
    /// 3. Waits for them to finish, bounded by `config.shutdown_timeout`
    /// 4. Emits [`Event::Shutdown`]
    ///
    /// Executions still running after the timeout are left to finish on
    /// their own; no durable record of them is kept.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.executions.accepting_new.store(false, Ordering::SeqCst);
        tracing::info!("Stopped accepting new executions");

        self.cancel_all();

        let wait_result =
            tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_executions()).await;
        match wait_result {
            Ok(()) => tracing::info!("All running executions finished"),
            Err(_) => tracing::warn!(
                still_running = self.running_count(),
                "Timeout waiting for executions to finish, proceeding with shutdown"
            ),
        }

        self.emit_event(Event::Shutdown);
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    fn cancel_all(&self) {
        let running = self
            .executions
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        tracing::debug!(running = running.len(), "Cancelling running executions");
        for (campaign_id, token) in running.iter() {
            tracing::debug!(campaign_id = %campaign_id, "Signaling cancellation");
            token.cancel();
        }
    }

    async fn wait_for_executions(&self) {
        loop {
            let running = self.running_count();
            if running == 0 {
                return;
            }
            tracing::debug!(running, "Waiting for executions to finish");
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    }
}

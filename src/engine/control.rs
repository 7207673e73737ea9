//! Execution control: start, cancel and progress queries.

use crate::error::{Error, ExecutionError, Result};
use crate::types::{CampaignId, CampaignStatus, ExecutionOptions, ExecutionProgress, TaskId};
use std::sync::PoisonError;

use super::CampaignEngine;
use super::execution::ExecutionReport;

/// Largest accepted `ExecutionOptions::batch_size`
pub(crate) const MAX_BATCH_SIZE: usize = 100;

impl CampaignEngine {
    /// Start executing a campaign in the background
    ///
    /// Returns as soon as the execution task is spawned. The campaign must
    /// exist and be in Draft status. Failures inside the execution are not
    /// returned here; they show up in the campaign status, the progress
    /// query and the event stream.
    ///
    /// # Errors
    ///
    /// - `Error::ShuttingDown` after [`shutdown`](Self::shutdown)
    /// - `ExecutionError::InvalidOptions` for a batch size outside 1..=100
    /// - `ExecutionError::NotFound` / `InvalidState` for a missing or non-Draft campaign
    /// - `ExecutionError::AlreadyRunning` while the campaign is executing in this engine
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use outreach_engine::*;
    /// # async fn example(engine: CampaignEngine, id: CampaignId) -> Result<()> {
    /// let task_id = engine.start_execution(id, ExecutionOptions::default()).await?;
    /// println!("execution {task_id} started");
    /// # Ok(())
    /// # }
    /// ```
    pub async fn start_execution(
        &self,
        campaign_id: CampaignId,
        options: ExecutionOptions,
    ) -> Result<TaskId> {
        self.check_accepting()?;
        validate_options(&options)?;

        let campaign = self
            .store
            .get_campaign(campaign_id)
            .await?
            .ok_or(Error::Execution(ExecutionError::NotFound { id: campaign_id }))?;
        if campaign.status != CampaignStatus::Draft {
            return Err(Error::Execution(ExecutionError::InvalidState {
                id: campaign_id,
                operation: "execute".to_string(),
                current_state: campaign.status,
            }));
        }

        let guard = self.claim(campaign_id)?;
        let task_id = TaskId::new();

        tracing::info!(campaign_id = %campaign_id, task_id = %task_id, "Execution accepted");

        let engine = self.clone();
        tokio::spawn(async move {
            engine.run_execution(guard, campaign_id, task_id, options).await;
        });

        Ok(task_id)
    }

    /// Execute a campaign and wait for it to finish
    ///
    /// Runs the same routine as [`start_execution`](Self::start_execution)
    /// on the calling task. Campaign-level problems (missing campaign, no
    /// targets, store failures) are reported in the returned
    /// [`ExecutionReport`], not as errors.
    pub async fn execute(
        &self,
        campaign_id: CampaignId,
        options: ExecutionOptions,
    ) -> Result<ExecutionReport> {
        self.check_accepting()?;
        validate_options(&options)?;
        let guard = self.claim(campaign_id)?;

        Ok(self
            .run_execution(guard, campaign_id, TaskId::new(), options)
            .await)
    }

    /// Request cancellation of a running execution
    ///
    /// The dispatcher stops before its next outer batch; jobs not yet sent
    /// are counted as failed.
    pub fn cancel_execution(&self, campaign_id: CampaignId) -> Result<()> {
        let running = self
            .executions
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match running.get(&campaign_id) {
            Some(token) => {
                tracing::info!(campaign_id = %campaign_id, "Cancellation requested");
                token.cancel();
                Ok(())
            }
            None => Err(Error::Execution(ExecutionError::NotRunning {
                id: campaign_id,
            })),
        }
    }

    /// Whether this engine is currently executing the campaign
    pub fn is_running(&self, campaign_id: CampaignId) -> bool {
        self.executions
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&campaign_id)
    }

    /// Progress of a campaign, derived from its stored response rows
    pub async fn get_execution_progress(&self, campaign_id: CampaignId) -> Result<ExecutionProgress> {
        let campaign = self
            .store
            .get_campaign(campaign_id)
            .await?
            .ok_or(Error::Execution(ExecutionError::NotFound { id: campaign_id }))?;
        let counts = self.store.response_counts(campaign_id).await?;

        Ok(ExecutionProgress::from_counts(
            campaign_id,
            campaign.status,
            counts,
        ))
    }

    fn check_accepting(&self) -> Result<()> {
        if self.is_accepting() {
            Ok(())
        } else {
            Err(Error::ShuttingDown)
        }
    }
}

fn validate_options(options: &ExecutionOptions) -> Result<()> {
    if let Some(size) = options.batch_size
        && !(1..=MAX_BATCH_SIZE).contains(&size)
    {
        return Err(Error::Execution(ExecutionError::InvalidOptions(format!(
            "batch_size must be between 1 and {MAX_BATCH_SIZE}, got {size}"
        ))));
    }
    Ok(())
}

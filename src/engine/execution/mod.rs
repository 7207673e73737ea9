//! Campaign execution -- from a Draft campaign to a final status.
//!
//! Split into focused submodules:
//! - [`context`] - Per-execution shared state
//! - [`targeting`] - Channel selection and target vendor resolution
//! - [`jobs`] - Per-vendor rendering into send jobs
//! - [`orchestration`] - Top-level execution lifecycle
//! - [`finalization`] - Final status, events and the execution report

mod context;
mod finalization;
mod jobs;
mod orchestration;
mod targeting;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::dispatch::DispatchReport;
use crate::types::{CampaignId, CampaignStatus, Channel, ExecutionOptions, TaskId};
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;

use super::{CampaignEngine, RunningGuard};
use context::ExecutionContext;

/// How an execution ended
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// Dispatch ran and the campaign reached a final status
    Finished {
        /// Completed when anything was delivered, otherwise Cancelled
        status: CampaignStatus,
    },
    /// No vendor with a usable contact matched the target; campaign untouched
    NoTargets,
    /// Stopped before anything was sent; campaign left in its previous status
    Aborted {
        /// Why the execution stopped
        reason: String,
    },
    /// Unexpected failure after activation; campaign forced to Cancelled
    Failed {
        /// What went wrong
        reason: String,
    },
}

/// Result of one campaign execution
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    /// Campaign
    pub campaign_id: CampaignId,
    /// Tracking id of this execution
    pub task_id: TaskId,
    /// How the execution ended
    pub outcome: ExecutionOutcome,
    /// Vendors that received a response record
    pub targeted: usize,
    /// Email dispatch, when the channel was used
    pub email: Option<DispatchReport>,
    /// Messaging dispatch, when the channel was used
    pub messaging: Option<DispatchReport>,
}

impl ExecutionReport {
    /// Deliveries across channels
    pub fn sent(&self) -> usize {
        self.channel_reports().map(|r| r.sent).sum()
    }

    /// Failures across channels
    pub fn failed(&self) -> usize {
        self.channel_reports().map(|r| r.failed).sum()
    }

    /// Campaign status this execution set, if it set one
    pub fn final_status(&self) -> Option<CampaignStatus> {
        match self.outcome {
            ExecutionOutcome::Finished { status } => Some(status),
            ExecutionOutcome::Failed { .. } => Some(CampaignStatus::Cancelled),
            ExecutionOutcome::NoTargets | ExecutionOutcome::Aborted { .. } => None,
        }
    }

    fn channel_reports(&self) -> impl Iterator<Item = &DispatchReport> {
        self.email.iter().chain(self.messaging.iter())
    }
}

/// Results gathered while an execution runs
#[derive(Default)]
pub(super) struct Tally {
    pub(super) targeted: usize,
    pub(super) email: Option<DispatchReport>,
    pub(super) messaging: Option<DispatchReport>,
}

impl Tally {
    pub(super) fn record(&mut self, report: DispatchReport) {
        match report.channel {
            Channel::Email => self.email = Some(report),
            Channel::Messaging => self.messaging = Some(report),
        }
    }

    /// `(sent, failed)` across channels
    pub(super) fn totals(&self) -> (usize, usize) {
        [&self.email, &self.messaging]
            .into_iter()
            .flatten()
            .fold((0, 0), |(sent, failed), r| (sent + r.sent, failed + r.failed))
    }

    pub(super) fn into_report(self, ctx: &ExecutionContext, outcome: ExecutionOutcome) -> ExecutionReport {
        ExecutionReport {
            campaign_id: ctx.campaign_id,
            task_id: ctx.task_id,
            outcome,
            targeted: self.targeted,
            email: self.email,
            messaging: self.messaging,
        }
    }
}

impl CampaignEngine {
    /// Run one execution while holding the campaign's single-flight slot
    pub(crate) async fn run_execution(
        &self,
        guard: RunningGuard,
        campaign_id: CampaignId,
        task_id: TaskId,
        options: ExecutionOptions,
    ) -> ExecutionReport {
        let ctx = ExecutionContext::new(self, guard.token().clone(), campaign_id, task_id, options);
        let report = match AssertUnwindSafe(orchestration::run_execution_task(&ctx))
            .catch_unwind()
            .await
        {
            Ok(report) => report,
            Err(panic) => {
                let reason = format!("execution panicked: {}", panic_message(panic.as_ref()));
                finalization::fail(&ctx, Tally::default(), reason).await
            }
        };
        drop(guard);
        report
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

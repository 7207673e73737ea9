//! Batch dispatcher
//!
//! Runs send jobs through a [`ChannelClient`] in outer batches of
//! `batch_size`. Inside a batch, jobs go out in groups of `concurrency`
//! that run concurrently; each group finishes before the next starts.
//! Groups are separated by `intra_batch_delay`, batches by
//! `inter_batch_delay` (never after the last batch).
//!
//! Every submitted job ends up counted exactly once, as sent or failed.

use crate::channels::{ChannelClient, SendError};
use crate::types::{Channel, VendorId};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

pub use crate::config::BatchPolicy;

/// One message queued for a channel client
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendJob {
    /// Vendor the message is for
    pub vendor_id: VendorId,
    /// Email address or phone number
    pub recipient: String,
    /// Vendor display name
    pub display_name: String,
    /// Rendered subject (email only)
    pub subject: Option<String>,
    /// Rendered text body
    pub body: String,
    /// Rendered HTML body (email only)
    pub html_body: Option<String>,
    /// Files to attach (email only)
    pub attachments: Vec<PathBuf>,
}

/// Result of one job
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOutcome {
    /// Vendor the job was for
    pub vendor_id: VendorId,
    /// Recipient address or number
    pub recipient: String,
    /// Whether delivery succeeded
    pub success: bool,
    /// Failure cause
    pub error: Option<String>,
    /// When the attempt finished
    pub completed_at: DateTime<Utc>,
}

impl SendOutcome {
    fn new(job: &SendJob, result: Result<(), SendError>) -> Self {
        Self {
            vendor_id: job.vendor_id,
            recipient: job.recipient.clone(),
            success: result.is_ok(),
            error: result.err().map(|e| e.to_string()),
            completed_at: Utc::now(),
        }
    }
}

/// Progress snapshot passed to the per-batch callback
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchProgress {
    /// Zero-based index of the batch that just finished
    pub batch: usize,
    /// Number of outer batches
    pub batches: usize,
    /// Jobs sent so far
    pub sent: usize,
    /// Jobs failed so far
    pub failed: usize,
}

/// Aggregated result of a dispatch run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    /// Channel the jobs went through
    pub channel: Channel,
    /// Jobs submitted
    pub total: usize,
    /// Jobs delivered
    pub sent: usize,
    /// Jobs that failed or were never attempted
    pub failed: usize,
    /// Outer batches that ran
    pub batches: usize,
    /// `recipient: cause` strings, bounded
    pub errors: Vec<String>,
    /// Errors not kept because the bound was reached
    pub errors_dropped: usize,
    /// Whether the run stopped early on cancellation
    pub cancelled: bool,
    /// Per-job results
    pub outcomes: Vec<SendOutcome>,
    #[serde(skip)]
    max_errors: usize,
}

impl DispatchReport {
    /// Empty report for a channel
    pub fn new(channel: Channel, total: usize, max_errors: usize) -> Self {
        Self {
            channel,
            total,
            sent: 0,
            failed: 0,
            batches: 0,
            errors: Vec::new(),
            errors_dropped: 0,
            cancelled: false,
            outcomes: Vec::with_capacity(total),
            max_errors,
        }
    }

    /// Count every job as sent without touching a transport
    pub fn simulated(channel: Channel, jobs: &[SendJob]) -> Self {
        let mut report = Self::new(channel, jobs.len(), 0);
        for job in jobs {
            report.record(SendOutcome::new(job, Ok(())));
        }
        report
    }

    /// Count every recipient as failed with the same cause, without sending
    pub fn failed_without_dispatch<I>(channel: Channel, recipients: I, cause: &SendError, max_errors: usize) -> Self
    where
        I: IntoIterator<Item = (VendorId, String)>,
    {
        let recipients: Vec<_> = recipients.into_iter().collect();
        let mut report = Self::new(channel, recipients.len(), max_errors);
        for (vendor_id, recipient) in recipients {
            report.record(SendOutcome {
                vendor_id,
                recipient,
                success: false,
                error: Some(cause.to_string()),
                completed_at: Utc::now(),
            });
        }
        report
    }

    /// Vendors the channel delivered to
    pub fn delivered(&self) -> Vec<VendorId> {
        self.outcomes
            .iter()
            .filter(|o| o.success)
            .map(|o| o.vendor_id)
            .collect()
    }

    fn record(&mut self, outcome: SendOutcome) {
        if outcome.success {
            self.sent += 1;
        } else {
            self.failed += 1;
            let cause = outcome.error.as_deref().unwrap_or("unknown error");
            if self.errors.len() < self.max_errors {
                self.errors.push(format!("{}: {cause}", outcome.recipient));
            } else {
                self.errors_dropped += 1;
            }
        }
        self.outcomes.push(outcome);
    }
}

/// Run `jobs` through `client` according to `policy`
///
/// `cancel` is checked before each outer batch and interrupts the pause
/// between batches; jobs not yet attempted are counted as failed.
/// `on_batch` is called after every completed outer batch.
pub async fn run_batches<F>(
    jobs: Vec<SendJob>,
    client: &dyn ChannelClient,
    policy: &BatchPolicy,
    cancel: &CancellationToken,
    max_errors: usize,
    mut on_batch: F,
) -> DispatchReport
where
    F: FnMut(BatchProgress),
{
    let channel = client.channel();
    let batch_size = policy.batch_size.max(1);
    let concurrency = policy.concurrency.max(1);
    let batches = jobs.len().div_ceil(batch_size);
    let mut report = DispatchReport::new(channel, jobs.len(), max_errors);

    for (index, batch) in jobs.chunks(batch_size).enumerate() {
        if cancel.is_cancelled() {
            let remaining = &jobs[index * batch_size..];
            tracing::warn!(
                channel = %channel,
                skipped = remaining.len(),
                "dispatch cancelled"
            );
            for job in remaining {
                report.record(SendOutcome::new(job, Err(SendError::Cancelled)));
            }
            report.cancelled = true;
            break;
        }

        for (group_index, group) in batch.chunks(concurrency).enumerate() {
            if group_index > 0 && !policy.intra_batch_delay.is_zero() {
                tokio::time::sleep(policy.intra_batch_delay).await;
            }
            let outcomes = join_all(group.iter().map(|job| attempt(client, job))).await;
            for outcome in outcomes {
                report.record(outcome);
            }
        }

        report.batches += 1;
        tracing::info!(
            channel = %channel,
            batch = index + 1,
            batches,
            sent = report.sent,
            failed = report.failed,
            "batch completed"
        );
        on_batch(BatchProgress {
            batch: index,
            batches,
            sent: report.sent,
            failed: report.failed,
        });

        if index + 1 < batches && !policy.inter_batch_delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(policy.inter_batch_delay) => {}
                _ = cancel.cancelled() => {}
            }
        }
    }

    report
}

async fn attempt(client: &dyn ChannelClient, job: &SendJob) -> SendOutcome {
    let result = client.send(job).await;
    if let Err(e) = &result {
        tracing::warn!(
            channel = %client.channel(),
            recipient = %job.recipient,
            vendor_id = %job.vendor_id,
            error = %e,
            "delivery failed"
        );
    }
    SendOutcome::new(job, result)
}

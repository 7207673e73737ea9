//! Final campaign status, closing events and the execution report.

use crate::types::{CampaignStatus, Event};

use super::context::ExecutionContext;
use super::{ExecutionOutcome, ExecutionReport, Tally};

/// Stop before anything was sent, leaving the campaign as it was
pub(super) fn abort(ctx: &ExecutionContext, tally: Tally, reason: String) -> ExecutionReport {
    tracing::warn!(
        campaign_id = %ctx.campaign_id,
        task_id = %ctx.task_id,
        reason = %reason,
        "Execution aborted"
    );
    ctx.emit(Event::ExecutionAborted {
        campaign_id: ctx.campaign_id,
        task_id: ctx.task_id,
        reason: reason.clone(),
    });
    tally.into_report(ctx, ExecutionOutcome::Aborted { reason })
}

/// Nothing to send to; the campaign stays Draft
pub(super) fn no_targets(ctx: &ExecutionContext, tally: Tally) -> ExecutionReport {
    tracing::info!(
        campaign_id = %ctx.campaign_id,
        task_id = %ctx.task_id,
        "No target vendors with a usable contact, campaign left unchanged"
    );
    ctx.emit(Event::ExecutionAborted {
        campaign_id: ctx.campaign_id,
        task_id: ctx.task_id,
        reason: "no target vendors".to_string(),
    });
    tally.into_report(ctx, ExecutionOutcome::NoTargets)
}

/// Set Completed when anything was delivered, otherwise Cancelled
pub(super) async fn finish(ctx: &ExecutionContext, tally: Tally) -> ExecutionReport {
    let (sent, failed) = tally.totals();
    let status = if sent > 0 {
        CampaignStatus::Completed
    } else {
        CampaignStatus::Cancelled
    };

    if let Err(e) = ctx.store.set_campaign_status(ctx.campaign_id, status).await {
        return fail(ctx, tally, format!("failed to set final status {status}: {e}")).await;
    }

    tracing::info!(
        campaign_id = %ctx.campaign_id,
        task_id = %ctx.task_id,
        status = %status,
        sent,
        failed,
        "Execution finished"
    );
    ctx.emit(Event::ExecutionFinished {
        campaign_id: ctx.campaign_id,
        task_id: ctx.task_id,
        status,
        sent,
        failed,
    });
    tally.into_report(ctx, ExecutionOutcome::Finished { status })
}

/// Unexpected failure: force the campaign to Cancelled (best effort)
pub(super) async fn fail(ctx: &ExecutionContext, tally: Tally, reason: String) -> ExecutionReport {
    tracing::error!(
        campaign_id = %ctx.campaign_id,
        task_id = %ctx.task_id,
        reason = %reason,
        "Execution failed, cancelling campaign"
    );

    if let Err(e) = ctx
        .store
        .set_campaign_status(ctx.campaign_id, CampaignStatus::Cancelled)
        .await
    {
        tracing::error!(
            campaign_id = %ctx.campaign_id,
            error = %e,
            "Failed to mark campaign Cancelled"
        );
    }

    ctx.emit(Event::ExecutionAborted {
        campaign_id: ctx.campaign_id,
        task_id: ctx.task_id,
        reason: reason.clone(),
    });
    tally.into_report(ctx, ExecutionOutcome::Failed { reason })
}

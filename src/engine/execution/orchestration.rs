//! Top-level lifecycle of a single campaign execution.

use crate::Result;
use crate::channels::SendError;
use crate::dispatch::{DispatchReport, run_batches};
use crate::types::{Campaign, CampaignStatus, Channel, Event, Vendor, VendorId};

use super::context::ExecutionContext;
use super::finalization::{abort, fail, finish, no_targets};
use super::jobs::{build_jobs, recipients};
use super::targeting::{ChannelPlan, planned_channels, resolve_targets};
use super::{ExecutionReport, Tally};

/// Core execution task -- drives one campaign from Draft to a final status.
///
/// Phases:
/// 1. Load the campaign and check it is Draft
/// 2. Resolve target vendors (none: stop, campaign untouched)
/// 3. Create one Pending response per vendor (failure: stop, nothing sent)
/// 4. Activate the campaign
/// 5. Dispatch each planned channel
/// 6. Completed if anything was delivered, otherwise Cancelled
///
/// Store failures from phase 4 on force the campaign to Cancelled.
pub(super) async fn run_execution_task(ctx: &ExecutionContext) -> ExecutionReport {
    let id = ctx.campaign_id;
    let mut tally = Tally::default();

    ctx.emit(Event::ExecutionStarted {
        campaign_id: id,
        task_id: ctx.task_id,
    });
    tracing::info!(
        campaign_id = %id,
        task_id = %ctx.task_id,
        send_email = ctx.options.send_email,
        send_messaging = ctx.options.send_messaging,
        test_mode = ctx.options.test_mode,
        "Execution started"
    );

    // Phase 1: Load campaign
    let campaign = match ctx.store.get_campaign(id).await {
        Ok(Some(campaign)) => campaign,
        Ok(None) => return abort(ctx, tally, "campaign not found".to_string()),
        Err(e) => return abort(ctx, tally, format!("failed to load campaign: {e}")),
    };
    if campaign.status != CampaignStatus::Draft {
        let reason = format!(
            "campaign is {}; only Draft campaigns can be executed",
            campaign.status
        );
        return abort(ctx, tally, reason);
    }

    // Phase 2: Resolve targets
    let plans = planned_channels(&campaign, &ctx.options);
    let channels: Vec<Channel> = plans.iter().map(|p| p.channel).collect();
    if plans.is_empty() {
        tracing::warn!(
            campaign_id = %id,
            "No channel is both enabled and configured with a template"
        );
    }

    let vendors =
        match resolve_targets(ctx.store.as_ref(), &campaign, &channels, ctx.country_code()).await {
            Ok(vendors) => vendors,
            Err(e) => return abort(ctx, tally, format!("failed to resolve target vendors: {e}")),
        };
    if vendors.is_empty() {
        return no_targets(ctx, tally);
    }

    // Phase 3: Create response records
    let vendor_ids: Vec<VendorId> = vendors.iter().map(|v| v.id).collect();
    if let Err(e) = ctx.store.create_responses(id, &vendor_ids).await {
        return abort(ctx, tally, format!("failed to create response records: {e}"));
    }
    tally.targeted = vendors.len();
    ctx.emit(Event::TargetsResolved {
        campaign_id: id,
        vendors: vendors.len(),
    });
    tracing::info!(campaign_id = %id, vendors = vendors.len(), "Response records created");

    // Phase 4: Activate
    if let Err(e) = ctx.store.set_campaign_status(id, CampaignStatus::Active).await {
        return fail(ctx, tally, format!("failed to activate campaign: {e}")).await;
    }

    // Phase 5: Dispatch per channel
    for plan in plans {
        match dispatch_channel(ctx, &campaign, &vendors, plan).await {
            Ok(report) => tally.record(report),
            Err(e) => {
                let reason = format!("{} dispatch failed: {e}", plan.channel);
                return fail(ctx, tally, reason).await;
            }
        }
    }

    // Phase 6: Final status
    finish(ctx, tally).await
}

/// Render and dispatch one channel, then record its deliveries
async fn dispatch_channel(
    ctx: &ExecutionContext,
    campaign: &Campaign,
    vendors: &[Vendor],
    plan: ChannelPlan,
) -> Result<DispatchReport> {
    let channel = plan.channel;
    let max_errors = ctx.config.dispatch.max_recorded_errors;

    let report = match ctx.store.get_template(plan.template_id, channel).await? {
        None => {
            tracing::error!(
                campaign_id = %ctx.campaign_id,
                channel = %channel,
                template_id = %plan.template_id,
                "Template not found, failing every job of the channel"
            );
            let cause = SendError::TemplateUnavailable(format!(
                "{channel} template {} not found",
                plan.template_id
            ));
            DispatchReport::failed_without_dispatch(
                channel,
                recipients(vendors, channel, ctx.country_code()),
                &cause,
                max_errors,
            )
        }
        Some(template) => {
            let jobs = build_jobs(
                &ctx.renderer,
                &template,
                campaign,
                vendors,
                &ctx.options,
                ctx.country_code(),
            );
            tracing::info!(
                campaign_id = %ctx.campaign_id,
                channel = %channel,
                jobs = jobs.len(),
                "Dispatching channel"
            );

            if ctx.options.test_mode {
                tracing::info!(
                    campaign_id = %ctx.campaign_id,
                    channel = %channel,
                    jobs = jobs.len(),
                    "Test mode, skipping transmission"
                );
                DispatchReport::simulated(channel, &jobs)
            } else {
                let client = ctx.clients.get(channel);
                let policy = ctx.policy(channel);
                run_batches(
                    jobs,
                    client.as_ref(),
                    &policy,
                    &ctx.cancel,
                    max_errors,
                    |progress| {
                        ctx.emit(Event::BatchCompleted {
                            campaign_id: ctx.campaign_id,
                            channel,
                            batch: progress.batch,
                            batches: progress.batches,
                            sent: progress.sent,
                            failed: progress.failed,
                        })
                    },
                )
                .await
            }
        }
    };

    if let Err(e) = ctx
        .store
        .mark_delivered(ctx.campaign_id, channel, &report.delivered())
        .await
    {
        tracing::error!(
            campaign_id = %ctx.campaign_id,
            channel = %channel,
            error = %e,
            "Failed to record deliveries"
        );
    }

    tracing::info!(
        campaign_id = %ctx.campaign_id,
        channel = %channel,
        sent = report.sent,
        failed = report.failed,
        cancelled = report.cancelled,
        "Channel dispatch complete"
    );
    ctx.emit(Event::ChannelCompleted {
        campaign_id: ctx.campaign_id,
        channel,
        sent: report.sent,
        failed: report.failed,
    });

    Ok(report)
}

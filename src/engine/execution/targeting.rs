//! Channel selection and target vendor resolution.

use crate::Result;
use crate::channels::normalize_phone;
use crate::store::RecordStore;
use crate::types::{Campaign, Channel, ExecutionOptions, TargetSpec, TemplateId, Vendor, VendorId};
use std::collections::BTreeSet;

/// A channel the execution will dispatch on, with its template
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct ChannelPlan {
    pub(super) channel: Channel,
    pub(super) template_id: TemplateId,
}

/// Channels enabled by the options that also have a template on the campaign
pub(super) fn planned_channels(campaign: &Campaign, options: &ExecutionOptions) -> Vec<ChannelPlan> {
    [
        (Channel::Email, options.send_email),
        (Channel::Messaging, options.send_messaging),
    ]
    .into_iter()
    .filter(|(_, enabled)| *enabled)
    .filter_map(|(channel, _)| {
        campaign
            .template_for(channel)
            .map(|template_id| ChannelPlan {
                channel,
                template_id,
            })
    })
    .collect()
}

/// The vendor's address on `channel`, if it is usable
pub(super) fn recipient(vendor: &Vendor, channel: Channel, country_code: &str) -> Option<String> {
    match channel {
        Channel::Email => vendor.email_address().map(str::to_string),
        Channel::Messaging => vendor
            .messaging_number()
            .filter(|number| normalize_phone(number, country_code).is_some())
            .map(str::to_string),
    }
}

/// Resolve the campaign's target into vendors reachable on at least one of `channels`
///
/// With no channels planned, any usable contact qualifies.
pub(super) async fn resolve_targets(
    store: &dyn RecordStore,
    campaign: &Campaign,
    channels: &[Channel],
    country_code: &str,
) -> Result<Vec<Vendor>> {
    let candidates = match &campaign.target {
        TargetSpec::ExplicitVendors(ids) => {
            let unique: Vec<VendorId> = ids
                .iter()
                .copied()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            store.get_vendors_by_ids(&unique).await?
        }
        TargetSpec::FilterCriteria(criteria) => store.list_vendors(criteria).await?,
    };

    let considered: &[Channel] = if channels.is_empty() {
        &[Channel::Email, Channel::Messaging]
    } else {
        channels
    };

    let total = candidates.len();
    let reachable: Vec<Vendor> = candidates
        .into_iter()
        .filter(|vendor| {
            considered
                .iter()
                .any(|channel| recipient(vendor, *channel, country_code).is_some())
        })
        .collect();

    if reachable.len() < total {
        tracing::info!(
            campaign_id = %campaign.id,
            excluded = total - reachable.len(),
            "Excluded vendors without a usable contact"
        );
    }

    Ok(reachable)
}

//! Per-vendor rendering into send jobs.

use crate::dispatch::SendJob;
use crate::template::{TemplateRenderer, build_variables};
use crate::types::{Campaign, Channel, ExecutionOptions, MessageTemplate, Vendor, VendorId};

use super::targeting::recipient;

/// Render `template` for every vendor reachable on its channel
pub(super) fn build_jobs(
    renderer: &TemplateRenderer,
    template: &MessageTemplate,
    campaign: &Campaign,
    vendors: &[Vendor],
    options: &ExecutionOptions,
    country_code: &str,
) -> Vec<SendJob> {
    let channel = template.channel;

    vendors
        .iter()
        .filter_map(|vendor| {
            let recipient = recipient(vendor, channel, country_code)?;
            let variables = build_variables(vendor, Some(campaign), &options.variables);
            let render = |content: &str| renderer.render(content, &variables);

            let (subject, html_body, attachments) = match channel {
                Channel::Email => (
                    template.subject.as_deref().map(render),
                    template.html_body.as_deref().map(render),
                    options.attachments.clone(),
                ),
                Channel::Messaging => (None, None, Vec::new()),
            };

            Some(SendJob {
                vendor_id: vendor.id,
                recipient,
                display_name: display_name(vendor),
                subject,
                body: render(&template.body),
                html_body,
                attachments,
            })
        })
        .collect()
}

/// `(vendor, address)` pairs reachable on `channel`
pub(super) fn recipients(vendors: &[Vendor], channel: Channel, country_code: &str) -> Vec<(VendorId, String)> {
    vendors
        .iter()
        .filter_map(|vendor| recipient(vendor, channel, country_code).map(|r| (vendor.id, r)))
        .collect()
}

fn display_name(vendor: &Vendor) -> String {
    [vendor.contact_person.as_deref(), vendor.company_name.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|name| !name.is_empty())
        .unwrap_or(&vendor.name)
        .to_string()
}

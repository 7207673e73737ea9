use super::jobs::{build_jobs, recipients};
use super::targeting::{ChannelPlan, planned_channels, recipient};
use crate::template::TemplateRenderer;
use crate::types::{
    Campaign, CampaignId, CampaignStatus, Channel, ExecutionOptions, MessageTemplate, TargetSpec,
    TemplateId, Vendor,
};
use chrono::{TimeZone, Utc};
use std::path::PathBuf;

fn campaign(email: Option<TemplateId>, messaging: Option<TemplateId>) -> Campaign {
    Campaign {
        id: CampaignId::new(),
        name: "Capacity survey".to_string(),
        description: None,
        status: CampaignStatus::Draft,
        email_template_id: email,
        messaging_template_id: messaging,
        target: TargetSpec::default(),
        deadline: Utc.with_ymd_and_hms(2026, 11, 30, 0, 0, 0).single(),
        owner: None,
        created_at: Utc::now(),
        updated_at: None,
    }
}

fn vendor(email: Option<&str>, phone: Option<&str>, whatsapp: Option<&str>) -> Vendor {
    Vendor {
        name: "Anand Weaves".to_string(),
        code: "V1".to_string(),
        email: email.map(str::to_string),
        phone: phone.map(str::to_string),
        whatsapp: whatsapp.map(str::to_string),
        ..Vendor::default()
    }
}

fn template(channel: Channel) -> MessageTemplate {
    MessageTemplate {
        id: TemplateId::new(),
        channel,
        name: "t".to_string(),
        subject: Some("{{campaign_name}}: {vendor_name}".to_string()),
        body: "Reply by {{deadline}}, {{contact_person}}".to_string(),
        html_body: Some("<b>{{vendor_name}}</b>".to_string()),
        variables: Vec::new(),
        owner: None,
    }
}

#[test]
fn planned_channels_need_option_and_template() {
    let email = TemplateId::new();
    let messaging = TemplateId::new();

    let both = campaign(Some(email), Some(messaging));
    assert_eq!(
        planned_channels(&both, &ExecutionOptions::default()),
        vec![
            ChannelPlan {
                channel: Channel::Email,
                template_id: email
            },
            ChannelPlan {
                channel: Channel::Messaging,
                template_id: messaging
            },
        ]
    );

    let email_disabled = ExecutionOptions {
        send_email: false,
        ..ExecutionOptions::default()
    };
    assert_eq!(planned_channels(&both, &email_disabled).len(), 1);

    let email_only = campaign(Some(email), None);
    let planned = planned_channels(&email_only, &ExecutionOptions::default());
    assert_eq!(planned.len(), 1);
    assert_eq!(planned[0].channel, Channel::Email);
}

#[test]
fn recipient_requires_usable_address() {
    let v = vendor(Some("  buyer@anand.in "), Some("123"), None);
    assert_eq!(
        recipient(&v, Channel::Email, "91").as_deref(),
        Some("buyer@anand.in")
    );
    assert_eq!(recipient(&v, Channel::Messaging, "91"), None);

    let v = vendor(Some("no-at-sign"), Some("9876543210"), Some("+91 98250 12345"));
    assert_eq!(recipient(&v, Channel::Email, "91"), None);
    assert_eq!(
        recipient(&v, Channel::Messaging, "91").as_deref(),
        Some("+91 98250 12345")
    );
}

#[test]
fn email_jobs_render_subject_body_html_and_attachments() {
    let renderer = TemplateRenderer::new().unwrap();
    let vendors = vec![
        Vendor {
            contact_person: Some("Priya".to_string()),
            ..vendor(Some("priya@anand.in"), None, None)
        },
        vendor(None, Some("9876543210"), None),
    ];
    let options = ExecutionOptions {
        attachments: vec![PathBuf::from("/tmp/brochure.pdf")],
        ..ExecutionOptions::default()
    };

    let jobs = build_jobs(
        &renderer,
        &template(Channel::Email),
        &campaign(None, None),
        &vendors,
        &options,
        "91",
    );

    assert_eq!(jobs.len(), 1);
    let job = &jobs[0];
    assert_eq!(job.recipient, "priya@anand.in");
    assert_eq!(job.display_name, "Priya");
    assert_eq!(job.subject.as_deref(), Some("Capacity survey: Anand Weaves"));
    assert_eq!(job.body, "Reply by 2026-11-30, Priya");
    assert_eq!(job.html_body.as_deref(), Some("<b>Anand Weaves</b>"));
    assert_eq!(job.attachments, vec![PathBuf::from("/tmp/brochure.pdf")]);
}

#[test]
fn messaging_jobs_carry_no_subject_or_attachments() {
    let renderer = TemplateRenderer::new().unwrap();
    let vendors = vec![vendor(None, Some("98765 43210"), None)];
    let options = ExecutionOptions {
        attachments: vec![PathBuf::from("/tmp/brochure.pdf")],
        ..ExecutionOptions::default()
    };

    let jobs = build_jobs(
        &renderer,
        &template(Channel::Messaging),
        &campaign(None, None),
        &vendors,
        &options,
        "91",
    );

    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].recipient, "98765 43210");
    assert_eq!(jobs[0].display_name, "Anand Weaves");
    assert!(jobs[0].subject.is_none());
    assert!(jobs[0].html_body.is_none());
    assert!(jobs[0].attachments.is_empty());
}

#[test]
fn recipients_skip_unreachable_vendors() {
    let reachable = vendor(Some("a@b.in"), None, None);
    let unreachable = vendor(None, None, None);
    let list = recipients(&[reachable.clone(), unreachable], Channel::Email, "91");
    assert_eq!(list, vec![(reachable.id, "a@b.in".to_string())]);
}

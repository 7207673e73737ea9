//! Common test utilities for outreach-engine integration tests

use outreach_engine::{
    BatchPolicy, CampaignEngine, CampaignId, Channel, Config, Database, Event, MessageTemplate,
    NewCampaign, TargetSpec, TemplateId, Vendor, VendorId,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast::Receiver;

/// Engine with unconfigured (simulated) channels over a temp database
pub struct Harness {
    pub engine: CampaignEngine,
    pub db: Arc<Database>,
    _dir: TempDir,
}

/// Default configuration with pacing removed and the database inside `dir`
pub fn fast_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = dir.path().join("outreach.db");
    for policy in [&mut config.dispatch.email, &mut config.dispatch.messaging] {
        *policy = BatchPolicy {
            inter_batch_delay: Duration::ZERO,
            intra_batch_delay: Duration::ZERO,
            ..policy.clone()
        };
    }
    config
}

pub async fn harness() -> Harness {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = fast_config(&dir);
    let db = Arc::new(
        Database::new(&config.persistence.database_path)
            .await
            .expect("Failed to open database"),
    );
    let engine =
        CampaignEngine::with_database(config, Arc::clone(&db)).expect("Failed to build engine");

    Harness {
        engine,
        db,
        _dir: dir,
    }
}

pub async fn add_vendor(db: &Database, name: &str, code: &str, region: &str) -> VendorId {
    db.insert_vendor(&Vendor {
        name: name.to_string(),
        code: code.to_string(),
        contact_person: Some(format!("{name} Owner")),
        email: Some(format!("{}@vendors.test", code.to_lowercase())),
        whatsapp: Some("9825012345".to_string()),
        industry: Some("Engineering".to_string()),
        region: Some(region.to_string()),
        ..Vendor::default()
    })
    .await
    .expect("Failed to insert vendor")
}

pub async fn add_template(db: &Database, channel: Channel) -> TemplateId {
    db.insert_template(&MessageTemplate {
        id: TemplateId::new(),
        channel,
        name: format!("{channel} invitation"),
        subject: (channel == Channel::Email).then(|| "{{campaign_name}}".to_string()),
        body: "Hello {{contact_person}} of {vendor_name}".to_string(),
        html_body: None,
        variables: Vec::new(),
        owner: Some("ops".to_string()),
    })
    .await
    .expect("Failed to insert template")
}

pub async fn add_campaign(
    db: &Database,
    target: TargetSpec,
    email: Option<TemplateId>,
    messaging: Option<TemplateId>,
) -> CampaignId {
    db.insert_campaign(&NewCampaign {
        name: "Capacity survey".to_string(),
        email_template_id: email,
        messaging_template_id: messaging,
        target,
        ..NewCampaign::default()
    })
    .await
    .expect("Failed to insert campaign")
}

/// Collect events until one matches `stop` or `timeout` elapses
pub async fn collect_events_until<F>(
    events: &mut Receiver<Event>,
    timeout: Duration,
    stop: F,
) -> Vec<Event>
where
    F: Fn(&Event) -> bool,
{
    let mut collected = Vec::new();
    let _ = tokio::time::timeout(timeout, async {
        while let Ok(event) = events.recv().await {
            let done = stop(&event);
            collected.push(event);
            if done {
                break;
            }
        }
    })
    .await;
    collected
}

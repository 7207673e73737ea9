//! Shared test helpers for creating CampaignEngine instances in tests.

use crate::channels::{ChannelClient, SendError};
use crate::config::{BatchPolicy, Config};
use crate::db::{Database, NewCampaign};
use crate::dispatch::SendJob;
use crate::engine::CampaignEngine;
use crate::types::{CampaignId, Channel, MessageTemplate, TargetSpec, TemplateId, Vendor, VendorId};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Channel client double that records every job and fails listed recipients
pub(crate) struct ScriptedClient {
    channel: Channel,
    fail: HashSet<String>,
    delay: Duration,
    panic: bool,
    sent: Mutex<Vec<SendJob>>,
}

impl ScriptedClient {
    pub(crate) fn new(channel: Channel) -> Self {
        Self {
            channel,
            fail: HashSet::new(),
            delay: Duration::ZERO,
            panic: false,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Client whose every send panics after recording the job
    pub(crate) fn panicking(channel: Channel) -> Self {
        Self {
            panic: true,
            ..Self::new(channel)
        }
    }

    pub(crate) fn failing(channel: Channel, recipients: &[&str]) -> Self {
        Self {
            fail: recipients.iter().map(|r| r.to_string()).collect(),
            ..Self::new(channel)
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every job this client was asked to send, in call order
    pub(crate) fn jobs(&self) -> Vec<SendJob> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelClient for ScriptedClient {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, job: &SendJob) -> Result<(), SendError> {
        self.sent.lock().unwrap().push(job.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.panic {
            panic!("send to {} blew up", job.recipient);
        }
        if self.fail.contains(&job.recipient) {
            Err(SendError::Smtp {
                code: 550,
                message: "mailbox unavailable".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

/// Engine over a temp database with scripted channel clients
pub(crate) struct TestEngine {
    pub(crate) engine: CampaignEngine,
    pub(crate) db: Arc<Database>,
    pub(crate) email: Arc<ScriptedClient>,
    pub(crate) messaging: Arc<ScriptedClient>,
    _dir: TempDir,
}

/// Config without pacing delays, database inside `dir`
pub(crate) fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = dir.path().join("test.db");
    config.dispatch.email = BatchPolicy {
        inter_batch_delay: Duration::ZERO,
        intra_batch_delay: Duration::ZERO,
        ..BatchPolicy::email()
    };
    config.dispatch.messaging = BatchPolicy {
        inter_batch_delay: Duration::ZERO,
        intra_batch_delay: Duration::ZERO,
        ..BatchPolicy::messaging()
    };
    config.shutdown_timeout = Duration::from_secs(5);
    config
}

pub(crate) async fn create_test_engine() -> TestEngine {
    create_test_engine_with(
        ScriptedClient::new(Channel::Email),
        ScriptedClient::new(Channel::Messaging),
    )
    .await
}

pub(crate) async fn create_test_engine_with(
    email: ScriptedClient,
    messaging: ScriptedClient,
) -> TestEngine {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);
    let db = Arc::new(
        Database::new(&config.persistence.database_path)
            .await
            .unwrap(),
    );
    let email = Arc::new(email);
    let messaging = Arc::new(messaging);

    let engine =
        CampaignEngine::with_components(config, db.clone(), email.clone(), messaging.clone())
            .unwrap();

    TestEngine {
        engine,
        db,
        email,
        messaging,
        _dir: dir,
    }
}

/// Insert a vendor with an email address and an Indian mobile number
pub(crate) async fn seed_vendor(db: &Database, name: &str, code: &str) -> Vendor {
    let vendor = Vendor {
        id: VendorId::new(),
        name: name.to_string(),
        code: code.to_string(),
        contact_person: Some(format!("{name} Contact")),
        email: Some(format!("{}@example.com", code.to_lowercase())),
        phone: Some("98765 43210".to_string()),
        industry: Some("Textiles".to_string()),
        region: Some("Gujarat".to_string()),
        size_class: Some("Small".to_string()),
        ..Vendor::default()
    };
    db.insert_vendor(&vendor).await.unwrap();
    vendor
}

pub(crate) async fn seed_template(db: &Database, channel: Channel) -> TemplateId {
    let (subject, body) = match channel {
        Channel::Email => (
            Some("{{campaign_name}} for {{vendor_name}}".to_string()),
            "Dear {contact_person}, please respond by {{deadline}}.".to_string(),
        ),
        Channel::Messaging => (None, "Hi {vendor_name}, see your email.".to_string()),
    };
    let template = MessageTemplate {
        id: TemplateId::new(),
        channel,
        name: format!("{channel} template"),
        subject,
        body,
        html_body: None,
        variables: Vec::new(),
        owner: None,
    };
    db.insert_template(&template).await.unwrap()
}

pub(crate) async fn seed_campaign(
    db: &Database,
    target: TargetSpec,
    email_template_id: Option<TemplateId>,
    messaging_template_id: Option<TemplateId>,
) -> CampaignId {
    db.insert_campaign(&NewCampaign {
        name: "Supplier survey".to_string(),
        email_template_id,
        messaging_template_id,
        target,
        ..NewCampaign::default()
    })
    .await
    .unwrap()
}

/// Wait for a spawned execution to release its campaign
pub(crate) async fn wait_until_idle(engine: &CampaignEngine, campaign_id: CampaignId) {
    for _ in 0..500 {
        if !engine.is_running(campaign_id) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("execution of {campaign_id} did not finish");
}

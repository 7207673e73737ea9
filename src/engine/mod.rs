//! Campaign execution engine split into focused submodules.
//!
//! The `CampaignEngine` struct and its methods are organized by domain:
//! - [`control`] - Start, cancel and progress queries
//! - [`lifecycle`] - Shutdown coordination
//! - [`execution`] - Target resolution, job building, dispatch and final status

mod control;
mod execution;
mod lifecycle;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use execution::{ExecutionOutcome, ExecutionReport};

use crate::channels::{ChannelClient, Mailer, Messenger};
use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, ExecutionError, Result};
use crate::store::RecordStore;
use crate::template::TemplateRenderer;
use crate::types::{CampaignId, Channel, Event};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

/// Delivery clients, one per channel
#[derive(Clone)]
pub(crate) struct ChannelClients {
    /// Email channel client
    pub(crate) email: Arc<dyn ChannelClient>,
    /// Messaging channel client
    pub(crate) messaging: Arc<dyn ChannelClient>,
}

impl ChannelClients {
    pub(crate) fn get(&self, channel: Channel) -> &Arc<dyn ChannelClient> {
        match channel {
            Channel::Email => &self.email,
            Channel::Messaging => &self.messaging,
        }
    }
}

/// Running-execution bookkeeping
#[derive(Clone)]
pub(crate) struct ExecutionState {
    /// Campaigns with an in-flight execution and their cancellation tokens
    pub(crate) running: Arc<Mutex<HashMap<CampaignId, CancellationToken>>>,
    /// Flag to indicate whether new executions are accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
}

/// Holds a campaign's single-flight slot; releases it on drop
pub(crate) struct RunningGuard {
    campaign_id: CampaignId,
    token: CancellationToken,
    running: Arc<Mutex<HashMap<CampaignId, CancellationToken>>>,
}

impl RunningGuard {
    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.campaign_id);
    }
}

/// Campaign execution engine (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct CampaignEngine {
    /// Record store for campaigns, vendors, templates and responses
    pub(crate) store: Arc<dyn RecordStore>,
    /// Delivery clients
    pub(crate) clients: ChannelClients,
    /// Template renderer shared by both channels
    pub(crate) renderer: Arc<TemplateRenderer>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Running-execution bookkeeping
    pub(crate) executions: ExecutionState,
}

impl CampaignEngine {
    /// Create an engine backed by the SQLite database at `config.persistence.database_path`
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let db = Database::new(&config.persistence.database_path).await?;
        Self::with_database(config, Arc::new(db))
    }

    /// Create an engine on an already-open database, building channel clients from `config`
    pub fn with_database(config: Config, db: Arc<Database>) -> Result<Self> {
        let simulate = config.simulate_when_unconfigured;
        let mailer = Mailer::new(config.mail.clone(), simulate);
        let messenger = Messenger::new(config.messaging.clone(), simulate)?;

        tracing::info!(
            email_configured = config.mail.has_credentials(),
            messaging_configured = config.messaging.has_credentials(),
            simulate_when_unconfigured = simulate,
            "Channel clients initialized"
        );

        Self::with_components(config, db, Arc::new(mailer), Arc::new(messenger))
    }

    /// Create an engine from explicit collaborators
    pub fn with_components(
        config: Config,
        store: Arc<dyn RecordStore>,
        email: Arc<dyn ChannelClient>,
        messaging: Arc<dyn ChannelClient>,
    ) -> Result<Self> {
        if email.channel() != Channel::Email || messaging.channel() != Channel::Messaging {
            return Err(Error::Channel(
                "channel clients were passed in the wrong slots".to_string(),
            ));
        }

        // Buffer of 1000 events per subscriber
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        Ok(Self {
            store,
            clients: ChannelClients { email, messaging },
            renderer: Arc::new(TemplateRenderer::new()?),
            config: Arc::new(config),
            event_tx,
            executions: ExecutionState {
                running: Arc::new(Mutex::new(HashMap::new())),
                accepting_new: Arc::new(AtomicBool::new(true)),
            },
        })
    }

    /// Subscribe to engine events
    ///
    /// Each subscriber receives all events independently. A subscriber that
    /// falls more than 1000 events behind receives `RecvError::Lagged`.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Template renderer used for executions
    pub fn renderer(&self) -> &TemplateRenderer {
        &self.renderer
    }

    /// Emit an event to all subscribers; dropped silently when nobody listens
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    pub(crate) fn is_accepting(&self) -> bool {
        self.executions.accepting_new.load(Ordering::SeqCst)
    }

    /// Take the single-flight slot for a campaign
    pub(crate) fn claim(&self, campaign_id: CampaignId) -> Result<RunningGuard> {
        let mut running = self
            .executions
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if running.contains_key(&campaign_id) {
            return Err(Error::Execution(ExecutionError::AlreadyRunning {
                id: campaign_id,
            }));
        }

        let token = CancellationToken::new();
        running.insert(campaign_id, token.clone());

        Ok(RunningGuard {
            campaign_id,
            token,
            running: Arc::clone(&self.executions.running),
        })
    }

    pub(crate) fn running_count(&self) -> usize {
        self.executions
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

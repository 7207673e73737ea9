//! State shared by the phases of one execution.

use crate::config::{BatchPolicy, Config};
use crate::store::RecordStore;
use crate::template::TemplateRenderer;
use crate::types::{CampaignId, Channel, Event, ExecutionOptions, TaskId};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::super::{CampaignEngine, ChannelClients};

/// Everything one execution needs, cloned out of the engine
pub(crate) struct ExecutionContext {
    pub(crate) campaign_id: CampaignId,
    pub(crate) task_id: TaskId,
    pub(crate) options: ExecutionOptions,
    pub(crate) cancel: CancellationToken,
    pub(crate) store: Arc<dyn RecordStore>,
    pub(crate) clients: ChannelClients,
    pub(crate) renderer: Arc<TemplateRenderer>,
    pub(crate) config: Arc<Config>,
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
}

impl ExecutionContext {
    pub(crate) fn new(
        engine: &CampaignEngine,
        cancel: CancellationToken,
        campaign_id: CampaignId,
        task_id: TaskId,
        options: ExecutionOptions,
    ) -> Self {
        Self {
            campaign_id,
            task_id,
            options,
            cancel,
            store: Arc::clone(&engine.store),
            clients: engine.clients.clone(),
            renderer: Arc::clone(&engine.renderer),
            config: Arc::clone(&engine.config),
            event_tx: engine.event_tx.clone(),
        }
    }

    pub(crate) fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Channel policy with the caller's batch size applied
    pub(crate) fn policy(&self, channel: Channel) -> BatchPolicy {
        let policy = match channel {
            Channel::Email => self.config.dispatch.email.clone(),
            Channel::Messaging => self.config.dispatch.messaging.clone(),
        };
        match self.options.batch_size {
            Some(size) => policy.with_batch_size(size),
            None => policy,
        }
    }

    pub(crate) fn country_code(&self) -> &str {
        &self.config.messaging.default_country_code
    }
}

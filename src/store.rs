//! Record store interface consumed by the execution engine
//!
//! The engine reads campaigns, vendors and templates and writes response
//! rows and campaign status only through [`RecordStore`]. [`Database`] is the
//! SQLite implementation; tests substitute their own.

use crate::db::Database;
use crate::types::{
    Campaign, CampaignId, CampaignStatus, Channel, FilterCriterion, MessageTemplate,
    ResponseCounts, TemplateId, Vendor, VendorId,
};
use crate::Result;
use async_trait::async_trait;

/// Persistence operations the engine depends on
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Load a campaign
    async fn get_campaign(&self, id: CampaignId) -> Result<Option<Campaign>>;

    /// Vendors matching every criterion (all vendors for an empty list)
    async fn list_vendors(&self, criteria: &[FilterCriterion]) -> Result<Vec<Vendor>>;

    /// Vendors with the given ids; unknown ids are skipped
    async fn get_vendors_by_ids(&self, ids: &[VendorId]) -> Result<Vec<Vendor>>;

    /// Load a template written for `channel`
    async fn get_template(&self, id: TemplateId, channel: Channel) -> Result<Option<MessageTemplate>>;

    /// Create one Pending response per vendor, all or nothing
    async fn create_responses(&self, campaign_id: CampaignId, vendor_ids: &[VendorId]) -> Result<()>;

    /// Set a campaign's status
    async fn set_campaign_status(&self, id: CampaignId, status: CampaignStatus) -> Result<()>;

    /// Record that `channel` delivered to these vendors
    async fn mark_delivered(
        &self,
        campaign_id: CampaignId,
        channel: Channel,
        vendor_ids: &[VendorId],
    ) -> Result<()>;

    /// Aggregate a campaign's response rows
    async fn response_counts(&self, campaign_id: CampaignId) -> Result<ResponseCounts>;
}

#[async_trait]
impl RecordStore for Database {
    async fn get_campaign(&self, id: CampaignId) -> Result<Option<Campaign>> {
        Database::get_campaign(self, id).await
    }

    async fn list_vendors(&self, criteria: &[FilterCriterion]) -> Result<Vec<Vendor>> {
        Database::list_vendors(self, criteria).await
    }

    async fn get_vendors_by_ids(&self, ids: &[VendorId]) -> Result<Vec<Vendor>> {
        Database::get_vendors_by_ids(self, ids).await
    }

    async fn get_template(&self, id: TemplateId, channel: Channel) -> Result<Option<MessageTemplate>> {
        Database::get_template(self, id, channel).await
    }

    async fn create_responses(&self, campaign_id: CampaignId, vendor_ids: &[VendorId]) -> Result<()> {
        Database::create_responses(self, campaign_id, vendor_ids).await
    }

    async fn set_campaign_status(&self, id: CampaignId, status: CampaignStatus) -> Result<()> {
        Database::set_campaign_status(self, id, status).await
    }

    async fn mark_delivered(
        &self,
        campaign_id: CampaignId,
        channel: Channel,
        vendor_ids: &[VendorId],
    ) -> Result<()> {
        Database::mark_delivered(self, campaign_id, channel, vendor_ids).await
    }

    async fn response_counts(&self, campaign_id: CampaignId) -> Result<ResponseCounts> {
        Database::response_counts(self, campaign_id).await
    }
}

//! Campaign CRUD and status updates.

use crate::error::DatabaseError;
use crate::types::{Campaign, CampaignId, CampaignStatus};
use crate::{Error, Result};

use super::{CampaignRow, Database, NewCampaign};

impl Database {
    /// Insert a new campaign in Draft status
    pub async fn insert_campaign(&self, campaign: &NewCampaign) -> Result<CampaignId> {
        let id = CampaignId::new();
        let now = chrono::Utc::now().timestamp();
        let target = serde_json::to_string(&campaign.target)?;

        sqlx::query(
            r#"
            INSERT INTO campaigns (
                id, name, description, status, email_template_id,
                messaging_template_id, target, deadline, owner, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(&campaign.name)
        .bind(&campaign.description)
        .bind(CampaignStatus::Draft.as_str())
        .bind(campaign.email_template_id)
        .bind(campaign.messaging_template_id)
        .bind(target)
        .bind(campaign.deadline.map(|d| d.timestamp()))
        .bind(&campaign.owner)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert campaign: {}",
                e
            )))
        })?;

        Ok(id)
    }

    /// Get a campaign by ID
    pub async fn get_campaign(&self, id: CampaignId) -> Result<Option<Campaign>> {
        let row = sqlx::query_as::<_, CampaignRow>(
            r#"
            SELECT
                id, name, description, status, email_template_id,
                messaging_template_id, target, deadline, owner,
                created_at, updated_at
            FROM campaigns
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get campaign: {}",
                e
            )))
        })?;

        Ok(row.map(Campaign::try_from).transpose()?)
    }

    /// Set a campaign's status
    ///
    /// Returns `DatabaseError::NotFound` when no campaign has this id.
    pub async fn set_campaign_status(&self, id: CampaignId, status: CampaignStatus) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query("UPDATE campaigns SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to update campaign status: {}",
                    e
                )))
            })?;

        if result.rows_affected() == 0 {
            return Err(Error::Database(DatabaseError::NotFound(format!(
                "campaign {id}"
            ))));
        }

        Ok(())
    }
}

//! Per-vendor response rows and progress aggregates.

use crate::error::DatabaseError;
use crate::types::{
    CampaignId, Channel, ResponseCounts, ResponseId, ResponseStatus, VendorId, VendorResponse,
};
use crate::{Error, Result};
use sqlx::{QueryBuilder, Sqlite};

use super::{Database, ResponseRow};

// 5 bind variables per row, SQLite's default limit is 999
const MAX_ROWS_PER_INSERT: usize = 190;
const MAX_IDS_PER_UPDATE: usize = 500;

impl Database {
    /// Create one Pending response row per vendor
    ///
    /// All rows are written in a single transaction: either every vendor
    /// gets a row or none does. A vendor that already has a row for this
    /// campaign fails the whole call with `ConstraintViolation`.
    pub async fn create_responses(&self, campaign_id: CampaignId, vendor_ids: &[VendorId]) -> Result<()> {
        if vendor_ids.is_empty() {
            return Ok(());
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        for chunk in vendor_ids.chunks(MAX_ROWS_PER_INSERT) {
            let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO vendor_responses (id, campaign_id, vendor_id, response_status, created_at) ",
            );
            query.push_values(chunk, |mut b, vendor_id| {
                b.push_bind(ResponseId::new())
                    .push_bind(campaign_id)
                    .push_bind(*vendor_id)
                    .push_bind(ResponseStatus::Pending.as_str())
                    .push_bind(now);
            });

            query.build().execute(&mut *tx).await.map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    Error::Database(DatabaseError::ConstraintViolation(format!(
                        "campaign {} already has response records for some vendors",
                        campaign_id
                    )))
                }
                e => Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to create responses: {}",
                    e
                ))),
            })?;
        }

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to commit responses: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Record that `channel` delivered to these vendors
    pub async fn mark_delivered(
        &self,
        campaign_id: CampaignId,
        channel: Channel,
        vendor_ids: &[VendorId],
    ) -> Result<()> {
        if vendor_ids.is_empty() {
            return Ok(());
        }

        let column = match channel {
            Channel::Email => "email_sent_at",
            Channel::Messaging => "messaging_sent_at",
        };
        let now = chrono::Utc::now().timestamp();

        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        for chunk in vendor_ids.chunks(MAX_IDS_PER_UPDATE) {
            let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE vendor_responses SET ");
            query.push(column);
            query.push(" = ");
            query.push_bind(now);
            query.push(" WHERE campaign_id = ");
            query.push_bind(campaign_id);
            query.push(" AND vendor_id IN (");
            let mut separated = query.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");

            query.build().execute(&mut *tx).await.map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to mark {} deliveries: {}",
                    channel, e
                )))
            })?;
        }

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to commit deliveries: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Aggregate a campaign's response rows
    pub async fn response_counts(&self, campaign_id: CampaignId) -> Result<ResponseCounts> {
        let row: (i64, i64, i64, i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN response_status = 'Pending' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN response_status = 'Completed' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN response_status = 'Partial' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN response_status = 'Failed' THEN 1 ELSE 0 END), 0),
                COUNT(email_sent_at),
                COUNT(messaging_sent_at)
            FROM vendor_responses
            WHERE campaign_id = ?
            "#,
        )
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to count responses: {}",
                e
            )))
        })?;

        let (total, pending, completed, partial, failed, email_sent, messaging_sent) = row;
        Ok(ResponseCounts {
            total: total.max(0) as u64,
            pending: pending.max(0) as u64,
            completed: completed.max(0) as u64,
            partial: partial.max(0) as u64,
            failed: failed.max(0) as u64,
            email_sent: email_sent.max(0) as u64,
            messaging_sent: messaging_sent.max(0) as u64,
        })
    }

    /// List a campaign's response rows, oldest first
    pub async fn list_responses(&self, campaign_id: CampaignId) -> Result<Vec<VendorResponse>> {
        let rows = sqlx::query_as::<_, ResponseRow>(
            r#"
            SELECT id, campaign_id, vendor_id, response_status,
                   email_sent_at, messaging_sent_at, created_at
            FROM vendor_responses
            WHERE campaign_id = ?
            ORDER BY created_at, rowid
            "#,
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list responses: {}",
                e
            )))
        })?;

        rows.into_iter()
            .map(|row| VendorResponse::try_from(row).map_err(Error::Database))
            .collect()
    }

    /// Set a single response's status
    pub async fn set_response_status(
        &self,
        campaign_id: CampaignId,
        vendor_id: VendorId,
        status: ResponseStatus,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE vendor_responses SET response_status = ? WHERE campaign_id = ? AND vendor_id = ?",
        )
        .bind(status.as_str())
        .bind(campaign_id)
        .bind(vendor_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to update response status: {}",
                e
            )))
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::Database(DatabaseError::NotFound(format!(
                "response for vendor {vendor_id} in campaign {campaign_id}"
            ))));
        }

        Ok(())
    }
}

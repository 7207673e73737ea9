//! Database layer for outreach-engine
//!
//! Handles SQLite persistence for campaigns, vendors, templates and vendor
//! response tracking.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`campaigns`] - Campaign CRUD and status updates
//! - [`vendors`] - Vendor inserts, filtering and id lookups
//! - [`templates`] - Email and messaging templates
//! - [`responses`] - Per-vendor response rows and progress aggregates

use crate::error::DatabaseError;
use crate::types::{
    Campaign, CampaignId, CampaignStatus, Channel, MessageTemplate, ResponseId, ResponseStatus,
    TargetSpec, TemplateId, Vendor, VendorId, VendorResponse,
};
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{FromRow, sqlite::SqlitePool};

mod campaigns;
mod migrations;
mod responses;
mod templates;
mod vendors;

/// New campaign to be inserted into the database (status starts as Draft)
#[derive(Debug, Clone, Default)]
pub struct NewCampaign {
    /// Display name
    pub name: String,
    /// Free-form description
    pub description: Option<String>,
    /// Email template reference
    pub email_template_id: Option<TemplateId>,
    /// Messaging template reference
    pub messaging_template_id: Option<TemplateId>,
    /// Target vendor selection
    pub target: TargetSpec,
    /// Response deadline
    pub deadline: Option<DateTime<Utc>>,
    /// Owner identifier
    pub owner: Option<String>,
}

/// Campaign record from database
#[derive(Debug, Clone, FromRow)]
pub struct CampaignRow {
    /// Campaign id
    pub id: CampaignId,
    /// Display name
    pub name: String,
    /// Description
    pub description: Option<String>,
    /// Status name ("Draft", "Active", ...)
    pub status: String,
    /// Email template reference
    pub email_template_id: Option<TemplateId>,
    /// Messaging template reference
    pub messaging_template_id: Option<TemplateId>,
    /// JSON-encoded [`TargetSpec`]
    pub target: String,
    /// Unix timestamp of the deadline
    pub deadline: Option<i64>,
    /// Owner identifier
    pub owner: Option<String>,
    /// Unix timestamp when created
    pub created_at: i64,
    /// Unix timestamp of the last update
    pub updated_at: Option<i64>,
}

impl TryFrom<CampaignRow> for Campaign {
    type Error = DatabaseError;

    fn try_from(row: CampaignRow) -> Result<Self, Self::Error> {
        let status = CampaignStatus::parse(&row.status).ok_or_else(|| {
            DatabaseError::CorruptRecord(format!(
                "campaign {} has unknown status '{}'",
                row.id, row.status
            ))
        })?;
        let target: TargetSpec = serde_json::from_str(&row.target).map_err(|e| {
            DatabaseError::CorruptRecord(format!("campaign {} has invalid target: {e}", row.id))
        })?;

        Ok(Campaign {
            id: row.id,
            name: row.name,
            description: row.description,
            status,
            email_template_id: row.email_template_id,
            messaging_template_id: row.messaging_template_id,
            target,
            deadline: row.deadline.map(timestamp),
            owner: row.owner,
            created_at: timestamp(row.created_at),
            updated_at: row.updated_at.map(timestamp),
        })
    }
}

/// Vendor record from database
#[derive(Debug, Clone, FromRow)]
pub struct VendorRow {
    /// Vendor id
    pub id: VendorId,
    /// Vendor name
    pub name: String,
    /// Unique vendor code
    pub code: String,
    /// Company name
    pub company_name: Option<String>,
    /// Contact person
    pub contact_person: Option<String>,
    /// Email address
    pub email: Option<String>,
    /// Phone number
    pub phone: Option<String>,
    /// WhatsApp number
    pub whatsapp: Option<String>,
    /// Industry
    pub industry: Option<String>,
    /// Region / state
    pub region: Option<String>,
    /// Size classification
    pub size_class: Option<String>,
}

impl From<VendorRow> for Vendor {
    fn from(row: VendorRow) -> Self {
        Vendor {
            id: row.id,
            name: row.name,
            code: row.code,
            company_name: row.company_name,
            contact_person: row.contact_person,
            email: row.email,
            phone: row.phone,
            whatsapp: row.whatsapp,
            industry: row.industry,
            region: row.region,
            size_class: row.size_class,
        }
    }
}

/// Template record from database
#[derive(Debug, Clone, FromRow)]
pub struct TemplateRow {
    /// Template id
    pub id: TemplateId,
    /// Channel name ("email" or "messaging")
    pub channel: String,
    /// Display name
    pub name: String,
    /// Subject line
    pub subject: Option<String>,
    /// Body
    pub body: String,
    /// HTML body
    pub html_body: Option<String>,
    /// JSON array of declared variable names
    pub variables: String,
    /// Owner identifier
    pub owner: Option<String>,
}

impl TryFrom<TemplateRow> for MessageTemplate {
    type Error = DatabaseError;

    fn try_from(row: TemplateRow) -> Result<Self, Self::Error> {
        let channel = Channel::parse(&row.channel).ok_or_else(|| {
            DatabaseError::CorruptRecord(format!(
                "template {} has unknown channel '{}'",
                row.id, row.channel
            ))
        })?;
        let variables: Vec<String> = serde_json::from_str(&row.variables).map_err(|e| {
            DatabaseError::CorruptRecord(format!("template {} has invalid variables: {e}", row.id))
        })?;

        Ok(MessageTemplate {
            id: row.id,
            channel,
            name: row.name,
            subject: row.subject,
            body: row.body,
            html_body: row.html_body,
            variables,
            owner: row.owner,
        })
    }
}

/// Vendor response record from database
#[derive(Debug, Clone, FromRow)]
pub struct ResponseRow {
    /// Response id
    pub id: ResponseId,
    /// Campaign id
    pub campaign_id: CampaignId,
    /// Vendor id
    pub vendor_id: VendorId,
    /// Status name ("Pending", "Completed", ...)
    pub response_status: String,
    /// Unix timestamp of email delivery
    pub email_sent_at: Option<i64>,
    /// Unix timestamp of messaging delivery
    pub messaging_sent_at: Option<i64>,
    /// Unix timestamp when created
    pub created_at: i64,
}

impl TryFrom<ResponseRow> for VendorResponse {
    type Error = DatabaseError;

    fn try_from(row: ResponseRow) -> Result<Self, Self::Error> {
        let response_status = ResponseStatus::parse(&row.response_status).ok_or_else(|| {
            DatabaseError::CorruptRecord(format!(
                "response {} has unknown status '{}'",
                row.id, row.response_status
            ))
        })?;

        Ok(VendorResponse {
            id: row.id,
            campaign_id: row.campaign_id,
            vendor_id: row.vendor_id,
            response_status,
            email_sent_at: row.email_sent_at.map(timestamp),
            messaging_sent_at: row.messaging_sent_at.map(timestamp),
            created_at: timestamp(row.created_at),
        })
    }
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now)
}

/// Database handle for outreach-engine
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

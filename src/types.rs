//! Core types for outreach-engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

/// Declares a UUID-backed identifier newtype with display/parse and sqlx support.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Get the inner UUID value
            pub fn get(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl sqlx::Type<sqlx::Sqlite> for $name {
            fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
                <Uuid as sqlx::Type<sqlx::Sqlite>>::type_info()
            }

            fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
                <Uuid as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
            ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
                sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for $name {
            fn decode(
                value: sqlx::sqlite::SqliteValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let id = <Uuid as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
                Ok(Self(id))
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a campaign
    CampaignId
);
uuid_id!(
    /// Unique identifier for a vendor
    VendorId
);
uuid_id!(
    /// Unique identifier for a message template
    TemplateId
);
uuid_id!(
    /// Unique identifier for a vendor response record
    ResponseId
);
uuid_id!(
    /// Tracking identifier handed back when an execution is started
    TaskId
);

/// Campaign lifecycle status
///
/// Transitions are one-directional: `Draft -> Active -> {Completed | Cancelled}`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CampaignStatus {
    /// Being edited, not yet executed
    #[default]
    Draft,
    /// Execution in progress
    Active,
    /// At least one message was delivered
    Completed,
    /// Nothing was delivered, or execution failed
    Cancelled,
}

impl CampaignStatus {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "Draft",
            CampaignStatus::Active => "Active",
            CampaignStatus::Completed => "Completed",
            CampaignStatus::Cancelled => "Cancelled",
        }
    }

    /// Parse the storage representation
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Draft" => Some(CampaignStatus::Draft),
            "Active" => Some(CampaignStatus::Active),
            "Completed" => Some(CampaignStatus::Completed),
            "Cancelled" => Some(CampaignStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether the state machine permits moving from `self` to `next`
    pub fn can_transition_to(&self, next: CampaignStatus) -> bool {
        matches!(
            (self, next),
            (CampaignStatus::Draft, CampaignStatus::Active)
                | (CampaignStatus::Active, CampaignStatus::Completed)
                | (CampaignStatus::Active, CampaignStatus::Cancelled)
                // best-effort recovery when a failure happens before activation
                | (CampaignStatus::Draft, CampaignStatus::Cancelled)
        )
    }

    /// Whether the campaign has left the execution lifecycle for good
    pub fn is_terminal(&self) -> bool {
        matches!(self, CampaignStatus::Completed | CampaignStatus::Cancelled)
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-vendor response tracking status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseStatus {
    /// Contacted (or about to be), no response yet
    #[default]
    Pending,
    /// Vendor submitted a complete response
    Completed,
    /// Vendor submitted a partial response
    Partial,
    /// Response could not be collected
    Failed,
}

impl ResponseStatus {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Pending => "Pending",
            ResponseStatus::Completed => "Completed",
            ResponseStatus::Partial => "Partial",
            ResponseStatus::Failed => "Failed",
        }
    }

    /// Parse the storage representation
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Pending" => Some(ResponseStatus::Pending),
            "Completed" => Some(ResponseStatus::Completed),
            "Partial" => Some(ResponseStatus::Partial),
            "Failed" => Some(ResponseStatus::Failed),
            _ => None,
        }
    }
}

/// Delivery channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// SMTP email
    Email,
    /// WhatsApp messaging API
    Messaging,
}

impl Channel {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Messaging => "messaging",
        }
    }

    /// Parse the storage representation
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "email" => Some(Channel::Email),
            "messaging" => Some(Channel::Messaging),
            _ => None,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vendor attribute a filter criterion applies to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKey {
    /// Industry (case-insensitive substring match)
    Industry,
    /// Region / state (case-insensitive substring match)
    Region,
    /// Size classification (exact match)
    SizeClass,
}

impl FilterKey {
    fn as_str(&self) -> &'static str {
        match self {
            FilterKey::Industry => "industry",
            FilterKey::Region => "region",
            FilterKey::SizeClass => "size-class",
        }
    }
}

/// A single `key:value` vendor filter
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FilterCriterion {
    /// Attribute being matched
    pub key: FilterKey,
    /// Value to match against
    pub value: String,
}

impl FilterCriterion {
    /// Create a criterion
    pub fn new(key: FilterKey, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

impl std::str::FromStr for FilterCriterion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, value) = s
            .split_once(':')
            .ok_or_else(|| format!("filter criterion '{s}' is not of the form key:value"))?;
        let key = match key.trim().to_ascii_lowercase().as_str() {
            "industry" => FilterKey::Industry,
            "region" | "state" => FilterKey::Region,
            "size" | "size-class" | "size_class" => FilterKey::SizeClass,
            other => return Err(format!("unknown filter key '{other}'")),
        };
        let value = value.trim();
        if value.is_empty() {
            return Err(format!("filter criterion '{s}' has an empty value"));
        }
        Ok(Self::new(key, value))
    }
}

impl TryFrom<String> for FilterCriterion {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FilterCriterion> for String {
    fn from(criterion: FilterCriterion) -> Self {
        criterion.to_string()
    }
}

impl std::fmt::Display for FilterCriterion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.key.as_str(), self.value)
    }
}

/// Which vendors a campaign targets
///
/// An empty `FilterCriteria` list targets every vendor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "entries", rename_all = "snake_case")]
pub enum TargetSpec {
    /// Manually selected vendors
    ExplicitVendors(Vec<VendorId>),
    /// Rule-based selection; all criteria must match
    FilterCriteria(Vec<FilterCriterion>),
}

impl Default for TargetSpec {
    fn default() -> Self {
        TargetSpec::FilterCriteria(Vec::new())
    }
}

/// Outreach campaign
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    /// Campaign identity
    pub id: CampaignId,
    /// Display name
    pub name: String,
    /// Free-form description
    pub description: Option<String>,
    /// Lifecycle status
    pub status: CampaignStatus,
    /// Template used for the email channel
    pub email_template_id: Option<TemplateId>,
    /// Template used for the messaging channel
    pub messaging_template_id: Option<TemplateId>,
    /// Target vendor selection
    pub target: TargetSpec,
    /// Optional response deadline
    pub deadline: Option<DateTime<Utc>>,
    /// Owner (user identifier in the CRUD layer)
    pub owner: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: Option<DateTime<Utc>>,
}

impl Campaign {
    /// The template configured for a channel, if any
    pub fn template_for(&self, channel: Channel) -> Option<TemplateId> {
        match channel {
            Channel::Email => self.email_template_id,
            Channel::Messaging => self.messaging_template_id,
        }
    }
}

/// Business vendor (read-only from the engine's perspective)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vendor {
    /// Vendor identity
    pub id: VendorId,
    /// Vendor name
    pub name: String,
    /// Unique vendor code
    pub code: String,
    /// Registered company name
    pub company_name: Option<String>,
    /// Person to address
    pub contact_person: Option<String>,
    /// Email address
    pub email: Option<String>,
    /// Phone number
    pub phone: Option<String>,
    /// WhatsApp number, when different from `phone`
    pub whatsapp: Option<String>,
    /// Industry / business category
    pub industry: Option<String>,
    /// Region / state / location
    pub region: Option<String>,
    /// Size classification (e.g. Micro, Small, Medium)
    pub size_class: Option<String>,
}

impl Vendor {
    /// Email address usable for delivery
    pub fn email_address(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty() && e.contains('@'))
    }

    /// Raw messaging number: WhatsApp number, falling back to phone
    pub fn messaging_number(&self) -> Option<&str> {
        [self.whatsapp.as_deref(), self.phone.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|n| !n.is_empty())
    }
}

/// Email or messaging template
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTemplate {
    /// Template identity
    pub id: TemplateId,
    /// Channel this template is written for
    pub channel: Channel,
    /// Display name
    pub name: String,
    /// Subject line (email only)
    pub subject: Option<String>,
    /// Body content with placeholder tokens
    pub body: String,
    /// Optional HTML alternative (email only)
    pub html_body: Option<String>,
    /// Declared variable names
    pub variables: Vec<String>,
    /// Owner (user identifier in the CRUD layer)
    pub owner: Option<String>,
}

/// Per-(campaign, vendor) tracking record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorResponse {
    /// Record identity
    pub id: ResponseId,
    /// Campaign this record belongs to
    pub campaign_id: CampaignId,
    /// Vendor this record tracks
    pub vendor_id: VendorId,
    /// Response state
    pub response_status: ResponseStatus,
    /// When the email channel delivered to this vendor
    pub email_sent_at: Option<DateTime<Utc>>,
    /// When the messaging channel delivered to this vendor
    pub messaging_sent_at: Option<DateTime<Utc>>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Options for a campaign execution
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOptions {
    /// Send through the email channel (default: true)
    #[serde(default = "default_true")]
    pub send_email: bool,
    /// Send through the messaging channel (default: true)
    #[serde(default = "default_true")]
    pub send_messaging: bool,
    /// Run every step except network transmission (default: false)
    #[serde(default)]
    pub test_mode: bool,
    /// Override the outer batch size of both channels (1..=100)
    #[serde(default)]
    pub batch_size: Option<usize>,
    /// Caller-supplied template variables; override derived ones
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    /// Files attached to every email of the execution
    #[serde(default)]
    pub attachments: Vec<PathBuf>,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            send_email: true,
            send_messaging: true,
            test_mode: false,
            batch_size: None,
            variables: BTreeMap::new(),
            attachments: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Aggregate counts of a campaign's response rows
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseCounts {
    /// Total response rows
    pub total: u64,
    /// Rows still pending
    pub pending: u64,
    /// Rows with a completed response
    pub completed: u64,
    /// Rows with a partial response
    pub partial: u64,
    /// Rows with a failed response
    pub failed: u64,
    /// Rows the email channel delivered to
    pub email_sent: u64,
    /// Rows the messaging channel delivered to
    pub messaging_sent: u64,
}

/// Execution progress, derived from stored rows
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionProgress {
    /// Campaign
    pub campaign_id: CampaignId,
    /// Current campaign status
    pub status: CampaignStatus,
    /// Vendors with a response record
    pub total_vendors: u64,
    /// Emails delivered
    pub email_sent: u64,
    /// Messages delivered
    pub messaging_sent: u64,
    /// Completed responses
    pub completed_responses: u64,
    /// Pending responses
    pub pending_responses: u64,
    /// Partial responses
    pub partial_responses: u64,
    /// Failed responses
    pub failed_responses: u64,
    /// Completed responses as a percentage of targeted vendors
    pub response_rate: f64,
}

impl ExecutionProgress {
    /// Build progress from a campaign status and its response counts
    pub fn from_counts(campaign_id: CampaignId, status: CampaignStatus, counts: ResponseCounts) -> Self {
        let response_rate = if counts.total > 0 {
            counts.completed as f64 / counts.total as f64 * 100.0
        } else {
            0.0
        };
        Self {
            campaign_id,
            status,
            total_vendors: counts.total,
            email_sent: counts.email_sent,
            messaging_sent: counts.messaging_sent,
            completed_responses: counts.completed,
            pending_responses: counts.pending,
            partial_responses: counts.partial,
            failed_responses: counts.failed,
            response_rate,
        }
    }
}

/// Events emitted by the engine
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Execution task accepted
    ExecutionStarted {
        /// Campaign
        campaign_id: CampaignId,
        /// Tracking id
        task_id: TaskId,
    },

    /// Target vendors resolved and response rows created
    TargetsResolved {
        /// Campaign
        campaign_id: CampaignId,
        /// Number of targeted vendors
        vendors: usize,
    },

    /// An outer batch finished on a channel
    BatchCompleted {
        /// Campaign
        campaign_id: CampaignId,
        /// Channel
        channel: Channel,
        /// Zero-based batch index
        batch: usize,
        /// Total outer batches for this channel
        batches: usize,
        /// Jobs delivered so far on this channel
        sent: usize,
        /// Jobs failed so far on this channel
        failed: usize,
    },

    /// All jobs of a channel finished
    ChannelCompleted {
        /// Campaign
        campaign_id: CampaignId,
        /// Channel
        channel: Channel,
        /// Jobs delivered
        sent: usize,
        /// Jobs failed
        failed: usize,
    },

    /// Execution reached a final campaign status
    ExecutionFinished {
        /// Campaign
        campaign_id: CampaignId,
        /// Tracking id
        task_id: TaskId,
        /// Final status
        status: CampaignStatus,
        /// Deliveries across channels
        sent: usize,
        /// Failures across channels
        failed: usize,
    },

    /// Execution stopped before reaching a final status
    ExecutionAborted {
        /// Campaign
        campaign_id: CampaignId,
        /// Tracking id
        task_id: TaskId,
        /// Why it stopped
        reason: String,
    },

    /// Engine is shutting down
    Shutdown,
}

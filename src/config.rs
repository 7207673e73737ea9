//! Configuration types for outreach-engine

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// SMTP mailer configuration
///
/// Credentials are optional: when `username`/`password` are unset the mailer
/// runs in logged-only mode (see [`Config::simulate_when_unconfigured`]).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MailConfig {
    /// SMTP server hostname (default: "smtp.gmail.com")
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,

    /// SMTP server port (default: 587). Port 465 uses implicit TLS.
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// SMTP username
    #[serde(default)]
    pub username: Option<String>,

    /// SMTP password
    #[serde(default)]
    pub password: Option<String>,

    /// Sender address (default: the username)
    #[serde(default)]
    pub from_email: Option<String>,

    /// Sender display name (default: "Campaign Central")
    #[serde(default = "default_from_name")]
    pub from_name: String,

    /// Domain announced in EHLO (default: "localhost")
    #[serde(default = "default_helo_domain")]
    pub helo_domain: String,

    /// Timeout applied to connect and to each SMTP exchange (default: 30s)
    #[serde(default = "default_channel_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Skip certificate verification (default: false)
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            username: None,
            password: None,
            from_email: None,
            from_name: default_from_name(),
            helo_domain: default_helo_domain(),
            timeout: default_channel_timeout(),
            accept_invalid_certs: false,
        }
    }
}

impl MailConfig {
    /// Whether both credentials are present and non-empty
    pub fn has_credentials(&self) -> bool {
        non_empty(&self.username).is_some() && non_empty(&self.password).is_some()
    }

    /// Envelope sender: `from_email`, falling back to the username
    pub fn sender_address(&self) -> Option<&str> {
        non_empty(&self.from_email).or_else(|| non_empty(&self.username))
    }

    /// Whether the connection starts with TLS instead of upgrading via STARTTLS
    pub fn implicit_tls(&self) -> bool {
        self.smtp_port == 465
    }
}

/// WhatsApp Cloud API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessagingConfig {
    /// Bearer token for the messaging API
    #[serde(default)]
    pub access_token: Option<String>,

    /// Sending phone number id assigned by the provider
    #[serde(default)]
    pub phone_number_id: Option<String>,

    /// API base URL (default: "https://graph.facebook.com")
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// API version path segment (default: "v17.0")
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Prefix applied to bare 10-digit mobile numbers (default: "91")
    #[serde(default = "default_country_code")]
    pub default_country_code: String,

    /// Request timeout (default: 30s)
    #[serde(default = "default_channel_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            phone_number_id: None,
            api_base_url: default_api_base_url(),
            api_version: default_api_version(),
            default_country_code: default_country_code(),
            timeout: default_channel_timeout(),
        }
    }
}

impl MessagingConfig {
    /// Whether both the token and the phone number id are present
    pub fn has_credentials(&self) -> bool {
        non_empty(&self.access_token).is_some() && non_empty(&self.phone_number_id).is_some()
    }
}

/// Batching and pacing policy for one channel
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPolicy {
    /// Jobs per outer batch (default: 100)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Jobs sent concurrently inside an outer batch (default: 10)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Pause after each outer batch except the last
    #[serde(default = "default_inter_batch_delay", with = "millis_serde")]
    pub inter_batch_delay: Duration,

    /// Pause between inner groups of the same outer batch
    #[serde(default = "default_intra_batch_delay", with = "millis_serde")]
    pub intra_batch_delay: Duration,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
            inter_batch_delay: default_inter_batch_delay(),
            intra_batch_delay: default_intra_batch_delay(),
        }
    }
}

impl BatchPolicy {
    /// Default email policy: 100 per batch, 10 concurrent, 2s between batches
    pub fn email() -> Self {
        Self::default()
    }

    /// Default messaging policy: 100 per batch, 5 concurrent, 3s between batches
    pub fn messaging() -> Self {
        Self {
            concurrency: 5,
            inter_batch_delay: Duration::from_secs(3),
            ..Self::default()
        }
    }

    /// Same policy with a different outer batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

/// Dispatch configuration shared by both channels
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Email channel policy
    #[serde(default = "BatchPolicy::email")]
    pub email: BatchPolicy,

    /// Messaging channel policy
    #[serde(default = "BatchPolicy::messaging")]
    pub messaging: BatchPolicy,

    /// Maximum error strings kept per dispatch report (default: 500)
    #[serde(default = "default_max_recorded_errors")]
    pub max_recorded_errors: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            email: BatchPolicy::email(),
            messaging: BatchPolicy::messaging(),
            max_recorded_errors: default_max_recorded_errors(),
        }
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database path (default: "./outreach.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Main configuration for CampaignEngine
///
/// Fields are organized into sub-configs:
/// - [`mail`](MailConfig) - SMTP transport and sender identity
/// - [`messaging`](MessagingConfig) - WhatsApp API credentials and endpoint
/// - [`dispatch`](DispatchConfig) - per-channel batching and pacing
/// - [`persistence`](PersistenceConfig) - SQLite location
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// SMTP settings
    #[serde(default)]
    pub mail: MailConfig,

    /// Messaging API settings
    #[serde(default)]
    pub messaging: MessagingConfig,

    /// Batching policies
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Storage settings
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Report success without transmitting when a channel has no credentials (default: true)
    #[serde(default = "default_true")]
    pub simulate_when_unconfigured: bool,

    /// How long shutdown waits for running executions (default: 30s)
    #[serde(default = "default_shutdown_timeout", with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mail: MailConfig::default(),
            messaging: MessagingConfig::default(),
            dispatch: DispatchConfig::default(),
            persistence: PersistenceConfig::default(),
            simulate_when_unconfigured: true,
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

impl Config {
    /// Defaults overlaid with the process environment
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay deployment variables resolved through `lookup`
    ///
    /// Recognized keys: `SMTP_SERVER`, `SMTP_PORT`, `SMTP_USERNAME`,
    /// `SMTP_PASSWORD`, `FROM_EMAIL`, `FROM_NAME`, `WHATSAPP_ACCESS_TOKEN`,
    /// `WHATSAPP_PHONE_NUMBER_ID`, `WHATSAPP_API_VERSION`, `DATABASE_PATH`,
    /// `SIMULATE_WHEN_UNCONFIGURED`. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("SMTP_SERVER") {
            self.mail.smtp_host = host;
        }
        if let Some(port) = get("SMTP_PORT") {
            self.mail.smtp_port = port.trim().parse().map_err(|_| Error::Config {
                message: format!("invalid SMTP port '{port}'"),
                key: Some("SMTP_PORT".to_string()),
            })?;
        }
        if let Some(username) = get("SMTP_USERNAME") {
            self.mail.username = Some(username);
        }
        if let Some(password) = get("SMTP_PASSWORD") {
            self.mail.password = Some(password);
        }
        if let Some(from) = get("FROM_EMAIL") {
            self.mail.from_email = Some(from);
        }
        if let Some(name) = get("FROM_NAME") {
            self.mail.from_name = name;
        }
        if let Some(token) = get("WHATSAPP_ACCESS_TOKEN") {
            self.messaging.access_token = Some(token);
        }
        if let Some(id) = get("WHATSAPP_PHONE_NUMBER_ID") {
            self.messaging.phone_number_id = Some(id);
        }
        if let Some(version) = get("WHATSAPP_API_VERSION") {
            self.messaging.api_version = version;
        }
        if let Some(path) = get("DATABASE_PATH") {
            self.persistence.database_path = PathBuf::from(path);
        }
        if let Some(flag) = get("SIMULATE_WHEN_UNCONFIGURED") {
            self.simulate_when_unconfigured = parse_bool(&flag).ok_or_else(|| Error::Config {
                message: format!("invalid boolean '{flag}'"),
                key: Some("SIMULATE_WHEN_UNCONFIGURED".to_string()),
            })?;
        }
        Ok(())
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<()> {
        for (name, policy) in [
            ("dispatch.email", &self.dispatch.email),
            ("dispatch.messaging", &self.dispatch.messaging),
        ] {
            if policy.batch_size == 0 {
                return Err(Error::Config {
                    message: "batch_size must be at least 1".to_string(),
                    key: Some(format!("{name}.batch_size")),
                });
            }
            if policy.concurrency == 0 {
                return Err(Error::Config {
                    message: "concurrency must be at least 1".to_string(),
                    key: Some(format!("{name}.concurrency")),
                });
            }
        }

        url::Url::parse(&self.messaging.api_base_url).map_err(|e| Error::Config {
            message: format!("invalid messaging API base URL: {e}"),
            key: Some("messaging.api_base_url".to_string()),
        })?;

        Ok(())
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn default_true() -> bool {
    true
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_name() -> String {
    "Campaign Central".to_string()
}

fn default_helo_domain() -> String {
    "localhost".to_string()
}

fn default_channel_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_api_base_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_api_version() -> String {
    "v17.0".to_string()
}

fn default_country_code() -> String {
    "91".to_string()
}

fn default_batch_size() -> usize {
    100
}

fn default_concurrency() -> usize {
    10
}

fn default_inter_batch_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_intra_batch_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_recorded_errors() -> usize {
    500
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./outreach.db")
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Millisecond Duration serialization helper (pacing delays)
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_deployment_values() {
        let config = Config::default();
        assert_eq!(config.mail.smtp_host, "smtp.gmail.com");
        assert_eq!(config.mail.smtp_port, 587);
        assert!(!config.mail.implicit_tls());
        assert_eq!(config.messaging.api_version, "v17.0");
        assert_eq!(config.dispatch.email.concurrency, 10);
        assert_eq!(config.dispatch.email.inter_batch_delay, Duration::from_secs(2));
        assert_eq!(config.dispatch.messaging.concurrency, 5);
        assert_eq!(config.dispatch.messaging.inter_batch_delay, Duration::from_secs(3));
        assert_eq!(config.dispatch.messaging.intra_batch_delay, Duration::from_millis(500));
        assert!(config.simulate_when_unconfigured);
        config.validate().unwrap();
    }

    #[test]
    fn empty_json_deserializes_to_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.dispatch.email, BatchPolicy::email());
        assert_eq!(config.dispatch.messaging, BatchPolicy::messaging());
        assert_eq!(config.shutdown_timeout, Duration::from_secs(30));
    }

    #[test]
    fn batch_delays_serialize_as_milliseconds() {
        let json = serde_json::to_value(BatchPolicy::messaging()).unwrap();
        assert_eq!(json["inter_batch_delay"], 3000);
        assert_eq!(json["intra_batch_delay"], 500);

        let policy: BatchPolicy =
            serde_json::from_str(r#"{"batch_size": 5, "inter_batch_delay": 0}"#).unwrap();
        assert_eq!(policy.batch_size, 5);
        assert_eq!(policy.concurrency, 10);
        assert_eq!(policy.inter_batch_delay, Duration::ZERO);
    }

    #[test]
    fn env_overlay_sets_credentials_and_endpoint() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("SMTP_SERVER", "mail.example.com"),
                ("SMTP_PORT", "465"),
                ("SMTP_USERNAME", "bot@example.com"),
                ("SMTP_PASSWORD", "secret"),
                ("WHATSAPP_ACCESS_TOKEN", "token"),
                ("WHATSAPP_PHONE_NUMBER_ID", "1234"),
                ("SIMULATE_WHEN_UNCONFIGURED", "false"),
            ]))
            .unwrap();

        assert_eq!(config.mail.smtp_host, "mail.example.com");
        assert!(config.mail.implicit_tls());
        assert!(config.mail.has_credentials());
        assert_eq!(config.mail.sender_address(), Some("bot@example.com"));
        assert!(config.messaging.has_credentials());
        assert!(!config.simulate_when_unconfigured);
    }

    #[test]
    fn env_overlay_ignores_blank_values() {
        let mut config = Config::default();
        config
            .apply_env(env(&[("SMTP_USERNAME", "  "), ("FROM_NAME", "")]))
            .unwrap();
        assert!(config.mail.username.is_none());
        assert_eq!(config.mail.from_name, "Campaign Central");
        assert!(!config.mail.has_credentials());
    }

    #[test]
    fn invalid_port_reports_offending_key() {
        let mut config = Config::default();
        let err = config.apply_env(env(&[("SMTP_PORT", "smtp")])).unwrap_err();
        match err {
            Error::Config { key, .. } => assert_eq!(key.as_deref(), Some("SMTP_PORT")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_zero_concurrency_and_bad_url() {
        let mut config = Config::default();
        config.dispatch.messaging.concurrency = 0;
        assert!(matches!(config.validate(), Err(Error::Config { .. })));

        let mut config = Config::default();
        config.messaging.api_base_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn from_email_takes_precedence_over_username() {
        let config = MailConfig {
            username: Some("login@example.com".into()),
            from_email: Some("outreach@example.com".into()),
            ..MailConfig::default()
        };
        assert_eq!(config.sender_address(), Some("outreach@example.com"));
    }
}

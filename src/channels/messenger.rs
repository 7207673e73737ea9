//! WhatsApp Cloud API messenger

use super::error::SendError;
use super::{ChannelClient, ConnectionCheck};
use crate::config::MessagingConfig;
use crate::dispatch::SendJob;
use crate::error::Result;
use crate::types::Channel;
use async_trait::async_trait;
use serde_json::json;

const MAX_ERROR_BODY: usize = 200;

/// Normalize a phone number to international digits without `+`
///
/// Keeps digits only, prefixes `country_code` to a 10-digit number starting
/// with 6-9, and rejects anything outside 10-15 digits.
pub fn normalize_phone(raw: &str, country_code: &str) -> Option<String> {
    let mut digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    if digits.len() == 10 && digits.starts_with(['6', '7', '8', '9']) {
        digits.insert_str(0, country_code);
    }

    (10..=15).contains(&digits.len()).then_some(digits)
}

/// Sends text messages through the WhatsApp Cloud API
pub struct Messenger {
    config: MessagingConfig,
    client: reqwest::Client,
    simulate_when_unconfigured: bool,
}

impl Messenger {
    /// Create a messenger with its own HTTP client
    pub fn new(config: MessagingConfig, simulate_when_unconfigured: bool) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            config,
            client,
            simulate_when_unconfigured,
        })
    }

    /// Report whether credentials are configured
    pub async fn test_connection(&self) -> ConnectionCheck {
        if self.config.has_credentials() {
            ConnectionCheck {
                success: true,
                message: "messaging API credentials configured".to_string(),
            }
        } else {
            ConnectionCheck {
                success: false,
                message: "credentials not configured".to_string(),
            }
        }
    }

    fn messages_url(&self, phone_number_id: &str) -> String {
        format!(
            "{}/{}/{}/messages",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.api_version,
            phone_number_id
        )
    }
}

#[async_trait]
impl ChannelClient for Messenger {
    fn channel(&self) -> Channel {
        Channel::Messaging
    }

    async fn send(&self, job: &SendJob) -> std::result::Result<(), SendError> {
        let to = normalize_phone(&job.recipient, &self.config.default_country_code)
            .ok_or_else(|| SendError::InvalidRecipient(job.recipient.clone()))?;

        if !self.config.has_credentials() {
            return self.unconfigured(&to, &job.body);
        }
        let token = self.config.access_token.as_deref().unwrap_or_default().trim();
        let phone_number_id = self
            .config
            .phone_number_id
            .as_deref()
            .unwrap_or_default()
            .trim();

        let payload = json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "text",
            "text": { "body": job.body },
        });

        let response = self
            .client
            .post(self.messages_url(phone_number_id))
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|&i| body.is_char_boundary(i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(SendError::Http {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(to = %to, vendor_id = %job.vendor_id, "message sent");
        Ok(())
    }
}

impl Messenger {
    fn unconfigured(&self, to: &str, body: &str) -> std::result::Result<(), SendError> {
        if self.simulate_when_unconfigured {
            let preview: String = body.chars().take(100).collect();
            tracing::info!(to, message = %preview, "messaging credentials not configured, message logged only");
            Ok(())
        } else {
            Err(SendError::NotConfigured(Channel::Messaging))
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VendorId;
    use std::time::Duration;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn job(number: &str) -> SendJob {
        SendJob {
            vendor_id: VendorId::new(),
            recipient: number.to_string(),
            display_name: "Acme".to_string(),
            subject: None,
            body: "Hello Acme".to_string(),
            html_body: None,
            attachments: Vec::new(),
        }
    }

    fn configured(base: &str) -> MessagingConfig {
        MessagingConfig {
            access_token: Some("token".to_string()),
            phone_number_id: Some("1234".to_string()),
            api_base_url: base.to_string(),
            timeout: Duration::from_secs(5),
            ..MessagingConfig::default()
        }
    }

    #[test]
    fn normalizes_indian_mobile_numbers() {
        assert_eq!(normalize_phone("9876543210", "91").as_deref(), Some("919876543210"));
        assert_eq!(normalize_phone("+91 98765 43210", "91").as_deref(), Some("919876543210"));
        assert_eq!(normalize_phone("98765-43210", "91").as_deref(), Some("919876543210"));
    }

    #[test]
    fn keeps_non_mobile_ten_digit_numbers_unprefixed() {
        assert_eq!(normalize_phone("0221234567", "91").as_deref(), Some("0221234567"));
    }

    #[test]
    fn rejects_numbers_outside_length_bounds() {
        assert_eq!(normalize_phone("123", "91"), None);
        assert_eq!(normalize_phone("", "91"), None);
        assert_eq!(normalize_phone("1234567890123456", "91"), None);
    }

    #[tokio::test]
    async fn posts_cloud_api_text_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v17.0/1234/messages"))
            .and(header("authorization", "Bearer token"))
            .and(body_json(serde_json::json!({
                "messaging_product": "whatsapp",
                "to": "919876543210",
                "type": "text",
                "text": { "body": "Hello Acme" },
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"messages": []})))
            .expect(1)
            .mount(&server)
            .await;

        let messenger = Messenger::new(configured(&server.uri()), false).unwrap();
        messenger.send(&job("98765 43210")).await.unwrap();
    }

    #[tokio::test]
    async fn non_success_status_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid recipient"))
            .mount(&server)
            .await;

        let messenger = Messenger::new(configured(&server.uri()), false).unwrap();
        let err = messenger.send(&job("9876543210")).await.unwrap_err();
        match err {
            SendError::Http { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "invalid recipient");
            }
            other => panic!("expected HTTP error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_number_fails_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let messenger = Messenger::new(configured(&server.uri()), false).unwrap();
        let err = messenger.send(&job("123")).await.unwrap_err();
        assert!(matches!(err, SendError::InvalidRecipient(_)));
    }

    #[tokio::test]
    async fn unconfigured_messenger_follows_simulation_flag() {
        let simulated = Messenger::new(MessagingConfig::default(), true).unwrap();
        simulated.send(&job("9876543210")).await.unwrap();
        assert!(!simulated.test_connection().await.success);

        let strict = Messenger::new(MessagingConfig::default(), false).unwrap();
        let err = strict.send(&job("9876543210")).await.unwrap_err();
        assert!(matches!(err, SendError::NotConfigured(Channel::Messaging)));
    }
}

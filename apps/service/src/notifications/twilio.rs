use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use super::{GatewayError, NotificationGateway};
use crate::config;

/// Longest body Twilio accepts for a single message
const MAX_MESSAGE_CHARS: usize = 1600;
const PHONE_LENGTH: usize = 10;

/// A gateway sending alerts as SMS through the Twilio REST API.
pub struct TwilioGateway {
    client: Client,
    account_sid: String,
    auth_token: String,
    from_phone: String,
    api_base: String,
}

impl TwilioGateway {
    pub fn new(config: &config::Twilio) -> Result<Self, GatewayError> {
        if config.account_sid.is_empty() || config.auth_token.is_empty() {
            return Err(GatewayError::InvalidConfiguration("missing Twilio credentials".to_string()));
        }

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            client,
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            from_phone: config.from_phone.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/2010-04-01/Accounts/{}/Messages.json", self.api_base, self.account_sid)
    }
}

#[async_trait]
impl NotificationGateway for TwilioGateway {
    async fn send(&self, phone: &str, message: &str) -> Result<(), GatewayError> {
        let phone = phone.trim();
        if phone.len() != PHONE_LENGTH || !phone.bytes().all(|b| b.is_ascii_digit()) {
            return Err(GatewayError::InvalidRecipient(phone.to_string()));
        }

        let message = message.trim();
        if message.is_empty() {
            return Err(GatewayError::InvalidMessage("message is empty".to_string()));
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(GatewayError::InvalidMessage(format!(
                "message longer than {MAX_MESSAGE_CHARS} characters"
            )));
        }

        let to = format!("+1{phone}");
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("From", self.from_phone.as_str()), ("To", to.as_str()), ("Body", message)])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::CREATED {
            debug!(to = %to, "Twilio accepted message");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(GatewayError::Rejected { status: status.as_u16(), body })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::spawn_recording_server;

    fn gateway_for(api_base: String) -> TwilioGateway {
        TwilioGateway::new(&config::Twilio {
            account_sid: "AC123".to_string(),
            auth_token: "token".to_string(),
            from_phone: "+15005550006".to_string(),
            api_base,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_send_posts_form_to_messages_endpoint() {
        let (addr, mut requests) = spawn_recording_server(201).await;
        let gateway = gateway_for(format!("http://{addr}/"));

        gateway.send("5551234567", "Alert: check is up").await.unwrap();

        let request = requests.recv().await.unwrap();
        assert!(request.starts_with("POST /2010-04-01/Accounts/AC123/Messages.json HTTP/1.1"));
        assert!(request.to_lowercase().contains("authorization: basic "));
        assert!(request.contains("To=%2B15551234567"));
        assert!(request.contains("From=%2B15005550006"));
        assert!(request.contains("Body=Alert%3A+check+is+up"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_rejected() {
        let (addr, _requests) = spawn_recording_server(400).await;
        let gateway = gateway_for(format!("http://{addr}"));

        let err = gateway.send("5551234567", "hello").await.unwrap_err();

        assert!(matches!(err, GatewayError::Rejected { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_invalid_input_never_reaches_network() {
        // Nothing listens on the discard port; validation must fail first.
        let gateway = gateway_for("http://127.0.0.1:9".to_string());

        assert!(matches!(
            gateway.send("555123", "hello").await,
            Err(GatewayError::InvalidRecipient(_))
        ));
        assert!(matches!(
            gateway.send("5551234567", "   ").await,
            Err(GatewayError::InvalidMessage(_))
        ));
        assert!(matches!(
            gateway.send("5551234567", &"x".repeat(MAX_MESSAGE_CHARS + 1)).await,
            Err(GatewayError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_missing_credentials_are_rejected() {
        let result = TwilioGateway::new(&config::Twilio {
            account_sid: String::new(),
            auth_token: "token".to_string(),
            from_phone: "+15005550006".to_string(),
            api_base: "https://api.twilio.com".to_string(),
        });

        assert!(matches!(result, Err(GatewayError::InvalidConfiguration(_))));
    }
}

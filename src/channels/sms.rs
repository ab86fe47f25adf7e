//! Outbound SMS channel. The provider returns a reference id for every
//! accepted message; delivery confirmation arrives later via the reminder
//! callback endpoint.

use async_trait::async_trait;
use log::error;
use serde::Deserialize;

use crate::config::SmsConfig;

#[derive(Debug, thiserror::Error)]
pub enum SmsError {
    #[error("network error: {0}")]
    Network(String),
    #[error("provider rejected message: {0}")]
    Provider(String),
    #[error("unexpected provider response: {0}")]
    Parse(String),
}

#[async_trait]
pub trait SmsSender: Send + Sync {
    /// Sends one message and returns the provider's reference id.
    async fn send(&self, to: &str, message: &str) -> Result<String, SmsError>;
}

pub struct HttpSmsProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    sender_id: String,
}

impl HttpSmsProvider {
    pub fn new(config: &SmsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            sender_id: config.sender_id.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    message_id: String,
}

#[async_trait]
impl SmsSender for HttpSmsProvider {
    async fn send(&self, to: &str, message: &str) -> Result<String, SmsError> {
        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "from": self.sender_id,
                "to": to,
                "body": message,
            }))
            .send()
            .await
            .map_err(|e| SmsError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("sms provider returned {}: {}", status, body);
            return Err(SmsError::Provider(format!("status {}", status)));
        }

        let body: SendResponse = response
            .json()
            .await
            .map_err(|e| SmsError::Parse(e.to_string()))?;
        Ok(body.message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: String) -> SmsConfig {
        SmsConfig {
            base_url,
            api_key: "test-key".to_string(),
            sender_id: "GROOMER".to_string(),
        }
    }

    #[tokio::test]
    async fn returns_provider_reference_on_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/messages")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message_id":"msg-123"}"#)
            .create_async()
            .await;

        let provider = HttpSmsProvider::new(&config(server.url()));
        let reference = provider.send("+15550001", "hello").await.unwrap();
        assert_eq!(reference, "msg-123");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn surfaces_provider_rejection() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/messages")
            .with_status(429)
            .with_body("rate limited")
            .create_async()
            .await;

        let provider = HttpSmsProvider::new(&config(server.url()));
        let result = provider.send("+15550001", "hello").await;
        assert!(matches!(result, Err(SmsError::Provider(_))));
    }
}

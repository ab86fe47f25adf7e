//! Accounting ledger client: pushes completed-appointment snapshots to the
//! external bookkeeping system.

use async_trait::async_trait;
use log::error;
use serde::Deserialize;

use crate::config::LedgerConfig;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("network error: {0}")]
    Network(String),
    #[error("ledger api error: {0}")]
    Api(String),
    #[error("unexpected ledger response: {0}")]
    Parse(String),
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Pushes one appointment snapshot; returns the ledger's entry id.
    async fn sync_appointment(&self, snapshot: &serde_json::Value) -> Result<String, LedgerError>;
}

pub struct HttpLedgerClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpLedgerClient {
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EntryResponse {
    id: String,
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn sync_appointment(&self, snapshot: &serde_json::Value) -> Result<String, LedgerError> {
        let response = self
            .client
            .post(format!("{}/v1/entries", self.base_url))
            .bearer_auth(&self.api_key)
            .json(snapshot)
            .send()
            .await
            .map_err(|e| LedgerError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("ledger sync failed: {} - {}", status, body);
            return Err(LedgerError::Api(format!("status {}", status)));
        }

        let body: EntryResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::Parse(e.to_string()))?;
        Ok(body.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(base_url: String) -> LedgerConfig {
        LedgerConfig {
            base_url,
            api_key: "ledger-key".to_string(),
        }
    }

    #[tokio::test]
    async fn returns_entry_id_on_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/entries")
            .match_header("authorization", "Bearer ledger-key")
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"entry-42"}"#)
            .create_async()
            .await;

        let client = HttpLedgerClient::new(&config(server.url()));
        let reference = client
            .sync_appointment(&json!({"appointment": "snapshot"}))
            .await
            .unwrap();
        assert_eq!(reference, "entry-42");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn surfaces_api_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/entries")
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let client = HttpLedgerClient::new(&config(server.url()));
        let result = client.sync_appointment(&json!({})).await;
        assert!(matches!(result, Err(LedgerError::Api(_))));
    }
}

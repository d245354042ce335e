use super::{endpoint, error_message, MessageGateway};
use crate::domain::error::{AppError, Result};
use crate::infrastructure::config::WhatsAppConfig;
use async_trait::async_trait;
use serde_json::json;

pub struct WhatsAppGatewayClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl WhatsAppGatewayClient {
    pub fn new(config: &WhatsAppConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl MessageGateway for WhatsAppGatewayClient {
    async fn send_text(&self, recipient: &str, message: &str) -> Result<()> {
        let url = endpoint(&self.base_url, "api/send");
        let mut request = self.client.post(&url).json(&json!({
            "recipient": recipient,
            "message": message,
        }));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("WhatsApp gateway unreachable: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!(
                "WhatsApp send failed: {}",
                error_message(status, &text)
            )));
        }

        Ok(())
    }
}

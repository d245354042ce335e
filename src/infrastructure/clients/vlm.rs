use super::{endpoint, error_message, VisionModel};
use crate::domain::error::{AppError, Result};
use crate::infrastructure::config::VlmConfig;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

pub struct OpenAiVisionClient {
    client: reqwest::Client,
    config: VlmConfig,
}

impl OpenAiVisionClient {
    pub fn new(config: &VlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build VLM client: {}", e)))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn request_error(&self, err: reqwest::Error) -> AppError {
        if err.is_timeout() {
            AppError::ExternalService(format!(
                "VLM request timed out after {}s",
                self.config.timeout_secs
            ))
        } else {
            AppError::ExternalService(format!("VLM request failed: {}", err))
        }
    }
}

pub fn completion_body(model: &str, prompt: &str, images_base64: &[String], max_tokens: u32, temperature: f32) -> Value {
    let mut content = vec![json!({ "type": "text", "text": prompt })];
    content.extend(images_base64.iter().map(|image| {
        json!({
            "type": "image_url",
            "image_url": { "url": format!("data:image/jpeg;base64,{}", image) }
        })
    }));

    json!({
        "model": model,
        "messages": [{ "role": "user", "content": content }],
        "max_tokens": max_tokens,
        "temperature": temperature,
    })
}

#[async_trait]
impl VisionModel for OpenAiVisionClient {
    async fn complete(&self, prompt: &str, images_base64: &[String]) -> Result<String> {
        let url = endpoint(&self.config.base_url, "chat/completions");
        let body = completion_body(
            &self.config.model,
            prompt,
            images_base64,
            self.config.max_tokens,
            self.config.temperature,
        );

        let mut request = self.client.post(&url).json(&body);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }
        let response = request.send().await.map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!(
                "VLM API error ({}): {}",
                status.as_u16(),
                error_message(status, &text)
            )));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("Failed to parse VLM JSON: {}", e)))?;

        json["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| AppError::ParseError("No content in VLM response".to_string()))
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let url = endpoint(&self.config.base_url, "models");
        let mut request = self.client.get(&url);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }
        let response = request.send().await.map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!(
                "VLM API error ({}): {}",
                status.as_u16(),
                error_message(status, &text)
            )));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("Failed to parse JSON: {}", e)))?;

        let models = json["data"]
            .as_array()
            .ok_or_else(|| {
                AppError::ExternalService("Invalid response format: missing data array".to_string())
            })?
            .iter()
            .filter_map(|m| m["id"].as_str())
            .map(|id| id.to_string())
            .collect();

        Ok(models)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

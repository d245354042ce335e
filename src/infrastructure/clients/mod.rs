pub mod photo_source;
pub mod service_catalog;
pub mod vlm;
pub mod whatsapp;

use crate::domain::error::Result;
use async_trait::async_trait;

pub use photo_source::HttpPhotoSource;
pub use service_catalog::HttpServiceCatalog;
pub use vlm::OpenAiVisionClient;
pub use whatsapp::WhatsAppGatewayClient;

/// Outbound WhatsApp text delivery.
#[async_trait]
pub trait MessageGateway: Send + Sync {
    async fn send_text(&self, recipient: &str, message: &str) -> Result<()>;
}

/// OpenAI-compatible vision model.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn complete(&self, prompt: &str, images_base64: &[String]) -> Result<String>;
    async fn list_models(&self) -> Result<Vec<String>>;
    fn model(&self) -> &str;
}

/// Where installation photos for a DR are stored.
#[async_trait]
pub trait PhotoSource: Send + Sync {
    async fn photo_urls(&self, dr_number: &str) -> Result<Vec<String>>;
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>>;
}

/// Names of the services contractors may offer.
#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    async fn available_services(&self) -> Result<Vec<String>>;
}

pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Best human-readable message from a failed response body.
pub(crate) fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    let fallback = format!("Request failed with status {}", status);
    let Ok(json) = serde_json::from_str::<serde_json::Value>(body) else {
        let body = body.trim();
        return if body.is_empty() || body.len() > 300 {
            fallback
        } else {
            format!("{} ({})", body, status)
        };
    };

    let message = json["message"]
        .as_str()
        .or_else(|| json["error"].as_str())
        .or_else(|| json["error"]["message"].as_str())
        .map(str::trim)
        .filter(|m| !m.is_empty());

    match message {
        Some(message) => message.to_string(),
        None => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn endpoint_joins_without_double_slashes() {
        assert_eq!(endpoint("http://h:1/", "/api/send"), "http://h:1/api/send");
        assert_eq!(endpoint("http://h:1/v1", "models"), "http://h:1/v1/models");
    }

    #[test]
    fn error_message_prefers_body_fields() {
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"message":"Invalid recipient"}"#),
            "Invalid recipient"
        );
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, r#"{"error":"Session not connected"}"#),
            "Session not connected"
        );
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"error":{"message":"model not loaded"}}"#),
            "model not loaded"
        );
        assert_eq!(
            error_message(StatusCode::INTERNAL_SERVER_ERROR, r#"{"ok":false}"#),
            "Request failed with status 500 Internal Server Error"
        );
        assert_eq!(
            error_message(StatusCode::SERVICE_UNAVAILABLE, ""),
            "Request failed with status 503 Service Unavailable"
        );
    }
}

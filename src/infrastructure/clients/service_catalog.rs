use super::{error_message, ServiceCatalog};
use crate::domain::error::{AppError, Result};
use crate::infrastructure::config::ImportConfig;
use async_trait::async_trait;
use serde_json::Value;

/// Service names from the catalogue endpoint, or the configured list when none is set.
pub struct HttpServiceCatalog {
    client: reqwest::Client,
    url: Option<String>,
    defaults: Vec<String>,
}

impl HttpServiceCatalog {
    pub fn new(config: &ImportConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config
                .services_url
                .clone()
                .filter(|u| !u.trim().is_empty()),
            defaults: config.default_services.clone(),
        }
    }
}

#[async_trait]
impl ServiceCatalog for HttpServiceCatalog {
    async fn available_services(&self) -> Result<Vec<String>> {
        let Some(url) = &self.url else {
            return Ok(self.defaults.clone());
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Service catalogue unreachable: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!(
                "Service catalogue request failed: {}",
                error_message(status, &text)
            )));
        }

        let json: Value = response.json().await.map_err(|e| {
            AppError::ExternalService(format!("Failed to parse service catalogue: {}", e))
        })?;
        Ok(service_names(&json))
    }
}

/// Accepts `["A", ...]`, `[{"name": "A"}, ...]` or either wrapped in `{"services"|"data": ...}`.
pub fn service_names(json: &Value) -> Vec<String> {
    let list = json
        .as_array()
        .or_else(|| json["services"].as_array())
        .or_else(|| json["data"].as_array());

    let Some(list) = list else {
        return Vec::new();
    };

    list.iter()
        .filter_map(|item| item.as_str().or_else(|| item["name"].as_str()))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn names_from_supported_shapes() {
        assert_eq!(service_names(&json!(["Trenching", " Splicing "])), vec!["Trenching", "Splicing"]);
        assert_eq!(
            service_names(&json!({"services": [{"name": "Trenching", "id": 1}, {"id": 2}]})),
            vec!["Trenching"]
        );
        assert_eq!(service_names(&json!({"data": ["Civil Works"]})), vec!["Civil Works"]);
        assert!(service_names(&json!({"unexpected": true})).is_empty());
    }

    #[tokio::test]
    async fn no_url_uses_configured_defaults() {
        let config = ImportConfig {
            services_url: Some("  ".to_string()),
            default_services: vec!["Trenching".to_string()],
            max_rows: 10,
        };
        let catalog = HttpServiceCatalog::new(&config);
        assert_eq!(catalog.available_services().await.unwrap(), vec!["Trenching"]);
    }
}

use super::{endpoint, error_message, PhotoSource};
use crate::domain::error::{AppError, Result};
use crate::infrastructure::config::PhotosConfig;
use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

#[derive(Debug, Deserialize)]
struct PhotoListing {
    #[serde(default)]
    drs: Vec<DrPhotos>,
}

#[derive(Debug, Deserialize)]
struct DrPhotos {
    dr_number: String,
    #[serde(default)]
    photos: Vec<PhotoEntry>,
}

#[derive(Debug, Deserialize)]
struct PhotoEntry {
    filename: String,
}

/// Photo store exposing `GET /api/photos` and `GET /api/photo/{dr}/{file}`.
pub struct HttpPhotoSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPhotoSource {
    pub fn new(config: &PhotosConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
        }
    }

    fn photo_url(&self, dr_number: &str, filename: &str) -> Result<String> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| AppError::ValidationError(format!("Invalid photo source URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| AppError::ValidationError("Photo source URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["api", "photo", dr_number, filename]);
        Ok(url.to_string())
    }
}

#[async_trait]
impl PhotoSource for HttpPhotoSource {
    async fn photo_urls(&self, dr_number: &str) -> Result<Vec<String>> {
        let url = endpoint(&self.base_url, "api/photos");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Photo source unreachable: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!(
                "Failed to list photos: {}",
                error_message(status, &text)
            )));
        }

        let listing: PhotoListing = response
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("Failed to parse photo listing: {}", e)))?;

        photo_urls_for(&listing, dr_number)
            .into_iter()
            .map(|filename| self.photo_url(dr_number, filename))
            .collect()
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Failed to fetch image: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "Failed to fetch image: {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::ExternalService(format!("Failed to read image: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

fn photo_urls_for<'a>(listing: &'a PhotoListing, dr_number: &str) -> Vec<&'a str> {
    listing
        .drs
        .iter()
        .find(|dr| dr.dr_number.eq_ignore_ascii_case(dr_number))
        .map(|dr| dr.photos.iter().map(|p| p.filename.as_str()).collect())
        .unwrap_or_default()
}

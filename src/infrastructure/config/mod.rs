use crate::domain::error::{AppError, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use validator::Validate;

const DEFAULT_CONFIG_FILE: &str = "fieldops.toml";
const ENV_PREFIX: &str = "FIELDOPS_";

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ServerConfig {
    #[validate(length(min = 1, message = "server host must not be empty"))]
    pub host: String,
    #[validate(range(min = 1, message = "server port must be non-zero"))]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct DatabaseConfig {
    #[validate(length(min = 1, message = "database url must not be empty"))]
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    #[validate(range(min = 1, message = "max upload size must be positive"))]
    pub max_upload_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct WhatsAppConfig {
    #[validate(length(min = 1, message = "whatsapp base url must not be empty"))]
    pub base_url: String,
    pub api_key: Option<String>,
    /// Project name to WhatsApp group JID.
    #[serde(default)]
    pub project_groups: HashMap<String, String>,
}

impl WhatsAppConfig {
    pub fn group_for(&self, project: &str) -> Option<&str> {
        let wanted = project.trim().to_lowercase();
        self.project_groups
            .iter()
            .find(|(name, _)| name.trim().to_lowercase() == wanted)
            .map(|(_, group)| group.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct VlmConfig {
    #[validate(length(min = 1, message = "vlm base url must not be empty"))]
    pub base_url: String,
    #[validate(length(min = 1, message = "vlm model must not be empty"))]
    pub model: String,
    pub api_key: Option<String>,
    #[validate(range(min = 1, message = "vlm timeout must be positive"))]
    pub timeout_secs: u64,
    #[validate(range(min = 1, message = "vlm max tokens must be positive"))]
    pub max_tokens: u32,
    #[validate(range(min = 0.0, max = 2.0, message = "vlm temperature must be within 0..=2"))]
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct PhotosConfig {
    #[validate(length(min = 1, message = "photo source base url must not be empty"))]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ImportConfig {
    pub services_url: Option<String>,
    #[serde(default)]
    pub default_services: Vec<String>,
    #[validate(range(min = 1, message = "import row limit must be positive"))]
    pub max_rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    pub filter: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct AppConfig {
    #[validate(nested)]
    pub server: ServerConfig,
    #[validate(nested)]
    pub database: DatabaseConfig,
    #[validate(nested)]
    pub storage: StorageConfig,
    #[validate(nested)]
    pub whatsapp: WhatsAppConfig,
    #[validate(nested)]
    pub vlm: VlmConfig,
    #[validate(nested)]
    pub photos: PhotosConfig,
    #[validate(nested)]
    pub import: ImportConfig,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3001,
            },
            database: DatabaseConfig {
                url: "sqlite://data/fieldops.db".to_string(),
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("data"),
                max_upload_bytes: 10 * 1024 * 1024,
            },
            whatsapp: WhatsAppConfig {
                base_url: "http://localhost:8081".to_string(),
                api_key: None,
                project_groups: HashMap::new(),
            },
            vlm: VlmConfig {
                base_url: "http://localhost:8100/v1".to_string(),
                model: "Qwen/Qwen3-VL-8B-Instruct".to_string(),
                api_key: None,
                timeout_secs: 120,
                max_tokens: 4096,
                temperature: 0.1,
            },
            photos: PhotosConfig {
                base_url: "http://localhost:3005".to_string(),
            },
            import: ImportConfig {
                services_url: None,
                default_services: vec![
                    "Fibre Installation".to_string(),
                    "Trenching".to_string(),
                    "Pole Planting".to_string(),
                    "Cable Stringing".to_string(),
                    "Splicing".to_string(),
                    "Home Drops".to_string(),
                    "Civil Works".to_string(),
                    "Maintenance".to_string(),
                ],
                max_rows: 10_000,
            },
            logging: LoggingConfig {
                filter: "info".to_string(),
            },
        }
    }
}

impl AppConfig {
    pub fn validate_all(&self) -> Result<()> {
        self.validate()?;
        if self.logging.filter.trim().is_empty() {
            return Err(AppError::ValidationError(
                "logging filter must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

pub struct ConfigService;

impl ConfigService {
    /// Defaults, then the TOML file (explicit path or `fieldops.toml`), then `FIELDOPS_*` env vars.
    pub fn load(path: Option<&Path>) -> Result<AppConfig> {
        let _ = dotenvy::dotenv();
        let figment = Self::figment(path);
        let config: AppConfig = figment
            .extract()
            .map_err(|e| AppError::ValidationError(format!("Invalid configuration: {}", e)))?;
        config.validate_all()?;
        Ok(config)
    }

    fn figment(path: Option<&Path>) -> Figment {
        let file = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}

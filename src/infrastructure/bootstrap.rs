use std::sync::{Arc, Mutex};

use sqlx::sqlite::SqlitePool;
use tracing::info;

use crate::application::use_cases::contractor_import::ContractorImportUseCase;
use crate::application::use_cases::dr_validation::DrValidationUseCase;
use crate::application::use_cases::photo_evaluation::{FeedbackRouting, PhotoEvaluationUseCase};
use crate::application::use_cases::qa_review::QaReviewUseCase;
use crate::application::use_cases::staff_documents::StaffDocumentsUseCase;
use crate::domain::error::Result;
use crate::infrastructure::clients::{
    HttpPhotoSource, HttpServiceCatalog, MessageGateway, OpenAiVisionClient, PhotoSource,
    ServiceCatalog, VisionModel, WhatsAppGatewayClient,
};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::db::connection::init_db;
use crate::infrastructure::db::contractors::ContractorRepository;
use crate::infrastructure::db::photo_evaluations::PhotoEvaluationRepository;
use crate::infrastructure::db::qa_reviews::QaReviewRepository;
use crate::infrastructure::db::staff_documents::StaffDocumentRepository;
use crate::infrastructure::storage::DocumentStore;
use crate::interfaces::http::{add_log, LogEntry};
use crate::interfaces::state::AppState;

/// External HTTP services the use cases talk to.
pub struct Collaborators {
    pub gateway: Arc<dyn MessageGateway>,
    pub vlm: Arc<dyn VisionModel>,
    pub photos: Arc<dyn PhotoSource>,
    pub catalog: Arc<dyn ServiceCatalog>,
}

impl Collaborators {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            gateway: Arc::new(WhatsAppGatewayClient::new(&config.whatsapp)),
            vlm: Arc::new(OpenAiVisionClient::new(&config.vlm)?),
            photos: Arc::new(HttpPhotoSource::new(&config.photos)),
            catalog: Arc::new(HttpServiceCatalog::new(&config.import)),
        })
    }
}

/// Open the database and wire every use case from configuration.
pub async fn build_state(config: &AppConfig) -> Result<AppState> {
    let pool = init_db(&config.database.url).await?;
    let collaborators = Collaborators::from_config(config)?;
    let logs = Arc::new(Mutex::new(Vec::new()));

    let state = assemble(pool, config, collaborators, logs);
    add_log(
        &state.logs,
        "INFO",
        "System",
        &format!("Backend initialized (database={})", config.database.url),
    );
    info!(
        database = %config.database.url,
        data_dir = %config.storage.data_dir.display(),
        "Application state ready"
    );
    Ok(state)
}

pub fn assemble(
    pool: SqlitePool,
    config: &AppConfig,
    collaborators: Collaborators,
    logs: Arc<Mutex<Vec<LogEntry>>>,
) -> AppState {
    let contractor_repo = Arc::new(ContractorRepository::new(pool.clone()));
    let document_repo = Arc::new(StaffDocumentRepository::new(pool.clone()));
    let qa_review_repo = Arc::new(QaReviewRepository::new(pool.clone()));
    let evaluation_repo = Arc::new(PhotoEvaluationRepository::new(pool.clone()));
    let document_store = Arc::new(DocumentStore::new(config.storage.data_dir.clone()));

    AppState {
        contractor_import_use_case: Arc::new(ContractorImportUseCase::new(
            contractor_repo,
            collaborators.catalog,
            config.import.max_rows,
        )),
        staff_documents_use_case: Arc::new(StaffDocumentsUseCase::new(
            document_repo,
            document_store,
            config.storage.max_upload_bytes,
        )),
        qa_review_use_case: Arc::new(QaReviewUseCase::new(
            qa_review_repo.clone(),
            collaborators.gateway.clone(),
            config.whatsapp.clone(),
        )),
        dr_validation_use_case: Arc::new(DrValidationUseCase::new(qa_review_repo.clone())),
        photo_evaluation_use_case: Arc::new(PhotoEvaluationUseCase::new(
            collaborators.photos,
            collaborators.vlm,
            evaluation_repo,
            FeedbackRouting {
                drops: qa_review_repo,
                gateway: collaborators.gateway,
                whatsapp: config.whatsapp.clone(),
            },
        )),
        pool,
        logs,
    }
}

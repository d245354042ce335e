use crate::application::{
    ContractorImportUseCase, DrValidationUseCase, PhotoEvaluationUseCase, QaReviewUseCase,
    StaffDocumentsUseCase,
};
use crate::interfaces::http::LogEntry;
use sqlx::sqlite::SqlitePool;
use std::sync::{Arc, Mutex};

/// Everything the HTTP handlers and CLI commands reach through.
pub struct AppState {
    pub pool: SqlitePool,
    pub contractor_import_use_case: Arc<ContractorImportUseCase>,
    pub staff_documents_use_case: Arc<StaffDocumentsUseCase>,
    pub qa_review_use_case: Arc<QaReviewUseCase>,
    pub dr_validation_use_case: Arc<DrValidationUseCase>,
    pub photo_evaluation_use_case: Arc<PhotoEvaluationUseCase>,
    pub logs: Arc<Mutex<Vec<LogEntry>>>,
}

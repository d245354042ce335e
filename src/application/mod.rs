pub mod use_cases;

pub use use_cases::contractor_import::ContractorImportUseCase;
pub use use_cases::dr_validation::DrValidationUseCase;
pub use use_cases::photo_evaluation::PhotoEvaluationUseCase;
pub use use_cases::qa_review::QaReviewUseCase;
pub use use_cases::staff_documents::StaffDocumentsUseCase;

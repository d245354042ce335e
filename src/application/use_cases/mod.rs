pub mod contractor_import;
pub mod dr_validation;
pub mod photo_evaluation;
pub mod qa_review;
pub mod staff_documents;

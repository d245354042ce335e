pub mod contractor;
pub mod dr_validation;
pub mod error;
pub mod photo_evaluation;
pub mod qa_review;
pub mod staff_document;

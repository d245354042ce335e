pub mod connection;
pub mod contractors;
pub mod photo_evaluations;
pub mod qa_reviews;
pub mod staff_documents;

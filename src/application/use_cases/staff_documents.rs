use crate::domain::error::{AppError, Result};
use crate::domain::staff_document::{
    compute_compliance, ComplianceStatus, DocumentFilter, DocumentType, StaffDocument,
    VerificationStatus,
};
use crate::infrastructure::db::staff_documents::StaffDocumentRepository;
use crate::infrastructure::storage::DocumentStore;
use crate::shared::encoding::decode_base64_content;
use crate::shared::time::{now_millis, today_sast};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub const ALLOWED_MIME_TYPES: [&str; 8] = [
    "application/pdf",
    "image/jpeg",
    "image/jpg",
    "image/png",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];

pub const DEFAULT_EXPIRY_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadDocumentRequest {
    pub staff_id: String,
    pub document_type: String,
    pub document_name: String,
    pub file_name: String,
    pub mime_type: String,
    pub content_base64: String,
    pub document_number: Option<String>,
    pub issued_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub issuing_authority: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentUpdate {
    pub document_name: Option<String>,
    pub document_number: Option<String>,
    pub issued_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub issuing_authority: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub status: String,
    pub notes: Option<String>,
    pub verified_by: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DocumentDownload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

pub struct StaffDocumentsUseCase {
    repository: Arc<StaffDocumentRepository>,
    store: Arc<DocumentStore>,
    max_upload_bytes: u64,
}

impl StaffDocumentsUseCase {
    pub fn new(
        repository: Arc<StaffDocumentRepository>,
        store: Arc<DocumentStore>,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            repository,
            store,
            max_upload_bytes,
        }
    }

    pub async fn upload(&self, request: UploadDocumentRequest) -> Result<StaffDocument> {
        let staff_id = required(&request.staff_id, "Staff ID")?;
        let document_name = required(&request.document_name, "Document name")?;
        let file_name = required(&request.file_name, "File name")?;
        let document_type = request
            .document_type
            .parse::<DocumentType>()
            .map_err(AppError::ValidationError)?;

        let mime_type = request.mime_type.trim().to_ascii_lowercase();
        if !ALLOWED_MIME_TYPES.contains(&mime_type.as_str()) {
            return Err(AppError::ValidationError(
                "Invalid file type. Allowed: PDF, JPEG, PNG, DOC, DOCX, XLS, XLSX".to_string(),
            ));
        }

        let bytes = decode_base64_content(&request.content_base64)?;
        if bytes.is_empty() {
            return Err(AppError::ValidationError("File is empty".to_string()));
        }
        if bytes.len() as u64 > self.max_upload_bytes {
            return Err(AppError::ValidationError(format!(
                "File size exceeds {} MB limit",
                self.max_upload_bytes / (1024 * 1024)
            )));
        }

        check_dates(document_type, request.issued_date, request.expiry_date)?;

        let now = now_millis();
        let file_url = self.store.save(staff_id, file_name, &bytes, now)?;

        let document = StaffDocument {
            id: Uuid::new_v4().to_string(),
            staff_id: staff_id.to_string(),
            document_type,
            document_name: document_name.to_string(),
            document_number: optional(request.document_number),
            issued_date: request.issued_date,
            expiry_date: request.expiry_date,
            issuing_authority: optional(request.issuing_authority),
            file_url,
            file_name: file_name.to_string(),
            file_size: bytes.len() as i64,
            mime_type,
            checksum: hex::encode(Sha256::digest(&bytes)),
            verification_status: VerificationStatus::Pending,
            verified_by: None,
            verified_at: None,
            verification_notes: None,
            created_at: now,
            updated_at: now,
        };

        if let Err(err) = self.repository.insert(&document).await {
            self.store.remove(&document.file_url)?;
            return Err(err);
        }

        info!(
            document_id = %document.id,
            staff_id = %document.staff_id,
            document_type = %document.document_type,
            size = document.file_size,
            "Stored staff document"
        );
        Ok(document)
    }

    pub async fn list_for_staff(
        &self,
        staff_id: &str,
        filter: &DocumentFilter,
    ) -> Result<Vec<StaffDocument>> {
        self.repository.list_for_staff(staff_id, filter).await
    }

    pub async fn get(&self, id: &str) -> Result<StaffDocument> {
        self.repository.get(id).await
    }

    pub async fn update(&self, id: &str, update: DocumentUpdate) -> Result<StaffDocument> {
        let mut document = self.repository.get(id).await?;

        if let Some(name) = update.document_name {
            let name = required(&name, "Document name")?;
            document.document_name = name.to_string();
        }
        if update.document_number.is_some() {
            document.document_number = optional(update.document_number);
        }
        if update.issued_date.is_some() {
            document.issued_date = update.issued_date;
        }
        if update.expiry_date.is_some() {
            document.expiry_date = update.expiry_date;
        }
        if update.issuing_authority.is_some() {
            document.issuing_authority = optional(update.issuing_authority);
        }

        check_dates(
            document.document_type,
            document.issued_date,
            document.expiry_date,
        )?;

        document.updated_at = now_millis();
        self.repository.update_metadata(&document).await?;
        Ok(document)
    }

    /// Delete the record, then its stored file.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let document = self.repository.get(id).await?;
        self.repository.delete(id).await?;
        self.store.remove(&document.file_url)?;
        info!(document_id = %id, staff_id = %document.staff_id, "Deleted staff document");
        Ok(())
    }

    pub async fn verify(&self, id: &str, request: VerifyRequest) -> Result<StaffDocument> {
        let status = request
            .status
            .parse::<VerificationStatus>()
            .map_err(AppError::ValidationError)?;
        if !matches!(
            status,
            VerificationStatus::Verified | VerificationStatus::Rejected
        ) {
            return Err(AppError::ValidationError(
                "Status must be verified or rejected".to_string(),
            ));
        }

        let notes = optional(request.notes);
        if status == VerificationStatus::Rejected && notes.is_none() {
            return Err(AppError::ValidationError(
                "Notes are required when rejecting a document".to_string(),
            ));
        }

        let document = self.repository.get(id).await?;
        if status == VerificationStatus::Verified
            && document.verification_status == VerificationStatus::Expired
        {
            return Err(AppError::ValidationError(
                "Cannot verify an expired document".to_string(),
            ));
        }

        let verified_by = optional(request.verified_by);
        self.repository
            .set_verification(
                id,
                status,
                verified_by.as_deref(),
                notes.as_deref(),
                now_millis(),
            )
            .await?;

        info!(document_id = %id, status = %status, "Updated document verification");
        self.repository.get(id).await
    }

    pub async fn expiring(
        &self,
        days: Option<i64>,
        staff_id: Option<&str>,
    ) -> Result<Vec<StaffDocument>> {
        self.expiring_from(today_sast(), days, staff_id).await
    }

    pub async fn expiring_from(
        &self,
        today: NaiveDate,
        days: Option<i64>,
        staff_id: Option<&str>,
    ) -> Result<Vec<StaffDocument>> {
        let days = days.unwrap_or(DEFAULT_EXPIRY_WINDOW_DAYS);
        if days < 0 {
            return Err(AppError::ValidationError(
                "days must not be negative".to_string(),
            ));
        }
        let until = Duration::try_days(days)
            .and_then(|window| today.checked_add_signed(window))
            .ok_or_else(|| {
                AppError::ValidationError(format!("days is out of range: {}", days))
            })?;
        self.repository
            .expiring_between(today, until, staff_id)
            .await
    }

    pub async fn mark_expired(&self) -> Result<u64> {
        self.mark_expired_on(today_sast()).await
    }

    pub async fn mark_expired_on(&self, today: NaiveDate) -> Result<u64> {
        let changed = self.repository.mark_expired(today, now_millis()).await?;
        if changed > 0 {
            info!(count = changed, %today, "Marked staff documents expired");
        }
        Ok(changed)
    }

    pub async fn compliance(&self, staff_id: &str) -> Result<ComplianceStatus> {
        self.compliance_on(staff_id, today_sast()).await
    }

    pub async fn compliance_on(&self, staff_id: &str, today: NaiveDate) -> Result<ComplianceStatus> {
        let documents = self
            .repository
            .list_for_staff(staff_id, &DocumentFilter::default())
            .await?;
        Ok(compute_compliance(staff_id, &documents, today))
    }

    pub async fn compliance_overview(&self) -> Result<Vec<ComplianceStatus>> {
        self.compliance_overview_on(today_sast()).await
    }

    /// Every staff member with documents, worst status first.
    pub async fn compliance_overview_on(&self, today: NaiveDate) -> Result<Vec<ComplianceStatus>> {
        let mut by_staff: BTreeMap<String, Vec<StaffDocument>> = BTreeMap::new();
        for document in self.repository.list_all().await? {
            by_staff
                .entry(document.staff_id.clone())
                .or_default()
                .push(document);
        }

        let mut overview: Vec<ComplianceStatus> = by_staff
            .iter()
            .map(|(staff_id, documents)| compute_compliance(staff_id, documents, today))
            .collect();
        overview.sort_by(|a, b| {
            a.status
                .cmp(&b.status)
                .then_with(|| a.staff_id.cmp(&b.staff_id))
        });
        Ok(overview)
    }

    pub async fn download(&self, id: &str) -> Result<DocumentDownload> {
        let document = self.repository.get(id).await?;
        let bytes = self.store.read(&document.file_url)?;
        Ok(DocumentDownload {
            file_name: document.file_name,
            mime_type: document.mime_type,
            bytes,
        })
    }
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::ValidationError(format!("{} is required", field)));
    }
    Ok(trimmed)
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_dates(
    document_type: DocumentType,
    issued: Option<NaiveDate>,
    expiry: Option<NaiveDate>,
) -> Result<()> {
    if document_type.requires_expiry() && expiry.is_none() {
        return Err(AppError::ValidationError(format!(
            "Expiry date is required for {}",
            document_type.label()
        )));
    }
    if let (Some(issued), Some(expiry)) = (issued, expiry) {
        if expiry < issued {
            return Err(AppError::ValidationError(
                "Expiry date cannot be before issued date".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::staff_document::ComplianceLevel;
    use crate::infrastructure::db::connection::init_memory_db;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use tempfile::TempDir;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    async fn use_case() -> (StaffDocumentsUseCase, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let repository = Arc::new(StaffDocumentRepository::new(init_memory_db().await.unwrap()));
        let store = Arc::new(DocumentStore::new(dir.path()));
        (StaffDocumentsUseCase::new(repository, store, 1024), dir)
    }

    fn request(staff_id: &str, document_type: &str, expiry: Option<&str>) -> UploadDocumentRequest {
        UploadDocumentRequest {
            staff_id: staff_id.to_string(),
            document_type: document_type.to_string(),
            document_name: "Scan".to_string(),
            file_name: "scan.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            content_base64: STANDARD.encode(b"%PDF-1.4 test"),
            expiry_date: expiry.map(date),
            ..UploadDocumentRequest::default()
        }
    }

    #[tokio::test]
    async fn upload_stores_file_and_checksum() {
        let (use_case, dir) = use_case().await;
        let doc = use_case.upload(request("s1", "id_document", None)).await.unwrap();

        assert_eq!(doc.verification_status, VerificationStatus::Pending);
        assert_eq!(doc.file_size, 13);
        assert_eq!(doc.checksum, hex::encode(Sha256::digest(b"%PDF-1.4 test")));
        assert!(doc.file_url.starts_with("documents/s1/"));
        assert!(dir.path().join(&doc.file_url).exists());

        let download = use_case.download(&doc.id).await.unwrap();
        assert_eq!(download.bytes, b"%PDF-1.4 test");
        assert_eq!(download.mime_type, "application/pdf");
    }

    #[tokio::test]
    async fn upload_rejects_bad_input() {
        let (use_case, _dir) = use_case().await;

        let unknown_type = use_case.upload(request("s1", "passport", None)).await;
        assert!(matches!(unknown_type, Err(AppError::ValidationError(m)) if m.starts_with("Invalid document type")));

        let mut exe = request("s1", "id_document", None);
        exe.mime_type = "application/x-msdownload".to_string();
        assert!(use_case.upload(exe).await.is_err());

        let mut too_big = request("s1", "id_document", None);
        too_big.content_base64 = STANDARD.encode(vec![0u8; 2048]);
        assert!(use_case.upload(too_big).await.is_err());

        let no_expiry = use_case.upload(request("s1", "drivers_license", None)).await;
        assert!(matches!(no_expiry, Err(AppError::ValidationError(_))));

        let mut backwards = request("s1", "work_permit", Some("2025-01-01"));
        backwards.issued_date = Some(date("2025-06-01"));
        assert!(use_case.upload(backwards).await.is_err());

        assert!(use_case.upload(request("  ", "id_document", None)).await.is_err());
    }

    #[tokio::test]
    async fn data_url_content_is_accepted() {
        let (use_case, _dir) = use_case().await;
        let mut req = request("s1", "bank_details", None);
        req.content_base64 = format!("data:application/pdf;base64,{}", STANDARD.encode(b"abc"));
        let doc = use_case.upload(req).await.unwrap();
        assert_eq!(doc.file_size, 3);
    }

    #[tokio::test]
    async fn verify_rules() {
        let (use_case, _dir) = use_case().await;
        let doc = use_case.upload(request("s1", "id_document", None)).await.unwrap();

        let reject_without_notes = use_case
            .verify(
                &doc.id,
                VerifyRequest {
                    status: "rejected".to_string(),
                    notes: Some("  ".to_string()),
                    verified_by: None,
                },
            )
            .await;
        assert!(matches!(reject_without_notes, Err(AppError::ValidationError(_))));

        let pending = use_case
            .verify(
                &doc.id,
                VerifyRequest {
                    status: "pending".to_string(),
                    notes: None,
                    verified_by: None,
                },
            )
            .await;
        assert!(pending.is_err());

        let verified = use_case
            .verify(
                &doc.id,
                VerifyRequest {
                    status: "verified".to_string(),
                    notes: None,
                    verified_by: Some("hr-admin".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(verified.verification_status, VerificationStatus::Verified);
        assert_eq!(verified.verified_by.as_deref(), Some("hr-admin"));
        assert!(verified.verified_at.is_some());
    }

    #[tokio::test]
    async fn expired_documents_cannot_be_verified() {
        let (use_case, _dir) = use_case().await;
        let doc = use_case
            .upload(request("s1", "medical_certificate", Some("2025-01-31")))
            .await
            .unwrap();

        assert_eq!(use_case.mark_expired_on(date("2025-02-01")).await.unwrap(), 1);

        let result = use_case
            .verify(
                &doc.id,
                VerifyRequest {
                    status: "verified".to_string(),
                    notes: None,
                    verified_by: None,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::ValidationError(m)) if m.contains("expired")));
    }

    #[tokio::test]
    async fn update_is_partial_and_revalidated() {
        let (use_case, _dir) = use_case().await;
        let doc = use_case
            .upload(request("s1", "certification", Some("2026-03-01")))
            .await
            .unwrap();

        let updated = use_case
            .update(
                &doc.id,
                DocumentUpdate {
                    document_number: Some("CERT-9".to_string()),
                    ..DocumentUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.document_number.as_deref(), Some("CERT-9"));
        assert_eq!(updated.document_name, "Scan");
        assert_eq!(updated.expiry_date, Some(date("2026-03-01")));

        let invalid = use_case
            .update(
                &doc.id,
                DocumentUpdate {
                    issued_date: Some(date("2027-01-01")),
                    ..DocumentUpdate::default()
                },
            )
            .await;
        assert!(invalid.is_err());
    }

    #[tokio::test]
    async fn delete_removes_stored_file() {
        let (use_case, dir) = use_case().await;
        let doc = use_case.upload(request("s1", "id_document", None)).await.unwrap();
        let path = dir.path().join(&doc.file_url);

        use_case.delete(&doc.id).await.unwrap();
        assert!(!path.exists());
        assert!(matches!(use_case.get(&doc.id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn expiring_window_defaults_to_thirty_days() {
        let (use_case, _dir) = use_case().await;
        use_case
            .upload(request("s1", "drivers_license", Some("2025-06-20")))
            .await
            .unwrap();
        use_case
            .upload(request("s2", "work_permit", Some("2025-06-05")))
            .await
            .unwrap();
        use_case
            .upload(request("s1", "certification", Some("2025-08-01")))
            .await
            .unwrap();

        let today = date("2025-06-01");
        let soon = use_case.expiring_from(today, None, None).await.unwrap();
        let expiries: Vec<_> = soon.iter().filter_map(|d| d.expiry_date).collect();
        assert_eq!(expiries, vec![date("2025-06-05"), date("2025-06-20")]);

        let week = use_case.expiring_from(today, Some(7), Some("s2")).await.unwrap();
        assert_eq!(week.len(), 1);
    }

    #[tokio::test]
    async fn expiring_window_out_of_range_is_rejected() {
        let (use_case, _dir) = use_case().await;
        let today = date("2025-06-01");

        for days in [1_000_000_000, i64::MAX, -1] {
            let result = use_case.expiring_from(today, Some(days), None).await;
            assert!(
                matches!(result, Err(AppError::ValidationError(_))),
                "days={} gave {:?}",
                days,
                result
            );
        }
        assert!(use_case.expiring(Some(1_000_000_000), None).await.is_err());
    }

    #[tokio::test]
    async fn overview_orders_worst_first() {
        let (use_case, _dir) = use_case().await;
        let today = date("2025-06-01");

        for staff in ["b-complete", "a-warning"] {
            use_case.upload(request(staff, "id_document", None)).await.unwrap();
            use_case
                .upload(request(staff, "employment_contract", None))
                .await
                .unwrap();
        }
        for doc in use_case
            .list_for_staff("b-complete", &DocumentFilter::default())
            .await
            .unwrap()
        {
            use_case
                .verify(
                    &doc.id,
                    VerifyRequest {
                        status: "verified".to_string(),
                        notes: None,
                        verified_by: None,
                    },
                )
                .await
                .unwrap();
        }
        use_case.upload(request("c-missing", "id_document", None)).await.unwrap();

        let overview = use_case.compliance_overview_on(today).await.unwrap();
        let order: Vec<(&str, ComplianceLevel)> = overview
            .iter()
            .map(|c| (c.staff_id.as_str(), c.status))
            .collect();
        assert_eq!(
            order,
            vec![
                ("c-missing", ComplianceLevel::NonCompliant),
                ("a-warning", ComplianceLevel::Warning),
                ("b-complete", ComplianceLevel::Compliant),
            ]
        );

        let single = use_case.compliance_on("c-missing", today).await.unwrap();
        assert_eq!(single.compliance_percentage, 50);
        assert_eq!(single.missing_required, vec![DocumentType::EmploymentContract]);
    }
}

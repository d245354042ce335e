use crate::domain::error::{AppError, Result};
use crate::domain::staff_document::{
    DocumentFilter, DocumentType, StaffDocument, VerificationStatus,
};
use chrono::NaiveDate;
use sqlx::sqlite::SqlitePool;

const DOCUMENT_COLUMNS: &str = "id, staff_id, document_type, document_name, document_number, issued_date,
     expiry_date, issuing_authority, file_url, file_name, file_size, mime_type, checksum,
     verification_status, verified_by, verified_at, verification_notes, created_at, updated_at";

pub struct StaffDocumentRepository {
    pool: SqlitePool,
}

impl StaffDocumentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, doc: &StaffDocument) -> Result<()> {
        sqlx::query(
            "INSERT INTO staff_documents (id, staff_id, document_type, document_name, document_number,
             issued_date, expiry_date, issuing_authority, file_url, file_name, file_size, mime_type,
             checksum, verification_status, verified_by, verified_at, verification_notes, created_at,
             updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&doc.id)
        .bind(&doc.staff_id)
        .bind(doc.document_type.as_str())
        .bind(&doc.document_name)
        .bind(&doc.document_number)
        .bind(doc.issued_date)
        .bind(doc.expiry_date)
        .bind(&doc.issuing_authority)
        .bind(&doc.file_url)
        .bind(&doc.file_name)
        .bind(doc.file_size)
        .bind(&doc.mime_type)
        .bind(&doc.checksum)
        .bind(doc.verification_status.as_str())
        .bind(&doc.verified_by)
        .bind(doc.verified_at)
        .bind(&doc.verification_notes)
        .bind(doc.created_at)
        .bind(doc.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to insert staff document: {e}")))?;

        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<StaffDocument> {
        let query = format!("SELECT {DOCUMENT_COLUMNS} FROM staff_documents WHERE id = ?");
        let entity = sqlx::query_as::<_, StaffDocumentEntity>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to fetch staff document: {e}")))?;

        match entity {
            Some(entity) => entity.try_into(),
            None => Err(AppError::NotFound(format!("Document not found: {}", id))),
        }
    }

    pub async fn list_for_staff(
        &self,
        staff_id: &str,
        filter: &DocumentFilter,
    ) -> Result<Vec<StaffDocument>> {
        let mut query = format!("SELECT {DOCUMENT_COLUMNS} FROM staff_documents WHERE staff_id = ?");
        if filter.document_type.is_some() {
            query.push_str(" AND document_type = ?");
        }
        if filter.verification_status.is_some() {
            query.push_str(" AND verification_status = ?");
        }
        query.push_str(" ORDER BY created_at DESC");

        let mut q = sqlx::query_as::<_, StaffDocumentEntity>(&query).bind(staff_id);
        if let Some(document_type) = filter.document_type {
            q = q.bind(document_type.as_str());
        }
        if let Some(status) = filter.verification_status {
            q = q.bind(status.as_str());
        }

        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to list staff documents: {e}")))?;
        rows.into_iter().map(StaffDocument::try_from).collect()
    }

    pub async fn list_all(&self) -> Result<Vec<StaffDocument>> {
        let query = format!("SELECT {DOCUMENT_COLUMNS} FROM staff_documents ORDER BY staff_id, created_at DESC");
        let rows = sqlx::query_as::<_, StaffDocumentEntity>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to list staff documents: {e}")))?;
        rows.into_iter().map(StaffDocument::try_from).collect()
    }

    /// Persist the editable metadata fields of a document.
    pub async fn update_metadata(&self, doc: &StaffDocument) -> Result<()> {
        let result = sqlx::query(
            "UPDATE staff_documents
             SET document_name = ?, document_number = ?, issued_date = ?, expiry_date = ?,
                 issuing_authority = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&doc.document_name)
        .bind(&doc.document_number)
        .bind(doc.issued_date)
        .bind(doc.expiry_date)
        .bind(&doc.issuing_authority)
        .bind(doc.updated_at)
        .bind(&doc.id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to update staff document: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Document not found: {}", doc.id)));
        }
        Ok(())
    }

    pub async fn set_verification(
        &self,
        id: &str,
        status: VerificationStatus,
        verified_by: Option<&str>,
        notes: Option<&str>,
        now: i64,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE staff_documents
             SET verification_status = ?, verified_by = ?, verified_at = ?, verification_notes = ?,
                 updated_at = ?
             WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(verified_by)
        .bind(now)
        .bind(notes)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to verify staff document: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Document not found: {}", id)));
        }
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM staff_documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to delete staff document: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Document not found: {}", id)));
        }
        Ok(())
    }

    /// Documents whose expiry falls in `[from, to]`, soonest first.
    pub async fn expiring_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        staff_id: Option<&str>,
    ) -> Result<Vec<StaffDocument>> {
        let mut query = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM staff_documents
             WHERE expiry_date IS NOT NULL AND expiry_date >= ? AND expiry_date <= ?"
        );
        if staff_id.is_some() {
            query.push_str(" AND staff_id = ?");
        }
        query.push_str(" ORDER BY expiry_date ASC, staff_id");

        let mut q = sqlx::query_as::<_, StaffDocumentEntity>(&query)
            .bind(from)
            .bind(to);
        if let Some(staff_id) = staff_id {
            q = q.bind(staff_id);
        }

        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to list expiring documents: {e}")))?;
        rows.into_iter().map(StaffDocument::try_from).collect()
    }

    /// Flip pending/verified documents that expired before `today`; returns how many changed.
    pub async fn mark_expired(&self, today: NaiveDate, now: i64) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE staff_documents SET verification_status = 'expired', updated_at = ?
             WHERE expiry_date IS NOT NULL AND expiry_date < ?
               AND verification_status IN ('pending', 'verified')",
        )
        .bind(now)
        .bind(today)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to mark expired documents: {e}")))?;

        Ok(result.rows_affected())
    }
}

#[derive(sqlx::FromRow)]
struct StaffDocumentEntity {
    id: String,
    staff_id: String,
    document_type: String,
    document_name: String,
    document_number: Option<String>,
    issued_date: Option<NaiveDate>,
    expiry_date: Option<NaiveDate>,
    issuing_authority: Option<String>,
    file_url: String,
    file_name: String,
    file_size: i64,
    mime_type: String,
    checksum: String,
    verification_status: String,
    verified_by: Option<String>,
    verified_at: Option<i64>,
    verification_notes: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<StaffDocumentEntity> for StaffDocument {
    type Error = AppError;

    fn try_from(entity: StaffDocumentEntity) -> Result<Self> {
        let document_type = entity
            .document_type
            .parse::<DocumentType>()
            .map_err(AppError::DatabaseError)?;
        let verification_status = entity
            .verification_status
            .parse::<VerificationStatus>()
            .map_err(AppError::DatabaseError)?;

        Ok(Self {
            id: entity.id,
            staff_id: entity.staff_id,
            document_type,
            document_name: entity.document_name,
            document_number: entity.document_number,
            issued_date: entity.issued_date,
            expiry_date: entity.expiry_date,
            issuing_authority: entity.issuing_authority,
            file_url: entity.file_url,
            file_name: entity.file_name,
            file_size: entity.file_size,
            mime_type: entity.mime_type,
            checksum: entity.checksum,
            verification_status,
            verified_by: entity.verified_by,
            verified_at: entity.verified_at,
            verification_notes: entity.verification_notes,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        })
    }
}

use crate::domain::contractor::{Contractor, ContractorData};
use crate::domain::error::{AppError, Result};
use sqlx::sqlite::SqlitePool;
use std::collections::HashSet;

const CONTRACTOR_COLUMNS: &str = "id, company_name, contact_person, email, phone, address, city, province,
     postal_code, business_type, registration_number, tax_number, services, specializations,
     bbbee_level, certifications, hourly_rate, daily_rate, notes, status, import_session_id,
     created_at, updated_at";

/// Lowercased emails and registration numbers already on file.
#[derive(Debug, Default, Clone)]
pub struct ExistingContractorKeys {
    pub emails: HashSet<String>,
    pub registration_numbers: HashSet<String>,
}

pub struct ContractorRepository {
    pool: SqlitePool,
}

impl ContractorRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert all rows in one transaction; nothing is written if any insert fails.
    pub async fn insert_batch(
        &self,
        rows: &[ContractorData],
        import_session_id: &str,
        now: i64,
    ) -> Result<Vec<String>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to start import transaction: {e}")))?;

        let mut ids = Vec::with_capacity(rows.len());
        for data in rows {
            let id = uuid::Uuid::new_v4().to_string();
            sqlx::query(
                "INSERT INTO contractors (id, company_name, contact_person, email, phone, address, city,
                 province, postal_code, business_type, registration_number, tax_number, services,
                 specializations, bbbee_level, certifications, hourly_rate, daily_rate, notes, status,
                 import_session_id, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(&data.company_name)
            .bind(&data.contact_person)
            .bind(&data.email)
            .bind(&data.phone)
            .bind(&data.address)
            .bind(&data.city)
            .bind(&data.province)
            .bind(&data.postal_code)
            .bind(&data.business_type)
            .bind(&data.registration_number)
            .bind(&data.tax_number)
            .bind(encode_list(&data.services)?)
            .bind(encode_list(&data.specializations)?)
            .bind(&data.bbbee_level)
            .bind(encode_list(&data.certifications)?)
            .bind(data.hourly_rate)
            .bind(data.daily_rate)
            .bind(&data.notes)
            .bind(&data.status)
            .bind(import_session_id)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!(
                    "Failed to insert contractor {}: {e}",
                    data.company_name
                ))
            })?;
            ids.push(id);
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit import: {e}")))?;

        Ok(ids)
    }

    pub async fn list(&self) -> Result<Vec<Contractor>> {
        let query = format!(
            "SELECT {CONTRACTOR_COLUMNS} FROM contractors ORDER BY company_name COLLATE NOCASE, created_at"
        );
        let rows = sqlx::query_as::<_, ContractorEntity>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to list contractors: {e}")))?;

        rows.into_iter().map(Contractor::try_from).collect()
    }

    pub async fn existing_keys(&self) -> Result<ExistingContractorKeys> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT email, registration_number FROM contractors")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(format!("Failed to load contractor keys: {e}"))
                })?;

        let mut keys = ExistingContractorKeys::default();
        for (email, registration) in rows {
            let email = email.trim().to_lowercase();
            if !email.is_empty() {
                keys.emails.insert(email);
            }
            let registration = registration.trim().to_lowercase();
            if !registration.is_empty() {
                keys.registration_numbers.insert(registration);
            }
        }
        Ok(keys)
    }

    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM contractors")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to count contractors: {e}")))?;
        Ok(count)
    }
}

fn encode_list(values: &[String]) -> Result<String> {
    Ok(serde_json::to_string(values)?)
}

fn decode_list(raw: &str) -> Result<Vec<String>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(raw)?)
}

#[derive(sqlx::FromRow)]
struct ContractorEntity {
    id: String,
    company_name: String,
    contact_person: String,
    email: String,
    phone: String,
    address: String,
    city: String,
    province: String,
    postal_code: String,
    business_type: String,
    registration_number: String,
    tax_number: String,
    services: String,
    specializations: String,
    bbbee_level: String,
    certifications: String,
    hourly_rate: Option<f64>,
    daily_rate: Option<f64>,
    notes: String,
    status: String,
    import_session_id: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<ContractorEntity> for Contractor {
    type Error = AppError;

    fn try_from(entity: ContractorEntity) -> Result<Self> {
        Ok(Self {
            id: entity.id,
            data: ContractorData {
                company_name: entity.company_name,
                contact_person: entity.contact_person,
                email: entity.email,
                phone: entity.phone,
                address: entity.address,
                city: entity.city,
                province: entity.province,
                postal_code: entity.postal_code,
                business_type: entity.business_type,
                registration_number: entity.registration_number,
                tax_number: entity.tax_number,
                services: decode_list(&entity.services)?,
                specializations: decode_list(&entity.specializations)?,
                bbbee_level: entity.bbbee_level,
                certifications: decode_list(&entity.certifications)?,
                hourly_rate: entity.hourly_rate,
                daily_rate: entity.daily_rate,
                notes: entity.notes,
                status: entity.status,
            },
            import_session_id: entity.import_session_id,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        })
    }
}

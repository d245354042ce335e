use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical column of the contractor import sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportField {
    CompanyName,
    ContactPerson,
    Email,
    Phone,
    Address,
    City,
    Province,
    PostalCode,
    BusinessType,
    RegistrationNumber,
    TaxNumber,
    Services,
    Specializations,
    BbbeeLevel,
    Certifications,
    HourlyRate,
    DailyRate,
    Notes,
}

impl ImportField {
    pub const ALL: [ImportField; 18] = [
        ImportField::CompanyName,
        ImportField::ContactPerson,
        ImportField::Email,
        ImportField::Phone,
        ImportField::Address,
        ImportField::City,
        ImportField::Province,
        ImportField::PostalCode,
        ImportField::BusinessType,
        ImportField::RegistrationNumber,
        ImportField::TaxNumber,
        ImportField::Services,
        ImportField::Specializations,
        ImportField::BbbeeLevel,
        ImportField::Certifications,
        ImportField::HourlyRate,
        ImportField::DailyRate,
        ImportField::Notes,
    ];

    /// Column label used in templates and exports.
    pub fn label(self) -> &'static str {
        match self {
            ImportField::CompanyName => "Company Name",
            ImportField::ContactPerson => "Contact Person",
            ImportField::Email => "Email",
            ImportField::Phone => "Phone",
            ImportField::Address => "Address",
            ImportField::City => "City",
            ImportField::Province => "Province",
            ImportField::PostalCode => "Postal Code",
            ImportField::BusinessType => "Business Type",
            ImportField::RegistrationNumber => "Registration Number",
            ImportField::TaxNumber => "Tax Number",
            ImportField::Services => "Services",
            ImportField::Specializations => "Specializations",
            ImportField::BbbeeLevel => "BBBEE Level",
            ImportField::Certifications => "Certifications",
            ImportField::HourlyRate => "Hourly Rate",
            ImportField::DailyRate => "Daily Rate",
            ImportField::Notes => "Notes",
        }
    }

    /// Cleaned header spellings (see `clean_header`) accepted for this field.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            ImportField::CompanyName => &[
                "company_name",
                "company",
                "companyname",
                "business_name",
                "contractor_name",
                "contractor",
                "name",
            ],
            ImportField::ContactPerson => &[
                "contact_person",
                "contactperson",
                "contact_name",
                "contact",
                "representative",
            ],
            ImportField::Email => &["email", "email_address", "e_mail", "contact_email"],
            ImportField::Phone => &[
                "phone",
                "phone_number",
                "telephone",
                "tel",
                "mobile",
                "cell",
                "cell_number",
                "contact_number",
            ],
            ImportField::Address => &["address", "street_address", "physical_address"],
            ImportField::City => &["city", "town"],
            ImportField::Province => &["province", "region", "state"],
            ImportField::PostalCode => &["postal_code", "postcode", "zip", "zip_code", "code"],
            ImportField::BusinessType => &["business_type", "company_type", "entity_type", "type"],
            ImportField::RegistrationNumber => &[
                "registration_number",
                "registration_no",
                "reg_number",
                "reg_no",
                "company_registration",
                "cipc_number",
            ],
            ImportField::TaxNumber => &["tax_number", "vat_number", "tax_no", "vat_no", "tax_id"],
            ImportField::Services => &["services", "service", "services_offered"],
            ImportField::Specializations => &["specializations", "specialisations", "specialization", "specialisation", "skills"],
            ImportField::BbbeeLevel => &["bbbee_level", "b_bbee_level", "bbbee", "bee_level", "bee"],
            ImportField::Certifications => &["certifications", "certification", "certificates"],
            ImportField::HourlyRate => &["hourly_rate", "rate_per_hour", "hourly"],
            ImportField::DailyRate => &["daily_rate", "rate_per_day", "day_rate", "daily"],
            ImportField::Notes => &["notes", "note", "comments", "comment", "remarks"],
        }
    }

    pub fn from_header(header: &str) -> Option<ImportField> {
        let cleaned = clean_header(header);
        if cleaned.is_empty() {
            return None;
        }
        ImportField::ALL
            .into_iter()
            .find(|field| field.aliases().contains(&cleaned.as_str()))
    }
}

/// Lowercase a header, replace non-alphanumerics with `_` and collapse repeats.
pub fn clean_header(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect::<String>()
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// One data row as read from the uploaded file, before normalisation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RawImportRow {
    /// 1-based sheet row (the header occupies row 1).
    pub row_number: usize,
    pub original_data: BTreeMap<String, String>,
    pub values: BTreeMap<ImportField, String>,
}

impl RawImportRow {
    pub fn value(&self, field: ImportField) -> Option<&str> {
        self.values.get(&field).map(|v| v.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ParsedSheet {
    pub headers: Vec<String>,
    pub unmapped_headers: Vec<String>,
    pub rows: Vec<RawImportRow>,
    pub empty_rows: usize,
}

/// Normalised contractor data for one import row.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ContractorData {
    pub company_name: String,
    pub contact_person: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub province: String,
    pub postal_code: String,
    pub business_type: String,
    pub registration_number: String,
    pub tax_number: String,
    pub services: Vec<String>,
    pub specializations: Vec<String>,
    pub bbbee_level: String,
    pub certifications: Vec<String>,
    pub hourly_rate: Option<f64>,
    pub daily_rate: Option<f64>,
    pub notes: String,
    pub status: String,
}

/// Transient per-import record: original values, normalised values and the verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractorImportRow {
    pub row_number: usize,
    pub original_data: BTreeMap<String, String>,
    pub data: ContractorData,
    pub validation_errors: Vec<String>,
    pub warnings: Vec<String>,
    pub is_valid: bool,
    pub is_duplicate: bool,
}

impl ContractorImportRow {
    pub fn new(row_number: usize, original_data: BTreeMap<String, String>, data: ContractorData) -> Self {
        Self {
            row_number,
            original_data,
            data,
            validation_errors: Vec::new(),
            warnings: Vec::new(),
            is_valid: true,
            is_duplicate: false,
        }
    }

    /// Identifier for in-file duplicate detection.
    pub fn identifier(&self) -> String {
        let parts: Vec<String> = [
            &self.data.company_name,
            &self.data.email,
            &self.data.registration_number,
        ]
        .iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect();

        if parts.is_empty() {
            format!("row_{}", self.row_number)
        } else {
            parts.join("|")
        }
    }

    pub fn is_importable(&self) -> bool {
        self.is_valid && !self.is_duplicate
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ImportStatistics {
    pub total_rows: usize,
    pub valid_rows: usize,
    pub invalid_rows: usize,
    pub duplicate_rows: usize,
    pub existing_rows: usize,
    pub empty_rows: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImportStage {
    Parsing,
    Transforming,
    Validating,
    Importing,
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportProgress {
    pub stage: ImportStage,
    pub processed: usize,
    pub total: usize,
}

impl ImportProgress {
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return if self.stage == ImportStage::Completed { 100 } else { 0 };
        }
        ((self.processed.min(self.total) * 100) / self.total) as u8
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportPreview {
    pub session_id: String,
    pub headers: Vec<String>,
    pub unmapped_headers: Vec<String>,
    pub rows: Vec<ContractorImportRow>,
    pub statistics: ImportStatistics,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RowFailure {
    pub row_number: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub session_id: String,
    pub imported: usize,
    pub skipped: usize,
    pub imported_ids: Vec<String>,
    pub failed_rows: Vec<RowFailure>,
    pub statistics: ImportStatistics,
}

/// Stored contractor record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contractor {
    pub id: String,
    #[serde(flatten)]
    pub data: ContractorData,
    pub import_session_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

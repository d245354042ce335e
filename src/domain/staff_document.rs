use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    IdDocument,
    DriversLicense,
    EmploymentContract,
    Certification,
    Qualification,
    MedicalCertificate,
    PoliceClearance,
    BankDetails,
    TaxDocument,
    WorkPermit,
    Other,
}

impl DocumentType {
    pub const ALL: [DocumentType; 11] = [
        DocumentType::IdDocument,
        DocumentType::DriversLicense,
        DocumentType::EmploymentContract,
        DocumentType::Certification,
        DocumentType::Qualification,
        DocumentType::MedicalCertificate,
        DocumentType::PoliceClearance,
        DocumentType::BankDetails,
        DocumentType::TaxDocument,
        DocumentType::WorkPermit,
        DocumentType::Other,
    ];

    pub const REQUIRED: [DocumentType; 2] =
        [DocumentType::IdDocument, DocumentType::EmploymentContract];

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::IdDocument => "id_document",
            DocumentType::DriversLicense => "drivers_license",
            DocumentType::EmploymentContract => "employment_contract",
            DocumentType::Certification => "certification",
            DocumentType::Qualification => "qualification",
            DocumentType::MedicalCertificate => "medical_certificate",
            DocumentType::PoliceClearance => "police_clearance",
            DocumentType::BankDetails => "bank_details",
            DocumentType::TaxDocument => "tax_document",
            DocumentType::WorkPermit => "work_permit",
            DocumentType::Other => "other",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DocumentType::IdDocument => "ID Document",
            DocumentType::DriversLicense => "Driver's License",
            DocumentType::EmploymentContract => "Employment Contract",
            DocumentType::Certification => "Certification",
            DocumentType::Qualification => "Qualification",
            DocumentType::MedicalCertificate => "Medical Certificate",
            DocumentType::PoliceClearance => "Police Clearance",
            DocumentType::BankDetails => "Bank Details",
            DocumentType::TaxDocument => "Tax Document",
            DocumentType::WorkPermit => "Work Permit",
            DocumentType::Other => "Other",
        }
    }

    /// Types that lapse and therefore must carry an expiry date.
    pub fn requires_expiry(self) -> bool {
        matches!(
            self,
            DocumentType::DriversLicense
                | DocumentType::Certification
                | DocumentType::MedicalCertificate
                | DocumentType::PoliceClearance
                | DocumentType::WorkPermit
        )
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        DocumentType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| {
                format!(
                    "Invalid document type. Allowed: {}",
                    DocumentType::ALL
                        .iter()
                        .map(|t| t.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Rejected,
    Expired,
}

impl VerificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Rejected => "rejected",
            VerificationStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(VerificationStatus::Pending),
            "verified" => Ok(VerificationStatus::Verified),
            "rejected" => Ok(VerificationStatus::Rejected),
            "expired" => Ok(VerificationStatus::Expired),
            other => Err(format!("Unknown verification status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StaffDocument {
    pub id: String,
    pub staff_id: String,
    pub document_type: DocumentType,
    pub document_name: String,
    pub document_number: Option<String>,
    pub issued_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub issuing_authority: Option<String>,
    pub file_url: String,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub checksum: String,
    pub verification_status: VerificationStatus,
    pub verified_by: Option<String>,
    pub verified_at: Option<i64>,
    pub verification_notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentFilter {
    pub document_type: Option<DocumentType>,
    pub verification_status: Option<VerificationStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceLevel {
    NonCompliant,
    Warning,
    Compliant,
}

impl ComplianceLevel {
    pub fn label(self) -> &'static str {
        match self {
            ComplianceLevel::NonCompliant => "Non-Compliant",
            ComplianceLevel::Warning => "Warning",
            ComplianceLevel::Compliant => "Compliant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceStatus {
    pub staff_id: String,
    pub total_documents: usize,
    pub verified_documents: usize,
    pub pending_documents: usize,
    pub rejected_documents: usize,
    pub expired_documents: usize,
    pub expiring_in_30_days: usize,
    pub expiring_in_7_days: usize,
    pub missing_required: Vec<DocumentType>,
    pub compliance_percentage: u8,
    pub status: ComplianceLevel,
}

/// Derive the compliance aggregate for one staff member as of `today`.
pub fn compute_compliance(staff_id: &str, documents: &[StaffDocument], today: NaiveDate) -> ComplianceStatus {
    let count = |status: VerificationStatus| {
        documents
            .iter()
            .filter(|d| d.verification_status == status)
            .count()
    };

    let verified = count(VerificationStatus::Verified);
    let pending = count(VerificationStatus::Pending);
    let rejected = count(VerificationStatus::Rejected);
    let expired = count(VerificationStatus::Expired);

    let in_7_days = today + Duration::days(7);
    let in_30_days = today + Duration::days(30);

    let expiring_in_7_days = documents
        .iter()
        .filter_map(|d| d.expiry_date)
        .filter(|expiry| *expiry > today && *expiry <= in_7_days)
        .count();

    let expiring_in_30_days = documents
        .iter()
        .filter_map(|d| d.expiry_date)
        .filter(|expiry| *expiry > in_7_days && *expiry <= in_30_days)
        .count();

    let existing: HashSet<DocumentType> = documents.iter().map(|d| d.document_type).collect();
    let missing_required: Vec<DocumentType> = DocumentType::REQUIRED
        .into_iter()
        .filter(|t| !existing.contains(t))
        .collect();

    let total_required = DocumentType::REQUIRED.len();
    let present_required = total_required - missing_required.len();
    let compliance_percentage = if total_required > 0 {
        ((present_required as f64 / total_required as f64) * 100.0).round() as u8
    } else {
        100
    };

    let status = if !missing_required.is_empty() || expired > 0 {
        ComplianceLevel::NonCompliant
    } else if expiring_in_7_days > 0 || pending > 0 {
        ComplianceLevel::Warning
    } else {
        ComplianceLevel::Compliant
    };

    ComplianceStatus {
        staff_id: staff_id.to_string(),
        total_documents: documents.len(),
        verified_documents: verified,
        pending_documents: pending,
        rejected_documents: rejected,
        expired_documents: expired,
        expiring_in_30_days,
        expiring_in_7_days,
        missing_required,
        compliance_percentage,
        status,
    }
}

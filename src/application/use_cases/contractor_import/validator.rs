use super::transformer::{BBBEE_LEVELS, BUSINESS_TYPES, PROVINCES};
use crate::domain::contractor::{ContractorImportRow, ImportStatistics};
use crate::infrastructure::db::contractors::ExistingContractorKeys;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());
static PHONE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\+27|0)[0-9]{9}$").unwrap());
static POSTAL_CODE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{4}$").unwrap());

pub const DUPLICATE_IN_FILE: &str = "Duplicate contractor entry found in import data";

const MAX_COMPANY_NAME: usize = 255;
const MAX_EMAIL: usize = 255;

/// Field length limits checked as errors.
const LENGTH_LIMITS: [(&str, usize); 7] = [
    ("Contact person", 100),
    ("Address", 500),
    ("City", 100),
    ("Postal code", 10),
    ("Registration number", 50),
    ("Tax number", 50),
    ("Notes", 1000),
];

/// Mark in-file duplicates, then validate every remaining row.
pub fn validate_rows(rows: &mut [ContractorImportRow], available_services: &[String]) {
    let mut seen = HashSet::new();
    for row in rows.iter_mut() {
        if !seen.insert(row.identifier()) {
            row.validation_errors = vec![DUPLICATE_IN_FILE.to_string()];
            row.is_valid = false;
            row.is_duplicate = true;
            continue;
        }
        validate_row(row, available_services);
    }
}

pub fn validate_row(row: &mut ContractorImportRow, available_services: &[String]) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let data = &row.data;

    let company_len = data.company_name.chars().count();
    if company_len < 2 {
        errors.push("Company name is required and must be at least 2 characters".to_string());
    } else if company_len > MAX_COMPANY_NAME {
        errors.push(format!(
            "Company name must be at most {} characters",
            MAX_COMPANY_NAME
        ));
    }

    if data.email.is_empty() {
        errors.push("Email address is required".to_string());
    } else if !EMAIL_PATTERN.is_match(&data.email) {
        errors.push("Invalid email format".to_string());
    } else if data.email.chars().count() > MAX_EMAIL {
        errors.push(format!("Email must be at most {} characters", MAX_EMAIL));
    }

    let lengths = [
        &data.contact_person,
        &data.address,
        &data.city,
        &data.postal_code,
        &data.registration_number,
        &data.tax_number,
        &data.notes,
    ];
    for ((label, limit), value) in LENGTH_LIMITS.iter().zip(lengths) {
        if value.chars().count() > *limit {
            errors.push(format!("{} must be at most {} characters", label, limit));
        }
    }

    if !available_services.is_empty() {
        for service in &data.services {
            let known = available_services
                .iter()
                .any(|s| s.trim().eq_ignore_ascii_case(service));
            if !known {
                errors.push(format!("Unknown service: {}", service));
            }
        }
    }

    if data.phone.is_empty() {
        warnings.push("Phone number is missing".to_string());
    } else if !PHONE_PATTERN.is_match(&data.phone) {
        warnings.push("Phone number format may be invalid".to_string());
    }

    if data.business_type.is_empty() {
        warnings.push("Business type not specified".to_string());
    } else if !BUSINESS_TYPES.contains(&data.business_type.as_str()) {
        warnings.push(format!("Unrecognised business type: {}", data.business_type));
    }

    if data.services.is_empty() {
        warnings.push("No services specified".to_string());
    }

    if data.address.is_empty() {
        warnings.push("Address information is incomplete".to_string());
    }

    if data.province.is_empty() {
        warnings.push("Province not specified".to_string());
    } else if !PROVINCES.contains(&data.province.as_str()) {
        warnings.push(format!("Unrecognised province: {}", data.province));
    }

    if !data.postal_code.is_empty() && !POSTAL_CODE_PATTERN.is_match(&data.postal_code) {
        warnings.push("Postal code should be 4 digits".to_string());
    }

    if !data.bbbee_level.is_empty() && !BBBEE_LEVELS.contains(&data.bbbee_level.as_str()) {
        warnings.push(format!("Unrecognised B-BBEE level: {}", data.bbbee_level));
    }

    row.is_valid = errors.is_empty();
    row.validation_errors = errors;
    row.warnings = warnings;
}

/// Flag valid rows that match a stored contractor or an earlier row of the same file;
/// returns how many matched.
pub fn flag_existing(rows: &mut [ContractorImportRow], existing: &ExistingContractorKeys) -> usize {
    let mut file_emails = HashSet::new();
    let mut file_registrations = HashSet::new();
    let mut flagged = 0;

    for row in rows.iter_mut().filter(|r| r.is_importable()) {
        let email = row.data.email.trim().to_lowercase();
        let registration = row.data.registration_number.trim().to_lowercase();
        let has_email = !email.is_empty();
        let has_registration = !registration.is_empty();

        let matched = if has_email && existing.emails.contains(&email) {
            Some(format!("Contractor with email {} already exists", row.data.email))
        } else if has_registration && existing.registration_numbers.contains(&registration) {
            Some(format!(
                "Contractor with registration number {} already exists",
                row.data.registration_number
            ))
        } else if has_email && file_emails.contains(&email) {
            Some(format!(
                "Email {} is already used by an earlier row in this file",
                row.data.email
            ))
        } else if has_registration && file_registrations.contains(&registration) {
            Some(format!(
                "Registration number {} is already used by an earlier row in this file",
                row.data.registration_number
            ))
        } else {
            None
        };

        match matched {
            Some(warning) => {
                row.warnings.push(warning);
                row.is_duplicate = true;
                flagged += 1;
            }
            None => {
                if has_email {
                    file_emails.insert(email);
                }
                if has_registration {
                    file_registrations.insert(registration);
                }
            }
        }
    }
    flagged
}

pub fn statistics(rows: &[ContractorImportRow], empty_rows: usize) -> ImportStatistics {
    let mut stats = ImportStatistics {
        total_rows: rows.len(),
        empty_rows,
        ..ImportStatistics::default()
    };
    for row in rows {
        match (row.is_valid, row.is_duplicate) {
            (true, false) => stats.valid_rows += 1,
            (true, true) => stats.existing_rows += 1,
            (false, true) => stats.duplicate_rows += 1,
            (false, false) => stats.invalid_rows += 1,
        }
    }
    stats
}

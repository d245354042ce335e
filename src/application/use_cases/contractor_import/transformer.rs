use crate::domain::contractor::{ContractorData, ContractorImportRow, ImportField, RawImportRow};

pub const PROVINCES: [&str; 9] = [
    "Eastern Cape",
    "Free State",
    "Gauteng",
    "KwaZulu-Natal",
    "Limpopo",
    "Mpumalanga",
    "North West",
    "Northern Cape",
    "Western Cape",
];

pub const BUSINESS_TYPES: [&str; 6] = [
    "Pty Ltd",
    "CC",
    "Sole Proprietor",
    "Partnership",
    "NPC",
    "Trust",
];

pub const BBBEE_LEVELS: [&str; 9] = [
    "Level 1",
    "Level 2",
    "Level 3",
    "Level 4",
    "Level 5",
    "Level 6",
    "Level 7",
    "Level 8",
    "Non-Compliant",
];

pub const DEFAULT_STATUS: &str = "pending";

pub fn transform_row(raw: &RawImportRow) -> ContractorImportRow {
    let text = |field: ImportField| raw.value(field).unwrap_or_default();

    let data = ContractorData {
        company_name: normalize_string(text(ImportField::CompanyName)),
        contact_person: normalize_string(text(ImportField::ContactPerson)),
        email: normalize_email(text(ImportField::Email)),
        phone: normalize_phone(text(ImportField::Phone)),
        address: normalize_string(text(ImportField::Address)),
        city: normalize_string(text(ImportField::City)),
        province: normalize_province(text(ImportField::Province)),
        postal_code: normalize_postal_code(text(ImportField::PostalCode)),
        business_type: normalize_business_type(text(ImportField::BusinessType)),
        registration_number: normalize_string(text(ImportField::RegistrationNumber)),
        tax_number: normalize_string(text(ImportField::TaxNumber)),
        services: normalize_list(text(ImportField::Services)),
        specializations: normalize_list(text(ImportField::Specializations)),
        bbbee_level: normalize_bbbee_level(text(ImportField::BbbeeLevel)),
        certifications: normalize_list(text(ImportField::Certifications)),
        hourly_rate: normalize_rate(text(ImportField::HourlyRate)),
        daily_rate: normalize_rate(text(ImportField::DailyRate)),
        notes: normalize_string(text(ImportField::Notes)),
        status: DEFAULT_STATUS.to_string(),
    };

    ContractorImportRow::new(raw.row_number, raw.original_data.clone(), data)
}

pub fn normalize_string(value: &str) -> String {
    value.trim().to_string()
}

pub fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Digits plus a single leading `+`; bare `27…` international numbers gain the `+`.
pub fn normalize_phone(value: &str) -> String {
    let kept: String = value
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();

    let mut phone = String::with_capacity(kept.len() + 1);
    for (index, c) in kept.chars().enumerate() {
        if c != '+' || index == 0 {
            phone.push(c);
        }
    }

    if phone.len() == 11 && phone.starts_with("27") {
        phone.insert(0, '+');
    }
    phone
}

pub fn normalize_province(value: &str) -> String {
    let trimmed = value.trim();
    let canonical = match trimmed.to_lowercase().as_str() {
        "western cape" | "wc" => "Western Cape",
        "eastern cape" | "ec" => "Eastern Cape",
        "northern cape" | "nc" => "Northern Cape",
        "free state" | "fs" => "Free State",
        "kwazulu-natal" | "kwazulu natal" | "kzn" => "KwaZulu-Natal",
        "north west" | "north-west" | "nw" => "North West",
        "gauteng" | "gp" => "Gauteng",
        "mpumalanga" | "mp" => "Mpumalanga",
        "limpopo" | "lp" => "Limpopo",
        _ => return trimmed.to_string(),
    };
    canonical.to_string()
}

pub fn normalize_postal_code(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

pub fn normalize_business_type(value: &str) -> String {
    let trimmed = value.trim();
    let canonical = match trimmed.to_lowercase().as_str() {
        "pty ltd" | "(pty) ltd" | "pty" | "proprietary limited" => "Pty Ltd",
        "cc" | "close corporation" => "CC",
        "sole proprietor" | "sole proprietorship" => "Sole Proprietor",
        "partnership" => "Partnership",
        "npc" => "NPC",
        "trust" => "Trust",
        _ => return trimmed.to_string(),
    };
    canonical.to_string()
}

/// Split on `,`, `;` or `|`, drop blanks and case-insensitive repeats.
pub fn normalize_list(value: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for item in value.split([',', ';', '|']).map(str::trim) {
        if item.is_empty() || items.iter().any(|seen| seen.eq_ignore_ascii_case(item)) {
            continue;
        }
        items.push(item.to_string());
    }
    items
}

pub fn normalize_bbbee_level(value: &str) -> String {
    let trimmed = value.trim();
    let lower = trimmed.to_lowercase();
    if lower == "non-compliant" || lower == "non compliant" {
        return "Non-Compliant".to_string();
    }

    let digits = lower
        .strip_prefix("level")
        .map(str::trim)
        .unwrap_or(lower.as_str());
    match digits.parse::<u8>() {
        Ok(level @ 1..=8) => format!("Level {}", level),
        _ => trimmed.to_string(),
    }
}

/// Strip currency symbols and thousands separators, then read the leading decimal number.
/// Anything after a second decimal point is ignored; no digits at all gives `None`.
pub fn normalize_rate(value: &str) -> Option<f64> {
    let numeric: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let leading = match numeric.match_indices('.').nth(1) {
        Some((second_point, _)) => &numeric[..second_point],
        None => numeric.as_str(),
    };
    if !leading.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    leading.parse::<f64>().ok()
}

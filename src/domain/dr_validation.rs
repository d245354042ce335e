use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static DROP_NUMBER_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^DR\d{7,8}$").unwrap());
static DMY_DATE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2})/(\d{2})/(\d{4})$").unwrap());
static ISO_DATE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

/// One drop listed in an uploaded reconciliation sheet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SheetDrop {
    pub date: String,
    pub drop_number: String,
    pub time: String,
}

/// Stored drop as seen by reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordedDrop {
    pub id: String,
    pub drop_number: String,
    pub date: String,
    pub time: String,
    pub project: Option<String>,
    pub completed: bool,
    pub incomplete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationResult {
    pub in_file_and_db: Vec<SheetDrop>,
    pub in_file_not_in_db: Vec<SheetDrop>,
    pub in_db_not_in_file: Vec<RecordedDrop>,
    pub file_total: usize,
    pub db_total: usize,
}

/// Normalise a drop number to `DR#######`; unparseable input is returned cleaned.
pub fn normalize_drop_number(input: &str) -> String {
    let cleaned = input.trim().to_uppercase();
    if cleaned.is_empty() {
        return String::new();
    }
    if DROP_NUMBER_PATTERN.is_match(&cleaned) {
        return cleaned;
    }

    let digits: String = cleaned.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() >= 7 {
        return format!("DR{}", digits);
    }
    cleaned
}

/// Normalise `DD/MM/YYYY` or ISO dates to ISO; anything else yields `fallback`.
pub fn normalize_sheet_date(input: &str, fallback: &str) -> String {
    let input = input.trim();
    if input.is_empty() {
        return fallback.to_string();
    }
    if let Some(caps) = DMY_DATE_PATTERN.captures(input) {
        return format!("{}-{}-{}", &caps[3], &caps[2], &caps[1]);
    }
    if ISO_DATE_PATTERN.is_match(input) {
        return input.to_string();
    }
    fallback.to_string()
}

/// Compare uploaded drops with recorded drops by drop number.
pub fn reconcile(file_rows: Vec<SheetDrop>, recorded: Vec<RecordedDrop>) -> ReconciliationResult {
    let recorded_numbers: std::collections::HashSet<&str> =
        recorded.iter().map(|d| d.drop_number.as_str()).collect();
    let file_numbers: std::collections::HashSet<&str> =
        file_rows.iter().map(|d| d.drop_number.as_str()).collect();

    let (in_file_and_db, in_file_not_in_db): (Vec<SheetDrop>, Vec<SheetDrop>) = file_rows
        .iter()
        .cloned()
        .partition(|row| recorded_numbers.contains(row.drop_number.as_str()));

    let in_db_not_in_file: Vec<RecordedDrop> = recorded
        .iter()
        .filter(|d| !file_numbers.contains(d.drop_number.as_str()))
        .cloned()
        .collect();

    ReconciliationResult {
        in_file_and_db,
        in_file_not_in_db,
        in_db_not_in_file,
        file_total: file_rows.len(),
        db_total: recorded.len(),
    }
}

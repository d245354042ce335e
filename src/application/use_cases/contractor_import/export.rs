use crate::domain::contractor::{Contractor, ContractorData, ImportField};
use crate::domain::error::{AppError, Result};
use csv::Writer;

const LIST_SEPARATOR: &str = "; ";

/// Header row plus one example row, in import column order.
pub fn template_csv() -> Result<String> {
    let example = ContractorData {
        company_name: "Example Fibre (Pty) Ltd".to_string(),
        contact_person: "Jane Dlamini".to_string(),
        email: "jane@examplefibre.co.za".to_string(),
        phone: "+27821234567".to_string(),
        address: "12 Main Road".to_string(),
        city: "Durban".to_string(),
        province: "KwaZulu-Natal".to_string(),
        postal_code: "4001".to_string(),
        business_type: "Pty Ltd".to_string(),
        registration_number: "2019/123456/07".to_string(),
        tax_number: "4123456789".to_string(),
        services: vec!["Fibre Installation".to_string(), "Trenching".to_string()],
        specializations: vec!["FTTH".to_string()],
        bbbee_level: "Level 2".to_string(),
        certifications: vec!["ECSA".to_string()],
        hourly_rate: Some(350.0),
        daily_rate: Some(2800.0),
        notes: "Available in KZN and Gauteng".to_string(),
        status: String::new(),
    };
    write_csv(std::slice::from_ref(&example))
}

/// Stored contractors in the same layout the importer reads.
pub fn contractors_csv(contractors: &[Contractor]) -> Result<String> {
    let rows: Vec<ContractorData> = contractors.iter().map(|c| c.data.clone()).collect();
    write_csv(&rows)
}

fn write_csv(rows: &[ContractorData]) -> Result<String> {
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(ImportField::ALL.iter().map(|f| f.label()))?;
    for data in rows {
        writer.write_record(ImportField::ALL.iter().map(|f| cell(data, *f)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("Failed to finish CSV: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("CSV is not UTF-8: {}", e)))
}

fn cell(data: &ContractorData, field: ImportField) -> String {
    let rate = |value: Option<f64>| value.map(|v| v.to_string()).unwrap_or_default();
    match field {
        ImportField::CompanyName => data.company_name.clone(),
        ImportField::ContactPerson => data.contact_person.clone(),
        ImportField::Email => data.email.clone(),
        ImportField::Phone => data.phone.clone(),
        ImportField::Address => data.address.clone(),
        ImportField::City => data.city.clone(),
        ImportField::Province => data.province.clone(),
        ImportField::PostalCode => data.postal_code.clone(),
        ImportField::BusinessType => data.business_type.clone(),
        ImportField::RegistrationNumber => data.registration_number.clone(),
        ImportField::TaxNumber => data.tax_number.clone(),
        ImportField::Services => data.services.join(LIST_SEPARATOR),
        ImportField::Specializations => data.specializations.join(LIST_SEPARATOR),
        ImportField::BbbeeLevel => data.bbbee_level.clone(),
        ImportField::Certifications => data.certifications.join(LIST_SEPARATOR),
        ImportField::HourlyRate => rate(data.hourly_rate),
        ImportField::DailyRate => rate(data.daily_rate),
        ImportField::Notes => data.notes.clone(),
    }
}

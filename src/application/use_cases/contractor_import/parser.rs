use crate::domain::contractor::{ImportField, ParsedSheet, RawImportRow};
use crate::domain::error::{AppError, Result};
use crate::infrastructure::tabular::{read_table, Table};
use std::collections::BTreeMap;

/// Read an uploaded CSV/Excel file and map its columns onto import fields.
pub fn parse_upload(file_name: &str, bytes: &[u8], max_rows: usize) -> Result<ParsedSheet> {
    let table = read_table(file_name, bytes)?;
    map_table(table, max_rows)
}

pub fn map_table(table: Table, max_rows: usize) -> Result<ParsedSheet> {
    let mut column_fields: Vec<Option<ImportField>> = Vec::with_capacity(table.headers.len());
    let mut unmapped_headers = Vec::new();

    for header in &table.headers {
        let field = ImportField::from_header(header)
            .filter(|field| !column_fields.contains(&Some(*field)));
        if field.is_none() && !header.trim().is_empty() {
            unmapped_headers.push(header.trim().to_string());
        }
        column_fields.push(field);
    }

    if column_fields.iter().all(Option::is_none) {
        return Err(AppError::ParseError(
            "No recognizable contractor columns found in header row".to_string(),
        ));
    }

    let mut rows = Vec::new();
    let mut empty_rows = 0;

    for row in table.rows {
        if row.is_blank() {
            empty_rows += 1;
            continue;
        }

        let mut original_data = BTreeMap::new();
        let mut values = BTreeMap::new();
        for (index, header) in table.headers.iter().enumerate() {
            let value = row.cell(index).trim();
            if !header.trim().is_empty() {
                original_data.insert(header.trim().to_string(), value.to_string());
            }
            if let Some(Some(field)) = column_fields.get(index) {
                if !value.is_empty() {
                    values.insert(*field, value.to_string());
                }
            }
        }

        rows.push(RawImportRow {
            row_number: row.row_number,
            original_data,
            values,
        });
    }

    if rows.len() > max_rows {
        return Err(AppError::ValidationError(format!(
            "File contains {} data rows; the import limit is {}",
            rows.len(),
            max_rows
        )));
    }

    Ok(ParsedSheet {
        headers: table.headers,
        unmapped_headers,
        rows,
        empty_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::tabular::TableRow;

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        Table {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .enumerate()
                .map(|(i, cells)| TableRow {
                    row_number: i + 2,
                    cells: cells.iter().map(|c| c.to_string()).collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn maps_aliases_and_reports_unknown_headers() {
        let sheet = map_table(
            table(
                &["Company", "E-mail", "Favourite Colour", ""],
                &[&["Acme Fibre", "info@acme.co.za", "blue", "x"]],
            ),
            100,
        )
        .unwrap();

        assert_eq!(sheet.unmapped_headers, vec!["Favourite Colour"]);
        let row = &sheet.rows[0];
        assert_eq!(row.row_number, 2);
        assert_eq!(row.value(ImportField::CompanyName), Some("Acme Fibre"));
        assert_eq!(row.value(ImportField::Email), Some("info@acme.co.za"));
        assert_eq!(row.original_data["Favourite Colour"], "blue");
        assert_eq!(row.original_data.len(), 3);
    }

    #[test]
    fn first_matching_column_wins() {
        let sheet = map_table(
            table(&["Company Name", "Company"], &[&["First", "Second"]]),
            100,
        )
        .unwrap();
        assert_eq!(sheet.rows[0].value(ImportField::CompanyName), Some("First"));
        assert_eq!(sheet.unmapped_headers, vec!["Company"]);
    }

    #[test]
    fn blank_rows_are_counted_not_returned() {
        let sheet = map_table(
            table(&["Company Name"], &[&["Acme"], &["  "], &[], &["Zulu"]]),
            100,
        )
        .unwrap();
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.empty_rows, 2);
        assert_eq!(sheet.rows[1].row_number, 5);
    }

    #[test]
    fn unrecognized_header_row_is_a_parse_error() {
        let err = map_table(table(&["foo", "bar"], &[&["1", "2"]]), 100).unwrap_err();
        assert!(matches!(err, AppError::ParseError(_)));
    }

    #[test]
    fn row_limit_is_enforced() {
        let err = map_table(table(&["Company Name"], &[&["A"], &["B"], &["C"]]), 2).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn parses_csv_upload_end_to_end() {
        let csv = "Company Name;Email;Phone\nAcme;info@acme.co.za;082 123 4567\n";
        let sheet = parse_upload("contractors.csv", csv.as_bytes(), 100).unwrap();
        assert_eq!(sheet.headers, vec!["Company Name", "Email", "Phone"]);
        assert_eq!(sheet.rows[0].value(ImportField::Phone), Some("082 123 4567"));
    }
}

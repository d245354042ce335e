use super::{Table, TableRow};
use crate::domain::error::{AppError, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;

/// Read the first worksheet; the first row is the header.
pub fn read_first_sheet(bytes: &[u8]) -> Result<Table> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| AppError::ParseError(format!("Failed to open spreadsheet: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::ParseError("No worksheet found in spreadsheet".to_string()))?
        .map_err(|e| AppError::ParseError(format!("Failed to read worksheet: {}", e)))?;

    // Row numbers are absolute so they match what users see in Excel.
    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);

    let mut rows = range.rows().enumerate().map(|(offset, cells)| TableRow {
        row_number: first_row + offset + 1,
        cells: cells.iter().map(cell_text).collect(),
    });

    let headers = match rows.next() {
        Some(header) => header.cells,
        None => return Ok(Table::default()),
    };

    Ok(Table {
        headers,
        rows: rows.collect(),
    })
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string().trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_render_as_plain_text() {
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::String(" Acme ".to_string())), "Acme");
        assert_eq!(cell_text(&Data::Float(2000.0)), "2000");
        assert_eq!(cell_text(&Data::Float(27821234567.0)), "27821234567");
        assert_eq!(cell_text(&Data::Float(350.5)), "350.5");
        assert_eq!(cell_text(&Data::Int(7)), "7");
        assert_eq!(cell_text(&Data::Bool(true)), "true");
    }

    #[test]
    fn garbage_bytes_are_a_parse_error() {
        let err = read_first_sheet(b"definitely not a workbook").unwrap_err();
        assert!(matches!(err, AppError::ParseError(_)));
    }
}

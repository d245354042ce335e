pub mod csv_reader;
pub mod spreadsheet;

use crate::domain::error::{AppError, Result};
use std::path::Path;

/// Uploaded file formats the readers understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabularFormat {
    Csv,
    Spreadsheet,
}

impl TabularFormat {
    pub fn from_file_name(file_name: &str) -> Result<Self> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "csv" | "txt" => Ok(TabularFormat::Csv),
            "xlsx" | "xlsm" | "xls" | "ods" => Ok(TabularFormat::Spreadsheet),
            "" => Err(AppError::ValidationError(format!(
                "File {} has no extension; expected CSV or Excel",
                file_name
            ))),
            other => Err(AppError::ValidationError(format!(
                "Unsupported file type: .{} (expected .csv, .txt, .xlsx, .xls or .ods)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    /// 1-based line/row in the source file; the header is row 1.
    pub row_number: usize,
    pub cells: Vec<String>,
}

impl TableRow {
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.trim().is_empty())
    }

    pub fn cell(&self, index: usize) -> &str {
        self.cells.get(index).map(|c| c.as_str()).unwrap_or("")
    }
}

/// Header row plus data rows of the first sheet / the CSV body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<TableRow>,
}

pub fn read_table(file_name: &str, bytes: &[u8]) -> Result<Table> {
    if bytes.is_empty() {
        return Err(AppError::ValidationError(format!("File {} is empty", file_name)));
    }
    match TabularFormat::from_file_name(file_name)? {
        TabularFormat::Csv => csv_reader::CsvReader::auto_detect(bytes).read(bytes),
        TabularFormat::Spreadsheet => spreadsheet::read_first_sheet(bytes),
    }
}

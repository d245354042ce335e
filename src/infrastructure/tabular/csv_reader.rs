use super::{Table, TableRow};
use crate::domain::error::{AppError, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use encoding_rs::WINDOWS_1252;
use std::borrow::Cow;

const DELIMITER_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// CSV reader with delimiter detection and legacy encoding fallback.
pub struct CsvReader {
    delimiter: u8,
}

impl Default for CsvReader {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl CsvReader {
    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }

    pub fn auto_detect(bytes: &[u8]) -> Self {
        let text = decode_text(bytes);
        Self::with_delimiter(detect_delimiter(&text))
    }

    pub fn read(&self, bytes: &[u8]) -> Result<Table> {
        let text = decode_text(bytes);
        self.read_str(&text)
    }

    pub fn read_str(&self, content: &str) -> Result<Table> {
        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .trim(Trim::All)
            .flexible(true)
            .from_reader(content.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| AppError::ParseError(format!("Failed to read CSV headers: {}", e)))?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let mut lines = LineCounter::new(content);
        let mut previous_end = reader.position().byte() as usize;
        let mut rows = Vec::new();
        let mut record = StringRecord::new();
        loop {
            let more = reader.read_record(&mut record).map_err(|e| {
                AppError::ParseError(format!(
                    "Failed to parse CSV near line {}: {}",
                    lines.line_at(previous_end),
                    e
                ))
            })?;
            if !more {
                break;
            }
            // Record positions point before any skipped blank lines.
            let start = lines.skip_terminators(
                record
                    .position()
                    .map(|p| p.byte() as usize)
                    .unwrap_or(previous_end),
            );
            let first_blank = lines.line_at(previous_end.saturating_sub(1)) + 1;
            let row_number = lines.line_at(start);
            for line in first_blank..row_number {
                rows.push(TableRow {
                    row_number: line,
                    cells: Vec::new(),
                });
            }

            rows.push(TableRow {
                row_number,
                cells: record.iter().map(|v| v.to_string()).collect(),
            });
            previous_end = reader.position().byte() as usize;
        }

        Ok(Table { headers, rows })
    }
}

/// 1-based line numbers for byte offsets visited in increasing order.
struct LineCounter<'a> {
    bytes: &'a [u8],
    offset: usize,
    line: usize,
}

impl<'a> LineCounter<'a> {
    fn new(content: &'a str) -> Self {
        Self {
            bytes: content.as_bytes(),
            offset: 0,
            line: 1,
        }
    }

    fn skip_terminators(&self, mut byte: usize) -> usize {
        while matches!(self.bytes.get(byte), Some(b'\r') | Some(b'\n')) {
            byte += 1;
        }
        byte
    }

    fn line_at(&mut self, byte: usize) -> usize {
        let target = byte.min(self.bytes.len());
        if target > self.offset {
            self.line += self.bytes[self.offset..target]
                .iter()
                .filter(|b| **b == b'\n')
                .count();
            self.offset = target;
        }
        self.line
    }
}

/// UTF-8 (BOM stripped) when valid, otherwise Windows-1252.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            let (text, _, _) = WINDOWS_1252.decode(bytes);
            text
        }
    }
}

/// Pick the candidate delimiter that appears most consistently in the first 10 lines.
pub fn detect_delimiter(content: &str) -> u8 {
    let sample_lines: Vec<&str> = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(10)
        .collect();
    if sample_lines.is_empty() {
        return b',';
    }

    let mut best_delimiter = b',';
    let mut best_score = 0.0f32;

    for &delimiter in &DELIMITER_CANDIDATES {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| line.bytes().filter(|b| *b == delimiter).count())
            .collect();

        let avg = counts.iter().sum::<usize>() as f32 / counts.len() as f32;
        let variance = counts
            .iter()
            .map(|&x| (x as f32 - avg).powi(2))
            .sum::<f32>()
            / counts.len() as f32;

        let score = avg / (1.0 + variance.sqrt());
        if score > best_score {
            best_score = score;
            best_delimiter = delimiter;
        }
    }

    best_delimiter
}

//! CSV decoding for student import files.
//!
//! Maps a header row onto the known student columns and turns every data row
//! into a validated [`CandidateRecord`]. Rows that fail to decode or validate
//! are set aside as [`RowError`]s so the rest of the file is still imported.
//! Only file-level problems (unreadable CSV, missing header or required
//! column) fail the parse.

use crate::import::outcome::RowError;
use crate::import::record::{CandidateRecord, StudentFields};
use csv::{ReaderBuilder, StringRecord, Trim};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CsvImportError {
    #[error("malformed CSV: {0}")]
    Malformed(#[from] csv::Error),
    #[error("CSV file is missing a header row")]
    MissingHeader,
    #[error("CSV header is missing required column '{0}'")]
    MissingColumn(&'static str),
}

/// Decoded roster: the rows that validated and the rows that did not, each
/// in file order.
#[derive(Debug, Default)]
pub struct ParsedRoster {
    pub records: Vec<CandidateRecord>,
    pub rejected: Vec<RowError>,
}

impl ParsedRoster {
    /// Non-blank data rows seen in the file.
    pub fn row_count(&self) -> usize {
        self.records.len() + self.rejected.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Name,
    Email,
    Major,
    AcademicLevel,
    Gpa,
    CareerInterests,
}

impl Column {
    fn from_header(header: &str) -> Option<Self> {
        let normalized: String = header
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();

        match normalized.as_str() {
            "name" | "full_name" | "student_name" => Some(Column::Name),
            "email" | "email_address" => Some(Column::Email),
            "major" | "program" => Some(Column::Major),
            "academic_level" | "level" | "year" | "class_year" => Some(Column::AcademicLevel),
            "gpa" => Some(Column::Gpa),
            "career_interests" | "interests" | "career_interest" => Some(Column::CareerInterests),
            _ => None,
        }
    }
}

/// Positions of the known columns within the header row.
#[derive(Debug, Default)]
struct ColumnMap {
    name: Option<usize>,
    email: Option<usize>,
    major: Option<usize>,
    academic_level: Option<usize>,
    gpa: Option<usize>,
    career_interests: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &StringRecord) -> Result<Self, CsvImportError> {
        let mut map = ColumnMap::default();
        for (index, header) in headers.iter().enumerate() {
            let slot = match Column::from_header(header) {
                Some(Column::Name) => &mut map.name,
                Some(Column::Email) => &mut map.email,
                Some(Column::Major) => &mut map.major,
                Some(Column::AcademicLevel) => &mut map.academic_level,
                Some(Column::Gpa) => &mut map.gpa,
                Some(Column::CareerInterests) => &mut map.career_interests,
                None => {
                    log::debug!("csv import: ignoring unknown column '{}'", header);
                    continue;
                }
            };
            // First occurrence wins.
            slot.get_or_insert(index);
        }

        if map.name.is_none() {
            return Err(CsvImportError::MissingColumn("name"));
        }
        if map.major.is_none() {
            return Err(CsvImportError::MissingColumn("major"));
        }
        if map.academic_level.is_none() {
            return Err(CsvImportError::MissingColumn("academic_level"));
        }
        Ok(map)
    }
}

fn field(record: &StringRecord, index: Option<usize>) -> &str {
    index.and_then(|i| record.get(i)).unwrap_or_default()
}

fn optional_field(record: &StringRecord, index: Option<usize>) -> Option<String> {
    let value = field(record, index);
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Split a career interests cell on `;` or `,`.
pub fn split_interests(value: &str) -> Vec<String> {
    value
        .split([';', ','])
        .map(str::trim)
        .filter(|interest| !interest.is_empty())
        .map(str::to_string)
        .collect()
}

/// Count the empty lines between `offset` (the end of the previous record)
/// and the start of the next record. The csv reader skips these silently.
fn skipped_empty_lines(source: &[u8], offset: usize) -> usize {
    let mut index = offset;
    // The reader may stop between the two bytes of a CRLF terminator.
    if index > 0 && source.get(index - 1) == Some(&b'\r') && source.get(index) == Some(&b'\n') {
        index += 1;
    }

    let mut lines = 0;
    while let Some(&byte) = source.get(index) {
        match byte {
            b'\n' => index += 1,
            b'\r' => {
                index += 1;
                if source.get(index) == Some(&b'\n') {
                    index += 1;
                }
            }
            _ => break,
        }
        lines += 1;
    }
    lines
}

fn decode_row(
    record: &StringRecord,
    columns: &ColumnMap,
    row: usize,
) -> Result<CandidateRecord, String> {
    let gpa = match optional_field(record, columns.gpa) {
        Some(raw) => Some(
            raw.parse::<f64>()
                .map_err(|_| format!("invalid GPA '{raw}'"))?,
        ),
        None => None,
    };

    StudentFields {
        name: field(record, columns.name).to_string(),
        email: optional_field(record, columns.email),
        major: field(record, columns.major).to_string(),
        academic_level: field(record, columns.academic_level).to_string(),
        gpa,
        career_interests: split_interests(field(record, columns.career_interests)),
    }
    .into_candidate(row)
    .map_err(|err| err.to_string())
}

/// Parse CSV text into candidate records numbered by their position among
/// the data rows (the first line after the header is row 1). Blank rows,
/// including fully empty lines, are skipped but keep their number.
pub fn parse_students_csv(input: &str) -> Result<ParsedRoster, CsvImportError> {
    let source = input.trim_start_matches('\u{feff}').as_bytes();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(source);

    let headers = reader.headers()?.clone();
    if headers.iter().all(str::is_empty) {
        return Err(CsvImportError::MissingHeader);
    }
    let columns = ColumnMap::from_headers(&headers)?;

    let mut roster = ParsedRoster::default();
    let mut row = 0;
    for result in reader.records() {
        let record = result?;
        let offset = record.position().map_or(0, |pos| pos.byte() as usize);
        row += 1 + skipped_empty_lines(source, offset);
        if record.iter().all(str::is_empty) {
            continue;
        }

        match decode_row(&record, &columns, row) {
            Ok(candidate) => roster.records.push(candidate),
            Err(message) => {
                log::debug!("csv import: rejecting row {}: {}", row, message);
                roster.rejected.push(RowError {
                    row_number: row,
                    message,
                });
            }
        }
    }

    log::debug!(
        "csv import: decoded {} candidate records, rejected {}",
        roster.records.len(),
        roster.rejected.len()
    );
    Ok(roster)
}

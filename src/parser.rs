use std::io::Read;
use std::path::Path;

use csv::{ByteRecord, ReaderBuilder};
use tracing::warn;

use crate::config::CycleConfig;
use crate::error::{AssignError, Result};
use crate::schedule::types::parse_whole;
use crate::schedule::{MonthChoice, PerformerRecord, RequestedTime, SchoolExceptions};

/// Lowercased header text without the trailing colon some sheets carry.
fn normalize_header(header: &str) -> String {
    header.trim().trim_end_matches(':').trim().to_lowercase()
}

/// Decodes a cell, replacing bytes that are not UTF-8 (e.g. Latin-1 exports).
fn cell(record: &ByteRecord, col: usize) -> String {
    String::from_utf8_lossy(record.get(col).unwrap_or(b"")).trim().to_string()
}

/// Finds a column by exact header first, then by containment.
fn find_column(headers: &ByteRecord, key: &'static str) -> Result<usize> {
    let normalized: Vec<String> = headers
        .iter()
        .map(|h| normalize_header(&String::from_utf8_lossy(h)))
        .collect();
    normalized
        .iter()
        .position(|h| h == key)
        .or_else(|| normalized.iter().position(|h| h.contains(key)))
        .ok_or(AssignError::MissingColumn(key))
}

/// Parses attendance, falling back to 0 for blank or non-numeric cells.
fn parse_attendance(value: &str, name: &str) -> f64 {
    match value.trim().parse::<f64>() {
        Ok(attendance) if attendance.is_finite() => attendance,
        _ => {
            warn!(performer = %name, value, "unreadable attendance, treating as 0");
            0.0
        }
    }
}

struct Columns {
    name: usize,
    teacher: usize,
    first_choice: usize,
    second_choice: usize,
    requested_time: usize,
    attendance: usize,
    eligibility: usize,
}

impl Columns {
    fn locate(headers: &ByteRecord) -> Result<Self> {
        Ok(Self {
            name: find_column(headers, "name")?,
            teacher: find_column(headers, "teacher")?,
            first_choice: find_column(headers, "first choice")?,
            second_choice: find_column(headers, "second choice")?,
            requested_time: find_column(headers, "requested time")?,
            attendance: find_column(headers, "attendance")?,
            eligibility: find_column(headers, "eligibility")?,
        })
    }
}

/// Reads performer rows from CSV. Rows without a name, or rows the CSV
/// reader cannot split, are skipped.
pub fn read_performers<R: Read>(reader: R, config: &CycleConfig) -> Result<Vec<PerformerRecord>> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);
    let columns = Columns::locate(reader.byte_headers()?)?;

    let mut performers = Vec::new();
    for (index, result) in reader.byte_records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                warn!(row = index + 2, error = %e, "skipping unreadable row");
                continue;
            }
        };

        let name = cell(&record, columns.name);
        if name.is_empty() {
            warn!(row = index + 2, "skipping row without a name");
            continue;
        }

        let attendance = parse_attendance(&cell(&record, columns.attendance), &name);
        performers.push(PerformerRecord {
            school: cell(&record, columns.teacher),
            attendance,
            eligibility: cell(&record, columns.eligibility),
            first_choice: MonthChoice::parse(&cell(&record, columns.first_choice), &config.no_request),
            second_choice: MonthChoice::parse(&cell(&record, columns.second_choice), &config.no_request),
            requested: RequestedTime::parse(&cell(&record, columns.requested_time)),
            name,
        });
    }

    Ok(performers)
}

pub fn load_performers<P: AsRef<Path>>(path: P, config: &CycleConfig) -> Result<Vec<PerformerRecord>> {
    let file = std::fs::File::open(path)?;
    read_performers(file, config)
}

/// Reads the school exceptions table: school in the first column, limit in
/// the second. Rows with an unreadable limit are skipped.
pub fn read_exceptions<R: Read>(reader: R) -> Result<SchoolExceptions> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut exceptions = SchoolExceptions::new();

    for (index, result) in reader.byte_records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                warn!(row = index + 2, error = %e, "skipping unreadable school exception");
                continue;
            }
        };
        let school = cell(&record, 0);
        let limit = cell(&record, 1);
        if school.is_empty() {
            continue;
        }
        match parse_whole(&limit) {
            Some(limit) => exceptions.insert(school, limit),
            None => warn!(%school, %limit, "skipping school exception with unreadable limit"),
        }
    }

    Ok(exceptions)
}

pub fn load_exceptions<P: AsRef<Path>>(path: P) -> Result<SchoolExceptions> {
    let file = std::fs::File::open(path)?;
    read_exceptions(file)
}

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::io::{self, Cursor, ErrorKind};
use std::path::Path;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use polars::prelude::{
    Column, CsvParseOptions, CsvReadOptions, CsvWriter, DataFrame, DataType, PolarsResult,
    SerReader, SerWriter, StringChunked,
};
use tracing::{debug, info, warn};

use crate::domain::TMError;
use crate::table::{ColumnConfig, Row, TableState};
use crate::validation::{is_valid_email, is_valid_import_age, parse_leading_int};
use crate::view::visible_columns;

/// Optional string fields carried over from an imported file.
const PASSTHROUGH_FIELDS: [&str; 2] = ["department", "location"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportErrorKind {
    Parse,
    MissingField,
    InvalidEmail,
    InvalidAge,
    DuplicateId,
}

/// A rejected input row. `row` is 1-based; 0 means the whole file failed to parse.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportError {
    pub row: usize,
    pub kind: ImportErrorKind,
    pub message: String,
}

impl ImportError {
    fn new(row: usize, kind: ImportErrorKind, message: impl Into<String>) -> Self {
        ImportError {
            row,
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Row {}: {}", self.row, self.message)
    }
}

#[derive(Debug, Default)]
pub struct ImportResult {
    pub rows: Vec<Row>,
    pub errors: Vec<ImportError>,
}

impl ImportResult {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Replaces the table rows, but only if no row was rejected. Otherwise the
    /// table is left untouched and the errors are handed back.
    pub fn apply(self, table: &mut TableState) -> Result<usize, Vec<ImportError>> {
        if !self.is_clean() {
            return Err(self.errors);
        }
        let imported = self.rows.len();
        table.replace_rows(self.rows);
        Ok(imported)
    }
}

/// Parses CSV text with a header row into validated rows. Bad rows are
/// collected as errors and never abort the batch.
pub fn import_csv(content: &str) -> ImportResult {
    let start_time = Instant::now();
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();

    let result = read_frame(content).and_then(|df| import_frame(&df, stamp));
    match result {
        Ok(result) => {
            info!(
                "Imported {} rows with {} errors in {}ms",
                result.rows.len(),
                result.errors.len(),
                start_time.elapsed().as_millis()
            );
            result
        }
        Err(e) => {
            warn!("CSV parsing failed: {e}");
            ImportResult {
                rows: Vec::new(),
                errors: vec![ImportError::new(
                    0,
                    ImportErrorKind::Parse,
                    format!("Parse error: {e}"),
                )],
            }
        }
    }
}

pub fn import_csv_file(path: &Path) -> Result<ImportResult, TMError> {
    let metadata = fs::metadata(path).map_err(map_io_error)?;
    if !metadata.is_file() {
        return Err(TMError::NotAFile);
    }
    debug!("Reading {} ({} bytes)", path.display(), metadata.len());
    let content = fs::read_to_string(path).map_err(map_io_error)?;
    Ok(import_csv(&content))
}

fn map_io_error(e: io::Error) -> TMError {
    match e.kind() {
        ErrorKind::NotFound => TMError::FileNotFound,
        ErrorKind::PermissionDenied => TMError::PermissionDenied,
        _ => TMError::IoError(e),
    }
}

// Every column is read as a string; validation decides what the values mean.
// Cells beyond the header width are dropped instead of failing the batch.
fn read_frame(content: &str) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .with_parse_options(CsvParseOptions::default().with_truncate_ragged_lines(true))
        .into_reader_with_file_handle(Cursor::new(content.as_bytes().to_vec()))
        .finish()
}

fn import_frame(df: &DataFrame, stamp: u128) -> PolarsResult<ImportResult> {
    // Header names are matched case-insensitively; a later duplicate wins.
    let mut fields: Vec<(String, Column)> = Vec::new();
    for column in df.get_columns() {
        let key = column.name().to_lowercase();
        let column = column.cast(&DataType::String)?;
        fields.retain(|(k, _)| *k != key);
        fields.push((key, column));
    }
    let fields = fields
        .iter()
        .map(|(key, column)| Ok((key.as_str(), column.str()?)))
        .collect::<PolarsResult<Vec<(&str, &StringChunked)>>>()?;

    let mut result = ImportResult::default();
    let mut seen_ids = HashSet::new();
    let mut index = 0;
    for ridx in 0..df.height() {
        let record: HashMap<&str, &str> = fields
            .iter()
            .filter_map(|(key, values)| values.get(ridx).map(|v| (*key, v)))
            .filter(|(_, v)| !v.is_empty())
            .collect();
        if record.is_empty() {
            continue;
        }
        match validate_record(&record, index, stamp) {
            Ok(row) if !seen_ids.insert(row.id.clone()) => result.errors.push(ImportError::new(
                index + 1,
                ImportErrorKind::DuplicateId,
                format!("Duplicate id: {}", row.id),
            )),
            Ok(row) => result.rows.push(row),
            Err(e) => result.errors.push(e),
        }
        index += 1;
    }
    Ok(result)
}

fn validate_record(
    record: &HashMap<&str, &str>,
    index: usize,
    stamp: u128,
) -> Result<Row, ImportError> {
    let row_number = index + 1;
    let (Some(name), Some(email)) = (record.get("name"), record.get("email")) else {
        return Err(ImportError::new(
            row_number,
            ImportErrorKind::MissingField,
            "Missing required fields: name or email",
        ));
    };

    if !is_valid_email(email) {
        return Err(ImportError::new(
            row_number,
            ImportErrorKind::InvalidEmail,
            format!("Invalid email format: {email}"),
        ));
    }

    let Some(raw_age) = record.get("age").copied() else {
        return Err(ImportError::new(
            row_number,
            ImportErrorKind::InvalidAge,
            "Missing age",
        ));
    };
    let Some(age) = parse_leading_int(raw_age).filter(|age| is_valid_import_age(*age)) else {
        return Err(ImportError::new(
            row_number,
            ImportErrorKind::InvalidAge,
            format!("Invalid age: {raw_age}"),
        ));
    };

    let id = match record.get("id") {
        Some(id) => id.to_string(),
        None => format!("imported-{stamp}-{index}"),
    };
    let role = record.get("role").copied().unwrap_or_default();
    let mut row = Row::new(id, *name, *email, age, role);
    for field in PASSTHROUGH_FIELDS {
        row = row.with_extra(field, record.get(field).copied().unwrap_or_default());
    }
    Ok(row)
}

/// Serializes the visible columns, in display order, with labels as headers.
/// Labels need not be unique, so the frame uses positional names and the
/// header line is written here.
pub fn export_csv(rows: &[Row], columns: &[ColumnConfig]) -> Result<String, TMError> {
    let visible = visible_columns(columns);
    let header = visible
        .iter()
        .map(|column| quote_field(&column.label))
        .collect::<Vec<String>>()
        .join(",");
    let frame_columns = visible
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let values: Vec<String> = rows.iter().map(|row| row.display(&column.id)).collect();
            Column::new(format!("c{idx}").into(), values)
        })
        .collect();
    let body = write_frame(frame_columns, false)?;
    Ok(format!("{header}\n{body}"))
}

/// Quotes a CSV field when it holds a separator, quote or line break.
pub fn quote_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn export_to_file(rows: &[Row], columns: &[ColumnConfig], path: &Path) -> Result<(), TMError> {
    let csv = export_csv(rows, columns)?;
    save_csv(path, &csv)?;
    info!("Exported {} rows to {}", rows.len(), path.display());
    Ok(())
}

type TemplateRow = (&'static str, &'static str, i64, &'static str, &'static str, &'static str);

const TEMPLATE_ROWS: [TemplateRow; 18] = [
    ("John Doe", "john.doe@example.com", 28, "Developer", "Engineering", "New York"),
    ("Jane Smith", "jane.smith@example.com", 32, "Manager", "Operations", "San Francisco"),
    ("Michael Johnson", "michael.j@example.com", 45, "Director", "Sales", "Chicago"),
    ("Emily Davis", "emily.davis@example.com", 26, "Designer", "Marketing", "Los Angeles"),
    ("Robert Brown", "robert.brown@example.com", 38, "Developer", "Engineering", "Seattle"),
    ("Sarah Wilson", "sarah.w@example.com", 29, "Analyst", "Finance", "Boston"),
    ("David Lee", "david.lee@example.com", 41, "Manager", "HR", "Austin"),
    ("Jennifer Taylor", "jennifer.t@example.com", 35, "Developer", "Engineering", "Denver"),
    ("James Anderson", "james.a@example.com", 52, "VP", "Operations", "Miami"),
    ("Lisa Martinez", "lisa.martinez@example.com", 30, "Designer", "Marketing", "Portland"),
    ("Christopher Garcia", "chris.g@example.com", 27, "Developer", "Engineering", "New York"),
    ("Amanda Rodriguez", "amanda.r@example.com", 33, "Manager", "Sales", "Dallas"),
    ("Daniel Hernandez", "daniel.h@example.com", 39, "Analyst", "Finance", "Phoenix"),
    ("Michelle Lopez", "michelle.l@example.com", 31, "Designer", "Marketing", "San Diego"),
    ("Kevin Gonzalez", "kevin.g@example.com", 44, "Director", "Engineering", "Atlanta"),
    ("Patricia Wilson", "patricia.w@example.com", 37, "Manager", "Operations", "Houston"),
    ("Thomas Moore", "thomas.moore@example.com", 42, "Developer", "Engineering", "Philadelphia"),
    ("Nancy Jackson", "nancy.j@example.com", 29, "Analyst", "Finance", "San Antonio"),
];

/// The onboarding template: a fixed sample covering every importable field.
pub fn sample_template() -> Result<String, TMError> {
    let text = |pick: fn(&TemplateRow) -> &'static str| -> Vec<&'static str> {
        TEMPLATE_ROWS.iter().map(pick).collect()
    };
    let ages: Vec<i64> = TEMPLATE_ROWS.iter().map(|r| r.2).collect();
    write_frame(
        vec![
            Column::new("name".into(), text(|r| r.0)),
            Column::new("email".into(), text(|r| r.1)),
            Column::new("age".into(), ages),
            Column::new("role".into(), text(|r| r.3)),
            Column::new("department".into(), text(|r| r.4)),
            Column::new("location".into(), text(|r| r.5)),
        ],
        true,
    )
}

pub fn write_template(path: &Path) -> Result<(), TMError> {
    save_csv(path, &sample_template()?)?;
    info!("Wrote CSV template to {}", path.display());
    Ok(())
}

fn write_frame(columns: Vec<Column>, header: bool) -> Result<String, TMError> {
    let mut df = DataFrame::new(columns)?;
    let mut buffer = Vec::new();
    CsvWriter::new(&mut buffer)
        .include_header(header)
        .finish(&mut df)?;
    String::from_utf8(buffer).map_err(|e| TMError::IoError(io::Error::new(ErrorKind::InvalidData, e)))
}

fn save_csv(path: &Path, csv: &str) -> Result<(), TMError> {
    fs::write(path, csv).map_err(map_io_error)
}

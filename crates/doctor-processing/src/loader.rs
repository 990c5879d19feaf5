//! Loading datasets from disk and writing cleaned data back.
//!
//! CSV files go through the polars CSV reader with a chain of fallback
//! strategies for files with stray quoting. Excel workbooks (`.xlsx`, `.xls`,
//! `.xlsm`) are read with calamine: the first worksheet, first row as header,
//! one typed column per header cell.

use crate::error::{DoctorError, Result, ResultExt};
use calamine::{Data, DataType as _, Reader, open_workbook_auto};
use chrono::NaiveDateTime;
use polars::prelude::*;
use std::fs::{self, File};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info};

/// Rows sampled when inferring CSV column types.
const INFER_SCHEMA_ROWS: usize = 100;

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Excel,
}

impl InputFormat {
    /// Determine the format from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" => Ok(Self::Csv),
            "xlsx" | "xls" | "xlsm" => Ok(Self::Excel),
            _ => Err(DoctorError::UnsupportedFormat(ext)),
        }
    }
}

/// Load a dataset from a `.csv` or Excel file.
///
/// # Errors
///
/// [`DoctorError::UnsupportedFormat`] for any other extension and
/// [`DoctorError::Load`] when the file cannot be parsed.
pub fn load_dataset(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    let format = InputFormat::from_path(path)?;

    let df = match format {
        InputFormat::Csv => load_csv_with_fallbacks(path),
        InputFormat::Excel => load_excel(path),
    }
    .map_err(|e| match e {
        DoctorError::Load { .. } => e,
        other => DoctorError::Load {
            path: path.display().to_string(),
            reason: other.to_string(),
        },
    })?;

    info!(
        path = %path.display(),
        rows = df.height(),
        columns = df.width(),
        "Dataset loaded"
    );
    Ok(df)
}

/// Write a DataFrame as CSV with a header row, creating parent directories.
pub fn write_csv(df: &DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context(format!("Creating {}", parent.display()))?;
    }

    let mut file = File::create(path).context(format!("Creating {}", path.display()))?;
    // CsvWriter::finish() needs &mut DataFrame
    let mut df = df.clone();
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .with_quote_char(b'"')
        .finish(&mut df)
        .context(format!("Writing {}", path.display()))?;

    debug!(path = %path.display(), rows = df.height(), "CSV written");
    Ok(())
}

fn load_csv_with_fallbacks(path: &Path) -> Result<DataFrame> {
    // Standard loading with quote handling
    match CsvReadOptions::default()
        .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
    {
        Ok(df) => return Ok(df),
        Err(e) => debug!("Standard CSV loading failed: {}", e),
    }

    // Without quote handling
    match CsvReadOptions::default()
        .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(None))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
    {
        Ok(df) => return Ok(df),
        Err(e) => debug!("CSV loading without quotes failed: {}", e),
    }

    // Pre-cleaned content
    let content = fs::read_to_string(path)?;
    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
        .with_has_header(true)
        .into_reader_with_file_handle(Cursor::new(normalize_csv_content(&content)))
        .finish()?;
    Ok(df)
}

/// Collapse doubled/tripled quotes and drop blank lines.
fn normalize_csv_content(content: &str) -> String {
    content
        .replace("\"\"\"", "\"")
        .replace("\"\"", "\"")
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Excel
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExcelColumnType {
    Int64,
    Float64,
    Boolean,
    Datetime,
    Utf8,
}

fn load_excel(path: &Path) -> Result<DataFrame> {
    let mut workbook = open_workbook_auto(path).map_err(|e| excel_error(path, e))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| excel_error(path, "workbook has no worksheets"))?
        .map_err(|e| excel_error(path, e))?;

    let rows: Vec<Vec<Data>> = range.rows().map(|r| r.to_vec()).collect();
    let Some((header_row, body)) = rows.split_first() else {
        return Ok(DataFrame::empty());
    };

    let mut columns = Vec::with_capacity(header_row.len());
    for (idx, header) in header_row.iter().enumerate() {
        let name = match header.as_string() {
            Some(name) if !name.trim().is_empty() => name,
            _ => format!("column_{}", idx + 1),
        };
        let cells: Vec<Option<&Data>> = body
            .iter()
            .map(|row| row.get(idx).filter(|cell| !cell.is_empty()))
            .collect();
        let series = excel_column_to_series(&name, &cells, infer_excel_column(&cells))?;
        columns.push(series.into());
    }

    Ok(DataFrame::new(columns)?)
}

fn excel_error(path: &Path, e: impl std::fmt::Display) -> DoctorError {
    DoctorError::Load {
        path: path.display().to_string(),
        reason: format!("Excel: {e}"),
    }
}

fn infer_excel_column(cells: &[Option<&Data>]) -> ExcelColumnType {
    let mut has_int = false;
    let mut has_float = false;
    let mut has_bool = false;
    let mut has_datetime = false;

    for cell in cells.iter().flatten() {
        if cell.is_string() || matches!(cell, Data::Error(_)) {
            return ExcelColumnType::Utf8;
        }
        has_int |= cell.is_int();
        has_float |= cell.is_float();
        has_bool |= cell.is_bool();
        has_datetime |= cell.is_datetime() || cell.is_datetime_iso();
    }

    let has_number = has_int || has_float;
    if has_bool && !has_number && !has_datetime {
        ExcelColumnType::Boolean
    } else if has_datetime && !has_number && !has_bool {
        ExcelColumnType::Datetime
    } else if has_bool || has_datetime {
        ExcelColumnType::Utf8
    } else if has_float {
        let all_whole = cells
            .iter()
            .flatten()
            .all(|cell| cell.as_f64().is_none_or(|f| f.is_finite() && f.fract() == 0.0));
        if all_whole {
            ExcelColumnType::Int64
        } else {
            ExcelColumnType::Float64
        }
    } else if has_int {
        ExcelColumnType::Int64
    } else {
        ExcelColumnType::Utf8
    }
}

fn excel_datetime(cell: &Data) -> Option<NaiveDateTime> {
    if let Some(dt) = cell.as_datetime() {
        return Some(dt);
    }
    let text = cell.get_datetime_iso()?;
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
}

fn excel_column_to_series(
    name: &str,
    cells: &[Option<&Data>],
    column_type: ExcelColumnType,
) -> Result<Series> {
    let series = match column_type {
        ExcelColumnType::Int64 => {
            let values: Vec<Option<i64>> = cells.iter().map(|c| c.and_then(|cell| cell.as_i64())).collect();
            Series::new(name.into(), values)
        }
        ExcelColumnType::Float64 => {
            let values: Vec<Option<f64>> = cells.iter().map(|c| c.and_then(|cell| cell.as_f64())).collect();
            Series::new(name.into(), values)
        }
        ExcelColumnType::Boolean => {
            let values: Vec<Option<bool>> = cells.iter().map(|c| c.and_then(|cell| cell.get_bool())).collect();
            Series::new(name.into(), values)
        }
        ExcelColumnType::Datetime => {
            let values: Vec<Option<i64>> = cells
                .iter()
                .map(|c| c.and_then(excel_datetime).map(|dt| dt.and_utc().timestamp_micros()))
                .collect();
            Series::new(name.into(), values)
                .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?
        }
        ExcelColumnType::Utf8 => {
            let values: Vec<Option<String>> = cells.iter().map(|c| c.and_then(|cell| cell.as_string())).collect();
            Series::new(name.into(), values)
        }
    };
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(InputFormat::from_path(Path::new("a.csv")).unwrap(), InputFormat::Csv);
        assert_eq!(InputFormat::from_path(Path::new("a.XLSX")).unwrap(), InputFormat::Excel);
        assert_eq!(InputFormat::from_path(Path::new("a.xls")).unwrap(), InputFormat::Excel);
        assert_eq!(InputFormat::from_path(Path::new("a.xlsm")).unwrap(), InputFormat::Excel);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = load_dataset("notes.txt").unwrap_err();
        assert!(matches!(err, DoctorError::UnsupportedFormat(ref ext) if ext == "txt"));

        let err = load_dataset("no_extension").unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_FORMAT");
    }

    #[test]
    fn test_csv_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("data.csv");
        let df = df! {
            "age" => &[Some(20i64), None, Some(22)],
            "city" => &[Some("Lagos"), Some("Lima"), None],
        }
        .unwrap();

        write_csv(&df, &path).unwrap();
        let loaded = load_dataset(&path).unwrap();

        assert_eq!(loaded.shape(), (3, 2));
        assert_eq!(loaded.column("age").unwrap().null_count(), 1);
        assert_eq!(loaded.column("city").unwrap().null_count(), 1);
    }

    #[test]
    fn test_missing_csv_is_load_error() {
        let dir = TempDir::new().unwrap();
        let err = load_dataset(dir.path().join("absent.csv")).unwrap_err();
        assert_eq!(err.error_code(), "LOAD_ERROR");
    }

    #[test]
    fn test_corrupt_workbook_is_load_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.xlsx");
        fs::write(&path, b"definitely not a zip archive").unwrap();

        let err = load_dataset(&path).unwrap_err();
        assert_eq!(err.error_code(), "LOAD_ERROR");
    }

    #[test]
    fn test_normalize_csv_content() {
        let raw = "a,b\n\n\"\"\"x\"\"\",1\n";
        assert_eq!(normalize_csv_content(raw), "a,b\n\"x\",1");
    }

    #[test]
    fn test_infer_excel_column_types() {
        let ints = [Data::Int(1), Data::Float(2.0)];
        let floats = [Data::Float(1.5), Data::Int(2)];
        let mixed = [Data::Float(1.0), Data::String("n/a".to_string())];
        let bools = [Data::Bool(true), Data::Bool(false)];

        fn refs(cells: &[Data]) -> Vec<Option<&Data>> {
            cells.iter().map(Some).collect::<Vec<_>>()
        }
        assert_eq!(infer_excel_column(&refs(&ints[..])), ExcelColumnType::Int64);
        assert_eq!(infer_excel_column(&refs(&floats[..])), ExcelColumnType::Float64);
        assert_eq!(infer_excel_column(&refs(&mixed[..])), ExcelColumnType::Utf8);
        assert_eq!(infer_excel_column(&refs(&bools[..])), ExcelColumnType::Boolean);
        assert_eq!(infer_excel_column(&[None, None]), ExcelColumnType::Utf8);
    }

    #[test]
    fn test_excel_column_to_series_keeps_missing() {
        let cells = [Some(&Data::Float(1.5)), None, Some(&Data::Float(2.5))];
        let series = excel_column_to_series("score", &cells, ExcelColumnType::Float64).unwrap();
        assert_eq!(series.null_count(), 1);
        assert_eq!(series.dtype(), &DataType::Float64);
    }
}

//! Spreadsheet loading.
//!
//! Workbooks are read through [`WorkbookSource`] so the sheet-merging and
//! type-normalization logic does not depend on a particular file reader.
//! [`CalamineWorkbook`] is the production source and understands xlsx, xlsm,
//! xlsb, xls and ods files.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use calamine::{Data, Reader, Sheets, open_workbook_auto};
use log::{debug, error, info};
use serde::Serialize;

use crate::config::Settings;
use crate::data::{Value, excel_serial_to_datetime, parse_naive_date, parse_naive_datetime, parse_number};
use crate::error::LoadError;
use crate::table::{IntWidth, Table};

/// One worksheet as raw cell rows, header row included.
pub type SheetRows = Vec<Vec<Option<Value>>>;

pub trait WorkbookSource {
    fn sheet_names(&self) -> Vec<String>;

    fn read_sheet(&mut self, name: &str) -> Result<SheetRows, LoadError>;

    /// Reads at most `limit` non-empty rows. Sources that can stop early
    /// should override this.
    fn read_sheet_head(&mut self, name: &str, limit: usize) -> Result<SheetRows, LoadError> {
        let mut rows = self.read_sheet(name)?;
        rows.truncate(limit);
        Ok(rows)
    }
}

pub struct CalamineWorkbook {
    sheets: Sheets<BufReader<File>>,
}

impl CalamineWorkbook {
    pub fn open(path: &Path) -> Result<Self, LoadError> {
        let sheets = open_workbook_auto(path).map_err(|err| LoadError::Open {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Ok(Self { sheets })
    }

    fn range(&mut self, name: &str) -> Result<calamine::Range<Data>, LoadError> {
        self.sheets
            .worksheet_range(name)
            .map_err(|err| LoadError::Sheet {
                sheet: name.to_string(),
                message: err.to_string(),
            })
    }
}

impl WorkbookSource for CalamineWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.sheet_names()
    }

    fn read_sheet(&mut self, name: &str) -> Result<SheetRows, LoadError> {
        let range = self.range(name)?;
        Ok(range
            .rows()
            .map(|row| row.iter().map(cell_to_value).collect())
            .collect())
    }

    fn read_sheet_head(&mut self, name: &str, limit: usize) -> Result<SheetRows, LoadError> {
        let range = self.range(name)?;
        Ok(range
            .rows()
            .filter(|row| row.iter().any(|cell| !matches!(cell, Data::Empty)))
            .take(limit)
            .map(|row| row.iter().map(cell_to_value).collect())
            .collect())
    }
}

fn cell_to_value(cell: &Data) -> Option<Value> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) if s.trim().is_empty() => None,
        Data::String(s) => Some(Value::Text(s.clone())),
        Data::Int(i) => Some(Value::Integer(*i)),
        Data::Float(f) => Some(Value::Float(*f)),
        Data::Bool(b) => Some(Value::Boolean(*b)),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            if dt.is_duration() || (0.0..1.0).contains(&serial) {
                Some(Value::Text(format_day_fraction(serial)))
            } else {
                excel_serial_to_datetime(serial).map(|ts| {
                    if ts.time() == chrono::NaiveTime::MIN {
                        Value::Date(ts.date())
                    } else {
                        Value::DateTime(ts)
                    }
                })
            }
        }
        Data::DateTimeIso(s) => Some(
            parse_naive_datetime(s)
                .map(Value::DateTime)
                .or_else(|_| parse_naive_date(s).map(Value::Date))
                .unwrap_or_else(|_| Value::Text(s.clone())),
        ),
        Data::DurationIso(s) => Some(Value::Text(s.clone())),
    }
}

/// Renders a fraction of a day (time-of-day or duration cells) as `H:MM:SS`.
fn format_day_fraction(days: f64) -> String {
    let total = (days * 86_400.0).round().max(0.0) as i64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkbookInfo {
    pub file_name: String,
    pub file_size_bytes: u64,
    pub sheet_names: Vec<String>,
    pub sample_columns: Vec<String>,
    pub sample_row_count: usize,
}

impl WorkbookInfo {
    pub fn file_size_mb(&self) -> f64 {
        (self.file_size_bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
    }
}

#[derive(Debug, Clone)]
pub struct SpreadsheetLoader {
    pub auto_merge_sheets: bool,
    pub sample_rows: usize,
}

impl Default for SpreadsheetLoader {
    fn default() -> Self {
        Self {
            auto_merge_sheets: true,
            sample_rows: crate::config::DEFAULT_SAMPLE_ROWS,
        }
    }
}

impl SpreadsheetLoader {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            auto_merge_sheets: settings.auto_merge_sheets,
            sample_rows: settings.sample_rows,
        }
    }

    pub fn load(&self, path: &Path) -> Result<Table, LoadError> {
        info!("Loading workbook {path:?}");
        let mut workbook = CalamineWorkbook::open(path)?;
        self.load_source(&mut workbook, path)
    }

    /// Loads every sheet (or only the first when merging is disabled), skipping
    /// sheets that fail to parse. Fails only when no sheet could be parsed.
    pub fn load_source(
        &self,
        source: &mut dyn WorkbookSource,
        path: &Path,
    ) -> Result<Table, LoadError> {
        let names = source.sheet_names();
        if names.is_empty() {
            return Err(LoadError::NoSheets {
                path: path.to_path_buf(),
            });
        }
        let selected = if self.auto_merge_sheets {
            names.as_slice()
        } else {
            &names[..1]
        };
        if selected.len() == 1 {
            info!("Single-sheet load of '{}'", selected[0]);
        } else {
            info!("Merging {} sheet(s): {}", selected.len(), selected.join(", "));
        }

        let mut tables = Vec::with_capacity(selected.len());
        for name in selected {
            match source.read_sheet(name) {
                Ok(rows) => {
                    let mut table = rows_to_table(rows);
                    normalize_types(&mut table);
                    info!("Sheet '{name}': {} row(s)", table.height());
                    tables.push(table);
                }
                Err(err) => error!("Skipping sheet '{name}': {err}"),
            }
        }
        if tables.is_empty() {
            return Err(LoadError::NoParseableSheets {
                path: path.to_path_buf(),
                sheet_count: selected.len(),
            });
        }

        let parsed = tables.len();
        let mut merged = if parsed == 1 {
            tables.remove(0)
        } else {
            Table::concat(tables)
        };
        if parsed > 1 {
            // Sheets normalized independently may disagree on a column's type.
            normalize_types(&mut merged);
            info!(
                "Merged {parsed} of {} sheet(s) into {} row(s) x {} column(s)",
                selected.len(),
                merged.height(),
                merged.width()
            );
        }
        Ok(merged)
    }

    pub fn inspect(&self, path: &Path) -> Result<WorkbookInfo, LoadError> {
        let file_size_bytes = fs::metadata(path)
            .map_err(|err| LoadError::Open {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?
            .len();
        let mut workbook = CalamineWorkbook::open(path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.inspect_source(&mut workbook, file_name, file_size_bytes, path)
    }

    /// Reads only the header and the first `sample_rows` rows of the first sheet.
    pub fn inspect_source(
        &self,
        source: &mut dyn WorkbookSource,
        file_name: String,
        file_size_bytes: u64,
        path: &Path,
    ) -> Result<WorkbookInfo, LoadError> {
        let sheet_names = source.sheet_names();
        let Some(first) = sheet_names.first() else {
            return Err(LoadError::NoSheets {
                path: PathBuf::from(path),
            });
        };
        let head = source.read_sheet_head(first, self.sample_rows + 1)?;
        let table = rows_to_table(head);
        Ok(WorkbookInfo {
            file_name,
            file_size_bytes,
            sample_columns: table.column_names().into_iter().map(str::to_string).collect(),
            sample_row_count: table.height(),
            sheet_names,
        })
    }
}

/// First non-empty row becomes the header; fully empty rows are dropped.
pub fn rows_to_table(rows: SheetRows) -> Table {
    let mut rows = rows
        .into_iter()
        .filter(|row| row.iter().any(Option::is_some));
    let Some(header_row) = rows.next() else {
        return Table::new();
    };
    let headers = header_names(&header_row);
    Table::from_rows(&headers, rows.collect())
}

fn header_names(row: &[Option<Value>]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    row.iter()
        .enumerate()
        .map(|(idx, cell)| {
            let base = cell
                .as_ref()
                .map(|v| v.as_display().trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| format!("Unnamed: {idx}"));
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base
            } else {
                format!("{base}.{count}")
            };
            *count += 1;
            name
        })
        .collect()
}

/// Per-column type normalization.
///
/// Text values are converted to numbers only when every non-null value in
/// the column parses. Purely numeric columns become integers when every value
/// is whole (recording the narrowest width) and floats otherwise.
pub fn normalize_types(table: &mut Table) {
    for column in table.columns_mut() {
        let mut numeric = Vec::with_capacity(column.values.len());
        let mut convertible = true;
        let mut has_any = false;
        for value in &column.values {
            let converted = match value {
                None => None,
                Some(Value::Integer(i)) => Some(Value::Integer(*i)),
                Some(Value::Float(f)) if f.is_finite() => Some(Value::Float(*f)),
                Some(Value::Text(s)) => match parse_number(s) {
                    Some(parsed) => Some(parsed),
                    None => {
                        convertible = false;
                        break;
                    }
                },
                Some(_) => {
                    convertible = false;
                    break;
                }
            };
            has_any |= converted.is_some();
            numeric.push(converted);
        }
        if !convertible || !has_any {
            continue;
        }

        let all_whole = numeric.iter().flatten().all(|v| match v {
            Value::Integer(_) => true,
            Value::Float(f) => f.fract() == 0.0 && f.abs() < 9.0e15,
            _ => false,
        });
        if all_whole {
            let ints = numeric
                .into_iter()
                .map(|v| v.and_then(|v| v.as_i64()).map(Value::Integer))
                .collect::<Vec<_>>();
            let (min, max) = ints
                .iter()
                .flatten()
                .filter_map(Value::as_i64)
                .fold((i64::MAX, i64::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
            column.int_width = Some(IntWidth::for_range(min, max));
            column.values = ints;
            debug!(
                "Column '{}' stored as i{}",
                column.name,
                column.int_width.map(IntWidth::bits).unwrap_or(64)
            );
        } else {
            column.values = numeric
                .into_iter()
                .map(|v| v.and_then(|v| v.as_f64()).map(Value::Float))
                .collect();
            column.int_width = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Option<Value> {
        Some(Value::Text(s.to_string()))
    }

    #[test]
    fn header_row_skips_leading_blank_rows_and_names_gaps() {
        let table = rows_to_table(vec![
            vec![None, None, None],
            vec![text("사번"), None, text("사번")],
            vec![text("1"), text("x"), text("2")],
        ]);
        assert_eq!(table.column_names(), vec!["사번", "Unnamed: 1", "사번.1"]);
        assert_eq!(table.height(), 1);
    }

    #[test]
    fn numeric_coercion_is_all_or_nothing() {
        let mut table = rows_to_table(vec![
            vec![text("ids"), text("mixed"), text("ratio")],
            vec![text("101"), text("7"), text("1.5")],
            vec![text("102"), text("n/a"), Some(Value::Integer(2))],
            vec![None, text("9"), None],
        ]);
        normalize_types(&mut table);
        let ids = table.column("ids").unwrap();
        assert_eq!(ids.values, vec![Some(Value::Integer(101)), Some(Value::Integer(102)), None]);
        assert_eq!(ids.int_width, Some(IntWidth::I8));
        assert_eq!(table.column("mixed").unwrap().values[0], text("7"));
        assert_eq!(
            table.column("ratio").unwrap().values,
            vec![Some(Value::Float(1.5)), Some(Value::Float(2.0)), None]
        );
    }

    #[test]
    fn whole_floats_become_integers() {
        let mut table = rows_to_table(vec![
            vec![text("출입시각")],
            vec![Some(Value::Float(70553.0))],
            vec![Some(Value::Float(183012.0))],
        ]);
        normalize_types(&mut table);
        let column = table.column("출입시각").unwrap();
        assert_eq!(column.values[0], Some(Value::Integer(70553)));
        assert_eq!(column.int_width, Some(IntWidth::I32));
    }

    #[test]
    fn day_fractions_render_as_clock_text() {
        assert_eq!(format_day_fraction(0.375), "09:00:00");
        assert_eq!(format_day_fraction(1.5), "36:00:00");
    }
}

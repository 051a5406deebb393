#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::Workbook;
use tempfile::{TempDir, tempdir};

/// A worksheet cell for generated fixtures.
#[derive(Debug, Clone, Copy)]
pub enum Cell<'a> {
    Text(&'a str),
    Number(f64),
    Blank,
}

pub fn t(value: &str) -> Cell<'_> {
    Cell::Text(value)
}

pub fn n(value: f64) -> Cell<'static> {
    Cell::Number(value)
}

pub const BLANK: Cell<'static> = Cell::Blank;

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.join(name);
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    /// Builds an xlsx workbook with one worksheet per `(name, rows)` entry.
    /// The first row of each sheet is its header.
    pub fn write_workbook(&self, name: &str, sheets: &[(&str, Vec<Vec<Cell<'_>>>)]) -> PathBuf {
        let path = self.join(name);
        let mut workbook = Workbook::new();
        for (sheet_name, rows) in sheets {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(*sheet_name).expect("sheet name");
            for (row_idx, row) in rows.iter().enumerate() {
                for (col_idx, cell) in row.iter().enumerate() {
                    let (r, c) = (row_idx as u32, col_idx as u16);
                    match cell {
                        Cell::Text(value) => {
                            worksheet.write_string(r, c, *value).expect("write string");
                        }
                        Cell::Number(value) => {
                            worksheet.write_number(r, c, *value).expect("write number");
                        }
                        Cell::Blank => {}
                    }
                }
            }
        }
        workbook.save(&path).expect("save workbook");
        path
    }

    /// Creates (or opens) a SQLite database under the workspace and runs
    /// `sql` against it.
    pub fn seed_database(&self, name: &str, sql: &str) -> PathBuf {
        let path = self.join(name);
        let conn = rusqlite::Connection::open(&path).expect("open database");
        conn.execute_batch(sql).expect("seed database");
        path
    }

    /// Runs a single-value query such as `SELECT COUNT(*) FROM t`.
    pub fn query_i64(&self, db: &Path, sql: &str) -> i64 {
        let conn = rusqlite::Connection::open(db).expect("open database");
        conn.query_row(sql, [], |row| row.get(0)).expect("query")
    }
}

/// Claim workbook rows shared by several suites: one overnight shift, one
/// annual-leave day, one overseas trip with hours and one trip without.
pub fn claim_rows() -> Vec<Vec<Cell<'static>>> {
    vec![
        vec![
            t("근무일"),
            t("사번"),
            t("성명"),
            t("직급"),
            t("근무시간"),
            t("시작"),
            t("종료"),
            t("근태명"),
        ],
        vec![
            t("2025-08-04"),
            n(2019001.0),
            t("김하나"),
            t("책임"),
            BLANK,
            t("23:00"),
            t("01:00"),
            BLANK,
        ],
        vec![
            t("2025-08-05"),
            n(2019001.0),
            t("김하나"),
            t("책임"),
            BLANK,
            BLANK,
            BLANK,
            t("연차"),
        ],
        vec![
            t("2025-08-06"),
            n(2019002.0),
            BLANK,
            t("선임"),
            n(660.0),
            BLANK,
            BLANK,
            t("해외출장"),
        ],
        vec![
            t("2025-08-07"),
            n(2019002.0),
            BLANK,
            t("선임"),
            BLANK,
            BLANK,
            BLANK,
            t("출장"),
        ],
    ]
}

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open workbook {path:?}: {message}")]
    Open { path: PathBuf, message: String },

    #[error("workbook {path:?} does not contain any sheets")]
    NoSheets { path: PathBuf },

    #[error("none of the {sheet_count} sheet(s) in {path:?} could be parsed")]
    NoParseableSheets { path: PathBuf, sheet_count: usize },

    #[error("sheet '{sheet}' could not be read: {message}")]
    Sheet { sheet: String, message: String },
}

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("{source_type} input is missing required column '{column}'")]
    MissingColumn {
        source_type: &'static str,
        column: String,
    },

    #[error("reference table '{table}' unavailable: {message}")]
    Reference { table: String, message: String },
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database file {path:?} does not exist")]
    DatabaseNotFound { path: PathBuf },

    #[error("{context}: {source}")]
    Sqlite {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("identifier '{0}' cannot be used as a table or column name")]
    InvalidIdentifier(String),

    #[error("'{0}' is not a valid YYYY-MM-DD date bound")]
    InvalidDate(String),

    #[error("table '{0}' already exists")]
    TableExists(String),
}

impl PersistenceError {
    pub(crate) fn sqlite(context: impl Into<String>, source: rusqlite::Error) -> Self {
        PersistenceError::Sqlite {
            context: context.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("unknown source type '{0}'")]
    UnknownSourceType(String),

    #[error("unsupported file type for '{0}' (expected a spreadsheet)")]
    UnsupportedFileType(String),

    #[error("load failed: {0}")]
    Load(#[from] LoadError),

    #[error("transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error("persistence failed: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("upload job '{0}' not found")]
    JobNotFound(String),

    #[error("staging upload bytes failed: {0}")]
    Io(#[from] std::io::Error),
}

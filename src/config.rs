//! Runtime settings, loaded from YAML.
//!
//! Every field has a default so a partial file (or no file at all) is valid.
//! The database path is always explicit: it comes from the settings file or a
//! command-line override and is never resolved relative to the binary.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "workforce-ingest.yml";
pub const DEFAULT_CHUNK_SIZE: usize = 5_000;
pub const DEFAULT_SAMPLE_ROWS: usize = 5;
pub const DEFAULT_DETECTION_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub database_path: PathBuf,
    /// Create the database file when it does not exist yet.
    pub create_if_missing: bool,
    pub chunk_size: usize,
    pub auto_merge_sheets: bool,
    pub sample_rows: usize,
    pub detection_threshold: f64,
    pub pragmas: PragmaSettings,
    pub references: ReferenceSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("workforce.db"),
            create_if_missing: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            auto_merge_sheets: true,
            sample_rows: DEFAULT_SAMPLE_ROWS,
            detection_threshold: DEFAULT_DETECTION_THRESHOLD,
            pragmas: PragmaSettings::default(),
            references: ReferenceSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PragmaSettings {
    pub journal_mode: String,
    pub synchronous: String,
    /// Negative values are KiB, positive values are pages.
    pub cache_size: i64,
}

impl Default for PragmaSettings {
    fn default() -> Self {
        Self {
            journal_mode: "DELETE".to_string(),
            synchronous: "NORMAL".to_string(),
            cache_size: -64_000,
        }
    }
}

/// Table and column names of the reference data used by enrichment joins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReferenceSettings {
    pub organization_table: String,
    pub organization_id_column: String,
    pub organization_name_column: String,
    pub organization_position_column: String,
    pub organization_center_column: String,
    pub organization_team_column: String,
    pub organization_group_column: String,
    pub grade_table: String,
    pub grade_name_column: String,
    pub grade_level_column: String,
}

impl Default for ReferenceSettings {
    fn default() -> Self {
        Self {
            organization_table: "employees".to_string(),
            organization_id_column: "employee_id".to_string(),
            organization_name_column: "employee_name".to_string(),
            organization_position_column: "position".to_string(),
            organization_center_column: "center_name".to_string(),
            organization_team_column: "team_name".to_string(),
            organization_group_column: "group_name".to_string(),
            grade_table: "grade_level_mapping".to_string(),
            grade_name_column: "grade_name".to_string(),
            grade_level_column: "level".to_string(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Reading settings file {path:?}"))?;
        let settings: Settings = serde_yaml::from_str(&raw)
            .with_context(|| format!("Parsing settings file {path:?}"))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads `explicit` when given, otherwise `workforce-ingest.yml` from the
    /// working directory if present, otherwise the defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::load(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Serializing settings")
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.chunk_size > 0, "chunk_size must be greater than zero");
        ensure!(
            (0.0..=1.0).contains(&self.detection_threshold),
            "detection_threshold must be between 0 and 1, got {}",
            self.detection_threshold
        );
        ensure!(
            !self.database_path.as_os_str().is_empty(),
            "database_path must not be empty"
        );
        Ok(())
    }
}

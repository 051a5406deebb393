//! Upload orchestration: load → transform → (range delete) → insert, with
//! per-job progress tracking, table statistics and source-type detection.

use std::io::Write;
use std::path::Path;

use chrono::NaiveDate;
use log::{debug, error, info, warn};
use regex::RegexBuilder;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::config::Settings;
use crate::data::parse_temporal;
use crate::enrich::ReferenceData;
use crate::error::UploadError;
use crate::job::{JobRegistry, UploadJob, sha256_hex};
use crate::loader::{SpreadsheetLoader, WorkbookInfo};
use crate::registry::{Registry, SourceType, SourceTypeDescriptor, is_spreadsheet};
use crate::store::{Gateway, InsertMode, TableStats};
use crate::table::Table;
use crate::transform::Transformer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    /// Insert every transformed row.
    Append,
    /// Delete the batch's date range first, in the same transaction. Undated
    /// sources replace the whole table.
    ReplaceRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    FileName,
    ColumnOverlap,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub source: Option<SourceType>,
    pub confidence: Confidence,
    pub method: Option<DetectionMethod>,
    /// Share of the descriptor's sample columns found in the workbook.
    pub column_overlap: Option<f64>,
    pub file_info: Option<WorkbookInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    pub source: SourceType,
    pub table_name: &'static str,
    #[serde(flatten)]
    pub stats: TableStats,
}

pub struct Orchestrator {
    registry: Registry,
    settings: Settings,
    loader: SpreadsheetLoader,
    gateway: Gateway,
    jobs: JobRegistry,
}

impl Orchestrator {
    pub fn new(registry: Registry, settings: Settings) -> Self {
        let loader = SpreadsheetLoader::from_settings(&settings);
        let gateway = Gateway::from_settings(&settings);
        Self {
            registry,
            settings,
            loader,
            gateway,
            jobs: JobRegistry::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn gateway(&mut self) -> &mut Gateway {
        &mut self.gateway
    }

    /// Validates the request and registers a `processing` job.
    pub fn begin(&mut self, source_id: &str, file_name: &str) -> Result<String, UploadError> {
        let source = self.registry.lookup(source_id)?.source;
        if !is_spreadsheet(file_name) {
            return Err(UploadError::UnsupportedFileType(file_name.to_string()));
        }
        let job = UploadJob::new(source, file_name);
        info!("Job {} accepted: {file_name} as {source}", job.id);
        Ok(self.jobs.insert(job))
    }

    /// Drives a registered job to completion. On failure the job is marked
    /// `error` and the stage error is returned.
    pub fn run(&mut self, job_id: &str, bytes: &[u8], mode: UploadMode) -> Result<UploadJob, UploadError> {
        let outcome = self.execute(job_id, bytes, mode);
        let job = self.jobs.get_mut(job_id)?;
        match outcome {
            Ok(message) => {
                info!("Job {job_id} completed: {message}");
                job.complete(message);
                Ok(job.clone())
            }
            Err(err) => {
                error!("Job {job_id} failed: {err}");
                job.fail(&err);
                Err(err)
            }
        }
    }

    pub fn start_upload(
        &mut self,
        source_id: &str,
        bytes: &[u8],
        file_name: &str,
        mode: UploadMode,
    ) -> Result<UploadJob, UploadError> {
        let job_id = self.begin(source_id, file_name)?;
        self.run(&job_id, bytes, mode)
    }

    pub fn poll(&self, job_id: &str) -> Result<UploadJob, UploadError> {
        self.jobs.get(job_id).cloned()
    }

    pub fn jobs(&self) -> Vec<&UploadJob> {
        self.jobs.list()
    }

    /// Forgets a job once its result has been read.
    pub fn forget(&mut self, job_id: &str) -> Result<UploadJob, UploadError> {
        self.jobs.remove(job_id)
    }

    /// Forgets every completed or failed job.
    pub fn prune_finished(&mut self) -> usize {
        let pruned = self.jobs.prune_finished();
        if pruned > 0 {
            debug!("Pruned {pruned} finished job(s)");
        }
        pruned
    }

    fn execute(&mut self, job_id: &str, bytes: &[u8], mode: UploadMode) -> Result<String, UploadError> {
        let (source, file_name) = {
            let job = self.jobs.get_mut(job_id)?;
            job.checksum = Some(sha256_hex(bytes));
            (job.source, job.file_name.clone())
        };
        let descriptor = self
            .registry
            .get(source)
            .ok_or_else(|| UploadError::UnknownSourceType(source.id().to_string()))?;

        let staged = stage_bytes(bytes, &file_name)?;
        let raw = self.loader.load(staged.path())?;
        drop(staged);
        {
            let job = self.jobs.get_mut(job_id)?;
            job.total_rows = raw.height();
            job.message = Some(format!("Loaded {} row(s)", raw.height()));
        }

        let refs = reference_snapshot(descriptor, &mut self.gateway, &self.settings);
        let records = Transformer::for_source(descriptor).transform(raw, &refs)?;
        if let Ok(job) = self.jobs.get_mut(job_id) {
            job.total_rows = records.height();
            job.message = Some(format!("Transformed {} row(s)", records.height()));
        }

        let table_name = descriptor.table_name;
        let chunk_size = self.settings.chunk_size;
        let jobs = &mut self.jobs;
        let mut progress = |done: usize| {
            if let Ok(job) = jobs.get_mut(job_id) {
                job.processed_rows = done;
            }
        };

        let message = match (mode, descriptor.date_column) {
            (UploadMode::ReplaceRange, Some(date)) => match date_bounds(&records, date.name) {
                Some((min, max)) => {
                    let (min, max) = (min.format("%Y-%m-%d").to_string(), max.format("%Y-%m-%d").to_string());
                    let (deleted, inserted) = self.gateway.replace_date_range(
                        &records,
                        table_name,
                        date.name,
                        &min,
                        &max,
                        chunk_size,
                        &mut progress,
                    )?;
                    if let Ok(job) = jobs.get_mut(job_id) {
                        job.deleted_rows = deleted;
                    }
                    format!("Replaced {min}..{max} in {table_name}: {deleted} deleted, {inserted} inserted")
                }
                None => {
                    warn!("No parseable {} values; appending without range replacement", date.name);
                    let inserted = self.gateway.bulk_insert(
                        &records,
                        table_name,
                        InsertMode::Append,
                        chunk_size,
                        &mut progress,
                    )?;
                    format!("Inserted {inserted} row(s) into {table_name}")
                }
            },
            (UploadMode::ReplaceRange, None) => {
                let inserted = self.gateway.bulk_insert(
                    &records,
                    table_name,
                    InsertMode::Replace,
                    chunk_size,
                    &mut progress,
                )?;
                format!("Replaced {table_name} with {inserted} row(s)")
            }
            (UploadMode::Append, _) => {
                let inserted = self.gateway.bulk_insert(
                    &records,
                    table_name,
                    InsertMode::Append,
                    chunk_size,
                    &mut progress,
                )?;
                format!("Inserted {inserted} row(s) into {table_name}")
            }
        };
        Ok(message)
    }

    /// Loads and transforms a workbook without writing anything.
    pub fn dry_run(&mut self, source_id: &str, path: &Path) -> Result<Table, UploadError> {
        let descriptor = self.registry.lookup(source_id)?;
        let raw = self.loader.load(path)?;
        let refs = reference_snapshot(descriptor, &mut self.gateway, &self.settings);
        Ok(Transformer::for_source(descriptor).transform(raw, &refs)?)
    }

    /// Row count and date range of a source's destination table. A missing
    /// table reports zero rows.
    pub fn stats(&mut self, source_id: &str) -> Result<SourceStats, UploadError> {
        let descriptor = self.registry.lookup(source_id)?;
        let stats = self
            .gateway
            .table_stats(descriptor.table_name, descriptor.date_column.as_ref())?;
        Ok(SourceStats {
            source: descriptor.source,
            table_name: descriptor.table_name,
            stats,
        })
    }

    pub fn all_stats(&mut self) -> Result<Vec<SourceStats>, UploadError> {
        let ids = self.registry.iter().map(|d| d.id()).collect::<Vec<_>>();
        ids.into_iter().map(|id| self.stats(id)).collect()
    }

    /// Guesses the source type from the file name, then from sample-column
    /// overlap. Never fails; an unreadable workbook simply yields no match.
    pub fn detect(&self, bytes: &[u8], file_name: &str) -> Detection {
        if let Some(descriptor) = self.registry.iter().find(|d| file_name_matches(d.file_pattern, file_name)) {
            info!("Detected {} from file name {file_name}", descriptor.id());
            return Detection {
                source: Some(descriptor.source),
                confidence: Confidence::High,
                method: Some(DetectionMethod::FileName),
                column_overlap: None,
                file_info: self.inspect_bytes(bytes, file_name),
            };
        }

        let file_info = self.inspect_bytes(bytes, file_name);
        let best = file_info.as_ref().and_then(|info| {
            self.registry
                .iter()
                .map(|d| (d, column_overlap(d, &info.sample_columns)))
                .filter(|(_, overlap)| *overlap >= self.settings.detection_threshold)
                // Ties go to the earlier registry entry.
                .fold(None::<(&SourceTypeDescriptor, f64)>, |best, candidate| match best {
                    Some(best) if best.1 >= candidate.1 => Some(best),
                    _ => Some(candidate),
                })
        });
        match best {
            Some((descriptor, overlap)) => {
                info!(
                    "Detected {} from columns ({:.0}% of sample columns present)",
                    descriptor.id(),
                    overlap * 100.0
                );
                Detection {
                    source: Some(descriptor.source),
                    confidence: Confidence::High,
                    method: Some(DetectionMethod::ColumnOverlap),
                    column_overlap: Some(overlap),
                    file_info,
                }
            }
            None => Detection {
                source: None,
                confidence: Confidence::Low,
                method: None,
                column_overlap: None,
                file_info,
            },
        }
    }

    fn inspect_bytes(&self, bytes: &[u8], file_name: &str) -> Option<WorkbookInfo> {
        let inspected = stage_bytes(bytes, file_name)
            .map_err(|err| err.to_string())
            .and_then(|staged| {
                let mut workbook = crate::loader::CalamineWorkbook::open(staged.path())
                    .map_err(|err| err.to_string())?;
                self.loader
                    .inspect_source(&mut workbook, file_name.to_string(), bytes.len() as u64, staged.path())
                    .map_err(|err| err.to_string())
            });
        match inspected {
            Ok(info) => Some(info),
            Err(err) => {
                warn!("Could not inspect {file_name}: {err}");
                None
            }
        }
    }

    pub fn close(&mut self) -> Result<(), UploadError> {
        Ok(self.gateway.close()?)
    }
}

/// Reference data is only needed by the transformers that join against it.
fn reference_snapshot(
    descriptor: &SourceTypeDescriptor,
    gateway: &mut Gateway,
    settings: &Settings,
) -> ReferenceData {
    match descriptor.source {
        SourceType::Claim | SourceType::Tag => ReferenceData::load(gateway, &settings.references),
        _ => ReferenceData::empty(),
    }
}

/// Writes the upload to a temporary file that keeps the original extension
/// (the workbook reader dispatches on it). Removed when dropped.
fn stage_bytes(bytes: &[u8], file_name: &str) -> Result<NamedTempFile, UploadError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default();
    let mut staged = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(&extension)
        .tempfile()?;
    staged.write_all(bytes)?;
    staged.flush()?;
    Ok(staged)
}

/// Earliest and latest calendar dates in `column`.
fn date_bounds(records: &Table, column: &str) -> Option<(NaiveDate, NaiveDate)> {
    records
        .column(column)?
        .non_null()
        .filter_map(parse_temporal)
        .map(|ts| ts.date())
        .fold(None::<(NaiveDate, NaiveDate)>, |bounds, date| match bounds {
            None => Some((date, date)),
            Some((lo, hi)) => Some((date.min(lo), date.max(hi))),
        })
}

/// Case-insensitive glob match of the file stem against the pattern stem.
fn file_name_matches(pattern: &str, file_name: &str) -> bool {
    let stem = |name: &str| {
        Path::new(name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(name)
            .to_string()
    };
    let pattern_stem = stem(pattern);
    let file_stem = stem(file_name);
    let expression = pattern_stem
        .chars()
        .map(|ch| match ch {
            '*' => ".*".to_string(),
            '?' => ".".to_string(),
            other => regex::escape(&other.to_string()),
        })
        .collect::<String>();
    RegexBuilder::new(&format!("^{expression}$"))
        .case_insensitive(true)
        .build()
        .is_ok_and(|re| re.is_match(&file_stem))
}

fn column_overlap(descriptor: &SourceTypeDescriptor, columns: &[String]) -> f64 {
    if descriptor.sample_columns.is_empty() {
        return 0.0;
    }
    let matched = descriptor
        .sample_columns
        .iter()
        .filter(|sample| columns.iter().any(|c| c.trim() == **sample))
        .count();
    matched as f64 / descriptor.sample_columns.len() as f64
}

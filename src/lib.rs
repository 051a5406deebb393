pub mod cli;
pub mod config;
pub mod data;
pub mod enrich;
pub mod error;
pub mod io_utils;
pub mod job;
pub mod loader;
pub mod pipeline;
pub mod registry;
pub mod store;
pub mod table;
pub mod transform;

use std::{env, fs, path::Path, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use itertools::Itertools;
use log::{LevelFilter, debug, info};

use crate::cli::{Cli, Commands};
use crate::config::Settings;
use crate::loader::SpreadsheetLoader;
use crate::pipeline::{Orchestrator, SourceStats, UploadMode};
use crate::registry::Registry;

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("workforce_ingest", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let settings = effective_settings(&cli)?;
    match cli.command {
        Commands::Types(args) => handle_types(&args),
        Commands::Inspect(args) => handle_inspect(&settings, &args),
        Commands::Detect(args) => handle_detect(settings, &args),
        Commands::Upload(args) => handle_upload(settings, &args),
        Commands::Transform(args) => handle_transform(settings, &args),
        Commands::Stats(args) => handle_stats(settings, &args),
        Commands::Config => {
            print!("{}", settings.to_yaml()?);
            Ok(())
        }
    }
}

fn effective_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::discover(cli.config.as_deref())?;
    if let Some(path) = &cli.database {
        settings.database_path = path.clone();
    }
    if let Some(chunk_size) = cli.chunk_size {
        settings.chunk_size = chunk_size;
    }
    if cli.create_db {
        settings.create_if_missing = true;
    }
    settings.validate()?;
    debug!("Effective settings: {settings:?}");
    Ok(settings)
}

fn handle_types(args: &cli::TypesArgs) -> Result<()> {
    let registry = Registry::builtin();
    if args.json {
        let listing = registry
            .iter()
            .map(|d| {
                serde_json::json!({
                    "id": d.id(),
                    "label": d.label,
                    "description": d.description,
                    "priority": d.priority,
                    "table_name": d.table_name,
                    "file_pattern": d.file_pattern,
                    "sample_columns": d.sample_columns,
                })
            })
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }
    let headers = ["type", "label", "priority", "table", "file pattern"]
        .map(String::from)
        .to_vec();
    let rows = registry
        .iter()
        .map(|d| {
            vec![
                d.id().to_string(),
                d.label.to_string(),
                d.priority.to_string(),
                d.table_name.to_string(),
                d.file_pattern.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    Ok(())
}

fn handle_inspect(settings: &Settings, args: &cli::InspectArgs) -> Result<()> {
    let loader = SpreadsheetLoader::from_settings(settings);
    let info = loader
        .inspect(&args.input)
        .with_context(|| format!("Inspecting {:?}", args.input))?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }
    println!("file: {}", info.file_name);
    println!("size: {:.2} MB", info.file_size_mb());
    println!("sheets: {}", info.sheet_names.iter().join(", "));
    println!("columns: {}", info.sample_columns.iter().join(", "));
    println!("sample rows: {}", info.sample_row_count);
    Ok(())
}

fn handle_detect(settings: Settings, args: &cli::DetectArgs) -> Result<()> {
    let bytes = fs::read(&args.input).with_context(|| format!("Reading {:?}", args.input))?;
    let orchestrator = Orchestrator::new(Registry::builtin(), settings);
    let detection = orchestrator.detect(&bytes, &file_name_of(&args.input)?);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&detection)?);
        return Ok(());
    }
    match (detection.source, detection.method) {
        (Some(source), Some(method)) => {
            println!("{source} (confidence: {:?}, via {:?})", detection.confidence, method)
        }
        _ => println!("unknown (confidence: {:?})", detection.confidence),
    }
    Ok(())
}

fn handle_upload(settings: Settings, args: &cli::UploadArgs) -> Result<()> {
    let file_name = file_name_of(&args.input)?;
    let bytes = fs::read(&args.input).with_context(|| format!("Reading {:?}", args.input))?;
    let mode = if args.replace {
        UploadMode::ReplaceRange
    } else {
        UploadMode::Append
    };
    let mut orchestrator = Orchestrator::new(Registry::builtin(), settings);
    let job = orchestrator
        .start_upload(&args.source_type, &bytes, &file_name, mode)
        .with_context(|| format!("Uploading {:?} as {}", args.input, args.source_type))?;
    orchestrator.close()?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&job)?);
    } else {
        println!(
            "{}: {} ({} row(s), {} deleted)",
            job.id,
            job.message.as_deref().unwrap_or_default(),
            job.processed_rows,
            job.deleted_rows
        );
    }
    Ok(())
}

fn handle_transform(settings: Settings, args: &cli::TransformArgs) -> Result<()> {
    let mut orchestrator = Orchestrator::new(Registry::builtin(), settings);
    let transformed = orchestrator
        .dry_run(&args.source_type, &args.input)
        .with_context(|| format!("Transforming {:?} as {}", args.input, args.source_type))?;
    if let Some(limit) = args.preview {
        print!("{}", transformed.preview(limit));
        return Ok(());
    }
    let encoding = io_utils::resolve_encoding(args.output_encoding.as_deref())?;
    let output = args.output.as_deref();
    let mut writer = io_utils::open_csv_writer(output, io_utils::delimiter_for(output), encoding)?;
    let written = io_utils::write_table_csv(&transformed, &mut writer)?;
    info!(
        "Wrote {written} transformed row(s) to {}",
        output.map_or_else(|| "stdout".to_string(), |p| p.display().to_string())
    );
    Ok(())
}

fn handle_stats(settings: Settings, args: &cli::StatsArgs) -> Result<()> {
    let mut orchestrator = Orchestrator::new(Registry::builtin(), settings);
    let stats = match &args.source_type {
        Some(id) => vec![orchestrator.stats(id)?],
        None => orchestrator.all_stats()?,
    };
    orchestrator.close()?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }
    let headers = ["type", "table", "rows", "from", "to"]
        .map(String::from)
        .to_vec();
    let rows = stats.iter().map(stats_row).collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    Ok(())
}

fn stats_row(entry: &SourceStats) -> Vec<String> {
    let (from, to) = entry
        .stats
        .date_range
        .as_ref()
        .map(|range| (range.min.clone(), range.max.clone()))
        .unwrap_or_default();
    let rows = if entry.stats.exists {
        entry.stats.row_count.to_string()
    } else {
        "-".to_string()
    };
    vec![
        entry.source.to_string(),
        entry.table_name.to_string(),
        rows,
        from,
        to,
    ]
}

fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .with_context(|| format!("{path:?} has no file name"))
}

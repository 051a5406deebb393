use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Load HR spreadsheets into a SQLite analytics store",
    long_about = None
)]
pub struct Cli {
    /// YAML settings file (defaults to ./workforce-ingest.yml when present)
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,
    /// SQLite database path, overriding the settings file
    #[arg(long = "db", global = true)]
    pub database: Option<PathBuf>,
    /// Rows per insert batch, overriding the settings file
    #[arg(long = "chunk-size", global = true)]
    pub chunk_size: Option<usize>,
    /// Create the database file when it does not exist yet
    #[arg(long = "create-db", global = true)]
    pub create_db: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the registered source types
    Types(TypesArgs),
    /// Show sheet names, columns and size of a workbook
    Inspect(InspectArgs),
    /// Guess the source type of a workbook
    Detect(DetectArgs),
    /// Load, transform and store a workbook
    Upload(UploadArgs),
    /// Transform a workbook without storing it, writing CSV or a preview table
    Transform(TransformArgs),
    /// Report row counts and date ranges per destination table
    Stats(StatsArgs),
    /// Print the effective settings as YAML
    Config,
}

#[derive(Debug, Args)]
pub struct TypesArgs {
    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Workbook to inspect
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct DetectArgs {
    /// Workbook to classify
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Emit JSON instead of a summary line
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct UploadArgs {
    /// Source type identifier such as `claim_data` (see `types`)
    #[arg(short = 't', long = "type")]
    pub source_type: String,
    /// Workbook to upload
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Delete rows inside the file's date range before inserting
    #[arg(long)]
    pub replace: bool,
    /// Emit the finished job as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct TransformArgs {
    /// Source type identifier such as `claim_data` (see `types`)
    #[arg(short = 't', long = "type")]
    pub source_type: String,
    /// Workbook to transform
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Output CSV file (stdout if omitted or `-`)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Character encoding for the output file/stdout (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
    /// Render the first N rows as a table instead of writing CSV
    #[arg(long)]
    pub preview: Option<usize>,
}

#[derive(Debug, Args)]
pub struct StatsArgs {
    /// Restrict to one source type
    #[arg(short = 't', long = "type")]
    pub source_type: Option<String>,
    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

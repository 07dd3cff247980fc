//! Command-line interface for sheet consolidation.
//!
//! ```text
//! sheet-consolidator detect rutas/ruta1.xlsx
//! sheet-consolidator analyze rutas/ruta1.xlsx --all-sheets
//! sheet-consolidator consolidate rutas/ruta1.xlsx -o salida/
//! sheet-consolidator batch rutas/ --parallel -w 8 --report resumen.json
//! ```
//!
//! Logs go to stderr; set `RUST_LOG` for fine-grained filtering.
use anyhow::Context;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use sheet_consolidator::config::Settings;
use sheet_consolidator::consolidation::BatchOptions;
use sheet_consolidator::consolidation::BatchSummary;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sheet-consolidator")]
#[command(about = "Consolidate semi-structured spreadsheets into normalized tables")]
#[command(version)]
struct Cli {
    /// Settings file (TOML)
    #[arg(long, global = true, env = "SHEET_CONSOLIDATOR_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect the structure of a file
    Detect {
        file: PathBuf,
    },

    /// Show structure, column types and a preview without writing
    Analyze {
        file: PathBuf,

        /// Analyze every sheet instead of the configured one
        #[arg(long)]
        all_sheets: bool,
    },

    /// Consolidate one file
    Consolidate {
        file: PathBuf,

        /// Output directory (default: a subdirectory next to the file)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Consolidate every spreadsheet under a directory
    Batch(BatchArgs),
}

#[derive(Args)]
struct BatchArgs {
    directory: PathBuf,

    /// Output directory (default: a subdirectory next to each file)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Process files on a worker pool
    #[arg(long)]
    parallel: bool,

    /// Worker pool size
    #[arg(short, long)]
    workers: Option<usize>,

    /// Report what would be done without writing
    #[arg(long)]
    dry_run: bool,

    /// Only scan the top-level directory
    #[arg(long)]
    no_recursive: bool,

    /// Extra glob pattern to exclude (repeatable)
    #[arg(long)]
    exclude: Vec<String>,

    /// Minimum file size in bytes
    #[arg(long)]
    min_size: Option<u64>,

    /// Maximum file size in bytes
    #[arg(long)]
    max_size: Option<u64>,

    /// Write the batch summary as JSON to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

impl BatchArgs {
    /// Applies command-line flags over the settings file.
    fn apply(&self, settings: &mut Settings) {
        let batch = &mut settings.batch;
        batch.parallel |= self.parallel;
        if let Some(workers) = self.workers {
            batch.max_workers = workers;
        }
        if self.no_recursive {
            batch.recursive = false;
        }
        batch.exclude.extend(self.exclude.iter().cloned());
        if let Some(min_size) = self.min_size {
            batch.min_size = min_size;
        }
        if let Some(max_size) = self.max_size {
            batch.max_size = max_size;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    let mut settings = match &cli.config {
        Some(path) => Settings::load(path).context("Failed to load settings")?,
        None => Settings::default(),
    };

    match cli.command {
        Command::Detect { file } => {
            let detection = sheet_consolidator::detect_structure(&file, &settings)
                .with_context(|| format!("Failed to detect structure of {}", file.display()))?;
            println!("{}: {}", file.display(), detection.structure);
            for (index, block) in detection.blocks.iter().enumerate() {
                let marker = block
                    .marker
                    .as_ref()
                    .map(|marker| format!(" marker={}", marker.value))
                    .unwrap_or_default();
                println!("  block {}: {} ({} rows){}", index + 1, block.range(), block.data_row_count(), marker);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Analyze { file, all_sheets: true } => {
            let analysis = sheet_consolidator::analyze_workbook(&file, &settings)
                .with_context(|| format!("Failed to analyze {}", file.display()))?;
            println!("{}", serde_json::to_string_pretty(&analysis)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Analyze { file, all_sheets: false } => {
            let analysis = sheet_consolidator::analyze_file(&file, &settings)
                .with_context(|| format!("Failed to analyze {}", file.display()))?;
            println!("{}", serde_json::to_string_pretty(&analysis)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Consolidate { file, output_dir } => {
            let result = sheet_consolidator::consolidate_file(&file, output_dir.as_deref(), &settings)
                .with_context(|| format!("Failed to consolidate {}", file.display()))?;
            println!(
                "{} -> {} ({}, {} rows, {} columns)",
                file.display(),
                result.output.as_deref().map(|path| path.display().to_string()).unwrap_or_default(),
                result.structure.map(|structure| structure.as_str()).unwrap_or("-"),
                result.rows,
                result.column_count()
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Batch(args) => {
            args.apply(&mut settings);
            let options = BatchOptions {
                dry_run: args.dry_run,
                ..BatchOptions::from(&settings.batch)
            };
            let summary =
                sheet_consolidator::run_directory(&args.directory, args.output_dir.as_deref(), &options, &settings)
                    .await
                    .with_context(|| format!("Failed to process {}", args.directory.display()))?;
            print_summary(&summary);
            if let Some(report) = &args.report {
                std::fs::write(report, summary.to_json()?)
                    .with_context(|| format!("Failed to write report {}", report.display()))?;
            }
            Ok(if summary.failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
    }
}

fn print_summary(summary: &BatchSummary) {
    for result in &summary.results {
        let structure = result.structure.map(|structure| structure.as_str()).unwrap_or("-");
        match &result.error {
            None => println!(
                "ok     {} [{}] {} rows -> {}",
                result.input.display(),
                structure,
                result.rows,
                result.output.as_deref().map(|path| path.display().to_string()).unwrap_or_default()
            ),
            Some(failure) => println!("failed {} [{}] {}: {}", result.input.display(), structure, failure.kind, failure.message),
        }
    }
    println!(
        "{}{} files in {} directories: {} succeeded, {} failed ({:.1}%) in {} ms",
        if summary.dry_run { "[dry run] " } else { "" },
        summary.total,
        summary.directories,
        summary.succeeded,
        summary.failed,
        summary.success_rate,
        summary.elapsed_ms
    );
}

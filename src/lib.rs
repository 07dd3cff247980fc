//! # Sheet Consolidator
//!
//! Turns semi-structured spreadsheets into one normalized table per file.
//!
//! Input sheets may hold a single table, several vertically stacked tables
//! repeating the same header, or blocks each introduced by a date marker row
//! (`FECHA: 2024-01-01`). Each file is classified as `SIMPLE`, `COMPLEX` or
//! `COMPLEX_FECHA`, its blocks are located and merged, blank rows and columns
//! are dropped, and the result is written as an `.xlsx` workbook.
//!
//! ## Features
//!
//! - **Multi-format input**: Excel (`.xlsx`, `.xlsm`, `.xlam`, `.xlsb`, `.xls`,
//!   `.xla`) and OpenDocument (`.ods`) through calamine
//! - **Structure detection**: repeated headers, date markers and blank-row
//!   boundaries, with every threshold configurable
//! - **Deterministic merging**: union of block columns in order of first
//!   appearance, marker values carried into a `fecha` column
//! - **Conservative typing**: text is only turned into numbers or dates when
//!   nothing is lost
//! - **Batches**: directory scans with exclusions and size limits, sequential
//!   or on a bounded worker pool, one failure never stopping the rest
//!
//! ## Entry points
//!
//! - [`detect_structure`]: classify a file
//! - [`analyze_file`]: preview what consolidation would produce
//! - [`analyze_workbook`]: the same preview for every sheet of a workbook
//! - [`consolidate_file`]: consolidate one file
//! - [`consolidate_directory`] and [`consolidate_directory_dry_run`]: batches
pub mod config;
pub mod consolidation;
pub mod error;
pub mod spreadsheet;
pub mod table;

use crate::config::Settings;
use crate::consolidation::Analysis;
use crate::consolidation::BatchConsolidator;
use crate::consolidation::BatchOptions;
use crate::consolidation::BatchSummary;
use crate::consolidation::ConsolidationResult;
use crate::consolidation::Consolidator;
use crate::consolidation::Detection;
use crate::consolidation::WorkbookAnalysis;
use crate::error::ConsolidateError;
use crate::spreadsheet::criteria::find_files;
use crate::spreadsheet::criteria::ScanCriteria;
use std::path::Path;
use std::path::PathBuf;

/// Detects the structure and blocks of a spreadsheet file.
///
/// # Errors
///
/// Returns an error only if the file cannot be read; detection itself never
/// fails.
pub fn detect_structure(file: &Path, settings: &Settings) -> Result<Detection, ConsolidateError> {
    Consolidator::new(settings)?.detect(file)
}

/// Detects and extracts a file without writing anything.
pub fn analyze_file(file: &Path, settings: &Settings) -> Result<Analysis, ConsolidateError> {
    Consolidator::new(settings)?.analyze(file)
}

/// Analyses every sheet of a workbook; a failing sheet carries its error.
pub fn analyze_workbook(file: &Path, settings: &Settings) -> Result<WorkbookAnalysis, ConsolidateError> {
    Consolidator::new(settings)?.analyze_sheets(file)
}

/// Consolidates one file into `output_dir`, or into the configured
/// subdirectory next to the file when no directory is given.
///
/// # Errors
///
/// Returns the [`ConsolidateError`] of the failing step; no output is written
/// in that case.
pub fn consolidate_file(
    file: &Path,
    output_dir: Option<&Path>,
    settings: &Settings,
) -> Result<ConsolidationResult, ConsolidateError> {
    Consolidator::new(settings)?
        .with_output_dir(output_dir.map(Path::to_path_buf))
        .consolidate(file)
}

/// Consolidates every spreadsheet found under `dir`.
///
/// Files are selected with the `batch` settings. Individual file failures are
/// recorded in the summary.
///
/// # Errors
///
/// Fails only when the batch cannot start: a missing `dir`, an invalid
/// exclusion pattern, or invalid settings.
pub async fn consolidate_directory(
    dir: &Path,
    output_dir: Option<&Path>,
    parallel: bool,
    max_workers: usize,
    settings: &Settings,
) -> Result<BatchSummary, ConsolidateError> {
    let options = BatchOptions {
        parallel,
        max_workers,
        dry_run: false,
    };
    run_directory(dir, output_dir, &options, settings).await
}

/// Plans the consolidation of every spreadsheet under `dir` without writing.
pub async fn consolidate_directory_dry_run(dir: &Path, settings: &Settings) -> Result<BatchSummary, ConsolidateError> {
    let options = BatchOptions {
        dry_run: true,
        ..BatchOptions::from(&settings.batch)
    };
    run_directory(dir, None, &options, settings).await
}

/// Scans `dir` and hands the files found to a [`BatchConsolidator`].
pub async fn run_directory(
    dir: &Path,
    output_dir: Option<&Path>,
    options: &BatchOptions,
    settings: &Settings,
) -> Result<BatchSummary, ConsolidateError> {
    let files = discover(dir, settings)?;
    let consolidator = Consolidator::new(settings)?.with_output_dir(output_dir.map(Path::to_path_buf));
    Ok(BatchConsolidator::new(consolidator).process_all(files, options).await)
}

/// Files under `dir` selected by the `batch` settings.
pub fn discover(dir: &Path, settings: &Settings) -> Result<Vec<PathBuf>, ConsolidateError> {
    let criteria = ScanCriteria::try_from(&settings.batch)?;
    Ok(find_files(dir, &criteria)?)
}

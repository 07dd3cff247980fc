use crate::config::OutputConfig;
use crate::config::Settings;
use crate::consolidation::detector::Detection;
use crate::consolidation::detector::StructureDetector;
use crate::consolidation::extractor::TableExtractor;
use crate::error::ConsolidateError;
use crate::error::ErrorKind;
use crate::error::ResultMessage;
use crate::spreadsheet::grid::CellGrid;
use crate::spreadsheet::writer::TableSink;
use crate::spreadsheet::writer::XlsxWriter;
use crate::spreadsheet::GridSource;
use crate::spreadsheet::WorkbookSource;
use crate::table::ColumnType;
use crate::table::NormalizedRecord;
use crate::table::StructureType;
use crate::table::Table;
use crate::table::TableBlock;
use serde::Serialize;
use std::fmt::Display;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use tracing::info_span;
use tracing::warn;

/// Position of a file within a batch, carried into its log lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    /// 1-based
    pub index: usize,
    pub total: usize,
}

impl Progress {
    /// Progress of a file consolidated on its own.
    pub const SINGLE: Progress = Progress { index: 1, total: 1 };
}

impl Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}/{}]", self.index, self.total)
    }
}

/// Error descriptor of a failed file.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

/// Outcome of consolidating (or dry-running) one file.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConsolidationResult {
    pub input: PathBuf,
    pub success: bool,
    /// True when the output was only planned, not written
    pub dry_run: bool,
    pub sheet: Option<String>,
    /// Set as soon as detection ran, even if a later step failed
    pub structure: Option<StructureType>,
    pub blocks: usize,
    pub rows: usize,
    pub columns: Vec<String>,
    pub output: Option<PathBuf>,
    pub elapsed_ms: u64,
    pub error: Option<Failure>,
}

impl ConsolidationResult {
    fn new(input: &Path, dry_run: bool) -> Self {
        Self {
            input: input.to_path_buf(),
            success: false,
            dry_run,
            sheet: None,
            structure: None,
            blocks: 0,
            rows: 0,
            columns: Vec::new(),
            output: None,
            elapsed_ms: 0,
            error: None,
        }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Builds the result of a file that failed before any work was done.
    pub fn failed(input: &Path, dry_run: bool, error: &ConsolidateError) -> Self {
        let mut result = Self::new(input, dry_run);
        result.record_failure(error);
        result
    }

    fn record_failure(&mut self, error: &ConsolidateError) {
        self.success = false;
        self.output = None;
        self.error = Some(Failure {
            kind: error.kind(),
            message: error.to_string(),
        });
    }
}

/// Inferred type of one output column.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub kind: ColumnType,
}

/// Read-only view of what consolidating a file would produce.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Analysis {
    pub input: PathBuf,
    pub sheet: String,
    /// Rows in the sheet, blank ones included
    pub total_rows: usize,
    pub structure: StructureType,
    pub blocks: Vec<TableBlock>,
    /// Rows of the consolidated table
    pub rows: usize,
    pub columns: Vec<ColumnSummary>,
    pub preview: Vec<NormalizedRecord>,
}

/// Analysis of one sheet within a whole-workbook analysis.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SheetAnalysis {
    pub sheet: String,
    pub analysis: Option<Analysis>,
    pub error: Option<Failure>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WorkbookAnalysis {
    pub input: PathBuf,
    pub sheets: Vec<SheetAnalysis>,
}

/// Per-file pipeline: read, detect, extract, clean, coerce, write.
pub struct Consolidator {
    source: Arc<dyn GridSource>,
    sink: Arc<dyn TableSink>,
    detector: StructureDetector,
    extractor: TableExtractor,
    output: OutputConfig,
    output_dir: Option<PathBuf>,
}

impl Consolidator {
    /// Creates a consolidator reading spreadsheet files and writing `.xlsx`.
    pub fn new(settings: &Settings) -> Result<Self, ConsolidateError> {
        Self::with_collaborators(settings, Arc::new(WorkbookSource), Arc::new(XlsxWriter::default()))
    }

    /// Creates a consolidator over any grid source and table sink.
    pub fn with_collaborators(
        settings: &Settings,
        source: Arc<dyn GridSource>,
        sink: Arc<dyn TableSink>,
    ) -> Result<Self, ConsolidateError> {
        Ok(Self {
            source,
            sink,
            detector: StructureDetector::new(&settings.detector)?,
            extractor: TableExtractor::new(&settings.extractor),
            output: settings.output.clone(),
            output_dir: None,
        })
    }

    /// Writes every output into `directory` instead of next to its input.
    pub fn with_output_dir(mut self, directory: Option<PathBuf>) -> Self {
        self.output_dir = directory;
        self
    }

    /// Where the consolidated version of `input` is written:
    /// `<output dir>/<stem><suffix>.xlsx`, the output dir defaulting to
    /// `<input dir>/<subdir>`.
    pub fn output_path(&self, input: &Path) -> PathBuf {
        let directory = match &self.output_dir {
            Some(directory) => directory.to_path_buf(),
            None => input
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join(&self.output.subdir),
        };
        let stem = input.file_stem().map(|stem| stem.to_string_lossy()).unwrap_or_default();
        directory.join(format!("{}{}.xlsx", stem, self.output.suffix))
    }

    /// Reads the configured sheet, or the first one.
    fn read(&self, input: &Path) -> Result<(String, CellGrid), ConsolidateError> {
        let sheets = self.source.list_sheets(input)?;
        let sheet = match &self.output.sheet {
            Some(sheet) if sheets.contains(sheet) => sheet.to_owned(),
            Some(sheet) => {
                return Err(ConsolidateError::Config(format!(
                    "Sheet '{}' not found, available: {}",
                    sheet,
                    sheets.join(", ")
                )))
            }
            None => sheets
                .into_iter()
                .next()
                .ok_or_else(|| ConsolidateError::EmptyData("Spreadsheet has no sheets".to_owned()))?,
        };
        let grid = self.source.read_grid(input, &sheet)?;
        Ok((sheet, grid))
    }

    /// Detects the structure of a file without extracting it.
    pub fn detect(&self, input: &Path) -> Result<Detection, ConsolidateError> {
        let (_, grid) = self.read(input).with_prefix(&display_name(input))?;
        Ok(self.detector.detect(&grid))
    }

    /// Detects and extracts a file without writing anything.
    ///
    /// A file without usable rows is analysed successfully and reports zero
    /// rows.
    pub fn analyze(&self, input: &Path) -> Result<Analysis, ConsolidateError> {
        let name = display_name(input);
        let (sheet, grid) = self.read(input).with_prefix(&name)?;
        self.analyze_grid(input, sheet, &grid).with_prefix(&name)
    }

    /// Analyses every sheet of a workbook, in workbook order.
    ///
    /// A sheet that cannot be read or extracted is reported with its error
    /// and does not stop the others.
    pub fn analyze_sheets(&self, input: &Path) -> Result<WorkbookAnalysis, ConsolidateError> {
        let name = display_name(input);
        let sheets = self
            .source
            .list_sheets(input)
            .map_err(ConsolidateError::from)
            .with_prefix(&name)?;
        let _span = info_span!("analyze", file = %name, sheets = sheets.len()).entered();

        let sheets = sheets
            .into_iter()
            .map(|sheet| {
                let analysis = self
                    .source
                    .read_grid(input, &sheet)
                    .map_err(ConsolidateError::from)
                    .and_then(|grid| self.analyze_grid(input, sheet.to_owned(), &grid))
                    .with_prefix(&sheet);
                match analysis {
                    Ok(analysis) => SheetAnalysis {
                        sheet,
                        analysis: Some(analysis),
                        error: None,
                    },
                    Err(error) => {
                        warn!("{}", error);
                        SheetAnalysis {
                            sheet,
                            analysis: None,
                            error: Some(Failure {
                                kind: error.kind(),
                                message: error.to_string(),
                            }),
                        }
                    }
                }
            })
            .collect();
        Ok(WorkbookAnalysis {
            input: input.to_path_buf(),
            sheets,
        })
    }

    fn analyze_grid(&self, input: &Path, sheet: String, grid: &CellGrid) -> Result<Analysis, ConsolidateError> {
        let detection = self.detector.detect(grid);
        let mut table = self.extractor.extract(grid, &detection.blocks)?;
        clean(&mut table);

        let columns = table
            .columns
            .iter()
            .zip(table.column_types())
            .map(|(name, kind)| ColumnSummary {
                name: name.to_owned(),
                kind,
            })
            .collect();
        Ok(Analysis {
            input: input.to_path_buf(),
            sheet,
            total_rows: grid.row_count(),
            structure: detection.structure,
            blocks: detection.blocks,
            rows: table.row_count(),
            columns,
            preview: table.head(self.output.preview_rows).records(),
        })
    }

    /// Consolidates one file and writes its output.
    ///
    /// # Errors
    ///
    /// Fails with [`ConsolidateError::EmptyData`] when no rows are found, and
    /// with the other variants for read, structure or write failures. Nothing
    /// is written on failure.
    pub fn consolidate(&self, input: &Path) -> Result<ConsolidationResult, ConsolidateError> {
        let mut result = ConsolidationResult::new(input, false);
        let started = Instant::now();
        self.run(input, &self.output_path(input), &mut result)
            .with_prefix(&display_name(input))?;
        result.elapsed_ms = started.elapsed().as_millis() as u64;
        Ok(result)
    }

    /// Consolidates (or dry-runs) one file, recording any error in the result.
    pub fn report(&self, input: &Path, dry_run: bool, progress: Progress) -> ConsolidationResult {
        self.report_to(input, &self.output_path(input), dry_run, progress)
    }

    /// Like [`report`](Self::report), writing to `output` instead of the
    /// default output path.
    pub fn report_to(&self, input: &Path, output: &Path, dry_run: bool, progress: Progress) -> ConsolidationResult {
        let name = display_name(input);
        let span = info_span!("consolidate", file = %name);
        let _entered = span.enter();
        info!("{} Processing{}", progress, if dry_run { " (dry run)" } else { "" });

        let started = Instant::now();
        let mut result = ConsolidationResult::new(input, dry_run);
        let outcome = self.run(input, output, &mut result).with_prefix(&name);
        result.elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(()) => info!(
                structure = result.structure.map(|structure| structure.as_str()),
                blocks = result.blocks,
                rows = result.rows,
                columns = result.column_count(),
                elapsed_ms = result.elapsed_ms,
                "{} Done",
                progress
            ),
            Err(error) => {
                warn!(kind = %error.kind(), "{} Failed: {}", progress, error);
                result.record_failure(&error);
            }
        }
        result
    }

    /// Runs the pipeline, filling `result` as each step completes.
    fn run(&self, input: &Path, output: &Path, result: &mut ConsolidationResult) -> Result<(), ConsolidateError> {
        let (sheet, grid) = self.read(input)?;
        result.sheet = Some(sheet);

        let detection = self.detector.detect(&grid);
        result.structure = Some(detection.structure);
        result.blocks = detection.blocks.iter().filter(|block| block.data_rows.is_some()).count();

        let mut table = self.extractor.extract(&grid, &detection.blocks)?;
        drop(grid);
        clean(&mut table);
        if table.is_empty() {
            return Err(ConsolidateError::EmptyData("No data rows found".to_owned()));
        }
        result.rows = table.row_count();
        result.columns = table.columns.clone();

        if !result.dry_run {
            self.sink.write_table(&table, output)?;
            info!(output = %output.display(), "Written");
        }
        result.output = Some(output.to_path_buf());
        result.success = true;
        Ok(())
    }
}

/// Drops blank rows and columns, then coerces unambiguous text.
fn clean(table: &mut Table) {
    table.drop_blank_rows();
    table.drop_blank_columns();
    table.coerce_cells();
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

use crate::config::BatchConfig;
use crate::consolidation::consolidator::ConsolidationResult;
use crate::consolidation::consolidator::Consolidator;
use crate::consolidation::consolidator::Progress;
use crate::error::ConsolidateError;
use crate::table::StructureType;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::info;
use tracing::warn;

/// How a batch is run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchOptions {
    pub parallel: bool,
    /// Upper bound on files processed at once in parallel mode
    pub max_workers: usize,
    /// Analyse every file and plan its output without writing anything
    pub dry_run: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        BatchOptions::from(&BatchConfig::default())
    }
}

impl From<&BatchConfig> for BatchOptions {
    fn from(config: &BatchConfig) -> Self {
        Self {
            parallel: config.parallel,
            max_workers: config.max_workers,
            dry_run: false,
        }
    }
}

/// Aggregate outcome of a batch, with one result per input file in input order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Percentage of files that succeeded, 0 for an empty batch
    pub success_rate: f64,
    pub elapsed_ms: u64,
    /// Distinct parent directories of the input files
    pub directories: usize,
    pub parallel: bool,
    pub dry_run: bool,
    pub results: Vec<ConsolidationResult>,
}

impl BatchSummary {
    fn new(results: Vec<ConsolidationResult>, options: &BatchOptions, elapsed_ms: u64) -> Self {
        let total = results.len();
        let succeeded = results.iter().filter(|result| result.success).count();
        let directories = results
            .iter()
            .filter_map(|result| result.input.parent())
            .collect::<HashSet<_>>()
            .len();
        Self {
            total,
            succeeded,
            failed: total - succeeded,
            success_rate: if total == 0 { 0.0 } else { succeeded as f64 * 100.0 / total as f64 },
            elapsed_ms,
            directories,
            parallel: options.parallel,
            dry_run: options.dry_run,
            results,
        }
    }

    /// Detected structure of every file, in input order.
    pub fn structures(&self) -> Vec<Option<StructureType>> {
        self.results.iter().map(|result| result.structure).collect()
    }

    /// Failed results only.
    pub fn failures(&self) -> impl Iterator<Item = &ConsolidationResult> {
        self.results.iter().filter(|result| !result.success)
    }

    /// Renders the summary as a pretty-printed JSON report.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Runs a [`Consolidator`] over many files, isolating each file's failure.
#[derive(Clone)]
pub struct BatchConsolidator {
    consolidator: Arc<Consolidator>,
}

impl BatchConsolidator {
    pub fn new(consolidator: Consolidator) -> Self {
        Self {
            consolidator: Arc::new(consolidator),
        }
    }

    /// Processes `files`, sequentially in input order or on a bounded pool of
    /// blocking workers. Either way the summary lists results in input order.
    pub async fn process_all(&self, files: Vec<PathBuf>, options: &BatchOptions) -> BatchSummary {
        let started = Instant::now();
        info!(
            files = files.len(),
            parallel = options.parallel,
            workers = options.max_workers,
            dry_run = options.dry_run,
            "Starting batch"
        );

        let outputs = self.plan_outputs(&files);
        let jobs: Vec<(PathBuf, PathBuf)> = files.into_iter().zip(outputs).collect();
        let results = if options.parallel {
            self.process_parallel(jobs, options.max_workers.max(1), options.dry_run).await
        } else {
            self.process_sequential(jobs, options.dry_run).await
        };

        let summary = BatchSummary::new(results, options, started.elapsed().as_millis() as u64);
        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            elapsed_ms = summary.elapsed_ms,
            "Batch finished, success rate {:.1}%",
            summary.success_rate
        );
        summary
    }

    /// Output path of every file, in input order.
    ///
    /// The first file claiming an output keeps it; later files mapping to the
    /// same path get a counter after the stem (`ruta_consolidado_2.xlsx`) that
    /// clashes with no other planned output.
    fn plan_outputs(&self, files: &[PathBuf]) -> Vec<PathBuf> {
        let planned: Vec<PathBuf> = files.iter().map(|file| self.consolidator.output_path(file)).collect();
        let reserved: HashSet<&PathBuf> = planned.iter().collect();
        let mut assigned: HashSet<PathBuf> = HashSet::new();
        planned
            .iter()
            .zip(files)
            .map(|(output, file)| {
                if assigned.insert(output.clone()) {
                    return output.clone();
                }
                let mut counter = 2;
                loop {
                    let candidate = with_counter(output, counter);
                    if !reserved.contains(&candidate) && assigned.insert(candidate.clone()) {
                        warn!(
                            file = %file.display(),
                            output = %candidate.display(),
                            "Output path already used by another file, renamed"
                        );
                        return candidate;
                    }
                    counter += 1;
                }
            })
            .collect()
    }

    async fn process_sequential(&self, jobs: Vec<(PathBuf, PathBuf)>, dry_run: bool) -> Vec<ConsolidationResult> {
        let total = jobs.len();
        let mut results = Vec::with_capacity(total);
        for (index, (file, output)) in jobs.into_iter().enumerate() {
            let progress = Progress { index: index + 1, total };
            results.push(run_file(self.consolidator.clone(), file, output, dry_run, progress).await);
        }
        results
    }

    async fn process_parallel(
        &self,
        jobs: Vec<(PathBuf, PathBuf)>,
        max_workers: usize,
        dry_run: bool,
    ) -> Vec<ConsolidationResult> {
        let total = jobs.len();
        let semaphore = Arc::new(Semaphore::new(max_workers));
        let mut tasks = JoinSet::new();

        for (index, (file, output)) in jobs.iter().cloned().enumerate() {
            let consolidator = self.consolidator.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let progress = Progress { index: index + 1, total };
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => run_file(consolidator, file, output, dry_run, progress).await,
                    Err(error) => failure(file, dry_run, format!("Worker pool closed: {}", error)),
                };
                (index, result)
            });
        }

        let mut slots: Vec<Option<ConsolidationResult>> = vec![None; total];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(error) => warn!(%error, "Worker task lost"),
            }
        }
        slots
            .into_iter()
            .zip(jobs)
            .map(|(slot, (file, _))| {
                slot.unwrap_or_else(|| failure(file, dry_run, "Worker did not report".to_owned()))
            })
            .collect()
    }
}

/// Runs one file on the blocking pool; a panic becomes that file's failure.
async fn run_file(
    consolidator: Arc<Consolidator>,
    file: PathBuf,
    output: PathBuf,
    dry_run: bool,
    progress: Progress,
) -> ConsolidationResult {
    let input = file.clone();
    match tokio::task::spawn_blocking(move || consolidator.report_to(&file, &output, dry_run, progress)).await {
        Ok(result) => result,
        Err(error) => {
            warn!(file = %input.display(), %error, "{} Worker panicked", progress);
            failure(input, dry_run, format!("Worker panicked: {}", error))
        }
    }
}

/// `dir/stem.ext` becomes `dir/stem_<counter>.ext`.
fn with_counter(output: &Path, counter: usize) -> PathBuf {
    let stem = output.file_stem().map(|stem| stem.to_string_lossy()).unwrap_or_default();
    let extension = output
        .extension()
        .map(|extension| format!(".{}", extension.to_string_lossy()))
        .unwrap_or_default();
    output.with_file_name(format!("{}_{}{}", stem, counter, extension))
}

fn failure(file: PathBuf, dry_run: bool, message: String) -> ConsolidationResult {
    ConsolidationResult::failed(&file, dry_run, &ConsolidateError::FileOperation(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputConfig;
    use crate::config::Settings;
    use crate::consolidation::memory::MemorySink;
    use crate::consolidation::memory::MemorySource;
    use crate::error::ErrorKind;
    use crate::spreadsheet::cell::CellValue;
    use crate::spreadsheet::grid::grid;
    use crate::spreadsheet::grid::CellGrid;
    use crate::spreadsheet::GridSource;
    use crate::spreadsheet::SpreadsheetError;

    fn source() -> MemorySource {
        MemorySource::default()
            .with("rutas/a.xlsx", grid![["Nombre", "Edad"], ["Ana", 30], ["Nombre", "Edad"], ["Luis", 25]])
            .with(
                "rutas/b.xlsx",
                grid![["FECHA:", "2024-01-01"], ["Nombre", "Valor"], ["Ana", 10]],
            )
            .with("otras/c.xlsx", grid![["Producto", "Precio"], ["Pan", 2.5], ["Leche", 4]])
            .corrupted("rutas/roto.xlsx")
    }

    fn files() -> Vec<PathBuf> {
        ["rutas/a.xlsx", "rutas/roto.xlsx", "rutas/b.xlsx", "otras/c.xlsx"]
            .map(PathBuf::from)
            .to_vec()
    }

    fn batch(source: impl GridSource + 'static) -> (BatchConsolidator, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::default());
        let consolidator =
            Consolidator::with_collaborators(&Settings::default(), Arc::new(source), sink.clone()).unwrap();
        (BatchConsolidator::new(consolidator), sink)
    }

    fn without_timing(summary: &BatchSummary) -> Vec<ConsolidationResult> {
        summary
            .results
            .iter()
            .cloned()
            .map(|mut result| {
                result.elapsed_ms = 0;
                result
            })
            .collect()
    }

    #[tokio::test]
    async fn failures_are_isolated() {
        let (batch, sink) = batch(source());
        let summary = batch.process_all(files(), &BatchOptions::default()).await;

        assert_eq!(summary.total, 4);
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.success_rate, 75.0);
        assert_eq!(summary.directories, 2);
        let inputs: Vec<_> = summary.results.iter().map(|result| result.input.clone()).collect();
        assert_eq!(inputs, files());

        let failed: Vec<_> = summary.failures().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].input, PathBuf::from("rutas/roto.xlsx"));
        assert_eq!(failed[0].error.as_ref().unwrap().kind, ErrorKind::UnsupportedFormat);

        assert_eq!(summary.results[0].rows, 2);
        assert_eq!(summary.results[3].rows, 2);
        assert_eq!(sink.written().len(), 3);
    }

    #[tokio::test]
    async fn parallel_matches_sequential() {
        let (batch, _) = batch(source());
        let sequential = batch.process_all(files(), &BatchOptions::default()).await;
        let options = BatchOptions {
            parallel: true,
            max_workers: 2,
            dry_run: false,
        };
        let parallel = batch.process_all(files(), &options).await;

        assert!(parallel.parallel);
        assert_eq!(parallel.succeeded, sequential.succeeded);
        assert_eq!(without_timing(&parallel), without_timing(&sequential));
    }

    #[tokio::test]
    async fn dry_run_writes_nothing() {
        let (batch, sink) = batch(source());
        let options = BatchOptions {
            parallel: true,
            max_workers: 0,
            dry_run: true,
        };
        let planned = batch.process_all(files(), &options).await;
        assert!(sink.written().is_empty());
        assert!(planned.results.iter().all(|result| result.dry_run));
        assert_eq!(
            planned.results[0].output,
            Some(PathBuf::from("rutas/consolidado/a_consolidado.xlsx"))
        );

        let done = batch.process_all(files(), &BatchOptions::default()).await;
        assert_eq!(planned.structures(), done.structures());
        assert_eq!(
            planned.structures(),
            vec![
                Some(StructureType::Complex),
                None,
                Some(StructureType::ComplexFecha),
                Some(StructureType::Simple),
            ]
        );
        assert_eq!(sink.written().len(), 3);
    }

    struct PanickingSource(MemorySource);

    impl GridSource for PanickingSource {
        fn list_sheets(&self, path: &Path) -> Result<Vec<String>, SpreadsheetError> {
            if path.ends_with("boom.xlsx") {
                panic!("reader crashed");
            }
            self.0.list_sheets(path)
        }

        fn read_grid(&self, path: &Path, sheet_name: &str) -> Result<CellGrid, SpreadsheetError> {
            self.0.read_grid(path, sheet_name)
        }
    }

    #[tokio::test]
    async fn panics_are_isolated() {
        let (batch, _) = batch(PanickingSource(source()));
        let mut files = files();
        files.insert(0, PathBuf::from("boom.xlsx"));
        for parallel in [false, true] {
            let options = BatchOptions {
                parallel,
                ..BatchOptions::default()
            };
            let summary = batch.process_all(files.clone(), &options).await;
            assert_eq!(summary.total, 5);
            assert_eq!(summary.failed, 2);
            assert!(!summary.results[0].success);
            assert!(summary.results[0].error.as_ref().unwrap().message.contains("panicked"));
        }
    }

    #[tokio::test]
    async fn colliding_outputs_are_renamed() {
        let source = MemorySource::default()
            .with("a/ruta.xlsx", grid![["Nombre", "Edad"], ["Ana", 30]])
            .with("b/ruta.xlsx", grid![["Nombre", "Edad"], ["Luis", 25]])
            .with("c/ruta.xlsx", grid![["Nombre", "Edad"], ["Eva", 41]])
            .with("d/ruta_2.xlsx", grid![["Nombre", "Edad"], ["Sol", 19]]);
        let sink = Arc::new(MemorySink::default());
        let settings = Settings {
            output: OutputConfig {
                suffix: String::new(),
                ..OutputConfig::default()
            },
            ..Settings::default()
        };
        let consolidator = Consolidator::with_collaborators(&settings, Arc::new(source), sink.clone())
            .unwrap()
            .with_output_dir(Some(PathBuf::from("salida")));
        let batch = BatchConsolidator::new(consolidator);
        let files: Vec<PathBuf> = ["a/ruta.xlsx", "b/ruta.xlsx", "c/ruta.xlsx", "d/ruta_2.xlsx"]
            .map(PathBuf::from)
            .to_vec();

        for parallel in [false, true] {
            let options = BatchOptions {
                parallel,
                max_workers: 4,
                dry_run: false,
            };
            let summary = batch.process_all(files.clone(), &options).await;
            assert_eq!(summary.succeeded, 4);
            let outputs: Vec<_> = summary.results.iter().map(|result| result.output.clone().unwrap()).collect();
            assert_eq!(
                outputs,
                ["salida/ruta.xlsx", "salida/ruta_3.xlsx", "salida/ruta_4.xlsx", "salida/ruta_2.xlsx"]
                    .map(PathBuf::from)
                    .to_vec()
            );
        }
        assert_eq!(sink.written().len(), 4);
        let first = sink.table("salida/ruta.xlsx").unwrap();
        assert_eq!(first.rows[0][0], CellValue::from("Ana"));
        let second = sink.table("salida/ruta_3.xlsx").unwrap();
        assert_eq!(second.rows[0][0], CellValue::from("Luis"));
    }

    #[tokio::test]
    async fn empty_batch() {
        let (batch, _) = batch(source());
        let summary = batch.process_all(Vec::new(), &BatchOptions::default()).await;
        assert_eq!(summary.total, 0);
        assert_eq!(summary.success_rate, 0.0);
        assert!(summary.to_json().unwrap().contains("\"results\": []"));
    }
}

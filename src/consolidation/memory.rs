//! In-memory grid source and table sink for tests.
use crate::spreadsheet::grid::CellGrid;
use crate::spreadsheet::writer::TableSink;
use crate::spreadsheet::writer::WriterError;
use crate::spreadsheet::GridSource;
use crate::spreadsheet::SpreadsheetError;
use crate::table::Table;
use std::collections::BTreeMap;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

pub(crate) const SHEET: &str = "Hoja1";

/// Serves the sheets registered per path; other paths are missing files.
#[derive(Default)]
pub(crate) struct MemorySource {
    workbooks: BTreeMap<PathBuf, Vec<(String, CellGrid)>>,
    corrupted: HashSet<PathBuf>,
}

impl MemorySource {
    /// Registers a workbook with a single sheet named [`SHEET`].
    pub(crate) fn with(self, path: &str, grid: CellGrid) -> Self {
        self.with_sheets(path, vec![(SHEET, grid)])
    }

    pub(crate) fn with_sheets(mut self, path: &str, sheets: Vec<(&str, CellGrid)>) -> Self {
        let sheets = sheets.into_iter().map(|(name, grid)| (name.to_owned(), grid)).collect();
        self.workbooks.insert(PathBuf::from(path), sheets);
        self
    }

    pub(crate) fn corrupted(mut self, path: &str) -> Self {
        self.corrupted.insert(PathBuf::from(path));
        self
    }

    fn workbook(&self, path: &Path) -> Result<&[(String, CellGrid)], SpreadsheetError> {
        if self.corrupted.contains(path) {
            return Err(SpreadsheetError::InvalidFileFormat {
                name: path.display().to_string(),
            });
        }
        self.workbooks
            .get(path)
            .map(Vec::as_slice)
            .ok_or_else(|| not_found("No such file"))
    }
}

fn not_found(message: &str) -> SpreadsheetError {
    SpreadsheetError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, message.to_owned()))
}

impl GridSource for MemorySource {
    fn list_sheets(&self, path: &Path) -> Result<Vec<String>, SpreadsheetError> {
        Ok(self.workbook(path)?.iter().map(|(name, _)| name.to_owned()).collect())
    }

    fn read_grid(&self, path: &Path, sheet_name: &str) -> Result<CellGrid, SpreadsheetError> {
        self.workbook(path)?
            .iter()
            .find(|(name, _)| name == sheet_name)
            .map(|(_, grid)| grid.clone())
            .ok_or_else(|| not_found("No such sheet"))
    }
}

/// Keeps every written table, keyed by output path.
#[derive(Default)]
pub(crate) struct MemorySink {
    pub(crate) tables: Mutex<BTreeMap<PathBuf, Table>>,
}

impl MemorySink {
    pub(crate) fn written(&self) -> Vec<PathBuf> {
        self.tables.lock().unwrap().keys().cloned().collect()
    }

    pub(crate) fn table(&self, output: &str) -> Option<Table> {
        self.tables.lock().unwrap().get(Path::new(output)).cloned()
    }
}

impl TableSink for MemorySink {
    fn write_table(&self, table: &Table, output: &Path) -> Result<(), WriterError> {
        self.tables.lock().unwrap().insert(output.to_path_buf(), table.clone());
        Ok(())
    }
}

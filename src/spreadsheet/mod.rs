//! # Spreadsheet Input/Output Module
//!
//! This module holds the collaborators that sit between the consolidation core
//! and the filesystem: the cell model, the [`CellGrid`] produced from one sheet,
//! the [`GridSource`] that reads grids, the [`TableSink`](writer::TableSink)
//! that writes consolidated tables, and directory discovery.
//!
//! Reading supports Excel (.xlsx, .xlsm, .xlam, .xlsb, .xls, .xla) and
//! OpenDocument (.ods) files through calamine.
use calamine::Data;
use calamine::Ods;
use calamine::OdsError;
use calamine::Range;
use calamine::Reader;
use calamine::Xls;
use calamine::XlsError;
use calamine::Xlsb;
use calamine::XlsbError;
use calamine::Xlsx;
use calamine::XlsxError;
use std::ffi::OsStr;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

pub mod cell;
pub mod criteria;
pub mod grid;
pub mod reference;
pub mod writer;

pub use cell::CellValue;
pub use grid::CellGrid;

/// Extensions understood by [`Spreadsheet::open`].
pub const SUPPORTED_EXTENSIONS: [&str; 7] = ["xlsx", "xlsm", "xlam", "xlsb", "xls", "xla", "ods"];

/// Errors raised while reading spreadsheet files.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    /// Error in Excel 2007+ format (.xlsx, .xlsm, .xlam)
    #[error("Invalid xlsx file format: {0}")]
    InvalidXlsxFileFormat(#[from] XlsxError),

    /// Error in Excel Binary format (.xlsb)
    #[error("Invalid xlsb file format: {0}")]
    InvalidXlsbFileFormat(#[from] XlsbError),

    /// Error in legacy Excel format (.xls, .xla)
    #[error("Invalid xls file format: {0}")]
    InvalidXlsFileFormat(#[from] XlsError),

    /// Error in OpenDocument format (.ods)
    #[error("Invalid ods file format: {0}")]
    InvalidOdsFileFormat(#[from] OdsError),

    /// Unsupported or unrecognized file extension
    #[error("Cannot detect file format for '{name}'")]
    InvalidFileFormat { name: String },

    /// The workbook has no sheet to read
    #[error("Spreadsheet has no sheets")]
    NoSheets,

    /// The file could not be opened or read
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// Yields the sheets of a file and the [`CellGrid`] of a given sheet.
///
/// The consolidation core never opens files itself; everything it reads comes
/// through this trait, so tests and embedders can supply grids from memory.
pub trait GridSource: Send + Sync {
    /// Names of all sheets in the file, in workbook order.
    fn list_sheets(&self, path: &Path) -> Result<Vec<String>, SpreadsheetError>;

    /// Reads one sheet as a grid whose indexes match the sheet's own positions.
    fn read_grid(&self, path: &Path, sheet_name: &str) -> Result<CellGrid, SpreadsheetError>;
}

/// Type alias for buffered file reader
pub type FileReader = BufReader<File>;

/// Wrapper enum for the calamine reader of each supported format.
pub enum Spreadsheet {
    /// Excel 2007+ format reader (.xlsx, .xlsm, .xlam)
    Xlsx(Xlsx<FileReader>),
    /// Excel Binary format reader (.xlsb)
    Xlsb(Xlsb<FileReader>),
    /// Legacy Excel format reader (.xls, .xla)
    Xls(Xls<FileReader>),
    /// OpenDocument format reader (.ods)
    Ods(Ods<FileReader>),
}

impl Spreadsheet {
    /// Opens a spreadsheet file, choosing the reader from the file extension.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The extension is not one of [`SUPPORTED_EXTENSIONS`]
    /// - The file cannot be opened (missing, locked, no permission)
    /// - The container is corrupted or password protected
    pub fn open<P>(path: P) -> Result<Spreadsheet, SpreadsheetError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(OsStr::to_str)
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("xlsx") | Some("xlsm") | Some("xlam") => Ok(Self::Xlsx(Xlsx::new(open_file(path)?)?)),
            Some("xlsb") => Ok(Self::Xlsb(Xlsb::new(open_file(path)?)?)),
            Some("xls") | Some("xla") => Ok(Self::Xls(Xls::new(open_file(path)?)?)),
            Some("ods") => Ok(Self::Ods(Ods::new(open_file(path)?)?)),
            _ => Err(SpreadsheetError::InvalidFileFormat {
                name: path.to_string_lossy().to_string(),
            }),
        }
    }

    /// Returns the names of all sheets in the spreadsheet.
    pub fn sheet_names(&self) -> Vec<String> {
        match self {
            Self::Xlsx(xlsx) => xlsx.sheet_names(),
            Self::Xlsb(xlsb) => xlsb.sheet_names(),
            Self::Xls(xls) => xls.sheet_names(),
            Self::Ods(ods) => ods.sheet_names(),
        }
    }

    /// Reads a sheet into a [`CellGrid`].
    ///
    /// Raw reader values are converted to [`CellValue`] here and nowhere else.
    pub fn read_grid(&mut self, sheet_name: &str) -> Result<CellGrid, SpreadsheetError> {
        let range = match self {
            Self::Xlsx(xlsx) => xlsx.worksheet_range(sheet_name)?,
            Self::Xlsb(xlsb) => xlsb.worksheet_range(sheet_name)?,
            Self::Xls(xls) => xls.worksheet_range(sheet_name)?,
            Self::Ods(ods) => ods.worksheet_range(sheet_name)?,
        };
        Ok(range_to_grid(&range))
    }
}

/// Opens a file for buffered reading.
fn open_file(path: &Path) -> Result<FileReader, SpreadsheetError> {
    Ok(BufReader::new(File::open(path)?))
}

/// Converts a used range into a grid anchored at the sheet's origin.
///
/// Ranges start at their first used cell, so leading rows and columns are
/// padded back in to keep positions absolute.
fn range_to_grid(range: &Range<Data>) -> CellGrid {
    let Some((row_offset, col_offset)) = range.start() else {
        return CellGrid::default();
    };
    let mut rows: Vec<Vec<CellValue>> = vec![Vec::new(); row_offset as usize];
    for cells in range.rows() {
        let mut row = vec![CellValue::Empty; col_offset as usize];
        row.extend(cells.iter().map(CellValue::from));
        rows.push(row);
    }
    CellGrid::new(rows)
}

/// [`GridSource`] backed by spreadsheet files on disk.
#[derive(Clone, Copy, Debug, Default)]
pub struct WorkbookSource;

impl GridSource for WorkbookSource {
    fn list_sheets(&self, path: &Path) -> Result<Vec<String>, SpreadsheetError> {
        Ok(Spreadsheet::open(path)?.sheet_names())
    }

    fn read_grid(&self, path: &Path, sheet_name: &str) -> Result<CellGrid, SpreadsheetError> {
        Spreadsheet::open(path)?.read_grid(sheet_name)
    }
}

//! Writes consolidated tables as single-sheet `.xlsx` workbooks.
//!
//! The header row holds the column names; dates are stored as serial numbers
//! with a date number format so spreadsheet readers restore them as dates.
use crate::spreadsheet::cell::CellValue;
use crate::table::Table;
use chrono::Datelike;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use chrono::Timelike;
use std::fs;
use std::io::Seek;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;
use umya_spreadsheet::helper::date::convert_date;
use umya_spreadsheet::Cell;

const DATE_FORMAT: &str = "yyyy-mm-dd";
const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// Errors raised while writing a consolidated workbook.
#[derive(Error, Debug)]
pub enum WriterError {
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    XlsxError(#[from] umya_spreadsheet::writer::xlsx::XlsxError),

    #[error("Cannot create sheet '{0}'")]
    SheetError(String),
}

/// Writes a consolidated table to an output location.
pub trait TableSink: Send + Sync {
    fn write_table(&self, table: &Table, output: &Path) -> Result<(), WriterError>;
}

/// [`TableSink`] producing `.xlsx` files.
#[derive(Clone, Debug)]
pub struct XlsxWriter {
    /// Name of the single sheet in the written workbook.
    pub sheet_name: String,
}

impl Default for XlsxWriter {
    fn default() -> Self {
        Self {
            sheet_name: "Consolidado".to_owned(),
        }
    }
}

impl TableSink for XlsxWriter {
    /// Writes into a uniquely named file beside the target, then renames it
    /// into place. Concurrent writers of one target never share a partial
    /// file, and a failed write leaves nothing behind.
    fn write_table(&self, table: &Table, output: &Path) -> Result<(), WriterError> {
        let parent = output
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;

        let mut partial = NamedTempFile::new_in(parent)?;
        self.write_workbook(table, partial.as_file_mut())?;
        partial.as_file_mut().flush()?;
        partial.persist(output).map_err(|error| error.error)?;
        Ok(())
    }
}

impl XlsxWriter {
    /// Serializes a table as a workbook into any seekable writer.
    pub fn write_workbook<W: Write + Seek>(&self, table: &Table, writer: W) -> Result<(), WriterError> {
        let mut book = umya_spreadsheet::new_file_empty_worksheet();
        let sheet = book
            .new_sheet(self.sheet_name.as_str())
            .map_err(|_| WriterError::SheetError(self.sheet_name.to_owned()))?;

        for (col, name) in table.columns.iter().enumerate() {
            set_cell(sheet.get_cell_mut((col as u32 + 1, 1)), &CellValue::Text(name.to_owned()));
        }
        for (row, cells) in table.rows.iter().enumerate() {
            for (col, cell) in cells.iter().enumerate() {
                if !cell.is_empty() {
                    set_cell(sheet.get_cell_mut((col as u32 + 1, row as u32 + 2)), cell);
                }
            }
        }

        umya_spreadsheet::writer::xlsx::write_writer(&book, writer)?;
        Ok(())
    }
}

fn set_cell(target: &mut Cell, cell: &CellValue) {
    match cell {
        CellValue::Empty => (),
        CellValue::Number(value) if value.is_finite() => {
            target.set_value_number(*value);
        }
        CellValue::Number(value) => {
            target.set_value_string(value.to_string());
        }
        CellValue::Text(text) => {
            // XML 1.0 has no representation for most control characters
            let text: String = text
                .chars()
                .filter(|character| !character.is_control() || matches!(character, '\t' | '\n' | '\r'))
                .collect();
            target.set_value_string(text);
        }
        CellValue::Date(value) => {
            let format = if value.time() == NaiveTime::MIN { DATE_FORMAT } else { DATETIME_FORMAT };
            target.set_value_number(date_serial(value));
            target.get_style_mut().get_number_format_mut().set_format_code(format);
        }
    }
}

fn date_serial(value: &NaiveDateTime) -> f64 {
    convert_date(
        value.year(),
        value.month() as i32,
        value.day() as i32,
        value.hour() as i32,
        value.minute() as i32,
        value.second() as i32,
    )
}

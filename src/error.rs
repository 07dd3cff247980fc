use crate::config::ConfigError;
use crate::spreadsheet::criteria::ScanError;
use crate::spreadsheet::writer::WriterError;
use crate::spreadsheet::SpreadsheetError;
use serde::Serialize;
use std::fmt::Display;
use thiserror::Error;

/// Errors surfaced by consolidation.
///
/// Lower layers keep their own error types; the `From` impls below classify
/// them into this taxonomy so callers only ever match on these variants.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConsolidateError {
    /// Extraction yielded no usable rows
    #[error("{0}")]
    EmptyData(String),

    /// Blocks with conflicting headers that cannot be merged safely
    #[error("{0}")]
    StructureAmbiguous(String),

    /// File extension or container not recognized, corrupted or protected
    #[error("{0}")]
    UnsupportedFormat(String),

    /// Read or write failure: missing file, permissions, locked file
    #[error("{0}")]
    FileOperation(String),

    /// Batch root is missing or not a directory
    #[error("{0}")]
    DirectoryNotFound(String),

    /// Settings file or option values are invalid
    #[error("{0}")]
    Config(String),
}

/// Serializable discriminant of [`ConsolidateError`], used in reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    #[serde(rename = "EmptyDataError")]
    EmptyData,
    #[serde(rename = "StructureAmbiguousError")]
    StructureAmbiguous,
    #[serde(rename = "UnsupportedFormatError")]
    UnsupportedFormat,
    #[serde(rename = "FileOperationError")]
    FileOperation,
    #[serde(rename = "DirectoryNotFoundError")]
    DirectoryNotFound,
    #[serde(rename = "ConfigError")]
    Config,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::EmptyData => "EmptyDataError",
            ErrorKind::StructureAmbiguous => "StructureAmbiguousError",
            ErrorKind::UnsupportedFormat => "UnsupportedFormatError",
            ErrorKind::FileOperation => "FileOperationError",
            ErrorKind::DirectoryNotFound => "DirectoryNotFoundError",
            ErrorKind::Config => "ConfigError",
        };
        write!(f, "{}", name)
    }
}

impl ConsolidateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConsolidateError::EmptyData(_) => ErrorKind::EmptyData,
            ConsolidateError::StructureAmbiguous(_) => ErrorKind::StructureAmbiguous,
            ConsolidateError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            ConsolidateError::FileOperation(_) => ErrorKind::FileOperation,
            ConsolidateError::DirectoryNotFound(_) => ErrorKind::DirectoryNotFound,
            ConsolidateError::Config(_) => ErrorKind::Config,
        }
    }

    /// Returns the same kind of error with `prefix: ` put before its message.
    fn prefixed(self, prefix: &str) -> Self {
        let wrap = |message: String| format!("{}: {}", prefix, message);
        match self {
            ConsolidateError::EmptyData(message) => ConsolidateError::EmptyData(wrap(message)),
            ConsolidateError::StructureAmbiguous(message) => ConsolidateError::StructureAmbiguous(wrap(message)),
            ConsolidateError::UnsupportedFormat(message) => ConsolidateError::UnsupportedFormat(wrap(message)),
            ConsolidateError::FileOperation(message) => ConsolidateError::FileOperation(wrap(message)),
            ConsolidateError::DirectoryNotFound(message) => ConsolidateError::DirectoryNotFound(wrap(message)),
            ConsolidateError::Config(message) => ConsolidateError::Config(wrap(message)),
        }
    }
}

impl From<SpreadsheetError> for ConsolidateError {
    fn from(error: SpreadsheetError) -> Self {
        match error {
            SpreadsheetError::Io(_) => ConsolidateError::FileOperation(error.to_string()),
            SpreadsheetError::NoSheets => ConsolidateError::EmptyData(error.to_string()),
            SpreadsheetError::InvalidXlsxFileFormat(_)
            | SpreadsheetError::InvalidXlsbFileFormat(_)
            | SpreadsheetError::InvalidXlsFileFormat(_)
            | SpreadsheetError::InvalidOdsFileFormat(_)
            | SpreadsheetError::InvalidFileFormat { .. } => ConsolidateError::UnsupportedFormat(error.to_string()),
        }
    }
}

impl From<WriterError> for ConsolidateError {
    fn from(error: WriterError) -> Self {
        ConsolidateError::FileOperation(format!("Cannot write output: {}", error))
    }
}

impl From<ScanError> for ConsolidateError {
    fn from(error: ScanError) -> Self {
        match error {
            ScanError::RootNotFound(_) => ConsolidateError::DirectoryNotFound(error.to_string()),
            ScanError::PatternError(_) => ConsolidateError::Config(error.to_string()),
        }
    }
}

impl From<ConfigError> for ConsolidateError {
    fn from(error: ConfigError) -> Self {
        ConsolidateError::Config(error.to_string())
    }
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, ConsolidateError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| e.prefixed(message))
    }
}

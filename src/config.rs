//! Settings for detection, extraction, output naming and batch runs.
//!
//! Every field has a default, so a settings file only needs to name what it
//! changes:
//!
//! ```toml
//! [detector]
//! blank_run_length = 2
//!
//! [batch]
//! parallel = true
//! max_workers = 8
//! ```
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading a settings file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read settings file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// All tunable settings.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub detector: DetectorConfig,
    pub extractor: ExtractorConfig,
    pub output: OutputConfig,
    pub batch: BatchConfig,
}

impl Settings {
    /// Loads settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or is not valid TOML
    /// for these settings.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Settings, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Thresholds used to recognise headers, blocks and markers.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DetectorConfig {
    /// Minimum number of populated cells in a header row.
    pub min_header_cells: usize,

    /// Maximum number of empty columns allowed between two header cells.
    pub max_header_gap: usize,

    /// Minimum share of populated header cells that must be labels
    /// (text that does not read as a number).
    pub min_header_text_ratio: f64,

    /// Number of consecutive blank rows that ends a single table.
    pub blank_run_length: usize,

    /// Case-insensitive prefixes that mark a date marker cell, e.g. `FECHA:`.
    pub marker_prefixes: Vec<String>,

    /// Regex for a marker label whose date sits in one of the next cells.
    pub marker_label_pattern: String,

    /// Regex the date next to a [`marker_label_pattern`](Self::marker_label_pattern) label must match.
    pub marker_date_pattern: String,

    /// How many cells to the right of a marker label are searched for its date.
    pub marker_lookahead: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_header_cells: 2,
            max_header_gap: 1,
            min_header_text_ratio: 1.0,
            blank_run_length: 3,
            marker_prefixes: vec!["FECHA:".to_owned()],
            marker_label_pattern: r"(?i)^DIA\s*/\s*FECHA".to_owned(),
            marker_date_pattern: r"\d{1,2}/\d{1,2}/\d{4}".to_owned(),
            marker_lookahead: 4,
        }
    }
}

/// How blocks are merged into one table.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Name of the column holding each record's marker value.
    pub marker_column: String,

    /// Merge blocks whose headers share no column instead of failing.
    pub allow_disjoint_blocks: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            marker_column: "fecha".to_owned(),
            allow_disjoint_blocks: false,
        }
    }
}

/// Where consolidated files go and which sheet is read.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Subdirectory next to the input used when no output directory is given.
    pub subdir: String,

    /// Appended to the input file stem.
    pub suffix: String,

    /// Number of rows returned by an analysis preview.
    pub preview_rows: usize,

    /// Sheet to read; the first sheet when unset.
    pub sheet: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            subdir: "consolidado".to_owned(),
            suffix: "_consolidado".to_owned(),
            preview_rows: 10,
            sheet: None,
        }
    }
}

/// Directory scanning and worker pool settings.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BatchConfig {
    pub parallel: bool,
    pub max_workers: usize,
    pub recursive: bool,

    /// Accepted extensions, without the dot.
    pub extensions: Vec<String>,

    /// Glob patterns; a file is skipped when any path component below the
    /// root matches one of them.
    pub exclude: Vec<String>,

    /// Size bounds in bytes, both inclusive.
    pub min_size: u64,
    pub max_size: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            max_workers: 4,
            recursive: true,
            extensions: ["xlsx", "xlsm", "xlsb", "xls", "ods"].map(String::from).to_vec(),
            exclude: ["~$*", "*.tmp", "temp", "consolidado", "backup", ".git"]
                .map(String::from)
                .to_vec(),
            min_size: 0,
            max_size: 100 * 1024 * 1024,
        }
    }
}

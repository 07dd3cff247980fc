//! Directory discovery: which files under a root a batch should consolidate.
use crate::config::BatchConfig;
use glob::Pattern;
use glob::PatternError;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;
use tracing::warn;

/// Errors raised while scanning a directory.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory not found: '{0}'")]
    RootNotFound(PathBuf),

    #[error("Invalid exclusion pattern: {0}")]
    PatternError(#[from] PatternError),
}

/// Criteria for selecting spreadsheet files under a directory.
#[derive(Clone, Debug)]
pub struct ScanCriteria {
    /// Accepted file extensions (lower case, without dot).
    pub extensions: Vec<String>,

    /// Glob patterns matched against every path component below the root;
    /// a single match excludes the file.
    pub exclude_patterns: Vec<Pattern>,

    /// Minimum file size in bytes (inclusive).
    pub min_size: u64,

    /// Maximum file size in bytes (inclusive).
    pub max_size: u64,

    /// Descend into subdirectories.
    pub recursive: bool,
}

impl TryFrom<&BatchConfig> for ScanCriteria {
    type Error = ScanError;

    fn try_from(config: &BatchConfig) -> Result<Self, Self::Error> {
        Ok(ScanCriteria {
            extensions: config.extensions.iter().map(|it| it.to_ascii_lowercase()).collect(),
            exclude_patterns: config
                .exclude
                .iter()
                .map(|pattern| Pattern::new(pattern))
                .collect::<Result<Vec<_>, _>>()?,
            min_size: config.min_size,
            max_size: config.max_size,
            recursive: config.recursive,
        })
    }
}

impl ScanCriteria {
    /// Checks the extension of a path against the accepted list.
    pub fn accept_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|extension| extension.to_str())
            .map(|extension| {
                let extension = extension.to_ascii_lowercase();
                self.extensions.iter().any(|accepted| *accepted == extension)
            })
            .unwrap_or(false)
    }

    /// Checks whether any component of a root-relative path is excluded.
    pub fn is_excluded(&self, relative: &Path) -> bool {
        relative.components().any(|component| {
            let name = component.as_os_str().to_string_lossy();
            self.exclude_patterns.iter().any(|pattern| pattern.matches(&name))
        })
    }

    /// Checks a file size against the configured bounds.
    pub fn accept_size(&self, size: u64) -> bool {
        self.min_size <= size && size <= self.max_size
    }
}

/// Finds the spreadsheet files under `root` that satisfy `criteria`.
///
/// Results are sorted so batches see files in a stable order.
///
/// # Errors
///
/// Returns [`ScanError::RootNotFound`] if `root` is not a directory.
pub fn find_files(root: &Path, criteria: &ScanCriteria) -> Result<Vec<PathBuf>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::RootNotFound(root.to_path_buf()));
    }

    let prefix = Pattern::escape(&root.to_string_lossy());
    let pattern = if criteria.recursive {
        format!("{prefix}/**/*")
    } else {
        format!("{prefix}/*")
    };

    let mut files = Vec::new();
    for entry in glob::glob(&pattern)? {
        let path = match entry {
            Ok(path) => path,
            Err(error) => {
                warn!(%error, "Skipping unreadable entry");
                continue;
            }
        };
        if !path.is_file() || !criteria.accept_extension(&path) {
            continue;
        }
        let relative = path.strip_prefix(root).unwrap_or(&path);
        if criteria.is_excluded(relative) {
            debug!(file = %path.display(), "Excluded by pattern");
            continue;
        }
        let size = match path.metadata() {
            Ok(metadata) => metadata.len(),
            Err(error) => {
                warn!(file = %path.display(), %error, "Cannot read file metadata");
                continue;
            }
        };
        if !criteria.accept_size(size) {
            debug!(file = %path.display(), size, "Excluded by size");
            continue;
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn criteria() -> ScanCriteria {
        ScanCriteria::try_from(&BatchConfig::default()).unwrap()
    }

    fn touch(path: &Path, size: usize) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, vec![b'x'; size]).unwrap();
    }

    #[test]
    fn default_exclusions() {
        let criteria = criteria();
        assert!(criteria.is_excluded(Path::new("~$ruta.xlsx")));
        assert!(criteria.is_excluded(Path::new("ruta/consolidado/ruta_consolidado.xlsx")));
        assert!(criteria.is_excluded(Path::new("backup/ruta.xlsx")));
        assert!(criteria.is_excluded(Path::new("ruta.tmp")));
        assert!(!criteria.is_excluded(Path::new("rutas/ruta 113.xlsx")));
    }

    #[test]
    fn extensions_are_case_insensitive() {
        let criteria = criteria();
        assert!(criteria.accept_extension(Path::new("a.XLSX")));
        assert!(criteria.accept_extension(Path::new("a.ods")));
        assert!(!criteria.accept_extension(Path::new("a.csv")));
        assert!(!criteria.accept_extension(Path::new("xlsx")));
    }

    #[test]
    fn scan_directory() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("b.xlsx"), 10);
        touch(&root.path().join("a.xls"), 10);
        touch(&root.path().join("notes.txt"), 10);
        touch(&root.path().join("empty.xlsx"), 0);
        touch(&root.path().join("nested/c.xlsx"), 10);
        touch(&root.path().join("consolidado/a_consolidado.xlsx"), 10);

        let mut criteria = criteria();
        criteria.min_size = 1;
        let files = find_files(root.path(), &criteria).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|path| path.strip_prefix(root.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.xls"),
                PathBuf::from("b.xlsx"),
                PathBuf::from("nested/c.xlsx"),
            ]
        );

        criteria.recursive = false;
        assert_eq!(find_files(root.path(), &criteria).unwrap().len(), 2);
    }

    #[test]
    fn missing_root() {
        let error = find_files(Path::new("no/such/dir"), &criteria()).unwrap_err();
        assert!(matches!(error, ScanError::RootNotFound(_)));
    }
}

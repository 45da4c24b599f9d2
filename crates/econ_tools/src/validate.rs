//! Data validation utilities.
//!
//! Files under a `catalog/` directory are checked as action catalogs; every
//! other `.ron` file is checked as a scheduler config.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use econ_core::catalog::ActionCatalog;
use econ_core::config::SchedulerConfig;
use econ_core::data::CatalogData;
use thiserror::Error;

/// Name of the directory holding catalog files.
pub const CATALOG_DIR: &str = "catalog";

/// A data file that failed validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// File or directory could not be read.
    #[error("Cannot read '{path}': {message}")]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// File is not valid RON for its kind.
    #[error("Cannot parse '{path}': {message}")]
    Parse {
        /// Offending path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Catalog parsed but its cross-references are broken.
    #[error("Invalid catalog '{path}': {}", problems.join("; "))]
    Catalog {
        /// Offending path.
        path: PathBuf,
        /// Every problem found.
        problems: Vec<String>,
    },

    /// Config parsed but describes an unusable scheduler.
    #[error("Invalid config '{path}': {message}")]
    Config {
        /// Offending path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Two catalog files share a name.
    #[error("Catalog '{name}' defined in both '{first}' and '{second}'")]
    DuplicateCatalog {
        /// Catalog name.
        name: String,
        /// First file defining it.
        first: PathBuf,
        /// Second file defining it.
        second: PathBuf,
    },

    /// Directory contained nothing to validate.
    #[error("No .ron files found in '{0}'")]
    NoDataFiles(PathBuf),
}

/// What a valid data file turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum DataFile {
    /// An action catalog with its name and action count.
    Catalog {
        /// Catalog name.
        name: String,
        /// Number of actions.
        actions: usize,
    },
    /// A scheduler config.
    Config(SchedulerConfig),
}

/// Outcome of validating a directory.
#[derive(Debug, Default)]
pub struct ValidationReport {
    /// Files that passed.
    pub valid: Vec<(PathBuf, DataFile)>,
    /// Files that failed.
    pub failures: Vec<ValidationError>,
}

impl ValidationReport {
    /// Whether every file passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Validate all RON data files in a directory, recursively.
///
/// # Errors
///
/// Returns an error if the directory cannot be read or holds no `.ron`
/// files. Per-file problems are collected in the report instead.
pub fn validate_data_directory(path: &Path) -> Result<ValidationReport, ValidationError> {
    let mut files = Vec::new();
    collect_ron_files(path, &mut files)?;
    if files.is_empty() {
        return Err(ValidationError::NoDataFiles(path.to_path_buf()));
    }
    files.sort();

    let mut report = ValidationReport::default();
    let mut catalog_names: BTreeMap<String, PathBuf> = BTreeMap::new();
    for file in files {
        match validate_file(&file) {
            Ok(DataFile::Catalog { name, actions }) => {
                if let Some(first) = catalog_names.get(&name) {
                    report.failures.push(ValidationError::DuplicateCatalog {
                        name,
                        first: first.clone(),
                        second: file,
                    });
                    continue;
                }
                tracing::debug!(path = %file.display(), catalog = %name, actions, "catalog ok");
                catalog_names.insert(name.clone(), file.clone());
                report.valid.push((file, DataFile::Catalog { name, actions }));
            }
            Ok(config) => {
                tracing::debug!(path = %file.display(), "config ok");
                report.valid.push((file, config));
            }
            Err(e) => {
                tracing::warn!("{e}");
                report.failures.push(e);
            }
        }
    }
    Ok(report)
}

/// Validate one file, deciding its kind from its location.
///
/// # Errors
///
/// Returns the first problem that makes the file unusable.
pub fn validate_file(path: &Path) -> Result<DataFile, ValidationError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ValidationError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    if is_catalog_path(path) {
        validate_catalog(path, &contents)
    } else {
        validate_config(path, &contents)
    }
}

/// Validate catalog RON.
///
/// # Errors
///
/// Returns [`ValidationError::Parse`] for malformed RON and
/// [`ValidationError::Catalog`] listing every broken cross-reference.
pub fn validate_catalog(path: &Path, contents: &str) -> Result<DataFile, ValidationError> {
    let data: CatalogData = ron::from_str(contents).map_err(|e| ValidationError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let problems = data.validate();
    if !problems.is_empty() {
        return Err(ValidationError::Catalog {
            path: path.to_path_buf(),
            problems,
        });
    }
    // Indexing can still fail on things the data check cannot see
    let catalog = ActionCatalog::from_data(data).map_err(|e| ValidationError::Catalog {
        path: path.to_path_buf(),
        problems: vec![e.to_string()],
    })?;
    Ok(DataFile::Catalog {
        name: catalog.name().to_string(),
        actions: catalog.len(),
    })
}

/// Validate scheduler config RON.
///
/// # Errors
///
/// Returns [`ValidationError::Parse`] for malformed RON and
/// [`ValidationError::Config`] for unusable values.
pub fn validate_config(path: &Path, contents: &str) -> Result<DataFile, ValidationError> {
    let config: SchedulerConfig = ron::from_str(contents).map_err(|e| ValidationError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    config.validate().map_err(|e| ValidationError::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(DataFile::Config(config))
}

fn is_catalog_path(path: &Path) -> bool {
    path.parent()
        .and_then(Path::file_name)
        .is_some_and(|dir| dir == CATALOG_DIR)
}

fn collect_ron_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), ValidationError> {
    let io_error = |e: std::io::Error| ValidationError::Io {
        path: dir.to_path_buf(),
        message: e.to_string(),
    };
    for entry in std::fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if path.is_dir() {
            collect_ron_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "ron") {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use econ_test_utils::fixtures::strict_config;

    const STANDARD: &str = include_str!("../../econ_core/assets/data/catalog/standard.ron");

    fn write(root: &Path, relative: &str, contents: &str) -> PathBuf {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_standard_catalog_valid() {
        let result = validate_catalog(Path::new("standard.ron"), STANDARD).unwrap();
        match result {
            DataFile::Catalog { name, actions } => {
                assert_eq!(name, "standard");
                assert!(actions > 0);
            }
            DataFile::Config(_) => panic!("expected a catalog"),
        }
    }

    #[test]
    fn test_broken_requirement_reported() {
        let broken = STANDARD.replacen("\"command_center\"]", "\"nexus\"]", 1);
        let err = validate_catalog(Path::new("broken.ron"), &broken).unwrap_err();
        assert!(matches!(err, ValidationError::Catalog { .. }), "{err}");
    }

    #[test]
    fn test_malformed_ron_is_parse_error() {
        let err = validate_catalog(Path::new("bad.ron"), "CatalogData(name: ").unwrap_err();
        assert!(matches!(err, ValidationError::Parse { .. }));
    }

    #[test]
    fn test_config_roundtrip_valid() {
        let source = ron::to_string(&strict_config()).unwrap();
        let result = validate_config(Path::new("scheduler.ron"), &source).unwrap();
        assert_eq!(result, DataFile::Config(strict_config()));
    }

    #[test]
    fn test_zero_period_rejected() {
        let err = validate_config(Path::new("scheduler.ron"), "(reconcile_period: 0)").unwrap_err();
        assert!(matches!(err, ValidationError::Config { .. }), "{err}");
    }

    #[test]
    fn test_directory_classifies_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "catalog/standard.ron", STANDARD);
        write(dir.path(), "scheduler.ron", "(order_timeout: 500)");
        write(dir.path(), "notes.txt", "ignored");

        let report = validate_data_directory(dir.path()).unwrap();
        assert!(report.passed(), "{:?}", report.failures);
        assert_eq!(report.valid.len(), 2);
    }

    #[test]
    fn test_duplicate_catalog_names() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "catalog/a.ron", STANDARD);
        write(dir.path(), "mods/catalog/b.ron", STANDARD);

        let report = validate_data_directory(dir.path()).unwrap();
        assert_eq!(report.valid.len(), 1);
        assert!(matches!(
            report.failures.as_slice(),
            [ValidationError::DuplicateCatalog { name, .. }] if name == "standard"
        ));
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            validate_data_directory(dir.path()),
            Err(ValidationError::NoDataFiles(_))
        ));
    }
}

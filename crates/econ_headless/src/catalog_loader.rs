//! Catalog and config loading for headless runs.
//!
//! Catalogs are looked up by file path, by name in the catalog directory, or
//! fall back to the embedded standard catalog.

use std::path::{Path, PathBuf};

use econ_core::catalog::ActionCatalog;
use econ_core::config::SchedulerConfig;

use crate::error::{Result, SandboxError};

/// Name of the embedded catalog.
pub const STANDARD_CATALOG: &str = "standard";

/// Resolve the default catalog directory.
///
/// Looks for catalog RON files in standard locations:
/// 1. Environment variable `ECON_CATALOG_DIR`
/// 2. `./crates/econ_core/assets/data/catalog/` (repo root)
/// 3. `./assets/data/catalog/` (running from econ_core)
/// 4. `../econ_core/assets/data/catalog/` (running from a sibling crate)
pub fn default_catalog_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("ECON_CATALOG_DIR") {
        let path = PathBuf::from(dir);
        if path.exists() {
            return Some(path);
        }
    }

    let candidates = [
        "crates/econ_core/assets/data/catalog",
        "assets/data/catalog",
        "../econ_core/assets/data/catalog",
    ];

    candidates.iter().map(PathBuf::from).find(|path| path.exists())
}

/// Load a catalog by path or name.
///
/// `None` and `"standard"` give the embedded catalog. A value naming an
/// existing file is loaded directly; anything else is looked up as
/// `<name>.ron` in `dir` (or [`default_catalog_dir`]).
pub fn load_catalog(spec: Option<&str>, dir: Option<&Path>) -> Result<ActionCatalog> {
    let Some(spec) = spec.filter(|s| *s != STANDARD_CATALOG) else {
        return Ok(ActionCatalog::standard()?);
    };

    let direct = PathBuf::from(spec);
    if direct.is_file() {
        return Ok(ActionCatalog::load(&direct)?);
    }

    let dir = dir
        .map(Path::to_path_buf)
        .or_else(default_catalog_dir)
        .ok_or_else(|| SandboxError::CatalogNotFound("catalog data directory".to_string()))?;
    let path = dir.join(format!("{spec}.ron"));
    if !path.is_file() {
        return Err(SandboxError::CatalogNotFound(path.display().to_string()));
    }
    tracing::debug!(path = %path.display(), "loading catalog");
    Ok(ActionCatalog::load(&path)?)
}

/// Load a scheduler config from RON, or the defaults when no path is given.
pub fn load_scheduler_config(path: Option<&Path>) -> Result<SchedulerConfig> {
    match path {
        Some(path) => Ok(SchedulerConfig::load(path)?),
        None => Ok(SchedulerConfig::default()),
    }
}

/// Catalog names available in `dir`, sorted.
pub fn list_catalogs(dir: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(dir).map_err(|e| SandboxError::Io {
        path: dir.display().to_string(),
        message: e.to_string(),
    })?;

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "ron"))
        .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .collect();
    names.sort();
    Ok(names)
}

//! Catalog validation.

use std::path::Path;

use buildqueue_core::data::CatalogData;

use crate::data_loader::{load_catalog, ToolError, ToolResult};

/// Validate a single catalog file.
///
/// Checks both the per-field rules and that the catalog can actually be
/// built (ids, keys, build times).
///
/// # Errors
///
/// Returns the load error, or [`ToolError::Validation`] listing every problem.
pub fn validate_catalog_file(path: &Path) -> ToolResult<CatalogData> {
    let catalog = load_catalog(path)?;

    let errors = catalog.validate();
    if !errors.is_empty() {
        return Err(ToolError::Validation {
            path: path.display().to_string(),
            errors,
        });
    }

    catalog.clone().into_catalog()?;
    Ok(catalog)
}

/// Validate a catalog file, or every `.ron` catalog directly inside a
/// directory.
///
/// Returns the number of definitions checked.
///
/// # Errors
///
/// Returns the first failing file's error.
pub fn validate_path(path: &Path) -> ToolResult<usize> {
    if !path.is_dir() {
        return validate_catalog_file(path).map(|c| c.definitions.len());
    }

    let io_error = |source| ToolError::Io {
        path: path.display().to_string(),
        source,
    };

    let mut files: Vec<_> = std::fs::read_dir(path)
        .map_err(io_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_error)?
        .into_iter()
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "ron"))
        .collect();
    files.sort();

    let mut total = 0;
    for file in &files {
        let catalog = validate_catalog_file(file)?;
        tracing::info!(
            "{}: {} definitions OK",
            file.display(),
            catalog.definitions.len()
        );
        total += catalog.definitions.len();
    }

    if files.is_empty() {
        tracing::warn!("No .ron files found in {}", path.display());
    }
    Ok(total)
}

//! Loading RON data files from disk.

use std::path::Path;

use buildqueue_core::data::CatalogData;
use buildqueue_core::error::BuildError;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::scenario::Scenario;

/// Errors raised by the tools.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Failed to read file.
    #[error("Failed to read file '{path}': {source}")]
    Io {
        /// Path to the file.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse RON file.
    #[error("Failed to parse RON file '{path}': {source}")]
    Parse {
        /// Path to the file.
        path: String,
        /// Underlying parse error.
        #[source]
        source: ron::error::SpannedError,
    },

    /// Data validation failed.
    #[error("Validation failed for '{path}': {errors:?}")]
    Validation {
        /// File or scenario that failed validation.
        path: String,
        /// List of validation errors.
        errors: Vec<String>,
    },

    /// A scenario referenced a definition key missing from its catalog.
    #[error("Unknown definition key '{0}'")]
    UnknownKey(String),

    /// Error from the construction core.
    #[error(transparent)]
    Core(#[from] BuildError),

    /// Failed to encode a report.
    #[error("Failed to encode report: {0}")]
    Report(#[from] serde_json::Error),
}

/// Result type for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Read and parse a RON file.
///
/// # Errors
///
/// Returns [`ToolError::Io`] or [`ToolError::Parse`].
pub fn load_ron<T: DeserializeOwned>(path: &Path) -> ToolResult<T> {
    let contents = std::fs::read_to_string(path).map_err(|source| ToolError::Io {
        path: path.display().to_string(),
        source,
    })?;
    ron::from_str(&contents).map_err(|source| ToolError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Load a catalog file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_catalog(path: &Path) -> ToolResult<CatalogData> {
    let catalog: CatalogData = load_ron(path)?;
    tracing::debug!(
        "Loaded {} definitions from {}",
        catalog.definitions.len(),
        path.display()
    );
    Ok(catalog)
}

/// Load a scenario file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_scenario(path: &Path) -> ToolResult<Scenario> {
    let scenario: Scenario = load_ron(path)?;
    tracing::debug!("Loaded scenario '{}' from {}", scenario.name, path.display());
    Ok(scenario)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_load_catalog_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"CatalogData(definitions: [DefinitionData(key: "barracks", name: "Barracks", category: Building)])"#
        )
        .unwrap();

        let catalog = load_catalog(file.path()).unwrap();
        assert_eq!(catalog.definitions.len(), 1);
        assert_eq!(catalog.definitions[0].key, "barracks");
    }

    #[test]
    fn test_missing_file() {
        let result = load_catalog(Path::new("does/not/exist.ron"));
        assert!(matches!(result, Err(ToolError::Io { .. })));
    }

    #[test]
    fn test_parse_error_names_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "CatalogData(definitions: [").unwrap();

        let err = load_catalog(file.path()).unwrap_err();
        assert!(matches!(err, ToolError::Parse { .. }));
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }
}

//! Error types for the construction core.
//!
//! Admission denials and lookup misses are ordinary outcomes, not faults.
//! They are still typed so callers can surface the reason in a UI.

use thiserror::Error;

use crate::definition::{BuildCategory, DefinitionId};
use crate::queue::{BuilderId, EntryId};

/// Result type alias using [`BuildError`].
pub type Result<T> = std::result::Result<T, BuildError>;

/// Top-level error type for all construction operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// The builder exposes no items of this category.
    #[error("Builder cannot build {}", .0.display_name())]
    CategoryNotPermitted(BuildCategory),

    /// The definition is not in the builder's permitted items.
    #[error("Builder cannot build '{0}'")]
    NotPermitted(String),

    /// Too many of this definition are in progress across all builders.
    #[error("Queue limit reached for '{name}' ({limit} in progress)")]
    QueueLimitReached {
        /// Definition key.
        name: String,
        /// Effective queue-size limit.
        limit: u32,
    },

    /// Completed plus in-progress builds have reached the global cap.
    #[error("Global build limit reached for '{name}' ({limit} total)")]
    GlobalLimitReached {
        /// Definition key.
        name: String,
        /// Effective global-build limit.
        limit: u32,
    },

    /// A non-empty queue holds no entry for this definition.
    #[error("No queued build of {0}")]
    NotQueued(DefinitionId),

    /// The queue holds no entry with this id.
    #[error("Build entry not found: {0:?}")]
    EntryNotFound(EntryId),

    /// The catalog has no definition with this id.
    #[error("Unknown definition: {0}")]
    UnknownDefinition(DefinitionId),

    /// No builder is registered under this id.
    #[error("Unknown builder: {0}")]
    UnknownBuilder(BuilderId),

    /// A builder is already registered under this id.
    #[error("Builder already registered: {0}")]
    DuplicateBuilder(BuilderId),

    /// A definition with the same id or key is already registered.
    #[error("Duplicate definition: {0}")]
    DuplicateDefinition(String),

    /// Definition data is malformed.
    #[error("Invalid definition '{key}': {reason}")]
    InvalidDefinition {
        /// Definition key.
        key: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Configuration text failed to parse.
    #[error("Failed to parse data: {0}")]
    DataParse(String),

    /// Snapshot encoding or decoding failed.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl BuildError {
    /// Whether this error is an admission denial (a normal gameplay outcome).
    #[must_use]
    pub const fn is_admission_denial(&self) -> bool {
        matches!(
            self,
            Self::CategoryNotPermitted(_)
                | Self::NotPermitted(_)
                | Self::QueueLimitReached { .. }
                | Self::GlobalLimitReached { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            BuildError::QueueLimitReached {
                name: "barracks".to_string(),
                limit: 1,
            }
            .to_string(),
            "Queue limit reached for 'barracks' (1 in progress)"
        );
        assert_eq!(
            BuildError::NotQueued(DefinitionId(4)).to_string(),
            "No queued build of #4"
        );
        assert_eq!(
            BuildError::UnknownBuilder(12).to_string(),
            "Unknown builder: 12"
        );
        assert_eq!(
            BuildError::CategoryNotPermitted(BuildCategory::Upgrade).to_string(),
            "Builder cannot build Upgrades"
        );
    }

    #[test]
    fn test_admission_denial_classification() {
        assert!(BuildError::CategoryNotPermitted(BuildCategory::Unit).is_admission_denial());
        assert!(BuildError::GlobalLimitReached {
            name: "armor".to_string(),
            limit: 1,
        }
        .is_admission_denial());
        assert!(!BuildError::NotQueued(DefinitionId(1)).is_admission_denial());
        assert!(!BuildError::UnknownBuilder(1).is_admission_denial());
    }
}

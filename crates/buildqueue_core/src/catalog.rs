//! The definition database.

use std::collections::HashMap;
use std::sync::Arc;

use crate::definition::{BuildCategory, BuildableDefinition, DefinitionId};
use crate::error::{BuildError, Result};
use crate::math::Fixed;

/// Registry of every buildable definition, in registration order.
///
/// Definitions are shared as `Arc` so build entries can point at them
/// without owning them.
#[derive(Debug, Clone, Default)]
pub struct DefinitionCatalog {
    definitions: Vec<Arc<BuildableDefinition>>,
    by_id: HashMap<DefinitionId, usize>,
    by_key: HashMap<String, usize>,
}

impl DefinitionCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the id or key is already taken, the category is
    /// `Unset`, or the build time is not positive.
    pub fn register(&mut self, definition: BuildableDefinition) -> Result<()> {
        if !definition.category.is_set() {
            return Err(BuildError::InvalidDefinition {
                key: definition.key,
                reason: "category is unset".to_string(),
            });
        }
        if definition.build_time <= Fixed::ZERO {
            return Err(BuildError::InvalidDefinition {
                key: definition.key,
                reason: "build time must be positive".to_string(),
            });
        }
        if self.by_id.contains_key(&definition.id) {
            return Err(BuildError::DuplicateDefinition(definition.id.to_string()));
        }
        if self.by_key.contains_key(&definition.key) {
            return Err(BuildError::DuplicateDefinition(definition.key));
        }

        let index = self.definitions.len();
        self.by_id.insert(definition.id, index);
        self.by_key.insert(definition.key.clone(), index);
        self.definitions.push(Arc::new(definition));
        Ok(())
    }

    /// Get a definition by ID.
    #[must_use]
    pub fn get(&self, id: DefinitionId) -> Option<&Arc<BuildableDefinition>> {
        self.by_id.get(&id).map(|&index| &self.definitions[index])
    }

    /// Get a definition by its data key.
    #[must_use]
    pub fn find_by_key(&self, key: &str) -> Option<&Arc<BuildableDefinition>> {
        self.by_key.get(key).map(|&index| &self.definitions[index])
    }

    /// All definitions in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<BuildableDefinition>> {
        self.definitions.iter()
    }

    /// Definitions of one category in registration order.
    pub fn in_category(
        &self,
        category: BuildCategory,
    ) -> impl Iterator<Item = &Arc<BuildableDefinition>> {
        self.definitions
            .iter()
            .filter(move |d| d.category == category)
    }

    /// Number of registered definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Check if the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

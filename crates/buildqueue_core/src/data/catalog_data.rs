//! Catalog data: the full list of definitions loaded at startup.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::definition_data::DefinitionData;
use crate::catalog::DefinitionCatalog;
use crate::definition::DefinitionId;
use crate::error::{BuildError, Result};

/// Every buildable definition of a game, in display order.
///
/// # Example RON
///
/// ```ron
/// CatalogData(
///     definitions: [
///         DefinitionData(key: "barracks", name: "Barracks", category: Building),
///         DefinitionData(key: "infantry", name: "Infantry", category: Unit, build_time: Some(2.0)),
///     ],
/// )
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogData {
    /// All definitions. Ids are assigned from file order starting at 1.
    pub definitions: Vec<DefinitionData>,
}

impl CatalogData {
    /// Parse catalog data from a RON string.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::DataParse`] if the text is not a valid catalog.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        ron::from_str(ron).map_err(|e| BuildError::DataParse(e.to_string()))
    }

    /// Look up definition data by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&DefinitionData> {
        self.definitions.iter().find(|d| d.key == key)
    }

    /// Validate data integrity.
    ///
    /// Returns a list of validation errors (empty if valid).
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for definition in &self.definitions {
            if !seen.insert(definition.key.as_str()) {
                errors.push(format!("Duplicate definition key '{}'", definition.key));
            }
            errors.extend(definition.validate());
        }

        errors
    }

    /// Build the runtime catalog.
    ///
    /// # Errors
    ///
    /// Returns the first invalid or duplicate definition.
    pub fn into_catalog(self) -> Result<DefinitionCatalog> {
        let mut catalog = DefinitionCatalog::new();
        for (id, data) in (1..).zip(&self.definitions) {
            catalog.register(data.to_definition(DefinitionId(id))?)?;
        }
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::BuildCategory;

    const CATALOG_RON: &str = r#"
        CatalogData(
            definitions: [
                DefinitionData(key: "barracks", name: "Barracks", category: Building, cost: 200),
                DefinitionData(key: "infantry", name: "Infantry", category: Unit, build_time: Some(2.0)),
                DefinitionData(key: "armor", name: "Armor Plating", category: Upgrade, build_time: Some(8.0)),
            ],
        )
    "#;

    #[test]
    fn test_parse_and_build_catalog() {
        let data = CatalogData::from_ron_str(CATALOG_RON).unwrap();
        assert!(data.validate().is_empty());
        assert_eq!(data.get("infantry").unwrap().name, "Infantry");

        let catalog = data.into_catalog().unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.find_by_key("barracks").unwrap().id, DefinitionId(1));
        assert_eq!(catalog.find_by_key("armor").unwrap().id, DefinitionId(3));
        assert_eq!(
            catalog.get(DefinitionId(2)).unwrap().category,
            BuildCategory::Unit
        );
    }

    #[test]
    fn test_duplicate_keys_reported() {
        let data = CatalogData {
            definitions: vec![
                DefinitionData::new("barracks", "Barracks", BuildCategory::Building),
                DefinitionData::new("barracks", "Barracks II", BuildCategory::Building),
            ],
        };

        assert_eq!(data.validate(), ["Duplicate definition key 'barracks'"]);
        assert!(matches!(
            data.into_catalog(),
            Err(BuildError::DuplicateDefinition(_))
        ));
    }

    #[test]
    fn test_parse_error() {
        let result = CatalogData::from_ron_str("CatalogData(definitions: [oops])");
        assert!(matches!(result, Err(BuildError::DataParse(_))));
    }
}

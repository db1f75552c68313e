//! Data-driven buildable definitions.

use serde::{Deserialize, Serialize};

use crate::definition::{BuildCategory, BuildableDefinition, DefinitionId};
use crate::error::{BuildError, Result};
use crate::math::{seconds, Fixed};

/// Data-driven buildable definition.
///
/// Omitted build time and limits fall back to the category defaults.
///
/// # Example RON
///
/// ```ron
/// DefinitionData(
///     key: "barracks",
///     name: "Barracks",
///     description: "Trains infantry.",
///     category: Building,
///     cost: 200,
///     build_time: Some(5.0),
///     queue_limit: Some(1),
///     global_limit: None,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionData {
    /// Unique string key for this definition.
    pub key: String,

    /// Display name.
    pub name: String,

    /// Display description.
    #[serde(default)]
    pub description: String,

    /// Category used for builder filtering.
    pub category: BuildCategory,

    /// Resource cost.
    #[serde(default)]
    pub cost: i32,

    /// Build duration in seconds.
    #[serde(default)]
    pub build_time: Option<f64>,

    /// Queue-size limit (`<= 0` is unlimited).
    #[serde(default)]
    pub queue_limit: Option<i32>,

    /// Global-build limit (`<= 0` is unlimited).
    #[serde(default)]
    pub global_limit: Option<i32>,
}

impl DefinitionData {
    /// Create data for `key` with every optional field left to defaults.
    #[must_use]
    pub fn new(key: impl Into<String>, name: impl Into<String>, category: BuildCategory) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            description: String::new(),
            category,
            cost: 0,
            build_time: None,
            queue_limit: None,
            global_limit: None,
        }
    }

    /// Check this definition on its own.
    ///
    /// Returns a list of human-readable problems; empty means valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.key.trim().is_empty() {
            errors.push(format!("Definition '{}' has an empty key", self.name));
        }
        if !self.category.is_set() {
            errors.push(format!("Definition '{}' has no category", self.key));
        }
        if let Some(build_time) = self.build_time {
            match seconds(build_time) {
                Some(value) if value > Fixed::ZERO => {}
                _ => errors.push(format!(
                    "Definition '{}' has invalid build time {build_time}",
                    self.key
                )),
            }
        }
        if self.cost < 0 {
            errors.push(format!("Definition '{}' has negative cost", self.key));
        }

        errors
    }

    /// Build the runtime definition under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidDefinition`] if [`validate`](Self::validate)
    /// reports any problem.
    pub fn to_definition(&self, id: DefinitionId) -> Result<BuildableDefinition> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(BuildError::InvalidDefinition {
                key: self.key.clone(),
                reason: errors.join("; "),
            });
        }

        let mut definition = BuildableDefinition::new(id, self.key.clone(), self.category)
            .with_name(self.name.clone())
            .with_description(self.description.clone())
            .with_cost(self.cost);

        if let Some(build_time) = self.build_time.and_then(seconds) {
            definition = definition.with_build_time(build_time);
        }
        if let Some(limit) = self.queue_limit {
            definition = definition.with_queue_limit(limit);
        }
        if let Some(limit) = self.global_limit {
            definition = definition.with_global_limit(limit);
        }
        Ok(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_category() {
        let data = DefinitionData::new("armor", "Armor Plating", BuildCategory::Upgrade);
        let definition = data.to_definition(DefinitionId(3)).unwrap();

        assert_eq!(definition.id, DefinitionId(3));
        assert_eq!(definition.name, "Armor Plating");
        assert_eq!(definition.build_time, Fixed::from_num(5));
        assert_eq!(definition.queue_limit(), Some(1));
        assert_eq!(definition.global_limit(), Some(1));
    }

    #[test]
    fn test_overrides_apply() {
        let data = DefinitionData {
            build_time: Some(2.5),
            queue_limit: Some(0),
            global_limit: Some(4),
            cost: 75,
            ..DefinitionData::new("ranger", "Ranger", BuildCategory::Unit)
        };
        let definition = data.to_definition(DefinitionId(1)).unwrap();

        assert_eq!(definition.build_time, Fixed::from_num(5) / 2);
        assert_eq!(definition.queue_limit(), None);
        assert_eq!(definition.global_limit(), Some(4));
        assert_eq!(definition.cost, 75);
    }

    #[test]
    fn test_validate_reports_problems() {
        let data = DefinitionData {
            build_time: Some(0.0),
            cost: -5,
            ..DefinitionData::new("", "Broken", BuildCategory::Unset)
        };
        let errors = data.validate();

        assert_eq!(errors.len(), 4);
        assert!(matches!(
            data.to_definition(DefinitionId(1)),
            Err(BuildError::InvalidDefinition { .. })
        ));
    }

    #[test]
    fn test_parse_from_ron() {
        let ron = r#"
            DefinitionData(
                key: "barracks",
                name: "Barracks",
                category: Building,
                cost: 200,
                build_time: Some(5.0),
            )
        "#;
        let data: DefinitionData = ron::from_str(ron).unwrap();

        assert_eq!(data.key, "barracks");
        assert_eq!(data.category, BuildCategory::Building);
        assert_eq!(data.queue_limit, None);
        assert!(data.validate().is_empty());
    }
}

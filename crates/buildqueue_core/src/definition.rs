//! Buildable definitions: the immutable records describing what can be built.
//!
//! Definitions are authored as static data, loaded once into a
//! [`DefinitionCatalog`](crate::catalog::DefinitionCatalog) and never mutated
//! at runtime. The core only reads them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, Fixed};

/// Unique identifier for buildable definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DefinitionId(pub u32);

impl DefinitionId {
    /// Create a new definition ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for DefinitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Category of a buildable.
///
/// `Unset` only exists so freshly authored data has a sentinel; it is never
/// a valid runtime category and the catalog rejects it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum BuildCategory {
    /// Not yet assigned.
    #[default]
    Unset,
    /// Structures placed in the world.
    Building,
    /// Units trained by a structure.
    Unit,
    /// One-off research upgrades.
    Upgrade,
}

impl BuildCategory {
    /// Every valid runtime category, in display order.
    pub const ALL: [Self; 3] = [Self::Building, Self::Unit, Self::Upgrade];

    /// Whether this is a valid runtime category.
    #[must_use]
    pub const fn is_set(self) -> bool {
        !matches!(self, Self::Unset)
    }

    /// Get the display name for this category.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Unset => "Unset",
            Self::Building => "Buildings",
            Self::Unit => "Units",
            Self::Upgrade => "Upgrades",
        }
    }

    /// Authoring defaults for a new definition of this category.
    #[must_use]
    pub fn defaults(self) -> CategoryDefaults {
        let (queue_limit, global_limit) = match self {
            Self::Unset => (0, 0),
            Self::Building => (1, -1),
            Self::Unit => (10, -1),
            Self::Upgrade => (1, 1),
        };
        CategoryDefaults {
            build_time: Fixed::from_num(DEFAULT_BUILD_SECONDS),
            queue_limit,
            global_limit,
        }
    }
}

/// Build time given to new definitions, in seconds.
const DEFAULT_BUILD_SECONDS: i32 = 5;

/// Per-category starting values for authored definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryDefaults {
    /// Build duration in seconds.
    pub build_time: Fixed,
    /// Queue-size limit (`<= 0` is unlimited).
    pub queue_limit: i32,
    /// Global-build limit (`<= 0` is unlimited).
    pub global_limit: i32,
}

/// Immutable description of a buildable thing.
///
/// Limits are stored as authored: any value `<= 0` means unlimited. Use
/// [`queue_limit`](Self::queue_limit) and [`global_limit`](Self::global_limit)
/// for the effective values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildableDefinition {
    /// Unique identifier.
    pub id: DefinitionId,
    /// Stable string key used by data files ("barracks").
    pub key: String,
    /// Display name.
    pub name: String,
    /// Display description.
    pub description: String,
    /// Category used for builder filtering.
    pub category: BuildCategory,
    /// Resource cost.
    pub cost: i32,
    /// Build duration in seconds of simulation time.
    #[serde(with = "fixed_serde")]
    pub build_time: Fixed,
    /// Maximum builds in progress across all builders (`<= 0` is unlimited).
    pub queue_limit: i32,
    /// Maximum completed plus in-progress builds (`<= 0` is unlimited).
    pub global_limit: i32,
}

impl BuildableDefinition {
    /// Create a definition with the category's authoring defaults.
    ///
    /// The display name and description start out as the key.
    #[must_use]
    pub fn new(id: DefinitionId, key: impl Into<String>, category: BuildCategory) -> Self {
        let key = key.into();
        let defaults = category.defaults();
        Self {
            id,
            name: key.clone(),
            description: key.clone(),
            key,
            category,
            cost: 0,
            build_time: defaults.build_time,
            queue_limit: defaults.queue_limit,
            global_limit: defaults.global_limit,
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the resource cost.
    #[must_use]
    pub fn with_cost(mut self, cost: i32) -> Self {
        self.cost = cost;
        self
    }

    /// Set the build duration in seconds.
    #[must_use]
    pub fn with_build_time(mut self, build_time: Fixed) -> Self {
        self.build_time = build_time;
        self
    }

    /// Set the queue-size limit.
    #[must_use]
    pub fn with_queue_limit(mut self, limit: i32) -> Self {
        self.queue_limit = limit;
        self
    }

    /// Set the global-build limit.
    #[must_use]
    pub fn with_global_limit(mut self, limit: i32) -> Self {
        self.global_limit = limit;
        self
    }

    /// Effective queue-size limit, `None` when unlimited.
    #[must_use]
    pub fn queue_limit(&self) -> Option<u32> {
        positive_limit(self.queue_limit)
    }

    /// Effective global-build limit, `None` when unlimited.
    #[must_use]
    pub fn global_limit(&self) -> Option<u32> {
        positive_limit(self.global_limit)
    }
}

fn positive_limit(limit: i32) -> Option<u32> {
    u32::try_from(limit).ok().filter(|l| *l > 0)
}

//! Test fixtures and helpers.
//!
//! A small standard catalog covering every category and limit shape,
//! plus helpers for building systems around it.

use buildqueue_core::catalog::DefinitionCatalog;
use buildqueue_core::data::{CatalogData, DefinitionData};
use buildqueue_core::definition::{BuildCategory, DefinitionId};
use buildqueue_core::queue::QueueConfig;
use buildqueue_core::system::BuildSystem;
use fixed::types::I32F32;

/// Building, 5 s, queue limit 1, no global limit.
pub const BARRACKS: DefinitionId = DefinitionId(1);
/// Unit, 2 s, queue limit 10.
pub const INFANTRY: DefinitionId = DefinitionId(2);
/// Unit, 10 s, queue limit 3.
pub const TANK: DefinitionId = DefinitionId(3);
/// Unit, 3 s, unlimited.
pub const HARVESTER: DefinitionId = DefinitionId(4);
/// Upgrade, 8 s, queue limit 1, global limit 1.
pub const ARMOR: DefinitionId = DefinitionId(5);

/// Every definition in the standard catalog, in id order.
pub const ALL_DEFINITIONS: [DefinitionId; 5] = [BARRACKS, INFANTRY, TANK, HARVESTER, ARMOR];

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Data for the standard catalog.
#[must_use]
pub fn standard_catalog_data() -> CatalogData {
    CatalogData {
        definitions: vec![
            DefinitionData {
                cost: 200,
                ..DefinitionData::new("barracks", "Barracks", BuildCategory::Building)
            },
            DefinitionData {
                cost: 50,
                build_time: Some(2.0),
                ..DefinitionData::new("infantry", "Infantry", BuildCategory::Unit)
            },
            DefinitionData {
                cost: 300,
                build_time: Some(10.0),
                queue_limit: Some(3),
                ..DefinitionData::new("tank", "Tank", BuildCategory::Unit)
            },
            DefinitionData {
                cost: 100,
                build_time: Some(3.0),
                queue_limit: Some(0),
                ..DefinitionData::new("harvester", "Harvester", BuildCategory::Unit)
            },
            DefinitionData {
                cost: 400,
                build_time: Some(8.0),
                ..DefinitionData::new("armor", "Armor Plating", BuildCategory::Upgrade)
            },
        ],
    }
}

/// The standard catalog.
///
/// # Panics
///
/// Panics if the fixture data is invalid.
#[must_use]
pub fn standard_catalog() -> DefinitionCatalog {
    standard_catalog_data()
        .into_catalog()
        .expect("standard catalog fixture is valid")
}

/// A system over the standard catalog with builders `1..=builders`.
///
/// # Panics
///
/// Panics if builder registration fails.
#[must_use]
pub fn standard_system(builders: u64, config: &QueueConfig) -> BuildSystem {
    let mut system = BuildSystem::new(standard_catalog());
    for builder in 1..=builders {
        system
            .add_builder(builder, config.clone())
            .expect("fresh builder id");
    }
    system
}

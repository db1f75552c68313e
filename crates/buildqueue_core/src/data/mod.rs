//! Data structures for construction configuration.
//!
//! Pure data types deserialized from RON files. Seconds are written as
//! plain decimals here and converted to fixed-point once, when the catalog
//! is built.
//!
//! **Note:** This module contains no IO - it only parses text it is given.
//! File loading is handled by `buildqueue_tools`.

mod catalog_data;
mod definition_data;

pub use catalog_data::CatalogData;
pub use definition_data::DefinitionData;

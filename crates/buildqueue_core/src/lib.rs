//! # Build Queue Core
//!
//! Deterministic construction core for real-time strategy builders.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No wall clock (time is passed in as simulation seconds)
//! - No floating-point math (uses fixed-point)
//!
//! ## Crate Structure
//!
//! - [`definition`] - Buildable definitions and categories
//! - [`catalog`] - The definition database
//! - [`ledger`] - Global in-progress/completed counts across all builders
//! - [`queue`] - Per-builder queue: admission, progress, cancellation
//! - [`events`] - Lifecycle events and observers
//! - [`system`] - Host driver owning the ledger and every queue
//! - [`data`] - RON-facing configuration types
//! - [`math`] - Fixed-point time utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod catalog;
pub mod data;
pub mod definition;
pub mod error;
pub mod events;
pub mod ledger;
pub mod math;
pub mod queue;
pub mod system;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::catalog::DefinitionCatalog;
    pub use crate::data::{CatalogData, DefinitionData};
    pub use crate::definition::{BuildCategory, BuildableDefinition, DefinitionId};
    pub use crate::error::{BuildError, Result};
    pub use crate::events::{BuildEvent, BuildEventKind, BuildObserver, BuildStats, TracingObserver};
    pub use crate::ledger::BuildLedger;
    pub use crate::math::Fixed;
    pub use crate::queue::{
        BuildEntry, BuildQueue, BuilderId, CancelOutcome, CancelPolicy, EntryId, QueueConfig,
    };
    pub use crate::system::{BuildSystem, SubscriptionId};
}

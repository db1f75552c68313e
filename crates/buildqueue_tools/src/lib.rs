//! # Build Queue Development Tools
//!
//! Command-line tooling around the construction core:
//! - Catalog validation
//! - Scripted scenario simulation with JSON reports

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod data_loader;
pub mod scenario;
pub mod validate;

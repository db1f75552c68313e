//! Global build ledger.
//!
//! Aggregates "in progress" and "completed" counts per definition across
//! every build queue. It is the only place global limits can be checked,
//! since no single queue sees the others.
//!
//! The ledger is owned by the host (see [`BuildSystem`](crate::system::BuildSystem))
//! and lent to queue operations. Counts live in ordered maps so that
//! iteration and [`state_hash`](BuildLedger::state_hash) are deterministic.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::definition::DefinitionId;
use crate::error::{BuildError, Result};

/// Process-wide build counts per definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildLedger {
    in_progress: BTreeMap<DefinitionId, u32>,
    completed: BTreeMap<DefinitionId, u32>,
}

impl BuildLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly queued build.
    pub fn record_queued(&mut self, id: DefinitionId) {
        *self.in_progress.entry(id).or_insert(0) += 1;
    }

    /// Record a cancelled build. The in-progress count never drops below zero.
    pub fn record_cancelled(&mut self, id: DefinitionId) {
        self.decrement_in_progress(id, "cancellation");
    }

    /// Record a completed build.
    pub fn record_completed(&mut self, id: DefinitionId) {
        self.decrement_in_progress(id, "completion");
        *self.completed.entry(id).or_insert(0) += 1;
    }

    /// Number of builds of `id` currently queued or in progress.
    #[must_use]
    pub fn in_progress_count(&self, id: DefinitionId) -> u32 {
        self.in_progress.get(&id).copied().unwrap_or(0)
    }

    /// Number of builds of `id` that have completed.
    #[must_use]
    pub fn completed_count(&self, id: DefinitionId) -> u32 {
        self.completed.get(&id).copied().unwrap_or(0)
    }

    /// Completed plus in-progress builds of `id`.
    #[must_use]
    pub fn total_count(&self, id: DefinitionId) -> u32 {
        self.completed_count(id)
            .saturating_add(self.in_progress_count(id))
    }

    /// Forget every count.
    pub fn clear(&mut self) {
        self.in_progress.clear();
        self.completed.clear();
    }

    /// Hash of all counts, for determinism checks.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.in_progress.hash(&mut hasher);
        self.completed.hash(&mut hasher);
        hasher.finish()
    }

    /// Serialize the ledger for save games or replays.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| BuildError::InvalidState(format!("Failed to serialize ledger: {e}")))
    }

    /// Deserialize a ledger snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid snapshot.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| BuildError::InvalidState(format!("Failed to deserialize ledger: {e}")))
    }

    fn decrement_in_progress(&mut self, id: DefinitionId, transition: &str) {
        // Zero counts are removed so equal counts compare and hash equal.
        match self.in_progress.get_mut(&id) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                self.in_progress.remove(&id);
            }
            None => {
                // More terminal transitions than queued builds: a caller
                // reported the same entry twice.
                tracing::warn!("Ledger underflow on {transition} of {id}, clamping to zero");
            }
        }
    }
}

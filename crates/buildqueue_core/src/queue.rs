//! Per-builder build queue.
//!
//! A [`BuildQueue`] owns the ordered entries of one builder. Only the head
//! entry receives progress; everything behind it waits untouched. Admission
//! and bookkeeping go through the shared [`BuildLedger`], which the caller
//! lends to each mutating operation.
//!
//! Every state change is recorded as a [`BuildEvent`] in an internal buffer
//! that the host drains with [`BuildQueue::drain_events`].

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::DefinitionCatalog;
use crate::definition::{BuildCategory, BuildableDefinition, DefinitionId};
use crate::error::{BuildError, Result};
use crate::events::BuildEvent;
use crate::ledger::BuildLedger;
use crate::math::{progress_fraction, Fixed};

/// Identifier of the entity that owns a build queue.
pub type BuilderId = u64;

/// Identifier of an entry, unique within its queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryId(pub u64);

/// One queued or in-progress construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildEntry {
    /// Identifier within the owning queue.
    pub id: EntryId,
    /// Builder that owns this entry.
    pub owner: BuilderId,
    /// What is being built.
    pub definition: Arc<BuildableDefinition>,
    /// Simulation seconds spent on this entry.
    pub elapsed: Fixed,
    /// Progress in `[0, 1]`.
    pub progress: Fixed,
}

impl BuildEntry {
    /// Create a new entry with no progress.
    #[must_use]
    pub fn new(id: EntryId, owner: BuilderId, definition: Arc<BuildableDefinition>) -> Self {
        Self {
            id,
            owner,
            definition,
            elapsed: Fixed::ZERO,
            progress: Fixed::ZERO,
        }
    }

    /// Whether the entry has received any progress.
    #[must_use]
    pub fn has_started(&self) -> bool {
        self.elapsed > Fixed::ZERO
    }

    /// Whether the entry has reached full progress.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.progress >= Fixed::ONE
    }

    /// Get progress as a percentage (0-100).
    #[must_use]
    pub fn percentage(&self) -> u32 {
        (self.progress * 100).to_num::<u32>()
    }

    /// Advance by `delta` seconds; progress is clamped to `[0, 1]`.
    ///
    /// Returns `true` if the entry is complete afterwards.
    pub fn tick(&mut self, delta: Fixed) -> bool {
        self.elapsed = self.elapsed.saturating_add(delta);
        self.progress = progress_fraction(self.elapsed, self.definition.build_time);
        self.is_complete()
    }
}

/// Which entry a cancel request removes when the head matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CancelPolicy {
    /// Cancel the active head entry.
    CancelsActive,
    /// Cancel the most recently queued matching entry, sparing head progress.
    #[default]
    CancelsMostRecentlyQueued,
}

/// Construction-time configuration of a build queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Tie-break used by [`BuildQueue::request_cancel`].
    #[serde(default)]
    pub cancel_policy: CancelPolicy,
    /// Categories this builder offers. Empty means every category.
    #[serde(default)]
    pub permitted_categories: Vec<BuildCategory>,
    /// Explicit list of buildable definitions. Overrides the category filter
    /// when non-empty.
    #[serde(default)]
    pub allow_list: Vec<DefinitionId>,
}

impl QueueConfig {
    /// Create a config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cancel policy.
    #[must_use]
    pub fn with_cancel_policy(mut self, policy: CancelPolicy) -> Self {
        self.cancel_policy = policy;
        self
    }

    /// Restrict the builder to some categories.
    #[must_use]
    pub fn with_permitted_categories(mut self, categories: Vec<BuildCategory>) -> Self {
        self.permitted_categories = categories;
        self
    }

    /// Restrict the builder to an explicit list of definitions.
    #[must_use]
    pub fn with_allow_list(mut self, definitions: Vec<DefinitionId>) -> Self {
        self.allow_list = definitions;
        self
    }
}

/// Result of a successful [`BuildQueue::request_cancel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    /// This entry was removed.
    Cancelled(BuildEntry),
    /// The queue was already empty; nothing to do.
    QueueEmpty,
}

/// Ordered build entries for one builder.
#[derive(Debug, Clone)]
pub struct BuildQueue {
    owner: BuilderId,
    cancel_policy: CancelPolicy,
    available: BTreeMap<BuildCategory, Vec<Arc<BuildableDefinition>>>,
    entries: VecDeque<BuildEntry>,
    paused: bool,
    next_entry: u64,
    events: Vec<BuildEvent>,
}

impl BuildQueue {
    /// Create a queue for `owner`, resolving its available items from `catalog`.
    ///
    /// Allow-list ids missing from the catalog are skipped.
    #[must_use]
    pub fn new(owner: BuilderId, config: QueueConfig, catalog: &DefinitionCatalog) -> Self {
        let mut available: BTreeMap<BuildCategory, Vec<Arc<BuildableDefinition>>> =
            BTreeMap::new();

        if config.allow_list.is_empty() {
            for definition in catalog.iter() {
                if !config.permitted_categories.is_empty()
                    && !config.permitted_categories.contains(&definition.category)
                {
                    continue;
                }
                available
                    .entry(definition.category)
                    .or_default()
                    .push(Arc::clone(definition));
            }
        } else {
            for id in &config.allow_list {
                match catalog.get(*id) {
                    Some(definition) => available
                        .entry(definition.category)
                        .or_default()
                        .push(Arc::clone(definition)),
                    None => {
                        tracing::warn!("Builder {owner}: allow-list entry {id} not in catalog");
                    }
                }
            }
        }

        Self {
            owner,
            cancel_policy: config.cancel_policy,
            available,
            entries: VecDeque::new(),
            paused: false,
            next_entry: 1,
            events: Vec::new(),
        }
    }

    /// The builder that owns this queue.
    #[must_use]
    pub const fn owner(&self) -> BuilderId {
        self.owner
    }

    /// The configured cancel policy.
    #[must_use]
    pub const fn cancel_policy(&self) -> CancelPolicy {
        self.cancel_policy
    }

    /// Check every admission rule for `definition`.
    ///
    /// # Errors
    ///
    /// Returns the first rule that denies the build: builder filtering,
    /// then the ledger-wide queue limit, then the global limit.
    pub fn check_admission(
        &self,
        ledger: &BuildLedger,
        definition: &BuildableDefinition,
    ) -> Result<()> {
        self.permitted(definition)?;

        if let Some(limit) = definition.queue_limit() {
            if ledger.in_progress_count(definition.id) >= limit {
                return Err(BuildError::QueueLimitReached {
                    name: definition.key.clone(),
                    limit,
                });
            }
        }

        if let Some(limit) = definition.global_limit() {
            if ledger.total_count(definition.id) >= limit {
                return Err(BuildError::GlobalLimitReached {
                    name: definition.key.clone(),
                    limit,
                });
            }
        }

        Ok(())
    }

    /// Whether `definition` would be admitted right now.
    #[must_use]
    pub fn can_build(&self, ledger: &BuildLedger, definition: &BuildableDefinition) -> bool {
        self.check_admission(ledger, definition).is_ok()
    }

    /// Append a new entry for `definition` to the tail of the queue.
    ///
    /// # Errors
    ///
    /// Returns the admission denial without touching any state.
    pub fn request_enqueue(
        &mut self,
        ledger: &mut BuildLedger,
        definition: &BuildableDefinition,
    ) -> Result<EntryId> {
        self.check_admission(ledger, definition)?;
        let definition = Arc::clone(self.permitted(definition)?);

        let id = EntryId(self.next_entry);
        self.next_entry += 1;

        let entry = BuildEntry::new(id, self.owner, definition);
        ledger.record_queued(entry.definition.id);
        self.events.push(BuildEvent::Queued(entry.clone()));
        self.entries.push_back(entry);
        Ok(id)
    }

    /// Cancel one entry of `definition`.
    ///
    /// If the head matches, the cancel policy picks between the head and the
    /// most recently queued match. Otherwise the earliest pending match is
    /// removed. Every removal emits `Cancelled` and updates the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::NotQueued`] if the queue is non-empty but holds
    /// no entry of `definition`.
    pub fn request_cancel(
        &mut self,
        ledger: &mut BuildLedger,
        definition: DefinitionId,
    ) -> Result<CancelOutcome> {
        let Some(head) = self.entries.front() else {
            return Ok(CancelOutcome::QueueEmpty);
        };

        let matches = |entry: &BuildEntry| entry.definition.id == definition;
        let index = if matches(head) {
            match self.cancel_policy {
                CancelPolicy::CancelsActive => 0,
                CancelPolicy::CancelsMostRecentlyQueued => {
                    self.entries.iter().rposition(matches).unwrap_or(0)
                }
            }
        } else {
            self.entries
                .iter()
                .position(matches)
                .ok_or(BuildError::NotQueued(definition))?
        };

        self.cancel_at(ledger, index)
            .map(CancelOutcome::Cancelled)
            .ok_or(BuildError::NotQueued(definition))
    }

    /// Cancel a specific entry.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::EntryNotFound`] if the entry is not in this queue.
    pub fn cancel(&mut self, ledger: &mut BuildLedger, entry: EntryId) -> Result<BuildEntry> {
        let index = self
            .entries
            .iter()
            .position(|e| e.id == entry)
            .ok_or(BuildError::EntryNotFound(entry))?;
        self.cancel_at(ledger, index)
            .ok_or(BuildError::EntryNotFound(entry))
    }

    /// Cancel every entry, tail first so the head is the last to go.
    ///
    /// Returns the number of entries cancelled.
    pub fn cancel_all(&mut self, ledger: &mut BuildLedger) -> usize {
        let mut cancelled = 0;
        while let Some(index) = self.entries.len().checked_sub(1) {
            if self.cancel_at(ledger, index).is_some() {
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Advance the head entry by `delta` seconds.
    ///
    /// Emits `Started` before the first progress, then `Ticked`. On reaching
    /// full progress the entry is recorded as completed, `Completed` is
    /// emitted and the entry is removed. At most one entry progresses per
    /// call; the next head waits for the next tick.
    ///
    /// Paused queues and non-positive deltas are ignored.
    ///
    /// Returns the completed entry, if any.
    pub fn advance(&mut self, ledger: &mut BuildLedger, delta: Fixed) -> Option<BuildEntry> {
        if self.paused || delta <= Fixed::ZERO {
            return None;
        }

        let head = self.entries.front_mut()?;
        if !head.has_started() {
            self.events.push(BuildEvent::Started(head.clone()));
        }

        let finished = head.tick(delta);
        self.events.push(BuildEvent::Ticked(head.clone()));

        if !finished {
            return None;
        }

        let completed = self.entries.pop_front()?;
        ledger.record_completed(completed.definition.id);
        self.events.push(BuildEvent::Completed(completed.clone()));
        Some(completed)
    }

    /// Withhold progress until [`resume`](Self::resume).
    pub fn pause(&mut self) {
        if self.paused {
            return;
        }
        self.paused = true;
        if let Some(head) = self.entries.front() {
            self.events.push(BuildEvent::Paused(head.clone()));
        }
    }

    /// Allow progress again.
    pub fn resume(&mut self) {
        if !self.paused {
            return;
        }
        self.paused = false;
        if let Some(head) = self.entries.front() {
            self.events.push(BuildEvent::Resumed(head.clone()));
        }
    }

    /// Whether the queue is paused.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Definitions offered for `category`, `None` if the builder offers none.
    #[must_use]
    pub fn available_items(&self, category: BuildCategory) -> Option<&[Arc<BuildableDefinition>]> {
        self.available.get(&category).map(Vec::as_slice)
    }

    /// Categories with at least one offered definition, in display order.
    pub fn available_categories(&self) -> impl Iterator<Item = BuildCategory> + '_ {
        self.available.keys().copied().filter(|c| c.is_set())
    }

    /// Number of entries of `definition` in this queue, head included.
    #[must_use]
    pub fn queued_count(&self, definition: DefinitionId) -> usize {
        self.entries
            .iter()
            .filter(|e| e.definition.id == definition)
            .count()
    }

    /// The active entry.
    #[must_use]
    pub fn head(&self) -> Option<&BuildEntry> {
        self.entries.front()
    }

    /// All entries in queue order.
    pub fn entries(&self) -> impl Iterator<Item = &BuildEntry> {
        self.entries.iter()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Take every buffered event in emission order.
    pub fn drain_events(&mut self) -> std::vec::Drain<'_, BuildEvent> {
        self.events.drain(..)
    }

    /// Number of buffered events.
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    fn permitted(&self, definition: &BuildableDefinition) -> Result<&Arc<BuildableDefinition>> {
        let offered = self
            .available
            .get(&definition.category)
            .ok_or(BuildError::CategoryNotPermitted(definition.category))?;
        offered
            .iter()
            .find(|d| d.id == definition.id)
            .ok_or_else(|| BuildError::NotPermitted(definition.key.clone()))
    }

    fn cancel_at(&mut self, ledger: &mut BuildLedger, index: usize) -> Option<BuildEntry> {
        let entry = self.entries.remove(index)?;
        ledger.record_cancelled(entry.definition.id);
        self.events.push(BuildEvent::Cancelled(entry.clone()));
        Some(entry)
    }
}

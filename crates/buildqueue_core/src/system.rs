//! Host-side driver for every build queue.
//!
//! [`BuildSystem`] owns the definition catalog, the global ledger and one
//! [`BuildQueue`] per builder. The simulation loop calls [`BuildSystem::tick`]
//! once per tick with the elapsed simulation time, then
//! [`BuildSystem::flush_events`] to fan events out to observers.
//!
//! Queues are kept in builder-id order so ticks and event delivery are
//! deterministic.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::catalog::DefinitionCatalog;
use crate::definition::{BuildableDefinition, DefinitionId};
use crate::error::{BuildError, Result};
use crate::events::{BuildEvent, BuildObserver};
use crate::ledger::BuildLedger;
use crate::math::Fixed;
use crate::queue::{BuildEntry, BuildQueue, BuilderId, CancelOutcome, EntryId, QueueConfig};

/// Handle returned by [`BuildSystem::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

/// Owner of the ledger and all build queues.
pub struct BuildSystem {
    catalog: Arc<DefinitionCatalog>,
    ledger: BuildLedger,
    queues: BTreeMap<BuilderId, BuildQueue>,
    observers: Vec<(SubscriptionId, Box<dyn BuildObserver>)>,
    next_subscription: u64,
    tick: u64,
}

impl BuildSystem {
    /// Create a system with an empty ledger.
    #[must_use]
    pub fn new(catalog: DefinitionCatalog) -> Self {
        Self::with_ledger(catalog, BuildLedger::new())
    }

    /// Create a system resuming from a saved ledger.
    #[must_use]
    pub fn with_ledger(catalog: DefinitionCatalog, ledger: BuildLedger) -> Self {
        Self {
            catalog: Arc::new(catalog),
            ledger,
            queues: BTreeMap::new(),
            observers: Vec::new(),
            next_subscription: 1,
            tick: 0,
        }
    }

    /// The definition catalog.
    #[must_use]
    pub fn catalog(&self) -> &DefinitionCatalog {
        &self.catalog
    }

    /// The global ledger.
    #[must_use]
    pub fn ledger(&self) -> &BuildLedger {
        &self.ledger
    }

    /// Number of ticks processed so far.
    #[must_use]
    pub const fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Register a builder.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::DuplicateBuilder`] if `builder` is already registered.
    pub fn add_builder(&mut self, builder: BuilderId, config: QueueConfig) -> Result<()> {
        if self.queues.contains_key(&builder) {
            return Err(BuildError::DuplicateBuilder(builder));
        }
        let queue = BuildQueue::new(builder, config, &self.catalog);
        self.queues.insert(builder, queue);
        tracing::debug!("Registered builder {builder}");
        Ok(())
    }

    /// Unregister a builder, cancelling whatever it still had queued.
    ///
    /// The queue's unflushed events, including the final `Cancelled` ones,
    /// are delivered to observers before the queue is handed back empty.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnknownBuilder`] if `builder` is not registered.
    pub fn remove_builder(&mut self, builder: BuilderId) -> Result<BuildQueue> {
        let mut queue = self
            .queues
            .remove(&builder)
            .ok_or(BuildError::UnknownBuilder(builder))?;
        let cancelled = queue.cancel_all(&mut self.ledger);
        tracing::debug!("Removed builder {builder}, cancelled {cancelled} builds");

        let events: Vec<BuildEvent> = queue.drain_events().collect();
        self.dispatch(&events);
        Ok(queue)
    }

    /// Get a builder's queue.
    #[must_use]
    pub fn queue(&self, builder: BuilderId) -> Option<&BuildQueue> {
        self.queues.get(&builder)
    }

    /// All builder ids in order.
    pub fn builders(&self) -> impl Iterator<Item = BuilderId> + '_ {
        self.queues.keys().copied()
    }

    /// Whether `builder` could start building `definition` now.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown builders or definitions, or the admission denial.
    pub fn check_admission(&self, builder: BuilderId, definition: DefinitionId) -> Result<()> {
        let definition = self.definition(definition)?;
        self.queues
            .get(&builder)
            .ok_or(BuildError::UnknownBuilder(builder))?
            .check_admission(&self.ledger, &definition)
    }

    /// Queue `definition` on `builder`.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown builders or definitions, or the admission denial.
    pub fn enqueue(&mut self, builder: BuilderId, definition: DefinitionId) -> Result<EntryId> {
        let definition = self.definition(definition)?;
        let queue = self
            .queues
            .get_mut(&builder)
            .ok_or(BuildError::UnknownBuilder(builder))?;
        queue
            .request_enqueue(&mut self.ledger, &definition)
            .map_err(|e| {
                tracing::debug!("Builder {builder} refused {}: {e}", definition.key);
                e
            })
    }

    /// Cancel one build of `definition` on `builder` using its cancel policy.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown builders, or [`BuildError::NotQueued`].
    pub fn cancel(&mut self, builder: BuilderId, definition: DefinitionId) -> Result<CancelOutcome> {
        let queue = self
            .queues
            .get_mut(&builder)
            .ok_or(BuildError::UnknownBuilder(builder))?;
        queue.request_cancel(&mut self.ledger, definition)
    }

    /// Cancel one specific entry on `builder`.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown builders, or [`BuildError::EntryNotFound`].
    pub fn cancel_entry(&mut self, builder: BuilderId, entry: EntryId) -> Result<BuildEntry> {
        let queue = self
            .queues
            .get_mut(&builder)
            .ok_or(BuildError::UnknownBuilder(builder))?;
        queue.cancel(&mut self.ledger, entry)
    }

    /// Pause `builder`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnknownBuilder`] if `builder` is not registered.
    pub fn pause(&mut self, builder: BuilderId) -> Result<()> {
        self.queue_mut(builder)?.pause();
        Ok(())
    }

    /// Resume `builder`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnknownBuilder`] if `builder` is not registered.
    pub fn resume(&mut self, builder: BuilderId) -> Result<()> {
        self.queue_mut(builder)?.resume();
        Ok(())
    }

    /// Advance every non-paused queue by `delta` seconds of simulation time.
    ///
    /// Returns the entries completed during this tick, in builder order.
    pub fn tick(&mut self, delta: Fixed) -> Vec<BuildEntry> {
        self.tick += 1;
        let mut completed = Vec::new();

        for queue in self.queues.values_mut() {
            if queue.is_paused() {
                continue;
            }
            if let Some(entry) = queue.advance(&mut self.ledger, delta) {
                completed.push(entry);
            }
        }

        if !completed.is_empty() {
            tracing::debug!("Tick {}: {} builds completed", self.tick, completed.len());
        }
        completed
    }

    /// Drain all queues' events, deliver them to every observer and return
    /// them.
    ///
    /// Events are grouped by builder id in ascending order. Within one
    /// builder they keep emission order, but calls that touched several
    /// builders between flushes are not interleaved chronologically. Flush
    /// after each command when cross-builder order matters.
    pub fn flush_events(&mut self) -> Vec<BuildEvent> {
        let events: Vec<BuildEvent> = self
            .queues
            .values_mut()
            .flat_map(|queue| queue.drain_events().collect::<Vec<_>>())
            .collect();

        self.dispatch(&events);
        events
    }

    fn dispatch(&mut self, events: &[BuildEvent]) {
        for event in events {
            for (_, observer) in &mut self.observers {
                observer.on_build_event(event);
            }
        }
    }

    /// Add an observer for every future flushed event.
    pub fn subscribe(&mut self, observer: Box<dyn BuildObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, observer));
        id
    }

    /// Remove an observer. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sub, _)| *sub != id);
        self.observers.len() != before
    }

    /// Hash of the ledger and every queue's contents.
    ///
    /// Two systems fed the same operations produce the same hash.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.ledger.state_hash().hash(&mut hasher);
        for (builder, queue) in &self.queues {
            builder.hash(&mut hasher);
            queue.is_paused().hash(&mut hasher);
            for entry in queue.entries() {
                entry.id.hash(&mut hasher);
                entry.definition.id.hash(&mut hasher);
                entry.progress.to_bits().hash(&mut hasher);
            }
        }
        hasher.finish()
    }

    fn definition(&self, id: DefinitionId) -> Result<Arc<BuildableDefinition>> {
        self.catalog
            .get(id)
            .cloned()
            .ok_or(BuildError::UnknownDefinition(id))
    }

    fn queue_mut(&mut self, builder: BuilderId) -> Result<&mut BuildQueue> {
        self.queues
            .get_mut(&builder)
            .ok_or(BuildError::UnknownBuilder(builder))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::definition::BuildCategory;
    use crate::events::{BuildEventKind, BuildStats};

    const BARRACKS: DefinitionId = DefinitionId(1);
    const INFANTRY: DefinitionId = DefinitionId(2);

    fn create_test_system() -> BuildSystem {
        let mut catalog = DefinitionCatalog::new();
        catalog
            .register(BuildableDefinition::new(
                BARRACKS,
                "barracks",
                BuildCategory::Building,
            ))
            .unwrap();
        catalog
            .register(
                BuildableDefinition::new(INFANTRY, "infantry", BuildCategory::Unit)
                    .with_build_time(Fixed::from_num(2)),
            )
            .unwrap();

        let mut system = BuildSystem::new(catalog);
        system.add_builder(1, QueueConfig::new()).unwrap();
        system.add_builder(2, QueueConfig::new()).unwrap();
        system
    }

    #[test]
    fn test_duplicate_and_unknown_builders() {
        let mut system = create_test_system();

        assert_eq!(
            system.add_builder(1, QueueConfig::new()),
            Err(BuildError::DuplicateBuilder(1))
        );
        assert_eq!(
            system.enqueue(9, INFANTRY),
            Err(BuildError::UnknownBuilder(9))
        );
        assert_eq!(system.pause(9), Err(BuildError::UnknownBuilder(9)));
        assert_eq!(
            system.enqueue(1, DefinitionId(77)),
            Err(BuildError::UnknownDefinition(DefinitionId(77)))
        );
        assert_eq!(system.builders().collect::<Vec<_>>(), [1, 2]);
    }

    #[test]
    fn test_queue_limit_shared_between_builders() {
        let mut system = create_test_system();

        assert!(system.enqueue(1, BARRACKS).is_ok());
        assert!(matches!(
            system.check_admission(2, BARRACKS),
            Err(BuildError::QueueLimitReached { .. })
        ));
        assert!(system.enqueue(2, BARRACKS).is_err());
        assert_eq!(system.ledger().in_progress_count(BARRACKS), 1);
    }

    #[test]
    fn test_tick_skips_paused_builders() {
        let mut system = create_test_system();
        system.enqueue(1, INFANTRY).unwrap();
        system.enqueue(2, INFANTRY).unwrap();
        system.pause(2).unwrap();

        let completed = system.tick(Fixed::from_num(2));

        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].owner, 1);
        assert_eq!(system.queue(2).unwrap().head().unwrap().progress, Fixed::ZERO);
        assert_eq!(system.ledger().completed_count(INFANTRY), 1);
        assert_eq!(system.ledger().in_progress_count(INFANTRY), 1);
        assert_eq!(system.current_tick(), 1);
    }

    #[test]
    fn test_flush_events_in_builder_order() {
        let mut system = create_test_system();
        system.enqueue(2, INFANTRY).unwrap();
        system.enqueue(1, INFANTRY).unwrap();
        system.pause(2).unwrap();

        let events: Vec<_> = system
            .flush_events()
            .iter()
            .map(|e| (e.entry().owner, e.kind()))
            .collect();
        // Grouped by builder, emission order kept within each builder.
        assert_eq!(
            events,
            [
                (1, BuildEventKind::Queued),
                (2, BuildEventKind::Queued),
                (2, BuildEventKind::Paused),
            ]
        );
        assert!(system.flush_events().is_empty());
    }

    #[test]
    fn test_observers_receive_events() {
        let mut system = create_test_system();
        let stats = Rc::new(RefCell::new(BuildStats::new()));
        let sub = system.subscribe(Box::new(Rc::clone(&stats)));

        system.enqueue(1, INFANTRY).unwrap();
        system.tick(Fixed::from_num(2));
        system.flush_events();

        assert_eq!(stats.borrow().count(BuildEventKind::Queued), 1);
        assert_eq!(stats.borrow().count(BuildEventKind::Started), 1);
        assert_eq!(stats.borrow().count(BuildEventKind::Completed), 1);

        assert!(system.unsubscribe(sub));
        assert!(!system.unsubscribe(sub));

        system.enqueue(1, INFANTRY).unwrap();
        system.flush_events();
        assert_eq!(stats.borrow().count(BuildEventKind::Queued), 1);
    }

    #[test]
    fn test_remove_builder_cancels_outstanding() {
        let mut system = create_test_system();
        system.enqueue(1, INFANTRY).unwrap();
        system.enqueue(1, INFANTRY).unwrap();
        system.flush_events();
        let stats = Rc::new(RefCell::new(BuildStats::new()));
        system.subscribe(Box::new(Rc::clone(&stats)));
        system.enqueue(1, INFANTRY).unwrap();

        let mut queue = system.remove_builder(1).unwrap();

        assert!(queue.is_empty());
        assert_eq!(queue.drain_events().count(), 0);
        assert_eq!(system.ledger().in_progress_count(INFANTRY), 0);
        // The unflushed `Queued` reaches observers along with every `Cancelled`.
        assert_eq!(stats.borrow().count(BuildEventKind::Queued), 1);
        assert_eq!(stats.borrow().count(BuildEventKind::Cancelled), 3);
        assert!(system.flush_events().is_empty());
        assert!(system.queue(1).is_none());
        assert!(matches!(
            system.remove_builder(1),
            Err(BuildError::UnknownBuilder(1))
        ));
    }

    #[test]
    fn test_cancel_through_system() {
        let mut system = create_test_system();
        let entry = system.enqueue(1, INFANTRY).unwrap();

        assert_eq!(
            system.cancel(1, BARRACKS),
            Err(BuildError::NotQueued(BARRACKS))
        );
        assert!(matches!(
            system.cancel(1, INFANTRY),
            Ok(CancelOutcome::Cancelled(ref e)) if e.id == entry
        ));
        assert_eq!(system.cancel(1, INFANTRY), Ok(CancelOutcome::QueueEmpty));

        let second = system.enqueue(1, INFANTRY).unwrap();
        assert_eq!(system.cancel_entry(1, second).unwrap().id, second);
    }

    #[test]
    fn test_resume_from_saved_ledger() {
        let mut system = create_test_system();
        system.enqueue(1, BARRACKS).unwrap();
        system.tick(Fixed::from_num(5));
        let saved = system.ledger().serialize().unwrap();

        let restored = BuildLedger::deserialize(&saved).unwrap();
        let resumed = BuildSystem::with_ledger(system.catalog().clone(), restored);

        assert_eq!(resumed.ledger().completed_count(BARRACKS), 1);
        assert_eq!(resumed.ledger(), system.ledger());
    }

    #[test]
    fn test_state_hash_tracks_progress() {
        let mut a = create_test_system();
        let mut b = create_test_system();
        a.enqueue(1, INFANTRY).unwrap();
        b.enqueue(1, INFANTRY).unwrap();
        assert_eq!(a.state_hash(), b.state_hash());

        a.tick(Fixed::from_num(1));
        assert_ne!(a.state_hash(), b.state_hash());

        b.tick(Fixed::from_num(1));
        assert_eq!(a.state_hash(), b.state_hash());
    }
}

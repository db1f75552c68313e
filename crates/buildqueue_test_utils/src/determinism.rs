//! Determinism testing utilities.
//!
//! Provides a harness for verifying that build systems produce identical
//! results given identical operations.
//!
//! # Testing Strategy
//!
//! Build progress feeds lockstep simulations, so queues must be fully
//! deterministic. Sources of non-determinism include:
//!
//! - **Floating-point math**: progress and build time use
//!   [`buildqueue_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: queues and ledger counts are kept in
//!   `BTreeMap`s and visited in id order.
//!
//! Operations are described by [`QueueOp`] so proptest can generate whole
//! sessions and replay them.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use buildqueue_core::definition::DefinitionId;
use buildqueue_core::events::BuildEvent;
use buildqueue_core::math::Fixed;
use buildqueue_core::queue::BuilderId;
use buildqueue_core::system::BuildSystem;

/// One host-side operation on a [`BuildSystem`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueOp {
    /// Queue a definition on a builder.
    Enqueue(BuilderId, DefinitionId),
    /// Cancel a definition on a builder.
    Cancel(BuilderId, DefinitionId),
    /// Pause a builder.
    Pause(BuilderId),
    /// Resume a builder.
    Resume(BuilderId),
    /// Advance every queue by this many seconds.
    Tick(Fixed),
}

/// Apply one operation, ignoring admission denials and missing entries.
pub fn apply_op(system: &mut BuildSystem, op: &QueueOp) {
    let outcome = match *op {
        QueueOp::Enqueue(builder, definition) => system.enqueue(builder, definition).map(drop),
        QueueOp::Cancel(builder, definition) => system.cancel(builder, definition).map(drop),
        QueueOp::Pause(builder) => system.pause(builder),
        QueueOp::Resume(builder) => system.resume(builder),
        QueueOp::Tick(delta) => {
            system.tick(delta);
            Ok(())
        }
    };
    if let Err(e) = outcome {
        tracing::trace!("{op:?} refused: {e}");
    }
}

/// Hash an event stream by kind, entry and progress.
#[must_use]
pub fn events_hash(events: &[BuildEvent]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for event in events {
        let entry = event.entry();
        event.kind().hash(&mut hasher);
        entry.id.hash(&mut hasher);
        entry.owner.hash(&mut hasher);
        entry.definition.id.hash(&mut hasher);
        entry.progress.to_bits().hash(&mut hasher);
    }
    hasher.finish()
}

/// Fingerprint of one replayed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayRun {
    /// [`BuildSystem::state_hash`] after the last operation.
    pub state_hash: u64,
    /// [`events_hash`] of every flushed event, in flush order.
    pub events_hash: u64,
    /// Number of events flushed over the session.
    pub event_count: usize,
}

impl ReplayRun {
    /// Single hash covering both state and events.
    #[must_use]
    pub fn combined_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.state_hash.hash(&mut hasher);
        self.events_hash.hash(&mut hasher);
        hasher.finish()
    }
}

/// Outcome of replaying one session several times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayCheck {
    /// One fingerprint per run, in run order.
    pub runs: Vec<ReplayRun>,
    /// Operations applied per run.
    pub operations: usize,
}

impl ReplayCheck {
    /// Whether every run matched the first.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.first_mismatch().is_none()
    }

    /// Index of the first run whose fingerprint differs from run 0.
    #[must_use]
    pub fn first_mismatch(&self) -> Option<usize> {
        let first = self.runs.first()?;
        self.runs.iter().position(|run| run != first)
    }
}

/// Apply `ops` to `system`, flushing after each one, and fingerprint the
/// result.
pub fn run_session(system: &mut BuildSystem, ops: &[QueueOp]) -> ReplayRun {
    let mut events = Vec::new();
    for op in ops {
        apply_op(system, op);
        events.extend(system.flush_events());
    }

    ReplayRun {
        state_hash: system.state_hash(),
        events_hash: events_hash(&events),
        event_count: events.len(),
    }
}

/// Replay `ops` on `runs` fresh systems and compare their fingerprints.
pub fn verify_replay<F>(runs: usize, setup: F, ops: &[QueueOp]) -> ReplayCheck
where
    F: Fn() -> BuildSystem,
{
    let runs = (0..runs).map(|_| run_session(&mut setup(), ops)).collect();
    ReplayCheck {
        runs,
        operations: ops.len(),
    }
}

/// Replay `ops` on two systems side by side, returning the number of
/// operations applied when their state or flushed events first differ.
///
/// `Some(0)` means the two fresh systems already differ.
pub fn find_first_divergence<F>(setup: F, ops: &[QueueOp]) -> Option<usize>
where
    F: Fn() -> BuildSystem,
{
    let mut a = setup();
    let mut b = setup();

    if a.state_hash() != b.state_hash() {
        return Some(0);
    }

    for (index, op) in ops.iter().enumerate() {
        apply_op(&mut a, op);
        apply_op(&mut b, op);
        let events_a = events_hash(&a.flush_events());
        let events_b = events_hash(&b.flush_events());
        if a.state_hash() != b.state_hash() || events_a != events_b {
            return Some(index + 1);
        }
    }

    None
}

/// Proptest strategies for build queue sessions.
pub mod strategies {
    use proptest::prelude::*;

    use super::QueueOp;
    use crate::fixtures::ALL_DEFINITIONS;
    use buildqueue_core::definition::DefinitionId;
    use buildqueue_core::math::Fixed;
    use buildqueue_core::queue::BuilderId;

    /// A builder id in `1..=builders`.
    pub fn arb_builder(builders: u64) -> impl Strategy<Value = BuilderId> {
        1..=builders
    }

    /// Any definition from the standard catalog.
    pub fn arb_definition() -> impl Strategy<Value = DefinitionId> {
        proptest::sample::select(ALL_DEFINITIONS.to_vec())
    }

    /// A tick length between 1/60 s and 4 s, in sixtieths.
    pub fn arb_delta() -> impl Strategy<Value = Fixed> {
        (1i32..=240).prop_map(|sixtieths| Fixed::from_num(sixtieths) / 60)
    }

    /// One operation, weighted toward enqueues and ticks.
    pub fn arb_op(builders: u64) -> impl Strategy<Value = QueueOp> {
        prop_oneof![
            4 => (arb_builder(builders), arb_definition())
                .prop_map(|(b, d)| QueueOp::Enqueue(b, d)),
            2 => (arb_builder(builders), arb_definition())
                .prop_map(|(b, d)| QueueOp::Cancel(b, d)),
            1 => arb_builder(builders).prop_map(QueueOp::Pause),
            1 => arb_builder(builders).prop_map(QueueOp::Resume),
            4 => arb_delta().prop_map(QueueOp::Tick),
        ]
    }

    /// A session of up to `max_len` operations.
    pub fn arb_session(builders: u64, max_len: usize) -> impl Strategy<Value = Vec<QueueOp>> {
        proptest::collection::vec(arb_op(builders), 0..max_len)
    }
}

//! Lifecycle events emitted by build queues.
//!
//! For a given entry, events arrive in the order
//! `Queued -> [Started] -> Ticked* -> (Completed | Cancelled)`, with
//! `Paused`/`Resumed` interleaved while it is the head of a paused queue.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::queue::BuildEntry;

/// A lifecycle notification carrying a snapshot of the entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
    /// Entry appended to the tail of a queue.
    Queued(BuildEntry),
    /// Head entry is about to receive its first progress.
    Started(BuildEntry),
    /// Queue paused while this entry was the head.
    Paused(BuildEntry),
    /// Queue resumed while this entry was the head.
    Resumed(BuildEntry),
    /// Entry removed before completion.
    Cancelled(BuildEntry),
    /// Head entry received progress.
    Ticked(BuildEntry),
    /// Head entry reached full progress and was removed.
    Completed(BuildEntry),
}

impl BuildEvent {
    /// The kind of this event.
    #[must_use]
    pub const fn kind(&self) -> BuildEventKind {
        match self {
            Self::Queued(_) => BuildEventKind::Queued,
            Self::Started(_) => BuildEventKind::Started,
            Self::Paused(_) => BuildEventKind::Paused,
            Self::Resumed(_) => BuildEventKind::Resumed,
            Self::Cancelled(_) => BuildEventKind::Cancelled,
            Self::Ticked(_) => BuildEventKind::Ticked,
            Self::Completed(_) => BuildEventKind::Completed,
        }
    }

    /// The entry snapshot this event carries.
    #[must_use]
    pub const fn entry(&self) -> &BuildEntry {
        match self {
            Self::Queued(entry)
            | Self::Started(entry)
            | Self::Paused(entry)
            | Self::Resumed(entry)
            | Self::Cancelled(entry)
            | Self::Ticked(entry)
            | Self::Completed(entry) => entry,
        }
    }

    /// Whether the entry no longer exists after this event.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled(_) | Self::Completed(_))
    }
}

/// Discriminant of [`BuildEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BuildEventKind {
    /// See [`BuildEvent::Queued`].
    Queued,
    /// See [`BuildEvent::Started`].
    Started,
    /// See [`BuildEvent::Paused`].
    Paused,
    /// See [`BuildEvent::Resumed`].
    Resumed,
    /// See [`BuildEvent::Cancelled`].
    Cancelled,
    /// See [`BuildEvent::Ticked`].
    Ticked,
    /// See [`BuildEvent::Completed`].
    Completed,
}

impl fmt::Display for BuildEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Queued => "Queued",
            Self::Started => "Started",
            Self::Paused => "Paused",
            Self::Resumed => "Resumed",
            Self::Cancelled => "Cancelled",
            Self::Ticked => "Ticked",
            Self::Completed => "Completed",
        };
        f.write_str(label)
    }
}

/// Subscriber for build lifecycle events (UI panels, telemetry).
pub trait BuildObserver {
    /// Called once per event, in emission order.
    fn on_build_event(&mut self, event: &BuildEvent);
}

/// Shared observers stay readable by whoever subscribed them.
impl<T: BuildObserver> BuildObserver for Rc<RefCell<T>> {
    fn on_build_event(&mut self, event: &BuildEvent) {
        self.borrow_mut().on_build_event(event);
    }
}

/// Logs every event at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl BuildObserver for TracingObserver {
    fn on_build_event(&mut self, event: &BuildEvent) {
        let entry = event.entry();
        tracing::debug!(
            "{} build of {} on builder {} ({}%)",
            event.kind(),
            entry.definition.name,
            entry.owner,
            entry.percentage()
        );
    }
}

/// Counts events per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    counts: BTreeMap<BuildEventKind, u64>,
}

impl BuildStats {
    /// Create empty stats.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events seen of `kind`.
    #[must_use]
    pub fn count(&self, kind: BuildEventKind) -> u64 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    /// Number of events seen in total.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Per-kind counts in kind order.
    pub fn iter(&self) -> impl Iterator<Item = (BuildEventKind, u64)> + '_ {
        self.counts.iter().map(|(kind, count)| (*kind, *count))
    }
}

impl BuildObserver for BuildStats {
    fn on_build_event(&mut self, event: &BuildEvent) {
        *self.counts.entry(event.kind()).or_insert(0) += 1;
    }
}

//! Scripted build scenarios.
//!
//! A scenario names a catalog, a set of builders and a list of steps. The
//! runner replays the steps against a fresh [`BuildSystem`] and produces a
//! [`ScenarioReport`] covering every step outcome, every event and the
//! final ledger.
//!
//! # Example RON
//!
//! ```ron
//! Scenario(
//!     name: "Barracks rush",
//!     catalog: File("../catalog.ron"),
//!     builders: [
//!         BuilderSetup(id: 1, permitted_categories: [Building]),
//!     ],
//!     steps: [
//!         Enqueue(builder: 1, item: "barracks"),
//!         Tick(seconds: 1.0, repeat: 5),
//!     ],
//! )
//! ```

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::rc::Rc;

use buildqueue_core::catalog::DefinitionCatalog;
use buildqueue_core::data::CatalogData;
use buildqueue_core::definition::{BuildCategory, DefinitionId};
use buildqueue_core::error::BuildError;
use buildqueue_core::events::{BuildEvent, BuildStats, TracingObserver};
use buildqueue_core::math::{seconds, Fixed};
use buildqueue_core::queue::{BuilderId, CancelPolicy, QueueConfig};
use buildqueue_core::system::BuildSystem;
use serde::{Deserialize, Serialize};

use crate::data_loader::{load_catalog, ToolError, ToolResult};

/// Where a scenario's catalog comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CatalogSource {
    /// Definitions written directly in the scenario.
    Inline(CatalogData),
    /// Path to a catalog file, relative to the scenario file.
    File(String),
}

/// One builder taking part in a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuilderSetup {
    /// Builder id.
    pub id: BuilderId,
    /// Cancel tie-break.
    #[serde(default)]
    pub cancel_policy: CancelPolicy,
    /// Categories offered. Empty means all.
    #[serde(default)]
    pub permitted_categories: Vec<BuildCategory>,
    /// Definition keys offered, overriding the categories when non-empty.
    #[serde(default)]
    pub allow_list: Vec<String>,
}

/// One scripted host action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Step {
    /// Request a build.
    Enqueue {
        /// Builder id.
        builder: BuilderId,
        /// Definition key.
        item: String,
    },
    /// Cancel a build by definition using the builder's policy.
    Cancel {
        /// Builder id.
        builder: BuilderId,
        /// Definition key.
        item: String,
    },
    /// Cancel whatever is at the head of the queue.
    CancelHead {
        /// Builder id.
        builder: BuilderId,
    },
    /// Pause a builder.
    Pause {
        /// Builder id.
        builder: BuilderId,
    },
    /// Resume a builder.
    Resume {
        /// Builder id.
        builder: BuilderId,
    },
    /// Advance simulation time.
    Tick {
        /// Seconds per tick.
        seconds: f64,
        /// Number of ticks.
        #[serde(default = "one")]
        repeat: u32,
    },
}

fn one() -> u32 {
    1
}

/// A complete scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Catalog to build from.
    pub catalog: CatalogSource,
    /// Builders, registered in order.
    pub builders: Vec<BuilderSetup>,
    /// Steps, applied in order.
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Load from a RON string (useful for embedded scenarios).
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Parse`] if the text is not a valid scenario.
    pub fn from_ron_str(ron: &str) -> ToolResult<Self> {
        ron::from_str(ron).map_err(|source| ToolError::Parse {
            path: "<inline>".to_string(),
            source,
        })
    }

    /// Resolve the catalog, reading `File` sources relative to `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded or built.
    pub fn load_catalog(&self, base_dir: &Path) -> ToolResult<DefinitionCatalog> {
        let data = match &self.catalog {
            CatalogSource::Inline(data) => data.clone(),
            CatalogSource::File(path) => load_catalog(&base_dir.join(path))?,
        };

        let errors = data.validate();
        if !errors.is_empty() {
            return Err(ToolError::Validation {
                path: self.name.clone(),
                errors,
            });
        }
        Ok(data.into_catalog()?)
    }
}

/// What happened to one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    /// Index into the scenario's steps.
    pub index: usize,
    /// Debug rendering of the step.
    pub step: String,
    /// `None` on success, otherwise why the core refused it.
    pub refused: Option<String>,
}

/// One event as recorded in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// System tick at which the event was flushed.
    pub tick: u64,
    /// Event kind.
    pub kind: String,
    /// Owning builder.
    pub builder: BuilderId,
    /// Entry id within the builder's queue.
    pub entry: u64,
    /// Definition key.
    pub item: String,
    /// Progress percentage.
    pub progress: u32,
}

/// Final ledger counts for one definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    /// Definition key.
    pub item: String,
    /// Entries still queued anywhere.
    pub in_progress: u32,
    /// Entries completed so far.
    pub completed: u32,
}

/// Outcome of running a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Scenario name.
    pub name: String,
    /// Ticks simulated.
    pub ticks: u64,
    /// Per-step outcomes.
    pub steps: Vec<StepReport>,
    /// Every event in emission order.
    pub events: Vec<EventRecord>,
    /// Event totals by kind.
    pub event_counts: BTreeMap<String, u64>,
    /// Final ledger for every definition that was touched.
    pub ledger: Vec<LedgerRow>,
    /// Final state hash, for comparing runs.
    pub state_hash: u64,
}

impl ScenarioReport {
    /// Pretty JSON encoding.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Report`] if encoding fails.
    pub fn to_json(&self) -> ToolResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Short human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let refused = self.steps.iter().filter(|s| s.refused.is_some()).count();
        let mut out = format!(
            "Scenario '{}': {} steps ({} refused), {} ticks, {} events\n",
            self.name,
            self.steps.len(),
            refused,
            self.ticks,
            self.events.len()
        );
        for step in self.steps.iter().filter(|s| s.refused.is_some()) {
            out.push_str(&format!(
                "  step {}: {} refused: {}\n",
                step.index,
                step.step,
                step.refused.as_deref().unwrap_or_default()
            ));
        }
        for row in &self.ledger {
            out.push_str(&format!(
                "  {:<16} in progress {:>3}  completed {:>3}\n",
                row.item, row.in_progress, row.completed
            ));
        }
        out
    }
}

/// Run `scenario`, resolving a file catalog relative to `base_dir`.
///
/// Refused steps are recorded in the report; only setup problems are errors.
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded, a builder is invalid, a
/// key is unknown, or a tick length is not a positive number.
pub fn run_scenario(scenario: &Scenario, base_dir: &Path) -> ToolResult<ScenarioReport> {
    let catalog = scenario.load_catalog(base_dir)?;
    let mut system = BuildSystem::new(catalog);

    for setup in &scenario.builders {
        let allow_list = setup
            .allow_list
            .iter()
            .map(|key| resolve(&system, key))
            .collect::<ToolResult<Vec<_>>>()?;
        let config = QueueConfig::new()
            .with_cancel_policy(setup.cancel_policy)
            .with_permitted_categories(setup.permitted_categories.clone())
            .with_allow_list(allow_list);
        system.add_builder(setup.id, config)?;
    }

    system.subscribe(Box::new(TracingObserver));
    let stats = Rc::new(RefCell::new(BuildStats::new()));
    system.subscribe(Box::new(Rc::clone(&stats)));

    tracing::info!(
        "Running scenario '{}' with {} builders",
        scenario.name,
        scenario.builders.len()
    );

    let mut steps = Vec::with_capacity(scenario.steps.len());
    let mut events = Vec::new();

    for (index, step) in scenario.steps.iter().enumerate() {
        let refused = apply_step(&mut system, step, &mut events)?;
        if let Some(reason) = &refused {
            tracing::debug!("Step {index} refused: {reason}");
        }
        steps.push(StepReport {
            index,
            step: format!("{step:?}"),
            refused,
        });
    }

    let touched: BTreeSet<DefinitionId> = events
        .iter()
        .map(|(_, e)| e.entry().definition.id)
        .collect();
    let ledger = touched
        .into_iter()
        .filter_map(|id| system.catalog().get(id))
        .map(|definition| LedgerRow {
            item: definition.key.clone(),
            in_progress: system.ledger().in_progress_count(definition.id),
            completed: system.ledger().completed_count(definition.id),
        })
        .collect();

    let event_counts = stats
        .borrow()
        .iter()
        .map(|(kind, count)| (kind.to_string(), count))
        .collect();

    Ok(ScenarioReport {
        name: scenario.name.clone(),
        ticks: system.current_tick(),
        steps,
        events: records(&events),
        event_counts,
        ledger,
        state_hash: system.state_hash(),
    })
}

fn resolve(system: &BuildSystem, key: &str) -> ToolResult<DefinitionId> {
    system
        .catalog()
        .find_by_key(key)
        .map(|d| d.id)
        .ok_or_else(|| ToolError::UnknownKey(key.to_string()))
}

/// Apply one step and flush its events. Returns the refusal, if any.
fn apply_step(
    system: &mut BuildSystem,
    step: &Step,
    events: &mut Vec<(u64, BuildEvent)>,
) -> ToolResult<Option<String>> {
    let outcome = match step {
        Step::Enqueue { builder, item } => {
            let id = resolve(system, item)?;
            system.enqueue(*builder, id).map(drop)
        }
        Step::Cancel { builder, item } => {
            let id = resolve(system, item)?;
            system.cancel(*builder, id).map(drop)
        }
        Step::CancelHead { builder } => {
            let head = system.queue(*builder).map(|q| q.head().map(|e| e.id));
            match head {
                Some(Some(entry)) => system.cancel_entry(*builder, entry).map(drop),
                Some(None) => Ok(()),
                None => Err(BuildError::UnknownBuilder(*builder)),
            }
        }
        Step::Pause { builder } => system.pause(*builder),
        Step::Resume { builder } => system.resume(*builder),
        Step::Tick {
            seconds: length,
            repeat,
        } => {
            let delta = tick_length(*length)?;
            for _ in 0..*repeat {
                system.tick(delta);
                flush(system, events);
            }
            Ok(())
        }
    };
    flush(system, events);
    Ok(outcome.err().map(|e| e.to_string()))
}

fn tick_length(value: f64) -> ToolResult<Fixed> {
    seconds(value)
        .filter(|delta| *delta > Fixed::ZERO)
        .ok_or_else(|| ToolError::Validation {
            path: "Tick".to_string(),
            errors: vec![format!("tick length must be a positive number of seconds, got {value}")],
        })
}

fn flush(system: &mut BuildSystem, events: &mut Vec<(u64, BuildEvent)>) {
    let tick = system.current_tick();
    events.extend(system.flush_events().into_iter().map(|e| (tick, e)));
}

fn records(events: &[(u64, BuildEvent)]) -> Vec<EventRecord> {
    events
        .iter()
        .map(|(tick, event)| {
            let entry = event.entry();
            EventRecord {
                tick: *tick,
                kind: event.kind().to_string(),
                builder: entry.owner,
                entry: entry.id.0,
                item: entry.definition.key.clone(),
                progress: entry.percentage(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
        Scenario(
            name: "Barracks then infantry",
            catalog: Inline(CatalogData(definitions: [
                DefinitionData(key: "barracks", name: "Barracks", category: Building),
                DefinitionData(key: "infantry", name: "Infantry", category: Unit, build_time: Some(2.0)),
            ])),
            builders: [
                BuilderSetup(id: 1, permitted_categories: [Building]),
                BuilderSetup(id: 2, allow_list: ["infantry"]),
            ],
            steps: [
                Enqueue(builder: 1, item: "barracks"),
                Enqueue(builder: 1, item: "barracks"),
                Enqueue(builder: 2, item: "barracks"),
                Enqueue(builder: 2, item: "infantry"),
                Tick(seconds: 1.0, repeat: 5),
                CancelHead(builder: 2),
                CancelHead(builder: 2),
            ],
        )
    "#;

    #[test]
    fn test_run_inline_scenario() {
        let scenario = Scenario::from_ron_str(SCENARIO).unwrap();
        let report = run_scenario(&scenario, Path::new(".")).unwrap();

        assert_eq!(report.ticks, 5);
        let refused: Vec<_> = report
            .steps
            .iter()
            .filter(|s| s.refused.is_some())
            .map(|s| s.index)
            .collect();
        assert_eq!(refused, [1, 2]);

        // Infantry completes on tick 2, barracks on tick 5.
        let completed: Vec<_> = report
            .events
            .iter()
            .filter(|e| e.kind == "Completed")
            .map(|e| (e.tick, e.item.as_str()))
            .collect();
        assert_eq!(completed, [(2, "infantry"), (5, "barracks")]);

        assert_eq!(report.event_counts["Queued"], 2);
        assert_eq!(report.event_counts.get("Cancelled"), None);
        assert_eq!(
            report.ledger,
            [
                LedgerRow {
                    item: "barracks".to_string(),
                    in_progress: 0,
                    completed: 1,
                },
                LedgerRow {
                    item: "infantry".to_string(),
                    in_progress: 0,
                    completed: 1,
                },
            ]
        );
    }

    #[test]
    fn test_report_is_deterministic() {
        let scenario = Scenario::from_ron_str(SCENARIO).unwrap();
        let a = run_scenario(&scenario, Path::new(".")).unwrap();
        let b = run_scenario(&scenario, Path::new(".")).unwrap();
        assert_eq!(a, b);
        assert!(a.to_json().unwrap().contains("\"state_hash\""));
        assert!(a.summary().contains("refused"));
    }

    #[test]
    fn test_summary_lines() {
        let scenario = Scenario::from_ron_str(SCENARIO).unwrap();
        let summary = run_scenario(&scenario, Path::new(".")).unwrap().summary();

        assert!(summary.ends_with('\n'));
        let lines: Vec<_> = summary.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("Scenario 'Barracks then infantry': 7 steps (2 refused)"));
        assert!(lines[1].starts_with("  step 1: "));
        assert!(lines[2].starts_with("  step 2: "));
        assert_eq!(lines[3], "  barracks         in progress   0  completed   1");
        assert_eq!(lines[4], "  infantry         in progress   0  completed   1");
    }

    #[test]
    fn test_unknown_key_is_an_error() {
        let mut scenario = Scenario::from_ron_str(SCENARIO).unwrap();
        scenario.steps.push(Step::Enqueue {
            builder: 1,
            item: "mothership".to_string(),
        });
        assert!(matches!(
            run_scenario(&scenario, Path::new(".")),
            Err(ToolError::UnknownKey(key)) if key == "mothership"
        ));
    }

    #[test]
    fn test_bad_tick_length() {
        let mut scenario = Scenario::from_ron_str(SCENARIO).unwrap();
        scenario.steps.push(Step::Tick {
            seconds: -1.0,
            repeat: 1,
        });
        assert!(matches!(
            run_scenario(&scenario, Path::new(".")),
            Err(ToolError::Validation { .. })
        ));
    }
}

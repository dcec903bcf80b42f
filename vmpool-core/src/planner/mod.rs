//! Planner framework: validates endpoint feasibility, builds the path
//! shell, and delegates the actual search to a chosen strategy.

pub mod displacement;
pub mod shortest_path;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::error::PlannerError;
use crate::migration::Migration;
use crate::path::Path;
use crate::placement::Snapshot;

/// How verbose the accumulated debug log should be. Mirrors the
/// `debug_level` threshold the planner's reference implementation took at
/// construction time: a message is kept only if its level is at or above
/// this threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DebugLevel {
    /// Keep almost everything the planner logs internally.
    Verbose = 0,
    /// Keep only high-level progress messages (the default).
    Normal = 1,
    /// Keep nothing; `get_debug()` will return an empty string.
    Silent = 2,
}

impl Default for DebugLevel {
    fn default() -> Self {
        DebugLevel::Normal
    }
}

/// Accumulates a textual debug log during a planner run, regardless of
/// whether the run ultimately succeeds. Also mirrors every kept message to
/// `tracing`, so a consumer that wires up a subscriber sees the same
/// narrative without having to read `get_debug()`.
#[derive(Debug, Default)]
pub struct DebugLog {
    threshold: DebugLevel,
    buffer: String,
}

impl DebugLog {
    pub fn new(threshold: DebugLevel) -> Self {
        DebugLog {
            threshold,
            buffer: String::new(),
        }
    }

    pub fn log(&mut self, level: DebugLevel, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::debug!(target: "vmpool_core::planner", "{message}");
        if level >= self.threshold {
            self.buffer.push_str(message);
            self.buffer.push('\n');
        }
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }
}

/// Which search strategy a [`Planner`] should delegate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// The recursive displacement planner: fast, complete-but-not-optimal.
    Displacement,
    /// Dijkstra over the placement graph: exhaustive, exponential.
    ShortestPath,
}

/// Construction-time knobs for a [`Planner`], the injection point spec §6
/// anticipates for future extension.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub strategy: StrategyKind,
    pub debug_level: DebugLevel,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            strategy: StrategyKind::Displacement,
            debug_level: DebugLevel::Normal,
        }
    }
}

/// A cache from canonical key to the snapshot it identifies, owned by the
/// framework and shared with whichever strategy needs deduplication
/// (only the shortest-path strategy does).
#[derive(Debug, Default)]
pub struct SnapshotCache {
    by_key: HashMap<String, Snapshot>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `snapshot` under its canonical key if not already cached.
    pub fn cache(&mut self, snapshot: &Snapshot) {
        self.by_key
            .entry(snapshot.canonical_key())
            .or_insert_with(|| snapshot.clone());
    }

    pub fn get(&self, key: &str) -> Option<&Snapshot> {
        self.by_key.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }
}

/// A single-shot path-finding run between two snapshots.
///
/// Construction validates both endpoints are feasible and builds the work
/// lists; [`Planner::find_path`] then delegates to the chosen strategy and
/// consumes the planner.
pub struct Planner {
    path: Path,
    config: PlannerConfig,
    debug: DebugLog,
    cache: SnapshotCache,
    started_at: Instant,
    finished_at: Option<Instant>,
}

impl Planner {
    /// Validates both endpoints and builds the path shell.
    ///
    /// # Errors
    /// `PlannerError::InvalidEndpoint` if either snapshot is infeasible.
    pub fn new(
        initial: Snapshot,
        final_state: Snapshot,
        config: PlannerConfig,
    ) -> Result<Self, PlannerError> {
        initial.check_feasible()?;
        final_state.check_feasible()?;

        let path = Path::compare_endpoints(initial, final_state).map_err(|e| {
            PlannerError::Invariant {
                message: format!("failed to derive boundary snapshots: {e}"),
                debug_log: String::new(),
            }
        })?;

        Ok(Planner {
            path,
            debug: DebugLog::new(config.debug_level),
            config,
            cache: SnapshotCache::new(),
            started_at: Instant::now(),
            finished_at: None,
        })
    }

    /// Runs the chosen strategy and, if a plan was found, attaches the
    /// migration sequence and cumulative cost to the path.
    pub fn find_path(mut self) -> Result<Option<Path>, PlannerError> {
        let start = self.path.state_after_shutdowns().clone();
        let goal = self.path.state_before_provisions().clone();
        let todo = self.path.guests_to_migrate().clone();

        let migrations: Option<Vec<Migration>> = match self.config.strategy {
            StrategyKind::Displacement => {
                displacement::run(&start, &goal, todo, &mut self.debug)?
            }
            StrategyKind::ShortestPath => {
                shortest_path::run(&start, &goal, todo, &mut self.debug, &mut self.cache)?
            }
        };

        self.finished_at = Some(Instant::now());

        match migrations {
            None => Ok(None),
            Some(sequence) => {
                self.path.set_migration_sequence(sequence);
                Ok(Some(self.path))
            }
        }
    }

    /// Wall-clock time since this planner was constructed (or, once
    /// `find_path` has returned, the time the run actually took).
    pub fn time_elapsed(&self) -> Duration {
        match self.finished_at {
            Some(end) => end.duration_since(self.started_at),
            None => self.started_at.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{new_guest, new_host, reset_registries};
    use std::collections::HashMap;

    fn placement(pairs: &[(&str, &str)]) -> HashMap<String, Vec<String>> {
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for (guest, host) in pairs {
            map.entry(host.to_string()).or_default().push(guest.to_string());
        }
        map
    }

    #[test]
    fn rejects_infeasible_initial_endpoint() {
        reset_registries();
        new_host("host1", "x86_64", 500, None).unwrap();
        new_guest("vm1", "x86_64", 1000).unwrap();
        let initial = Snapshot::from_placement(placement(&[("vm1", "host1")])).unwrap();
        let final_state = initial.clone();

        let err = Planner::new(initial, final_state, PlannerConfig::default()).unwrap_err();
        assert!(matches!(err, PlannerError::InvalidEndpoint(_)));
    }

    #[test]
    fn finds_a_simple_swap() {
        reset_registries();
        new_host("host1", "x86_64", 4096, None).unwrap();
        new_host("host2", "x86_64", 4096, None).unwrap();
        new_guest("vm1", "x86_64", 256).unwrap();
        new_guest("vm2", "x86_64", 256).unwrap();

        let initial =
            Snapshot::from_placement(placement(&[("vm1", "host1"), ("vm2", "host2")])).unwrap();
        let final_state =
            Snapshot::from_placement(placement(&[("vm1", "host2"), ("vm2", "host1")])).unwrap();

        let planner = Planner::new(initial, final_state, PlannerConfig::default()).unwrap();
        let path = planner.find_path().unwrap().expect("plan should be found");
        assert_eq!(path.migration_sequence().len(), 2);
        assert_eq!(path.cost(), 512);
    }
}

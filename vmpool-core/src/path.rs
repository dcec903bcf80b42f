//! The path object: initial/final snapshots, the derived work lists, the
//! two boundary snapshots the planner actually searches between, and
//! (once a strategy has run) the ordered migration sequence and its cost.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::error::SnapshotError;
use crate::migration::{total_cost, Migration};
use crate::placement::Snapshot;

/// An ordered sequence of shutdowns, migrations, and provisions that takes
/// `initial` to `final_state`.
///
/// Shutdowns always happen first and provisions last; the displacement or
/// shortest-path strategy only ever operates on the migrations in between.
#[derive(Debug, Clone, Serialize)]
pub struct Path {
    initial: Snapshot,
    final_state: Snapshot,
    guests_to_shutdown: BTreeSet<String>,
    guests_to_migrate: BTreeSet<String>,
    guests_to_provision: BTreeMap<String, String>,
    state_after_shutdowns: Snapshot,
    state_before_provisions: Snapshot,
    migration_sequence: Vec<Migration>,
    cost: u64,
}

impl Path {
    /// Computes the work lists and boundary snapshots for `initial` ->
    /// `final_state` (spec §4.2's `compare_endpoints`). The migration
    /// sequence is empty until a strategy fills it in via
    /// [`Path::set_migration_sequence`].
    pub fn compare_endpoints(initial: Snapshot, final_state: Snapshot) -> Result<Self, SnapshotError> {
        let mut guests_to_shutdown = BTreeSet::new();
        let mut guests_to_migrate = BTreeSet::new();

        for guest in initial.guest_names() {
            match final_state.host_of(guest) {
                None => {
                    guests_to_shutdown.insert(guest.to_string());
                }
                Some(to_host) => {
                    let from_host = initial.host_of(guest).expect("guest in own snapshot");
                    if from_host != to_host {
                        guests_to_migrate.insert(guest.to_string());
                    }
                }
            }
        }

        let mut guests_to_provision = BTreeMap::new();
        for guest in final_state.guest_names() {
            if initial.host_of(guest).is_none() {
                let host = final_state.host_of(guest).expect("guest in own snapshot");
                guests_to_provision.insert(guest.to_string(), host.to_string());
            }
        }

        let mut state_after_shutdowns = initial.clone();
        for guest in &guests_to_shutdown {
            state_after_shutdowns = state_after_shutdowns.shutdown(guest)?;
        }

        let mut state_before_provisions = final_state.clone();
        for guest in guests_to_provision.keys() {
            state_before_provisions = state_before_provisions.shutdown(guest)?;
        }

        Ok(Path {
            initial,
            final_state,
            guests_to_shutdown,
            guests_to_migrate,
            guests_to_provision,
            state_after_shutdowns,
            state_before_provisions,
            migration_sequence: Vec::new(),
            cost: 0,
        })
    }

    pub fn initial(&self) -> &Snapshot {
        &self.initial
    }

    pub fn final_state(&self) -> &Snapshot {
        &self.final_state
    }

    pub fn guests_to_shutdown(&self) -> &BTreeSet<String> {
        &self.guests_to_shutdown
    }

    pub fn guests_to_migrate(&self) -> &BTreeSet<String> {
        &self.guests_to_migrate
    }

    pub fn guests_to_provision(&self) -> &BTreeMap<String, String> {
        &self.guests_to_provision
    }

    pub fn state_after_shutdowns(&self) -> &Snapshot {
        &self.state_after_shutdowns
    }

    pub fn state_before_provisions(&self) -> &Snapshot {
        &self.state_before_provisions
    }

    pub fn migration_sequence(&self) -> &[Migration] {
        &self.migration_sequence
    }

    pub fn cost(&self) -> u64 {
        self.cost
    }

    /// Attaches the migration sequence found by a strategy and derives
    /// the cumulative cost from it.
    pub fn set_migration_sequence(&mut self, sequence: Vec<Migration>) {
        self.cost = total_cost(&sequence);
        self.migration_sequence = sequence;
    }

    /// Walks the sequence of intermediate snapshots from
    /// `state_after_shutdowns` through each migration to
    /// `state_before_provisions`.
    pub fn states(&self) -> Vec<Snapshot> {
        let mut states = Vec::with_capacity(self.migration_sequence.len() + 1);
        let mut current = self.state_after_shutdowns.clone();
        states.push(current.clone());
        for migration in &self.migration_sequence {
            current = current
                .migrate(&migration.guest, &migration.to_host)
                .expect("recorded migration must replay cleanly");
            states.push(current.clone());
        }
        states
    }

    /// Renders the stable, line-oriented textual format used for equality
    /// and test fixtures:
    ///
    /// ```text
    /// shutdown: <sorted guest names>
    /// ! <guest>: <from_host> -> <to_host>  cost <ram>
    /// ...
    /// provision: <sorted guest names>
    /// ```
    pub fn dump(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!(
            "shutdown: {}\n",
            self.guests_to_shutdown.iter().cloned().collect::<Vec<_>>().join(", ")
        ));
        for migration in &self.migration_sequence {
            s.push_str(&format!("! {migration}\n"));
        }
        s.push_str(&format!(
            "provision: {}\n",
            self.guests_to_provision.keys().cloned().collect::<Vec<_>>().join(", ")
        ));
        s
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.dump() == other.dump()
    }
}

impl Eq for Path {}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dump())
    }
}

//! Dijkstra over the implicit placement graph: nodes are snapshots, edges
//! are single feasible migrations weighted by the migrating guest's RAM.
//!
//! Exhaustive and guaranteed optimal when a plan exists, at the cost of a
//! branching factor of `guests * hosts` per node — fine for the small
//! pools this strategy is meant for, exponential for anything larger
//! (hence [`super::displacement`] as the default).

use std::collections::{BTreeSet, HashMap};

use crate::error::PlannerError;
use crate::migration::Migration;
use crate::placement::Snapshot;
use crate::vomap::ValueOrderedMap;

use super::{DebugLevel, DebugLog, SnapshotCache};

/// Entry point: the cheapest sequence of migrations from `start` to `goal`,
/// or `None` if `goal` is unreachable. `todo` only affects the order in
/// which edges out of a node are tried, not which states are reachable.
pub fn run(
    start: &Snapshot,
    goal: &Snapshot,
    todo: BTreeSet<String>,
    debug: &mut DebugLog,
    cache: &mut SnapshotCache,
) -> Result<Option<Vec<Migration>>, PlannerError> {
    let start_key = start.canonical_key();
    let goal_key = goal.canonical_key();

    cache.cache(start);

    if start_key == goal_key {
        return Ok(Some(Vec::new()));
    }

    let mut distances: HashMap<String, u64> = HashMap::new();
    let mut previous: HashMap<String, (String, Migration)> = HashMap::new();
    let mut done: BTreeSet<String> = BTreeSet::new();
    let mut frontier: ValueOrderedMap<String, u64> = ValueOrderedMap::new();

    distances.insert(start_key.clone(), 0);
    frontier
        .insert(start_key, 0)
        .expect("frontier starts empty");

    while let Some((key, dist)) = frontier.pop_front() {
        if done.contains(&key) {
            continue;
        }
        done.insert(key.clone());

        if key == goal_key {
            debug.log(DebugLevel::Normal, format!("reached goal at cost {dist}"));
            let sequence = reconstruct(&goal_key, &previous);
            return Ok(Some(sequence));
        }

        let current = cache
            .get(&key)
            .cloned()
            .unwrap_or_else(|| panic!("snapshot for key {key} must have been cached on discovery"));

        for m in explore_neighbours(&current, &todo) {
            let Ok(next) = current.try_migrate(&m.guest, &m.to_host) else {
                continue;
            };
            let next_key = next.canonical_key();
            if done.contains(&next_key) {
                continue;
            }
            cache.cache(&next);

            let candidate_dist = dist + m.cost;
            let improves = match distances.get(&next_key) {
                Some(&existing) => candidate_dist < existing,
                None => true,
            };
            if improves {
                distances.insert(next_key.clone(), candidate_dist);
                previous.insert(next_key.clone(), (key.clone(), m.clone()));
                if frontier.contains_key(&next_key) {
                    frontier.set(next_key, candidate_dist);
                } else {
                    frontier
                        .insert(next_key, candidate_dist)
                        .expect("checked above that it's absent");
                }
            }
        }
    }

    debug.log(DebugLevel::Normal, "frontier exhausted without reaching goal");
    Ok(None)
}

/// Candidate migrations out of `current`, guests still in `todo` first
/// (sorted by name, then by destination host), then the rest.
fn explore_neighbours(current: &Snapshot, todo: &BTreeSet<String>) -> Vec<Migration> {
    let mut all_hosts: Vec<String> = current.host_names().map(String::from).collect();
    all_hosts.sort();

    let mut guests: Vec<String> = current.guest_names().map(String::from).collect();
    guests.sort();
    let (moved_vms, unmoved_vms): (Vec<String>, Vec<String>) =
        guests.into_iter().partition(|g| todo.contains(g));

    let mut candidates = Vec::new();
    for guest in moved_vms.into_iter().chain(unmoved_vms) {
        let from_host = current
            .host_of(&guest)
            .expect("guest_names only yields placed guests")
            .to_string();
        for host in &all_hosts {
            if *host == from_host {
                continue;
            }
            candidates.push(Migration::new(guest.clone(), from_host.clone(), host.clone()));
        }
    }
    candidates
}

fn reconstruct(goal_key: &str, previous: &HashMap<String, (String, Migration)>) -> Vec<Migration> {
    let mut sequence = Vec::new();
    let mut key = goal_key.to_string();
    while let Some((prev_key, m)) = previous.get(&key) {
        sequence.push(m.clone());
        key = prev_key.clone();
    }
    sequence.reverse();
    sequence
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{new_guest, new_host, reset_registries};
    use std::collections::HashMap as StdHashMap;

    fn placement(pairs: &[(&str, &str)]) -> StdHashMap<String, Vec<String>> {
        let mut map: StdHashMap<String, Vec<String>> = StdHashMap::new();
        for (guest, host) in pairs {
            map.entry(host.to_string()).or_default().push(guest.to_string());
        }
        map
    }

    #[test]
    fn finds_the_cheapest_plan_for_a_simple_swap() {
        reset_registries();
        new_host("host1", "x86_64", 4096, None).unwrap();
        new_host("host2", "x86_64", 4096, None).unwrap();
        new_guest("vm1", "x86_64", 256).unwrap();
        new_guest("vm2", "x86_64", 256).unwrap();

        let start = Snapshot::from_placement(placement(&[("vm1", "host1"), ("vm2", "host2")])).unwrap();
        let goal = Snapshot::from_placement(placement(&[("vm1", "host2"), ("vm2", "host1")])).unwrap();
        let todo: BTreeSet<String> = ["vm1".to_string(), "vm2".to_string()].into_iter().collect();

        let mut debug = DebugLog::new(DebugLevel::Silent);
        let mut cache = SnapshotCache::new();
        let plan = run(&start, &goal, todo, &mut debug, &mut cache)
            .unwrap()
            .expect("plan found");
        let total: u64 = plan.iter().map(|m| m.cost).sum();
        assert_eq!(total, 512);
    }

    #[test]
    fn already_at_goal_returns_an_empty_plan() {
        reset_registries();
        new_host("host1", "x86_64", 4096, None).unwrap();
        new_guest("vm1", "x86_64", 256).unwrap();
        let snap = Snapshot::from_placement(placement(&[("vm1", "host1")])).unwrap();

        let mut debug = DebugLog::new(DebugLevel::Silent);
        let mut cache = SnapshotCache::new();
        let plan = run(&snap, &snap, BTreeSet::new(), &mut debug, &mut cache)
            .unwrap()
            .expect("no-op plan");
        assert!(plan.is_empty());
    }

    #[test]
    fn unreachable_goal_yields_no_plan() {
        reset_registries();
        new_host("host1", "x86_64", 276, None).unwrap();
        new_host("host2", "x86_64", 276, None).unwrap();
        new_guest("vm1", "x86_64", 20).unwrap();
        new_guest("vm2", "x86_64", 20).unwrap();

        let start = Snapshot::from_placement(placement(&[("vm1", "host1"), ("vm2", "host2")])).unwrap();
        let goal = Snapshot::from_placement(placement(&[("vm1", "host2"), ("vm2", "host1")])).unwrap();
        let todo: BTreeSet<String> = ["vm1".to_string(), "vm2".to_string()].into_iter().collect();

        let mut debug = DebugLog::new(DebugLevel::Silent);
        let mut cache = SnapshotCache::new();
        let plan = run(&start, &goal, todo, &mut debug, &mut cache).unwrap();
        assert!(plan.is_none());
    }
}

//! Recursive displacement planner.
//!
//! At each step, pick a guest that still needs to move and try to migrate
//! it straight to its target host. When that fails because the target is
//! full or architecture-incompatible, recursively displace guests already
//! sitting on the target to make room — in priority order: guests that
//! themselves need to reach their own final target via this same host
//! (recursion allowed, since moving them forward is progress either way),
//! guests that need to move but not to this host (a sideways step, no
//! further recursion), and guests that don't need to move at all (a pure
//! favour, no further recursion).
//!
//! A guest already being displaced on someone else's behalf is locked for
//! the remainder of that displacement attempt, so it can never be asked to
//! make way for its own rescuer — this is what turns would-be infinite
//! mutual-dependency loops into a clean `None` instead of a stack overflow.

use std::collections::BTreeSet;

use crate::error::PlannerError;
use crate::migration::Migration;
use crate::placement::Snapshot;

use super::DebugLog;

/// Bounds recursion depth as a defensive invariant. In practice depth is
/// bounded by guests-per-host times guests-in-todo, which is always far
/// below this for any pool worth modelling; tripping it means the planner
/// found a cycle its bookkeeping should have already ruled out.
const MAX_DEPTH: usize = 10_000;

type DisplaceResult = Option<(Vec<Migration>, Snapshot, BTreeSet<String>, BTreeSet<String>)>;

/// Entry point: finds a sequence of migrations from `start` to `goal` that
/// relocates every guest in `todo`, or `None` if no such sequence exists.
pub fn run(
    start: &Snapshot,
    goal: &Snapshot,
    todo: BTreeSet<String>,
    debug: &mut DebugLog,
) -> Result<Option<Vec<Migration>>, PlannerError> {
    solve(start, goal, &todo, debug, 0)
}

fn check_depth(depth: usize, debug: &DebugLog) -> Result<(), PlannerError> {
    if depth > MAX_DEPTH {
        return Err(invariant(debug, "recursion depth exceeded the safe bound"));
    }
    Ok(())
}

fn invariant(debug: &DebugLog, message: impl Into<String>) -> PlannerError {
    PlannerError::Invariant {
        message: message.into(),
        debug_log: debug.as_str().to_string(),
    }
}

fn target_host<'a>(goal: &'a Snapshot, guest: &str) -> &'a str {
    goal.host_of(guest)
        .unwrap_or_else(|| panic!("guest {guest} in todo has no target in the goal snapshot"))
}

/// Recomputes `todo` after performing `m`: `m.guest` leaves the set if it
/// landed on its final target, and is (re-)added otherwise.
fn update_todo(todo: &BTreeSet<String>, m: &Migration, goal: &Snapshot) -> BTreeSet<String> {
    let mut next = todo.clone();
    if m.to_host == target_host(goal, &m.guest) {
        next.remove(&m.guest);
    } else {
        next.insert(m.guest.clone());
    }
    next
}

/// Attempts the single migration `m` directly, with no displacement.
fn solve_single(
    current: &Snapshot,
    m: &Migration,
    todo: &BTreeSet<String>,
    goal: &Snapshot,
) -> Option<(Vec<Migration>, Snapshot, BTreeSet<String>)> {
    match current.try_migrate(&m.guest, &m.to_host) {
        Ok(next) => Some((vec![m.clone()], next, update_todo(todo, m, goal))),
        Err(_) => None,
    }
}

/// Tries `m` directly; on failure, falls back to displacing guests off
/// `m.to_host` to make room for it.
fn solve_to(
    current: &Snapshot,
    m: &Migration,
    todo: &BTreeSet<String>,
    locked: &BTreeSet<String>,
    goal: &Snapshot,
    debug: &mut DebugLog,
    depth: usize,
) -> Result<DisplaceResult, PlannerError> {
    check_depth(depth, debug)?;
    if let Some((seg, next, next_todo)) = solve_single(current, m, todo, goal) {
        return Ok(Some((seg, next, next_todo, locked.clone())));
    }
    displace(current, m, todo, locked, goal, debug, depth + 1)
}

/// One candidate considered while clearing room on `on_behalf_of.to_host`.
struct Candidate {
    migration: Migration,
    /// Class 1 ("required-to-final") candidates may recurse through
    /// `solve_to`; classes 2 and 3 are accepted only if directly feasible.
    allow_recursion: bool,
}

/// Enumerates candidates for clearing room on `on_behalf_of.to_host`, in
/// priority order: required-to-final, required-to-non-final, not-required.
fn enumerate_candidates(
    current: &Snapshot,
    on_behalf_of: &Migration,
    todo: &BTreeSet<String>,
    locked: &BTreeSet<String>,
    goal: &Snapshot,
) -> Vec<Candidate> {
    let host = on_behalf_of.to_host.as_str();

    let mut resident: Vec<String> = current.guests_on(host).into_iter().map(String::from).collect();
    resident.sort();

    let mut all_hosts: Vec<String> = current.host_names().map(String::from).collect();
    all_hosts.sort();

    let required: Vec<&String> = resident
        .iter()
        .filter(|v| todo.contains(v.as_str()) && !locked.contains(v.as_str()))
        .collect();
    let not_required: Vec<&String> = resident
        .iter()
        .filter(|v| !todo.contains(v.as_str()) && !locked.contains(v.as_str()))
        .collect();

    let mut candidates = Vec::new();

    for v in &required {
        let target = target_host(goal, v);
        candidates.push(Candidate {
            migration: Migration::new((*v).clone(), host.to_string(), target.to_string()),
            allow_recursion: true,
        });
    }

    for v in &required {
        let target = target_host(goal, v).to_string();
        for h in &all_hosts {
            if h == host || *h == target {
                continue;
            }
            candidates.push(Candidate {
                migration: Migration::new((*v).clone(), host.to_string(), h.clone()),
                allow_recursion: false,
            });
        }
    }

    for v in &not_required {
        for h in &all_hosts {
            if h == host {
                continue;
            }
            candidates.push(Candidate {
                migration: Migration::new((*v).clone(), host.to_string(), h.clone()),
                allow_recursion: false,
            });
        }
    }

    candidates
}

/// Makes room for `on_behalf_of` on its target host by relocating other
/// guests already there, one at a time, recursing further if a single
/// relocation isn't enough.
fn displace(
    current: &Snapshot,
    on_behalf_of: &Migration,
    todo: &BTreeSet<String>,
    locked: &BTreeSet<String>,
    goal: &Snapshot,
    debug: &mut DebugLog,
    depth: usize,
) -> Result<DisplaceResult, PlannerError> {
    check_depth(depth, debug)?;

    let mut locked = locked.clone();
    locked.insert(on_behalf_of.guest.clone());
    debug.log(
        super::DebugLevel::Verbose,
        format!(
            "displace: making way for {} on {}",
            on_behalf_of.guest, on_behalf_of.to_host
        ),
    );

    for candidate in enumerate_candidates(current, on_behalf_of, todo, &locked, goal) {
        let attempt = if candidate.allow_recursion {
            solve_to(current, &candidate.migration, todo, &locked, goal, debug, depth + 1)?
        } else {
            solve_single(current, &candidate.migration, todo, goal)
                .map(|(seg, snap, td)| (seg, snap, td, locked.clone()))
        };

        let Some((partial, state_after, todo_after, locked_after)) = attempt else {
            continue;
        };

        if candidate.migration.guest == on_behalf_of.guest
            && candidate.migration.to_host == on_behalf_of.to_host
        {
            return Err(invariant(
                debug,
                "candidate coincided with the displacement it was meant to serve",
            ));
        }

        match state_after.try_migrate(&on_behalf_of.guest, &on_behalf_of.to_host) {
            Ok(final_snapshot) => {
                let mut sequence = partial;
                sequence.push(on_behalf_of.clone());
                let todo_final = update_todo(&todo_after, on_behalf_of, goal);
                return Ok(Some((sequence, final_snapshot, todo_final, locked_after)));
            }
            Err(_) => {
                match displace(
                    &state_after,
                    on_behalf_of,
                    &todo_after,
                    &locked_after,
                    goal,
                    debug,
                    depth + 1,
                )? {
                    Some((mut rest, state2, todo2, locked2)) => {
                        let mut sequence = partial;
                        sequence.append(&mut rest);
                        return Ok(Some((sequence, state2, todo2, locked2)));
                    }
                    None => continue,
                }
            }
        }
    }

    Ok(None)
}

fn solve(
    current: &Snapshot,
    goal: &Snapshot,
    todo: &BTreeSet<String>,
    debug: &mut DebugLog,
    depth: usize,
) -> Result<Option<Vec<Migration>>, PlannerError> {
    check_depth(depth, debug)?;

    let at_goal = current.canonical_key() == goal.canonical_key();
    if at_goal && todo.is_empty() {
        return Ok(Some(Vec::new()));
    }
    if at_goal != todo.is_empty() {
        return Err(invariant(
            debug,
            "reached the goal placement with guests still outstanding, or vice versa",
        ));
    }

    for guest in todo.iter().cloned().collect::<Vec<_>>() {
        let to_host = target_host(goal, &guest).to_string();
        let from_host = current
            .host_of(&guest)
            .expect("guest in todo must currently be placed somewhere")
            .to_string();
        let m = Migration::new(guest.clone(), from_host, to_host);

        debug.log(super::DebugLevel::Normal, format!("attempting {m}"));

        if let Some((segment, next, next_todo, _locked)) =
            solve_to(current, &m, todo, &BTreeSet::new(), goal, debug, depth + 1)?
        {
            if let Some(rest) = solve(&next, goal, &next_todo, debug, depth + 1)? {
                let mut combined = segment;
                combined.extend(rest);
                return Ok(Some(combined));
            }
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{new_guest, new_host, reset_registries};
    use crate::planner::DebugLevel;
    use std::collections::HashMap;

    fn placement(pairs: &[(&str, &str)]) -> HashMap<String, Vec<String>> {
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for (guest, host) in pairs {
            map.entry(host.to_string()).or_default().push(guest.to_string());
        }
        map
    }

    #[test]
    fn direct_swap_needs_no_displacement() {
        reset_registries();
        new_host("host1", "x86_64", 4096, None).unwrap();
        new_host("host2", "x86_64", 4096, None).unwrap();
        new_guest("vm1", "x86_64", 256).unwrap();
        new_guest("vm2", "x86_64", 256).unwrap();

        let start = Snapshot::from_placement(placement(&[("vm1", "host1"), ("vm2", "host2")])).unwrap();
        let goal = Snapshot::from_placement(placement(&[("vm1", "host2"), ("vm2", "host1")])).unwrap();
        let todo: BTreeSet<String> = ["vm1".to_string(), "vm2".to_string()].into_iter().collect();

        let mut debug = DebugLog::new(DebugLevel::Silent);
        let plan = run(&start, &goal, todo, &mut debug).unwrap().expect("plan found");
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn swap_needing_a_spare_host_displaces_through_it() {
        reset_registries();
        new_host("host1", "x86_64", 300, None).unwrap();
        new_host("host2", "x86_64", 300, None).unwrap();
        new_host("host3", "x86_64", 300, None).unwrap();
        new_guest("vm1", "x86_64", 20).unwrap();
        new_guest("vm2", "x86_64", 20).unwrap();

        // host1 and host2 are full enough that a direct swap can't happen
        // without first parking one of the guests on host3.
        let start = Snapshot::from_placement(placement(&[("vm1", "host1"), ("vm2", "host2")])).unwrap();
        let goal = Snapshot::from_placement(placement(&[("vm1", "host2"), ("vm2", "host1")])).unwrap();
        let todo: BTreeSet<String> = ["vm1".to_string(), "vm2".to_string()].into_iter().collect();

        let mut debug = DebugLog::new(DebugLevel::Silent);
        let plan = run(&start, &goal, todo, &mut debug).unwrap().expect("plan found");
        assert!(plan.len() >= 2);
    }

    #[test]
    fn deadlock_without_a_spare_host_yields_no_plan() {
        reset_registries();
        // Both hosts sized so neither has room to hold both guests at
        // once, and there is no third host to act as a staging area.
        new_host("host1", "x86_64", 276, None).unwrap();
        new_host("host2", "x86_64", 276, None).unwrap();
        new_guest("vm1", "x86_64", 20).unwrap();
        new_guest("vm2", "x86_64", 20).unwrap();

        let start = Snapshot::from_placement(placement(&[("vm1", "host1"), ("vm2", "host2")])).unwrap();
        let goal = Snapshot::from_placement(placement(&[("vm1", "host2"), ("vm2", "host1")])).unwrap();
        let todo: BTreeSet<String> = ["vm1".to_string(), "vm2".to_string()].into_iter().collect();

        let mut debug = DebugLog::new(DebugLevel::Silent);
        let plan = run(&start, &goal, todo, &mut debug).unwrap();
        assert!(plan.is_none());
    }
}

//! Placement snapshots: a value-typed `guest -> host` mapping (plus its
//! inverse) that can be checked for feasibility and derived into new
//! snapshots by a single migration, shutdown, or provision.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::{self, arch_compatible};
use crate::error::{InfeasibleState, SnapshotError};

/// Error surface for [`Snapshot::try_migrate`], which can fail either
/// because the migration itself is malformed (`Snapshot`) or because the
/// resulting placement would be infeasible (`Infeasible`).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TryMigrateError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Infeasible(#[from] InfeasibleState),
}

/// A placement of every guest onto exactly one host.
///
/// Snapshots are value-like: every derivation (`migrate`, `shutdown`,
/// `provision`) returns an independent copy, so a snapshot can be shared
/// freely between callers without synchronisation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    guest_to_host: HashMap<String, String>,
    host_to_guests: HashMap<String, BTreeSet<String>>,
}

impl Snapshot {
    pub fn new() -> Self {
        Snapshot::default()
    }

    /// Builds a snapshot from a `host name -> guest names` map, the shape
    /// the public interface accepts (spec §6).
    ///
    /// Every currently registered host gets an entry, even if `placement`
    /// never mentions it and it ends up with no guests — matching
    /// `VMPoolState.init_by_vmhosts` in the original, which always seeds
    /// every known host. Without this, a spare host registered but never
    /// referenced by either endpoint would silently never appear as a
    /// migration destination or staging area.
    pub fn from_placement(
        placement: HashMap<String, Vec<String>>,
    ) -> Result<Self, SnapshotError> {
        let mut snapshot = Snapshot::new();
        for host in entity::registered_host_names() {
            snapshot.init_host(&host);
        }
        for (host, guests) in placement {
            snapshot.init_host(&host);
            for guest in guests {
                snapshot.add_guest(&guest, &host)?;
            }
        }
        Ok(snapshot)
    }

    /// Ensures `host` has an entry in the reverse map, even with no guests.
    pub fn init_host(&mut self, host: &str) {
        self.host_to_guests.entry(host.to_string()).or_default();
    }

    /// Places `guest` on `host`, mutating this snapshot in place.
    ///
    /// # Errors
    /// `DuplicateGuest` if `guest` is already placed somewhere in this
    /// snapshot.
    pub fn add_guest(&mut self, guest: &str, host: &str) -> Result<(), SnapshotError> {
        if self.guest_to_host.contains_key(guest) {
            return Err(SnapshotError::DuplicateGuest(guest.to_string()));
        }
        self.guest_to_host.insert(guest.to_string(), host.to_string());
        self.host_to_guests
            .entry(host.to_string())
            .or_default()
            .insert(guest.to_string());
        Ok(())
    }

    /// Removes `guest` from this snapshot, mutating it in place.
    ///
    /// # Errors
    /// `UnknownGuest` if `guest` is not currently placed.
    pub fn remove_guest(&mut self, guest: &str) -> Result<(), SnapshotError> {
        let host = self
            .guest_to_host
            .remove(guest)
            .ok_or_else(|| SnapshotError::UnknownGuest(guest.to_string()))?;
        if let Some(guests) = self.host_to_guests.get_mut(&host) {
            guests.remove(guest);
        }
        Ok(())
    }

    /// The host `guest` currently occupies, if placed.
    pub fn host_of(&self, guest: &str) -> Option<&str> {
        self.guest_to_host.get(guest).map(String::as_str)
    }

    /// Guests currently on `host`, sorted by name.
    pub fn guests_on(&self, host: &str) -> Vec<&str> {
        self.host_to_guests
            .get(host)
            .map(|guests| guests.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// All guest names in this snapshot.
    pub fn guest_names(&self) -> impl Iterator<Item = &str> {
        self.guest_to_host.keys().map(String::as_str)
    }

    /// All host names referenced by this snapshot.
    pub fn host_names(&self) -> impl Iterator<Item = &str> {
        self.host_to_guests.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.guest_to_host.is_empty()
    }

    /// Returns a fresh snapshot with `guest` moved to `to_host`. Does not
    /// check feasibility — see [`Snapshot::try_migrate`] for that.
    ///
    /// # Errors
    /// `UnknownHost` if `to_host` isn't registered; `SameHost` if `guest`
    /// is already on `to_host`.
    pub fn migrate(&self, guest: &str, to_host: &str) -> Result<Snapshot, SnapshotError> {
        if entity::host(to_host).is_none() {
            return Err(SnapshotError::UnknownHost(to_host.to_string()));
        }
        let current_host = self
            .guest_to_host
            .get(guest)
            .ok_or_else(|| SnapshotError::UnknownGuest(guest.to_string()))?;
        if current_host == to_host {
            return Err(SnapshotError::SameHost {
                guest: guest.to_string(),
                host: to_host.to_string(),
            });
        }
        let mut next = self.clone();
        next.init_host(to_host);
        next.remove_guest(guest)?;
        next.add_guest(guest, to_host)?;
        Ok(next)
    }

    /// Returns a fresh snapshot with `guest` removed entirely.
    pub fn shutdown(&self, guest: &str) -> Result<Snapshot, SnapshotError> {
        let mut next = self.clone();
        next.remove_guest(guest)?;
        Ok(next)
    }

    /// Returns a fresh snapshot with `guest` newly placed on `host`.
    pub fn provision(&self, guest: &str, host: &str) -> Result<Snapshot, SnapshotError> {
        let mut next = self.clone();
        next.init_host(host);
        next.add_guest(guest, host)?;
        Ok(next)
    }

    /// Checks that every host's guest RAM plus its reserved RAM fits
    /// within its total RAM, and every guest's architecture is hostable on
    /// its host's architecture.
    ///
    /// # Errors
    /// `RamExceeded` or `ArchIncompatible`, whichever is violated first
    /// (hosts are checked in sorted order for determinism).
    pub fn check_feasible(&self) -> Result<(), InfeasibleState> {
        for host_name in self.sorted_host_names() {
            let host = entity::host(&host_name)
                .unwrap_or_else(|| panic!("host {host_name} referenced but not registered"));
            let guests = self.guests_on(&host_name);

            let guest_ram: u64 = guests
                .iter()
                .map(|g| {
                    entity::guest(g)
                        .unwrap_or_else(|| panic!("guest {g} referenced but not registered"))
                        .ram
                })
                .sum();
            let required = guest_ram + host.reserved_ram;
            if required > host.ram {
                return Err(InfeasibleState::RamExceeded {
                    host: host.name.clone(),
                    guest_ram,
                    dom0_ram: host.reserved_ram,
                    required,
                    capacity: host.ram,
                });
            }

            for guest_name in guests {
                let guest = entity::guest(guest_name)
                    .unwrap_or_else(|| panic!("guest {guest_name} referenced but not registered"));
                if !arch_compatible(&host.arch, &guest.arch) {
                    return Err(InfeasibleState::ArchIncompatible {
                        host: host.name.clone(),
                        host_arch: host.arch.clone(),
                        guest: guest.name.clone(),
                        guest_arch: guest.arch.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Attempts `migrate(guest, to_host)` and additionally checks the
    /// resulting snapshot is feasible, rolling back (i.e. never mutating
    /// `self`) on either kind of failure.
    pub fn try_migrate(&self, guest: &str, to_host: &str) -> Result<Snapshot, TryMigrateError> {
        let candidate = self.migrate(guest, to_host)?;
        candidate.check_feasible()?;
        Ok(candidate)
    }

    fn sorted_host_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.host_to_guests.keys().cloned().collect();
        names.sort();
        names
    }

    /// The deterministic string identity of this snapshot: host names
    /// sorted, guests within each host sorted, rendered as
    /// `host[g1 g2 ...]` segments joined by spaces.
    ///
    /// Two snapshots compare equal (by canonical key) iff they place the
    /// same guests on the same hosts.
    pub fn canonical_key(&self) -> String {
        self.sorted_host_names()
            .into_iter()
            .map(|host| {
                let guests = self.guests_on(&host).join(" ");
                format!("{host}[{guests}]")
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

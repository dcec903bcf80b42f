//! Entity model: guests, hosts, and the process-wide registries that let
//! snapshots and migrations refer to them by name alone.
//!
//! The registries are a deliberate concession to how the system this crate
//! is modeled on works: guests and hosts are created once up front and
//! referred to by name everywhere after that. See `DESIGN.md` for why a
//! systems rewrite would likely replace this with arena handles instead.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use crate::error::SnapshotError;

/// Default RAM (MB) reserved for the hypervisor/dom0 on every host, unless
/// overridden at construction.
pub const DEFAULT_RESERVED_RAM: u64 = 256;

/// An immutable guest VM descriptor: a name, an architecture tag, and a RAM
/// requirement in megabytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Guest {
    pub name: String,
    pub arch: String,
    pub ram: u64,
}

impl Guest {
    pub fn new(name: impl Into<String>, arch: impl Into<String>, ram: u64) -> Self {
        Guest {
            name: name.into(),
            arch: arch.into(),
            ram,
        }
    }
}

impl std::fmt::Display for Guest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// An immutable physical host descriptor: a name, an architecture tag,
/// total RAM, and the RAM reserved for the hypervisor itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Host {
    pub name: String,
    pub arch: String,
    pub ram: u64,
    pub reserved_ram: u64,
}

impl Host {
    pub fn new(name: impl Into<String>, arch: impl Into<String>, ram: u64) -> Self {
        Host {
            name: name.into(),
            arch: arch.into(),
            ram,
            reserved_ram: DEFAULT_RESERVED_RAM,
        }
    }

    pub fn with_reserved_ram(
        name: impl Into<String>,
        arch: impl Into<String>,
        ram: u64,
        reserved_ram: u64,
    ) -> Self {
        Host {
            name: name.into(),
            arch: arch.into(),
            ram,
            reserved_ram,
        }
    }

    /// RAM available to guests, i.e. `ram - reserved_ram`.
    pub fn usable_ram(&self) -> u64 {
        self.ram.saturating_sub(self.reserved_ram)
    }
}

impl std::fmt::Display for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Which guest architectures a host architecture may run, hard-coded policy
/// rather than configuration (see `spec` §3 / §6).
///
/// `i386` hosts may only run `i386` guests; `x86_64` hosts may run either.
pub fn arch_compatible(host_arch: &str, guest_arch: &str) -> bool {
    match host_arch {
        "i386" => guest_arch == "i386",
        "x86_64" => guest_arch == "i386" || guest_arch == "x86_64",
        _ => false,
    }
}

type GuestTable = HashMap<String, Arc<Guest>>;
type HostTable = HashMap<String, Arc<Host>>;

struct Registries {
    guests: GuestTable,
    hosts: HostTable,
}

impl Registries {
    fn new() -> Self {
        Registries {
            guests: HashMap::new(),
            hosts: HashMap::new(),
        }
    }
}

fn registries() -> &'static RwLock<Registries> {
    static REGISTRIES: OnceLock<RwLock<Registries>> = OnceLock::new();
    REGISTRIES.get_or_init(|| RwLock::new(Registries::new()))
}

/// Registers a new guest in the process-wide registry.
///
/// # Errors
/// Returns [`SnapshotError::DuplicateGuest`] if a guest with this name is
/// already registered.
pub fn new_guest(
    name: impl Into<String>,
    arch: impl Into<String>,
    ram: u64,
) -> Result<Arc<Guest>, SnapshotError> {
    let name = name.into();
    let mut registries = registries().write().expect("registry lock poisoned");
    if registries.guests.contains_key(&name) {
        return Err(SnapshotError::DuplicateGuest(name));
    }
    let guest = Arc::new(Guest::new(name.clone(), arch, ram));
    registries.guests.insert(name, guest.clone());
    Ok(guest)
}

/// Registers a new host in the process-wide registry. `reserved_ram`
/// defaults to [`DEFAULT_RESERVED_RAM`] when `None`.
///
/// # Errors
/// Returns `SnapshotError::DuplicateGuest(name)` if a host with this name
/// is already registered — there's no separate "duplicate host" kind since
/// nothing in the error surface ever needs to tell the two apart.
pub fn new_host(
    name: impl Into<String>,
    arch: impl Into<String>,
    ram: u64,
    reserved_ram: Option<u64>,
) -> Result<Arc<Host>, SnapshotError> {
    let name = name.into();
    let mut registries = registries().write().expect("registry lock poisoned");
    if registries.hosts.contains_key(&name) {
        return Err(SnapshotError::DuplicateGuest(name));
    }
    let host = Arc::new(Host::with_reserved_ram(
        name.clone(),
        arch,
        ram,
        reserved_ram.unwrap_or(DEFAULT_RESERVED_RAM),
    ));
    registries.hosts.insert(name, host.clone());
    Ok(host)
}

/// Looks up a registered guest by name.
pub fn guest(name: &str) -> Option<Arc<Guest>> {
    registries().read().expect("registry lock poisoned").guests.get(name).cloned()
}

/// Looks up a registered host by name.
pub fn host(name: &str) -> Option<Arc<Host>> {
    registries().read().expect("registry lock poisoned").hosts.get(name).cloned()
}

/// Every currently registered host name, sorted for determinism.
///
/// A snapshot must carry an entry (possibly empty) for each of these: a
/// registered host with no guests on it is still a valid migration
/// destination, and the original `VMPoolState.init_by_vmhosts` always
/// seeds one for every host it knows about.
pub fn registered_host_names() -> Vec<String> {
    let mut names: Vec<String> = registries()
        .read()
        .expect("registry lock poisoned")
        .hosts
        .keys()
        .cloned()
        .collect();
    names.sort();
    names
}

/// Clears both registries. Intended for test isolation between scenarios
/// that would otherwise collide on guest/host names.
pub fn reset_registries() {
    let mut registries = registries().write().expect("registry lock poisoned");
    registries.guests.clear();
    registries.hosts.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_and_looks_up_a_guest() {
        reset_registries();
        new_guest("vm1", "x86_64", 256).unwrap();
        let g = guest("vm1").expect("should be registered");
        assert_eq!(g.arch, "x86_64");
        assert_eq!(g.ram, 256);
    }

    #[test]
    fn rejects_duplicate_guest_names() {
        reset_registries();
        new_guest("vm1", "x86_64", 256).unwrap();
        let err = new_guest("vm1", "x86_64", 512).unwrap_err();
        assert_eq!(err, SnapshotError::DuplicateGuest("vm1".to_string()));
    }

    #[test]
    fn host_usable_ram_subtracts_reserved() {
        let h = Host::new("host1", "x86_64", 4096);
        assert_eq!(h.usable_ram(), 4096 - DEFAULT_RESERVED_RAM);
    }

    #[test]
    fn arch_compatibility_matrix() {
        assert!(arch_compatible("x86_64", "x86_64"));
        assert!(arch_compatible("x86_64", "i386"));
        assert!(arch_compatible("i386", "i386"));
        assert!(!arch_compatible("i386", "x86_64"));
    }

    #[test]
    fn reset_registries_clears_both_tables() {
        reset_registries();
        new_guest("vm1", "x86_64", 256).unwrap();
        new_host("host1", "x86_64", 4096, None).unwrap();
        reset_registries();
        assert!(guest("vm1").is_none());
        assert!(host("host1").is_none());
    }

    #[test]
    fn registered_host_names_is_sorted_and_complete() {
        reset_registries();
        new_host("hostB", "x86_64", 4096, None).unwrap();
        new_host("hostA", "x86_64", 4096, None).unwrap();
        new_host("hostC", "x86_64", 4096, None).unwrap();
        assert_eq!(
            registered_host_names(),
            vec!["hostA".to_string(), "hostB".to_string(), "hostC".to_string()]
        );
    }
}

//! A single VM migration: one guest moving from one host to another.

use crate::entity;

/// One step of a migration plan: `guest` moves from `from_host` to
/// `to_host`. `from_host` and `to_host` are always distinct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub guest: String,
    pub from_host: String,
    pub to_host: String,
    pub cost: u64,
}

impl Migration {
    /// Builds a migration record, looking up `guest`'s RAM in the registry
    /// to derive `cost`.
    ///
    /// # Panics
    /// If `guest` is not registered — a migration should never be
    /// constructed for a guest that doesn't exist.
    pub fn new(
        guest: impl Into<String>,
        from_host: impl Into<String>,
        to_host: impl Into<String>,
    ) -> Self {
        let guest = guest.into();
        let ram = entity::guest(&guest)
            .unwrap_or_else(|| panic!("guest {guest} referenced but not registered"))
            .ram;
        Migration {
            guest,
            from_host: from_host.into(),
            to_host: to_host.into(),
            cost: ram,
        }
    }
}

impl std::fmt::Display for Migration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} -> {}  cost {}",
            self.guest, self.from_host, self.to_host, self.cost
        )
    }
}

/// Sums `guest.ram` over a sequence of migrations.
pub fn total_cost<'a>(migrations: impl IntoIterator<Item = &'a Migration>) -> u64 {
    migrations.into_iter().map(|m| m.cost).sum()
}

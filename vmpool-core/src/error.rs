//! Error types for the migration planner

use thiserror::Error;

/// Errors raised by direct manipulation of a [`crate::placement::Snapshot`].
///
/// These are programmer errors: they indicate a caller referred to a guest
/// or host that doesn't exist, or tried to perform a no-op migration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("guest {0} is already placed")]
    DuplicateGuest(String),

    #[error("guest {0} is not in this snapshot")]
    UnknownGuest(String),

    #[error("host {0} is not registered")]
    UnknownHost(String),

    #[error("guest {guest} is already on host {host}")]
    SameHost { guest: String, host: String },
}

/// A snapshot that violates a capacity or architecture constraint.
///
/// Both variants carry the exact diagnostic strings used by every consumer
/// of this library, including the planner's own debug log.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InfeasibleState {
    #[error("vmhost {host} requires {guest_ram} for guests + {dom0_ram} for dom0 == {required} > {capacity}")]
    RamExceeded {
        host: String,
        guest_ram: u64,
        dom0_ram: u64,
        required: u64,
        capacity: u64,
    },

    #[error("{host} has arch {host_arch}; incapable of hosting {guest} with arch {guest_arch}")]
    ArchIncompatible {
        host: String,
        host_arch: String,
        guest: String,
        guest_arch: String,
    },
}

/// Fatal errors raised by a [`crate::planner::Planner`] run.
///
/// `InfeasibleState` is deliberately absent here: a strategy always catches
/// it locally and turns it into a `None`/retry decision, never lets it
/// propagate to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlannerError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(#[from] InfeasibleState),

    #[error("planner invariant violated: {message}\n--- debug log ---\n{debug_log}")]
    Invariant { message: String, debug_log: String },
}

//! vmpool-core - Live VM migration path planning
//!
//! Plans a sequence of live migrations that takes a pool of physical hosts
//! from an initial placement of guest VMs to a desired final placement,
//! such that every intermediate placement along the way is itself feasible.
//!
//! Key types:
//! - `Guest` / `Host` (entity) and the process-wide registries that let
//!   snapshots and migrations refer to them by name
//! - `Snapshot` (placement), a value-typed `guest -> host` mapping with a
//!   feasibility check and a canonical string identity
//! - `Migration`, one placement-to-placement step
//! - `Path`, the work lists, boundary snapshots, and migration sequence
//!   produced by a planner run
//! - `Planner`, the framework that validates endpoints and delegates to a
//!   strategy: the recursive displacement planner (default) or the
//!   Dijkstra-based shortest-path planner

pub mod entity;
pub mod error;
pub mod migration;
pub mod path;
pub mod placement;
pub mod planner;
pub mod vomap;

pub use entity::{
    arch_compatible, new_guest, new_host, registered_host_names, reset_registries, Guest, Host,
};
pub use error::{InfeasibleState, PlannerError, SnapshotError};
pub use migration::Migration;
pub use path::Path;
pub use placement::{Snapshot, TryMigrateError};
pub use planner::{DebugLevel, Planner, PlannerConfig, StrategyKind};

//! bootgate - relation coordination for cluster node bootstrap
//!
//! A node joins a cluster through relations with its peers. It may only
//! publish its configuration once local readiness holds, and may only
//! start once it has seen a whole record from its counterpart. bootgate
//! sequences that work: it defers what cannot run yet and replays it the
//! moment its preconditions hold.

pub mod cli;
pub mod config;
pub mod coordination;
pub mod inventory;
pub mod observability;

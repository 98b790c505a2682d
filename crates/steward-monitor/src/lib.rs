//! Reconciliation engine for labelled containers.
//!
//! Every container carrying the [`STATUS_LABEL`](steward_common::constants::STATUS_LABEL)
//! declares the lifecycle state it should be in. The [`Monitor`](monitor::Monitor)
//! periodically compares that desired state with what the runtime reports,
//! turns each mismatch into a [`Change`](change::Change), and applies it
//! against the runtime, the service registry, and the network providers.
//!
//! The runtime, registry, network providers, and spec translator are
//! collaborators reached through the traits in [`runtime`], [`registry`],
//! [`network`], and [`translate`].

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod attach;
pub mod backends;
pub mod change;
pub mod monitor;
pub mod network;
pub mod reconcile;
pub mod registry;
pub mod runtime;
pub mod shutdown;
pub mod signal;
pub mod status;
pub mod terminate;
pub mod translate;

pub use backends::Backends;
pub use change::Change;
pub use monitor::{Monitor, MonitorState};

//! Server synchronization.
//!
//! # Responsibility
//! - Reconcile remote snapshots into the local book (`reconcile`).
//! - Talk to the remote endpoint behind a trait seam (`remote`).
//! - Drive single-flight periodic sync with timeouts (`driver`).
//!
//! # Invariants
//! - Sync never deletes local quotes.
//! - A failed sync leaves the local store unchanged.

pub mod driver;
pub mod reconcile;
pub mod remote;
pub mod status;

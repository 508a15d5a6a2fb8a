//! # sync-core
//!
//! Pure logic for offline-sync (no I/O, instant tests).
//!
//! This crate implements the decisions the sync engine makes without any
//! network or disk I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects:
//! - [`conflict`] decides whether a queued mutation or the server copy prevails
//! - [`retry`] turns a failed attempt into a backoff schedule or an abandonment
//! - [`connectivity`] reduces a noisy online/offline signal to edge transitions
//! - [`plan`] orders a queue snapshot into per-type drain lanes
//!
//! The actual I/O (store, remote calls, timers) is performed by `sync-client`,
//! which interprets the decisions produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod conflict;
pub mod connectivity;
pub mod plan;
pub mod retry;

pub use conflict::{resolve, resolve_item, Decision};
pub use connectivity::{Connectivity, Transition};
pub use plan::{overflow, DrainPlan, Lane};
pub use retry::{RetryPolicy, RetryVerdict, DEFAULT_MAX_RETRIES};

//! # sync-types
//!
//! Data model for the offline-first sync queue.
//!
//! This crate provides the foundational types used across all offline-sync crates:
//! - [`ItemId`], [`ItemType`] - Identity and routing tags for queued mutations
//! - [`SyncItem`] - A queued mutation waiting for delivery
//! - [`RemoteRecord`] - The authoritative server copy used for conflict checks
//! - [`QueueSnapshot`], [`SyncResult`] - Read-only views and drain outcomes
//! - [`TypesError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod item;
mod result;

pub use error::TypesError;
pub use ids::{ItemId, ItemType};
pub use item::{now_millis, parse_timestamp, RemoteRecord, SyncItem};
pub use result::{DrainOutcome, QueueSnapshot, SyncResult};

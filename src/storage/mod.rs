//! SQLite storage layer for MemoryLane.
//!
//! This module provides the persistence layer using SQLite with:
//! - WAL mode so queries read while a sync pass writes
//! - Transaction discipline for atomic, durable writes
//! - Secondary indexes on document path and day key
//!
//! # Submodules
//!
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Row store, sync marker store and settings

pub mod schema;
pub mod sqlite;

pub use sqlite::{IndexCounts, MutationContext, SqliteStorage};

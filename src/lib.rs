//! MemoryLane - an incremental index of tagged lines in a folder of notes
//!
//! This crate provides the indexing core and the `mlane` CLI.
//!
//! # Architecture
//!
//! - [`model`] - Data types (Row, SyncMarker) and date derivation
//! - [`storage`] - SQLite row store, sync markers and settings
//! - [`sync`] - Document sources, per-document reconciliation, folder sync
//! - [`query`] - Search, browse, on-this-day and timeline rendering
//! - [`config`] - Database location and stored settings
//! - [`cli`] - Command-line interface using clap
//! - [`error`] - Error types and handling

#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod query;
pub mod storage;
pub mod sync;
pub mod validate;

pub use error::{Error, Result};

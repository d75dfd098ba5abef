//! Data models for MemoryLane.
//!
//! This module contains the domain models:
//! - Row (one indexed tagged line)
//! - SyncMarker (per folder+tag reconciliation bookmark)

pub mod row;

pub use row::{
    Row, SortDirection, SyncMarker, day_key, extract_row_date, local_date, local_midnight_millis,
    year_key,
};

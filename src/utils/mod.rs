//! Shared helpers
//!
//! - Atomic output: temp file + rename for every file the pipeline writes
//! - Region lists: splitting delimited code fields

pub mod atomic_write;
pub mod region_list;

pub use atomic_write::{write_atomic, write_json_atomic};
pub use region_list::split_region_field;

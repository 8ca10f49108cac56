//! Timestamp and run-identifier helpers shared across the crate.

pub mod run_id;
pub mod timestamps;

pub use run_id::generate_run_id;
pub use timestamps::{compact_timestamp, iso_timestamp, now_utc, Timestamp};

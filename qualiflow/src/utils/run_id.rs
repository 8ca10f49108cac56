//! Run identifier generation.
//!
//! The external scheduler usually supplies the `run_id`; this helper
//! covers ad-hoc invocations (demos, tests, manual reruns).

use uuid::Uuid;

/// Generates a fresh opaque run identifier.
#[must_use]
pub fn generate_run_id() -> String {
    Uuid::new_v4().to_string()
}

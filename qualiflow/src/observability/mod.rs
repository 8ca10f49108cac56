//! Tracing subscriber bootstrap.
//!
//! The scheduler wrapping a run decides where logs go; this module only
//! installs a subscriber when the host process has not already done so.

use tracing_subscriber::EnvFilter;

/// Initializes a human-readable tracing subscriber.
///
/// Honors `RUST_LOG` when set; falls back to `default_filter` otherwise.
/// Safe to call more than once: a pre-installed global subscriber wins.
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}

/// Initializes a JSON tracing subscriber for machine-consumed logs.
pub fn init_json(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init("info");
        init("debug");
        init_json("warn");
    }
}

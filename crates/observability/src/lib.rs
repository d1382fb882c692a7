//! Logging setup for the server binary and its tests.

pub mod tracing;

/// JSON logs at `info` unless `RUST_LOG` says otherwise. Idempotent.
pub fn init() {
    tracing::init("info");
}

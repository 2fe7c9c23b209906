//! Logging and metrics initialisation shared by batcher binaries and tests.

pub mod metrics;
pub mod tracing;

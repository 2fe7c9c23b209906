//! Configuration types and loading for batching queues.
//!
//! Shared configuration lives in [`shared`]; [`load_config`] assembles it from configuration files
//! and `APP_`-prefixed environment variables for binaries.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from};

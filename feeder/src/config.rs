use std::path::Path;
use std::time::Duration;

use batcher_config::shared::{BatchConfig, ValidationError};
use batcher_config::{Config, Environment, load_config, load_config_from};
use serde::Deserialize;

/// Settings of the feeder: the queue it drives and the synthetic workload it submits.
#[derive(Debug, Clone, Deserialize)]
pub struct FeederConfig {
    #[serde(default)]
    pub batch: BatchConfig,
    /// Number of events to submit before closing the queue.
    pub events: usize,
    /// Pause between two submitted events.
    pub event_interval_ms: u64,
    /// Simulated processing time of one batch.
    pub handler_delay_ms: u64,
}

impl Config for FeederConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        self.batch.validate()
    }
}

impl FeederConfig {
    pub fn event_interval(&self) -> Duration {
        Duration::from_millis(self.event_interval_ms)
    }

    pub fn handler_delay(&self) -> Duration {
        Duration::from_millis(self.handler_delay_ms)
    }
}

/// Loads the feeder configuration from `directory`, or from `./configuration` when none is given.
pub fn load_feeder_config(directory: Option<&Path>) -> anyhow::Result<FeederConfig> {
    let config = match directory {
        Some(directory) => load_config_from(directory, Environment::load()?)?,
        None => load_config()?,
    };

    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn shipped_base_configuration_loads() {
        let directory = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("configuration");

        let config = load_config_from::<FeederConfig>(&directory, Environment::Dev).unwrap();

        assert_eq!(config.batch, BatchConfig::new(5, Duration::from_secs(2)));
        assert_eq!(config.events, 12);
        assert_eq!(config.event_interval(), Duration::from_millis(300));
        assert_eq!(config.handler_delay(), Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn prod_configuration_overrides_the_batch() {
        let directory = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("configuration");

        let config = load_config_from::<FeederConfig>(&directory, Environment::Prod).unwrap();

        assert_eq!(config.batch.max_size, 100);
        assert_eq!(config.batch.max_fill(), Duration::from_secs(1));
        assert_eq!(config.events, 12);
    }
}

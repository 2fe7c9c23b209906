use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Batching configuration for a queue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BatchConfig {
    /// Maximum number of items handed to the handler in a single batch.
    #[serde(default = "default_batch_max_size")]
    pub max_size: usize,
    /// Maximum time, in milliseconds, a partially filled backlog may wait before being flushed.
    #[serde(default = "default_batch_max_fill_ms")]
    pub max_fill_ms: u64,
}

impl BatchConfig {
    /// Default maximum batch size.
    pub const DEFAULT_MAX_SIZE: usize = 10000;

    /// Default maximum fill time in milliseconds.
    pub const DEFAULT_MAX_FILL_MS: u64 = 1000;

    /// Creates a configuration from a capacity and a flush interval.
    ///
    /// Intervals below one millisecond are rounded up so they survive [`BatchConfig::validate`].
    pub fn new(max_size: usize, max_fill: Duration) -> Self {
        let max_fill_ms = u64::try_from(max_fill.as_millis()).unwrap_or(u64::MAX);

        Self {
            max_size,
            max_fill_ms: if max_fill.is_zero() {
                0
            } else {
                max_fill_ms.max(1)
            },
        }
    }

    /// Returns the flush interval as a [`Duration`].
    pub fn max_fill(&self) -> Duration {
        Duration::from_millis(self.max_fill_ms)
    }

    /// Validates batch configuration settings.
    ///
    /// Ensures both the batch size and the fill interval are non-zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_size == 0 {
            return Err(ValidationError::MaxSizeZero);
        }

        if self.max_fill_ms == 0 {
            return Err(ValidationError::MaxFillZero);
        }

        Ok(())
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_size: default_batch_max_size(),
            max_fill_ms: default_batch_max_fill_ms(),
        }
    }
}

fn default_batch_max_size() -> usize {
    BatchConfig::DEFAULT_MAX_SIZE
}

fn default_batch_max_fill_ms() -> u64 {
    BatchConfig::DEFAULT_MAX_FILL_MS
}

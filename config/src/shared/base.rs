use thiserror::Error;

/// Errors raised when validating configuration values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A batch must be able to hold at least one item.
    #[error("`batch.max_size` must be greater than 0")]
    MaxSizeZero,
    /// A partially filled batch must be flushed after a positive delay.
    #[error("`batch.max_fill_ms` must be greater than 0")]
    MaxFillZero,
}

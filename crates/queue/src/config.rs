//! Queue tuning.

use std::time::Duration;

/// Quiet period the editor waits for after the last edit before writing.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    pub debounce: Duration,
}

impl QueueConfig {
    pub fn with_debounce_ms(ms: u64) -> Self {
        Self { debounce: Duration::from_millis(ms) }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { debounce: DEFAULT_DEBOUNCE }
    }
}

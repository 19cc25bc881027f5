//! Store configuration.

use std::time::Duration;

/// Configuration for an [`ObjectStore`](crate::ObjectStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// How long a transaction waits for an object lock held by another
    /// transaction before failing with a retryable conflict.
    pub lock_wait: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_wait: Duration::from_millis(500),
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the lock wait.
    #[must_use]
    pub const fn lock_wait(mut self, wait: Duration) -> Self {
        self.lock_wait = wait;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        assert_eq!(StoreConfig::default().lock_wait, Duration::from_millis(500));
    }

    #[test]
    fn builder_pattern() {
        let config = StoreConfig::new().lock_wait(Duration::from_millis(5));
        assert_eq!(config.lock_wait, Duration::from_millis(5));
    }
}

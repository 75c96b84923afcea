//! Engine configuration.

use std::time::Duration;

/// Configuration for an [`Engine`](crate::Engine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a blocked lock acquisition waits before retrying.
    ///
    /// Waiters also wake early whenever locks are released. Deadlock
    /// detection runs on every retry.
    pub lock_retry_interval: Duration,

    /// Upper bound on the number of keys tracked in a read set.
    ///
    /// Reads past the bound are still served but are not validated at
    /// commit. `None` tracks every read.
    pub max_read_set: Option<usize>,

    /// Whether writing an unknown key creates it.
    ///
    /// Lazily created keys start with an empty committed value.
    pub create_missing_keys: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_retry_interval: Duration::from_millis(5),
            max_read_set: None,
            create_missing_keys: true,
        }
    }
}

impl EngineConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the lock retry interval.
    #[must_use]
    pub const fn lock_retry_interval(mut self, interval: Duration) -> Self {
        self.lock_retry_interval = interval;
        self
    }

    /// Sets the read set bound.
    #[must_use]
    pub const fn max_read_set(mut self, limit: Option<usize>) -> Self {
        self.max_read_set = limit;
        self
    }

    /// Sets whether writes create missing keys.
    #[must_use]
    pub const fn create_missing_keys(mut self, value: bool) -> Self {
        self.create_missing_keys = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.lock_retry_interval, Duration::from_millis(5));
        assert!(config.max_read_set.is_none());
        assert!(config.create_missing_keys);
    }

    #[test]
    fn builder_pattern() {
        let config = EngineConfig::new()
            .lock_retry_interval(Duration::from_millis(1))
            .max_read_set(Some(32))
            .create_missing_keys(false);

        assert_eq!(config.lock_retry_interval, Duration::from_millis(1));
        assert_eq!(config.max_read_set, Some(32));
        assert!(!config.create_missing_keys);
    }
}

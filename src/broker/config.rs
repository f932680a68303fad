//! Broker configuration

/// Default per-subscription queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 128;

/// Broker configuration options
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// How many items a subscriber may fall behind before it is disconnected
    pub queue_capacity: usize,

    /// Replay history for every new subscription, even without a resume token
    pub replay_all: bool,

    /// Allow gzip content encoding when the client accepts it
    pub gzip: bool,

    /// Allow streams to be read from any origin
    pub allow_cors: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            replay_all: false,
            gzip: false,
            allow_cors: false,
        }
    }
}

impl BrokerConfig {
    /// Set the per-subscription queue capacity (at least 1)
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Replay history for every new subscription
    pub fn replay_all(mut self, enabled: bool) -> Self {
        self.replay_all = enabled;
        self
    }

    /// Enable gzip negotiation
    pub fn gzip(mut self, enabled: bool) -> Self {
        self.gzip = enabled;
        self
    }

    /// Enable cross-origin access
    pub fn allow_cors(mut self, enabled: bool) -> Self {
        self.allow_cors = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BrokerConfig::default();

        assert_eq!(config.queue_capacity, 128);
        assert!(!config.replay_all);
        assert!(!config.gzip);
        assert!(!config.allow_cors);
    }

    #[test]
    fn test_builder_queue_capacity() {
        let config = BrokerConfig::default().queue_capacity(16);

        assert_eq!(config.queue_capacity, 16);
    }

    #[test]
    fn test_builder_queue_capacity_floor() {
        // A zero-capacity queue cannot be created
        let config = BrokerConfig::default().queue_capacity(0);

        assert_eq!(config.queue_capacity, 1);
    }

    #[test]
    fn test_builder_chaining() {
        let config = BrokerConfig::default()
            .queue_capacity(4)
            .replay_all(true)
            .gzip(true)
            .allow_cors(true);

        assert_eq!(config.queue_capacity, 4);
        assert!(config.replay_all);
        assert!(config.gzip);
        assert!(config.allow_cors);
    }
}

//! World configuration.

/// Configuration shared by the levels of a [`World`](crate::World).
#[derive(Debug, Clone)]
pub struct WorldConfig {
    /// Maximum number of random positions tried when placing a character or
    /// item without explicit coordinates.
    pub max_placement_attempts: u32,
    /// Whether a joining character also receives the single-cell update that
    /// announces it to the others. It always receives the full board.
    pub broadcast_to_joiner: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            max_placement_attempts: 1_000,
            broadcast_to_joiner: false,
        }
    }
}

impl WorldConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the placement attempt bound.
    #[must_use]
    pub const fn max_placement_attempts(mut self, attempts: u32) -> Self {
        self.max_placement_attempts = attempts;
        self
    }

    /// Sets whether joiners receive their own update.
    #[must_use]
    pub const fn broadcast_to_joiner(mut self, enabled: bool) -> Self {
        self.broadcast_to_joiner = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = WorldConfig::default();
        assert_eq!(config.max_placement_attempts, 1_000);
        assert!(!config.broadcast_to_joiner);
    }

    #[test]
    fn builder_pattern() {
        let config = WorldConfig::new()
            .max_placement_attempts(3)
            .broadcast_to_joiner(true);
        assert_eq!(config.max_placement_attempts, 3);
        assert!(config.broadcast_to_joiner);
    }
}

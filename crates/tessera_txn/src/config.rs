//! Coordinator and scheduler configuration.

use crate::error::{TxnError, TxnResult};
use std::collections::HashMap;
use std::time::Duration;

/// Property naming the bounded timeout in milliseconds.
pub const TIMEOUT_PROPERTY: &str = "tessera.txn.timeout";

/// Property naming the unbounded timeout in milliseconds.
pub const UNBOUNDED_TIMEOUT_PROPERTY: &str = "tessera.txn.unbounded.timeout";

/// Property disabling the prepare-and-commit optimization.
pub const DISABLE_PREPARE_AND_COMMIT_PROPERTY: &str = "tessera.txn.disable.prepareAndCommit";

/// Configuration for a [`TransactionCoordinator`](crate::TransactionCoordinator).
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Timeout for transactions created with [`TimeoutPolicy::Bounded`](crate::TimeoutPolicy).
    pub bounded_timeout: Duration,

    /// Timeout for transactions created with [`TimeoutPolicy::Unbounded`](crate::TimeoutPolicy).
    ///
    /// `Duration::MAX` never expires.
    pub unbounded_timeout: Duration,

    /// Whether to skip the prepare-and-commit shortcut for a durable last
    /// participant.
    pub disable_prepare_and_commit: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            bounded_timeout: Duration::from_millis(100),
            unbounded_timeout: Duration::MAX,
            disable_prepare_and_commit: false,
        }
    }
}

impl CoordinatorConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bounded timeout.
    #[must_use]
    pub const fn bounded_timeout(mut self, timeout: Duration) -> Self {
        self.bounded_timeout = timeout;
        self
    }

    /// Sets the unbounded timeout.
    #[must_use]
    pub const fn unbounded_timeout(mut self, timeout: Duration) -> Self {
        self.unbounded_timeout = timeout;
        self
    }

    /// Sets whether the prepare-and-commit shortcut is disabled.
    #[must_use]
    pub const fn disable_prepare_and_commit(mut self, value: bool) -> Self {
        self.disable_prepare_and_commit = value;
        self
    }

    /// Checks that both timeouts are positive.
    pub fn validate(&self) -> TxnResult<()> {
        if self.bounded_timeout.is_zero() {
            return Err(TxnError::invalid_argument(
                "bounded timeout must be greater than zero",
            ));
        }
        if self.unbounded_timeout.is_zero() {
            return Err(TxnError::invalid_argument(
                "unbounded timeout must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Builds a configuration from string properties.
    ///
    /// Missing properties keep their defaults. Timeouts are given in
    /// milliseconds and must parse as positive integers.
    pub fn from_properties(properties: &HashMap<String, String>) -> TxnResult<Self> {
        let mut config = Self::default();
        if let Some(value) = properties.get(TIMEOUT_PROPERTY) {
            config.bounded_timeout = parse_millis(TIMEOUT_PROPERTY, value)?;
        }
        if let Some(value) = properties.get(UNBOUNDED_TIMEOUT_PROPERTY) {
            config.unbounded_timeout = parse_millis(UNBOUNDED_TIMEOUT_PROPERTY, value)?;
        }
        if let Some(value) = properties.get(DISABLE_PREPARE_AND_COMMIT_PROPERTY) {
            config.disable_prepare_and_commit = value.trim().parse().map_err(|_| {
                TxnError::invalid_argument(format!(
                    "{DISABLE_PREPARE_AND_COMMIT_PROPERTY} must be true or false, got {value:?}"
                ))
            })?;
        }
        config.validate()?;
        Ok(config)
    }
}

fn parse_millis(name: &str, value: &str) -> TxnResult<Duration> {
    let millis: i64 = value.trim().parse().map_err(|_| {
        TxnError::invalid_argument(format!("{name} must be a number, got {value:?}"))
    })?;
    if millis <= 0 {
        return Err(TxnError::invalid_argument(format!(
            "{name} must be greater than zero, got {millis}"
        )));
    }
    Ok(Duration::from_millis(millis.unsigned_abs()))
}

/// Configuration for a [`TransactionScheduler`](crate::TransactionScheduler).
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum number of attempts for a unit of work, including the first.
    pub max_attempts: u32,

    /// Timeout policy for transactions created by the scheduler.
    pub timeout_policy: crate::TimeoutPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            timeout_policy: crate::TimeoutPolicy::Bounded,
        }
    }
}

impl SchedulerConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of attempts.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the timeout policy.
    #[must_use]
    pub const fn with_timeout_policy(mut self, policy: crate::TimeoutPolicy) -> Self {
        self.timeout_policy = policy;
        self
    }
}

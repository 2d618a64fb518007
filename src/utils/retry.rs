use std::time::Duration;

/// Policy for re-fetching a block the metadata service has not indexed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries; if None, indicates infinite retries
    pub max_retries: Option<u32>,
    /// Fixed delay before each retry
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: None,
            delay: Duration::from_secs(12),
        }
    }
}

impl RetryPolicy {
    pub fn new(delay: Duration, max_retries: Option<u32>) -> Self {
        Self { max_retries, delay }
    }

    /// Whether retry number `attempt` (1-based) is still allowed.
    pub fn allows(&self, attempt: u32) -> bool {
        match self.max_retries {
            Some(max) => attempt <= max,
            None => true,
        }
    }

    /// Minimum time spent waiting before the `retries`-th retry completes.
    pub fn total_delay(&self, retries: u32) -> Duration {
        self.delay * retries
    }
}

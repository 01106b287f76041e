use crate::{Error, Item, Result, SentinelRule};
use core::time::Duration;

/// Default upper bound on how long the orchestrator waits for each stage to
/// exit after cancellation.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

/// Everything needed to build a [`Pipeline`](crate::Pipeline) with the
/// built-in [`SentinelRule`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Items emitted by the source, in order.
    pub items: Vec<Item>,
    pub rule: SentinelRule,
    pub shutdown_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            items: (0..10).collect(),
            rule: SentinelRule::default(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl PipelineConfig {
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `shutdown_timeout` is zero, which
    /// would abort every stage instead of letting it observe cancellation.
    pub fn validate(&self) -> Result<()> {
        if self.shutdown_timeout.is_zero() {
            return Err(Error::InvalidConfig {
                reason: "shutdown timeout must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

//! Step results
//!
//! `StepResult` is the only output of a provisioning step. `dirty` tells the
//! caller the host status changed and must be persisted; `requeue_after`
//! advises when to call again, independently of `dirty`.

use std::time::Duration;

/// Outcome of a single provisioning step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepResult {
    /// Host status changed and must be persisted
    pub dirty: bool,
    /// Advisory delay before the host is reconsidered; zero for no preference
    pub requeue_after: Duration,
}

impl StepResult {
    /// Nothing changed, no requeue preference
    #[must_use]
    pub fn clean() -> Self {
        Self::default()
    }

    /// Status changed, no requeue preference
    #[must_use]
    pub fn dirty() -> Self {
        Self {
            dirty: true,
            requeue_after: Duration::ZERO,
        }
    }

    /// Same result with a requeue delay
    #[must_use]
    pub fn requeue(mut self, delay: Duration) -> Self {
        self.requeue_after = delay;
        self
    }

    /// Whether the step asked to be called again after a delay
    pub fn should_requeue(&self) -> bool {
        !self.requeue_after.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_result_builders() {
        assert_eq!(StepResult::clean(), StepResult { dirty: false, requeue_after: Duration::ZERO });
        assert!(!StepResult::clean().should_requeue());

        let result = StepResult::dirty().requeue(Duration::from_secs(5));
        assert!(result.dirty);
        assert!(result.should_requeue());
        assert_eq!(result.requeue_after, Duration::from_secs(5));
    }
}

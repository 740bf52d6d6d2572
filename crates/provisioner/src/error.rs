//! Provisioner errors

use thiserror::Error;

/// Errors that can occur while driving a host through a provisioning step
///
/// No variant is fatal to the process: every failure is scoped to one host
/// and recovered by requeueing it.
#[derive(Debug, Error)]
pub enum ProvisionerError {
    /// Backend call failed; retry after a backoff
    #[error("Backend error: {0}")]
    Backend(String),

    /// BMC credentials are missing or malformed
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The step was called in a phase that does not satisfy its preconditions
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// Invalid provisioner configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// User data could not be retrieved
    #[error("User data error: {0}")]
    UserData(String),
}

impl ProvisionerError {
    /// Whether retrying the same step later may succeed without any change
    /// to the host spec or credentials.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProvisionerError::Backend(_) | ProvisionerError::UserData(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ProvisionerError::Backend("timeout".to_string()).is_transient());
        assert!(!ProvisionerError::PreconditionFailed("not registered".to_string()).is_transient());
        assert!(!ProvisionerError::InvalidCredentials("empty username".to_string()).is_transient());
    }
}

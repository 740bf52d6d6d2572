//! BMC credentials

use crate::error::ProvisionerError;
use std::fmt;

/// Connection credentials for a host's BMC
///
/// Immutable for the lifetime of a provisioner.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// BMC user
    pub username: String,
    /// BMC password
    pub password: String,
}

impl Credentials {
    /// Create credentials from a username and password
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Check that both fields are present
    pub fn validate(&self) -> Result<(), ProvisionerError> {
        if self.username.is_empty() {
            return Err(ProvisionerError::InvalidCredentials("missing username".to_string()));
        }
        if self.password.is_empty() {
            return Err(ProvisionerError::InvalidCredentials("missing password".to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

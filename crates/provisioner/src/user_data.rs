//! Provisioning-time user data
//!
//! User data (typically cloud-init) is fetched lazily through a
//! `UserDataSource` so that backends which do not need it never pay for the
//! lookup.

use crate::error::ProvisionerError;

/// Accessor for user data blobs
#[async_trait::async_trait]
pub trait UserDataSource: Send + Sync {
    /// Fetch the user data, if the host has any
    async fn user_data(&self) -> Result<Option<String>, ProvisionerError>;
}

/// Source for hosts without user data
#[derive(Debug, Clone, Copy, Default)]
pub struct NoUserData;

#[async_trait::async_trait]
impl UserDataSource for NoUserData {
    async fn user_data(&self) -> Result<Option<String>, ProvisionerError> {
        Ok(None)
    }
}

/// Source returning a fixed blob
#[derive(Debug, Clone, Default)]
pub struct StaticUserData(pub String);

#[async_trait::async_trait]
impl UserDataSource for StaticUserData {
    async fn user_data(&self) -> Result<Option<String>, ProvisionerError> {
        Ok(Some(self.0.clone()))
    }
}

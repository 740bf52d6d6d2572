//! User data stored in Kubernetes Secrets.
//!
//! The Secret named by `spec.userData` is only read when a provisioning step
//! actually asks for it.

use host_provisioner::{ProvisionerError, UserDataSource};
use k8s_openapi::api::core::v1::Secret;
use kube::Api;
use tracing::debug;

/// Secret key holding the user data blob
pub const USER_DATA_KEY: &str = "userData";

/// Reads user data from a Secret on demand
#[derive(Clone)]
pub struct SecretUserData {
    api: Api<Secret>,
    name: String,
}

impl std::fmt::Debug for SecretUserData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretUserData").field("name", &self.name).finish_non_exhaustive()
    }
}

impl SecretUserData {
    /// Source reading Secret `name` through `api`
    pub fn new(api: Api<Secret>, name: impl Into<String>) -> Self {
        Self {
            api,
            name: name.into(),
        }
    }
}

/// Extracts the user data blob from a Secret. `data` wins over `stringData`.
pub(crate) fn user_data_from_secret(secret: &Secret) -> Result<Option<String>, ProvisionerError> {
    if let Some(bytes) = secret.data.as_ref().and_then(|d| d.get(USER_DATA_KEY)) {
        return String::from_utf8(bytes.0.clone())
            .map(Some)
            .map_err(|e| ProvisionerError::UserData(format!("{USER_DATA_KEY} is not valid UTF-8: {e}")));
    }
    Ok(secret
        .string_data
        .as_ref()
        .and_then(|d| d.get(USER_DATA_KEY))
        .cloned())
}

#[async_trait::async_trait]
impl UserDataSource for SecretUserData {
    async fn user_data(&self) -> Result<Option<String>, ProvisionerError> {
        debug!(secret = %self.name, "Fetching user data");
        let secret = self
            .api
            .get_opt(&self.name)
            .await
            .map_err(|e| ProvisionerError::UserData(format!("failed to read Secret {}: {e}", self.name)))?
            .ok_or_else(|| ProvisionerError::UserData(format!("Secret {} not found", self.name)))?;
        user_data_from_secret(&secret)
    }
}

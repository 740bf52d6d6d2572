//! Controller-specific error types.
//!
//! This module defines error types specific to the BareMetalHost Controller
//! that are not covered by upstream library errors.

use host_provisioner::ProvisionerError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the BareMetalHost Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Provisioning step failed
    #[error("Provisioner error: {0}")]
    Provisioner(#[from] ProvisionerError),

    /// BMC credentials could not be loaded
    #[error("Credentials error: {0}")]
    Credentials(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

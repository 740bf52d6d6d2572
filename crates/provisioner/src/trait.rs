//! Provisioner capability
//!
//! A `Provisioner` is bound to one host for the duration of one
//! reconciliation tick. Every step is idempotent and re-entrant: calling it
//! again without an external change must report `dirty == false`. Steps
//! never call each other; the caller picks the step for the host's phase.

use crate::credentials::Credentials;
use crate::error::ProvisionerError;
use crate::events::EventPublisher;
use crate::result::StepResult;
use crate::user_data::UserDataSource;
use crds::BareMetalHost;
use std::sync::Arc;

/// Provisioning steps over a single host
///
/// Backends may do I/O inside a step but must express long-running work
/// through `StepResult::requeue_after` instead of waiting for it.
#[async_trait::async_trait]
pub trait Provisioner: Send {
    /// Register the host with the backend, or clear a stale error once registered
    async fn validate_management_access(&mut self) -> Result<StepResult, ProvisionerError>;

    /// Discover hardware and record it on the host in one piece
    async fn inspect_hardware(&mut self) -> Result<StepResult, ProvisionerError>;

    /// Cheap refresh of hardware state for hosts not pending provisioning
    async fn update_hardware_state(&mut self) -> Result<StepResult, ProvisionerError>;

    /// Write the desired image to the host
    async fn provision(&mut self, user_data: &dyn UserDataSource) -> Result<StepResult, ProvisionerError>;

    /// Tear the host down: hardware details first, then the provisioning ID
    ///
    /// The first clean call is terminal and reports completion. Callers must
    /// stop calling once it has been recorded; another call reports it again.
    async fn deprovision(&mut self, force_delete: bool) -> Result<StepResult, ProvisionerError>;

    /// Ensure the host is powered on
    async fn power_on(&mut self) -> Result<StepResult, ProvisionerError>;

    /// Ensure the host is powered off
    async fn power_off(&mut self) -> Result<StepResult, ProvisionerError>;
}

/// Builds provisioners for a backend
///
/// Construction must not perform I/O. It may fail only on invalid
/// credentials.
pub trait ProvisionerFactory: Send + Sync {
    /// Bind a provisioner to `host`
    fn new_provisioner<'a>(
        &self,
        host: &'a mut BareMetalHost,
        credentials: Credentials,
        publisher: Arc<dyn EventPublisher>,
    ) -> Result<Box<dyn Provisioner + 'a>, ProvisionerError>;
}

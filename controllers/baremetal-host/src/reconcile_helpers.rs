//! Helper functions for the BareMetalHost reconcile loop
//!
//! Everything here is pure with respect to the Kubernetes API: step
//! selection, finalizer bookkeeping, status patches, and requeue policy.
//! The reconciler wires these together around the API calls.

use crate::error::ControllerError;
use crds::{BareMetalHost, BareMetalHostStatus, HostPhase};
use host_provisioner::{Credentials, Provisioner, ProvisionerError, StepResult, UserDataSource};
use k8s_openapi::api::core::v1::Secret;
use kube_runtime::controller::Action;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Finalizer holding a host until its teardown completes
pub const FINALIZER: &str = "metal3.dcops.microscaler.io/baremetalhost";

/// Requeue delay when a step changed the host but asked for no delay
pub const DIRTY_REQUEUE: Duration = Duration::from_secs(1);

/// Periodic resync for hosts with nothing left to do
pub const RESYNC_INTERVAL: Duration = Duration::from_secs(300);

/// Secret key holding the BMC username
pub const USERNAME_KEY: &str = "username";

/// Secret key holding the BMC password
pub const PASSWORD_KEY: &str = "password";

/// The single provisioner operation run in one reconciliation tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// `validate_management_access`
    Register,
    /// `inspect_hardware`
    Inspect,
    /// `update_hardware_state`
    UpdateHardwareState,
    /// `provision`
    Provision,
    /// `deprovision`
    Deprovision,
    /// `power_on`
    PowerOn,
    /// `power_off`
    PowerOff,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Register => "Register",
            Step::Inspect => "Inspect",
            Step::UpdateHardwareState => "UpdateHardwareState",
            Step::Provision => "Provision",
            Step::Deprovision => "Deprovision",
            Step::PowerOn => "PowerOn",
            Step::PowerOff => "PowerOff",
        };
        f.write_str(name)
    }
}

/// Picks the step for a host in `phase`.
///
/// Power is only reconciled once the host has settled (`Ready` or
/// `Provisioned`); until then the lifecycle step takes the tick.
pub fn select_step(host: &BareMetalHost, phase: HostPhase) -> Step {
    match phase {
        HostPhase::Unregistered | HostPhase::Registered => Step::Register,
        HostPhase::Inspecting => Step::Inspect,
        HostPhase::Provisioning => Step::Provision,
        HostPhase::Deprovisioning | HostPhase::Deprovisioned => Step::Deprovision,
        HostPhase::Ready | HostPhase::Provisioned => {
            match (host.spec.online, host.powered_on()) {
                (true, false) => Step::PowerOn,
                (false, true) => Step::PowerOff,
                _ => Step::UpdateHardwareState,
            }
        }
    }
}

/// Runs `step` against a bound provisioner
pub async fn run_step(
    provisioner: &mut (dyn Provisioner + '_),
    step: Step,
    user_data: &dyn UserDataSource,
    force_delete: bool,
) -> Result<StepResult, ProvisionerError> {
    debug!(%step, "Running provisioning step");
    match step {
        Step::Register => provisioner.validate_management_access().await,
        Step::Inspect => provisioner.inspect_hardware().await,
        Step::UpdateHardwareState => provisioner.update_hardware_state().await,
        Step::Provision => provisioner.provision(user_data).await,
        Step::Deprovision => provisioner.deprovision(force_delete).await,
        Step::PowerOn => provisioner.power_on().await,
        Step::PowerOff => provisioner.power_off().await,
    }
}

/// Phase to record after `step` returned `result`.
///
/// `Registered` cannot be told apart from `Inspecting` by the status fields,
/// so it is recorded right after the registering call. `Deprovisioned` is
/// only recorded once the terminal deprovision call has run.
pub fn observed_phase(host: &BareMetalHost, step: Step, result: &StepResult) -> HostPhase {
    let phase = host.phase();
    match step {
        Step::Register if result.dirty && host.hardware_details().is_none() => HostPhase::Registered,
        Step::Deprovision if result.dirty && phase == HostPhase::Deprovisioned => HostPhase::Deprovisioning,
        _ => phase,
    }
}

/// Mirrors `phase` into `status.provisioning.state`. Returns true if it changed.
pub fn record_phase(host: &mut BareMetalHost, phase: HostPhase) -> bool {
    let status = host.status_mut();
    if status.provisioning.state == phase {
        return false;
    }
    status.provisioning.state = phase;
    true
}

/// Whether the terminal deprovision call has finished the teardown
pub fn teardown_complete(host: &BareMetalHost, phase: HostPhase, result: &StepResult) -> bool {
    phase == HostPhase::Deprovisioned
        && !result.dirty
        && host.provisioning_id().is_empty()
        && host.hardware_details().is_none()
}

/// Whether a finished teardown was already recorded on a previous tick.
///
/// The terminal deprovision call reports completion every time it runs, so
/// once `Deprovisioned` is persisted the reconciler acts on it instead of
/// calling the provisioner again.
pub fn teardown_recorded(host: &BareMetalHost, phase: HostPhase) -> bool {
    phase == HostPhase::Deprovisioned
        && host
            .status
            .as_ref()
            .is_some_and(|s| s.provisioning.state == HostPhase::Deprovisioned)
}

/// Whether a host that cannot be torn down should still be let go: it is
/// being deleted and only our finalizer would keep it.
pub fn release_without_teardown(host: &BareMetalHost) -> bool {
    host.metadata.deletion_timestamp.is_some() && has_finalizer(host)
}

/// Forgets the provisioned image of a torn-down host that is not being
/// deleted, returning it to `Unregistered`. Returns true if anything changed.
pub fn recycle(host: &mut BareMetalHost) -> bool {
    if host.provisioned_image().is_none() {
        return false;
    }
    host.status_mut().provisioning.image = crds::Image::default();
    true
}

/// Builds the merge patch persisting the whole status.
///
/// Cleared optional fields are emitted as `null` so the merge removes them.
pub fn create_host_status_patch(status: &BareMetalHostStatus) -> Result<serde_json::Value, ControllerError> {
    let status = serde_json::to_value(status)
        .map_err(|e| ControllerError::InvalidConfig(format!("failed to serialize host status: {e}")))?;
    Ok(serde_json::json!({ "status": status }))
}

/// Requeue policy after a successful step
pub fn requeue_action(result: &StepResult) -> Action {
    if result.should_requeue() {
        Action::requeue(result.requeue_after)
    } else if result.dirty {
        Action::requeue(DIRTY_REQUEUE)
    } else {
        Action::requeue(RESYNC_INTERVAL)
    }
}

/// Reads one credential field, preferring `data` over `stringData`
fn secret_value(secret: &Secret, key: &str) -> Result<String, ControllerError> {
    if let Some(bytes) = secret.data.as_ref().and_then(|d| d.get(key)) {
        return String::from_utf8(bytes.0.clone())
            .map_err(|e| ControllerError::Credentials(format!("{key} is not valid UTF-8: {e}")));
    }
    secret
        .string_data
        .as_ref()
        .and_then(|d| d.get(key))
        .cloned()
        .ok_or_else(|| ControllerError::Credentials(format!("Secret is missing key {key}")))
}

/// Extracts and validates BMC credentials from a Secret
pub fn credentials_from_secret(secret: &Secret) -> Result<Credentials, ControllerError> {
    let credentials = Credentials::new(
        secret_value(secret, USERNAME_KEY)?,
        secret_value(secret, PASSWORD_KEY)?,
    );
    credentials
        .validate()
        .map_err(|e| ControllerError::Credentials(e.to_string()))?;
    Ok(credentials)
}

/// Whether the host carries the controller's finalizer
pub fn has_finalizer(host: &BareMetalHost) -> bool {
    host.metadata
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|name| name == FINALIZER))
}

/// Merge patch adding or removing the controller's finalizer, keeping any
/// finalizers owned by others
pub fn finalizer_patch(host: &BareMetalHost, present: bool) -> serde_json::Value {
    let mut finalizers: Vec<String> = host
        .metadata
        .finalizers
        .iter()
        .flatten()
        .filter(|name| name.as_str() != FINALIZER)
        .cloned()
        .collect();
    if present {
        finalizers.push(FINALIZER.to_string());
    }
    serde_json::json!({
        "metadata": {
            "finalizers": finalizers,
        }
    })
}

#[cfg(test)]
#[path = "reconcile_helpers_test.rs"]
mod tests;

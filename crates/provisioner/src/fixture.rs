//! Simulated provisioning backend
//!
//! `FixtureProvisioner` drives a host through the whole lifecycle without
//! talking to any hardware. Latency is expressed only through requeue delays,
//! and every transition is inferred from the host status, so a reconciler
//! that restarts at any point resumes at the right step.

use crate::config::ProvisionerConfig;
use crate::credentials::Credentials;
use crate::error::ProvisionerError;
use crate::events::{reason, EventPublisher};
use crate::provisioner_trait::{Provisioner, ProvisionerFactory};
use crate::result::StepResult;
use crate::user_data::UserDataSource;
use crds::{BareMetalHost, Cpu, HardwareDetails, Nic, Storage};
use std::sync::Arc;
use tracing::{debug, info, Span};

/// Provisioning ID assigned to every host registered by the fixture
pub const FIXTURE_PROVISIONING_ID: &str = "temporary-fake-id";

/// Provisioner that simulates the backend by editing the host status
pub struct FixtureProvisioner<'a> {
    host: &'a mut BareMetalHost,
    credentials: Credentials,
    publisher: Arc<dyn EventPublisher>,
    config: ProvisionerConfig,
    span: Span,
}

impl std::fmt::Debug for FixtureProvisioner<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixtureProvisioner")
            .field("host", &self.host.name_or_unknown())
            .field("credentials", &self.credentials)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<'a> FixtureProvisioner<'a> {
    /// Bind a fixture provisioner to `host` with the default delays
    pub fn new(
        host: &'a mut BareMetalHost,
        credentials: Credentials,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        let span = tracing::info_span!("fixture", host = %host.name_or_unknown());
        Self {
            host,
            credentials,
            publisher,
            config: ProvisionerConfig::default(),
            span,
        }
    }

    /// Use `config` for requeue delays
    #[must_use]
    pub fn with_config(mut self, config: ProvisionerConfig) -> Self {
        self.config = config;
        self
    }

    fn require_registered(&self, action: &str) -> Result<(), ProvisionerError> {
        if self.host.provisioning_id().is_empty() {
            return Err(ProvisionerError::PreconditionFailed(format!(
                "cannot {action} unregistered host {}",
                self.host.name_or_unknown()
            )));
        }
        Ok(())
    }
}

/// Hardware reported by every fixture inspection
fn fixture_hardware() -> HardwareDetails {
    let nic = |name: &str, model: &str, mac: &str, ip: &str| Nic {
        name: name.to_string(),
        model: model.to_string(),
        network: "Pod Networking".to_string(),
        mac: mac.to_string(),
        ip: ip.to_string(),
        speed_gbps: 1,
    };
    let disk = |name: &str| Storage {
        name: name.to_string(),
        storage_type: "SSD".to_string(),
        size_gib: 1024 * 93,
        model: "Dell CFJ61".to_string(),
    };

    HardwareDetails {
        ram_gib: 128,
        nics: vec![
            nic("nic-1", "virt-io", "some:mac:address", "192.168.100.1"),
            nic("nic-2", "e1000", "some:other:mac:address", "192.168.100.2"),
        ],
        storage: vec![disk("disk-1 (boot)"), disk("disk-2")],
        cpus: vec![Cpu {
            cpu_type: "x86".to_string(),
            speed_ghz: 3,
        }],
    }
}

#[async_trait::async_trait]
impl Provisioner for FixtureProvisioner<'_> {
    async fn validate_management_access(&mut self) -> Result<StepResult, ProvisionerError> {
        info!(parent: &self.span, bmc_user = %self.credentials.username, "testing management access");

        if self.host.provisioning_id().is_empty() {
            self.host.status_mut().provisioning.id = FIXTURE_PROVISIONING_ID.to_string();
            info!(parent: &self.span, provisioning_id = FIXTURE_PROVISIONING_ID, "setting provisioning id");
            self.publisher.publish(reason::REGISTERED, "Registered new host");
            return Ok(StepResult::dirty().requeue(self.config.registration_backoff));
        }

        Ok(StepResult {
            dirty: self.host.clear_error(),
            ..StepResult::default()
        })
    }

    async fn inspect_hardware(&mut self) -> Result<StepResult, ProvisionerError> {
        info!(parent: &self.span, status = ?self.host.operational_status(), "inspecting hardware");
        self.require_registered("inspect")?;

        if self.host.hardware_details().is_some() {
            return Ok(StepResult::clean());
        }

        // Built in full before it is attached to the host.
        let details = fixture_hardware();
        info!(
            parent: &self.span,
            ram_gib = details.ram_gib,
            nics = details.nics.len(),
            storage_gib = details.total_storage_gib(),
            "continuing inspection by setting details"
        );
        self.host.status_mut().hardware_details = Some(details);
        self.publisher.publish(reason::INSPECTION_COMPLETE, "Hardware inspection completed");
        Ok(StepResult::dirty())
    }

    async fn update_hardware_state(&mut self) -> Result<StepResult, ProvisionerError> {
        if !self.host.needs_provisioning() {
            debug!(parent: &self.span, "updating hardware state");
        }
        Ok(StepResult::clean())
    }

    async fn provision(&mut self, _user_data: &dyn UserDataSource) -> Result<StepResult, ProvisionerError> {
        info!(parent: &self.span, state = %self.host.phase(), "provisioning image to host");
        self.require_registered("provision")?;

        let Some(desired) = self.host.spec.image.clone().filter(|image| !image.url.is_empty()) else {
            return Err(ProvisionerError::PreconditionFailed(format!(
                "host {} has no image to provision",
                self.host.name_or_unknown()
            )));
        };

        if self.host.provisioned_image().is_some_and(|recorded| recorded.url == desired.url) {
            return Ok(StepResult::clean());
        }

        self.publisher.publish(reason::PROVISIONING_COMPLETE, "Image provisioning completed");
        info!(parent: &self.span, image = %desired.url, "moving to done");
        self.host.status_mut().provisioning.image = desired;
        Ok(StepResult::dirty().requeue(self.config.provision_poll_delay))
    }

    async fn deprovision(&mut self, force_delete: bool) -> Result<StepResult, ProvisionerError> {
        info!(parent: &self.span, force_delete, "ensuring host is removed");
        let delay = self.config.deprovision_poll_delay;

        if self.host.hardware_details().is_some() {
            self.publisher.publish(reason::DEPROVISION_STARTED, "Image deprovisioning started");
            info!(parent: &self.span, "clearing hardware details");
            self.host.status_mut().hardware_details = None;
            return Ok(StepResult::dirty().requeue(delay));
        }

        if !self.host.provisioning_id().is_empty() {
            info!(parent: &self.span, "clearing provisioning id");
            self.host.status_mut().provisioning.id.clear();
            return Ok(StepResult::dirty().requeue(delay));
        }

        self.publisher.publish(reason::DEPROVISION_COMPLETE, "Image deprovisioning completed");
        Ok(StepResult::clean().requeue(delay))
    }

    async fn power_on(&mut self) -> Result<StepResult, ProvisionerError> {
        info!(parent: &self.span, "ensuring host is powered on");

        if !self.host.powered_on() {
            self.publisher.publish(reason::POWER_ON, "Host powered on");
            info!(parent: &self.span, "changing status");
            self.host.status_mut().powered_on = true;
            return Ok(StepResult::dirty());
        }

        Ok(StepResult::clean())
    }

    async fn power_off(&mut self) -> Result<StepResult, ProvisionerError> {
        info!(parent: &self.span, "ensuring host is powered off");

        if self.host.powered_on() {
            self.publisher.publish(reason::POWER_OFF, "Host powered off");
            info!(parent: &self.span, "changing status");
            self.host.status_mut().powered_on = false;
            return Ok(StepResult::dirty());
        }

        Ok(StepResult::clean())
    }
}

/// Factory for `FixtureProvisioner`
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureFactory {
    config: ProvisionerConfig,
}

impl FixtureFactory {
    /// Create a factory handing `config` to every provisioner
    pub fn new(config: ProvisionerConfig) -> Self {
        Self { config }
    }
}

impl ProvisionerFactory for FixtureFactory {
    fn new_provisioner<'a>(
        &self,
        host: &'a mut BareMetalHost,
        credentials: Credentials,
        publisher: Arc<dyn EventPublisher>,
    ) -> Result<Box<dyn Provisioner + 'a>, ProvisionerError> {
        Ok(Box::new(
            FixtureProvisioner::new(host, credentials, publisher).with_config(self.config),
        ))
    }
}

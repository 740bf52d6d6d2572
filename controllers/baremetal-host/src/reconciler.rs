//! Reconciliation logic for BareMetalHost resources.
//!
//! One reconciliation runs exactly one provisioner step:
//!
//! 1. Ensure the finalizer so teardown can finish before the object goes.
//! 2. Derive the phase. A recorded finished teardown releases or recycles
//!    the host without calling the provisioner again.
//! 3. Load the BMC credentials from the Secret named in `spec.bmc`.
//! 4. Bind a provisioner to the host and run the step for the phase.
//! 5. Persist the status if anything changed and requeue as the step asked.

use crate::backoff::HostBackoffs;
use crate::error::ControllerError;
use crate::events::{reason, KubeEventPublisher};
use crate::reconcile_helpers::{
    create_host_status_patch, credentials_from_secret, finalizer_patch, has_finalizer,
    observed_phase, record_phase, recycle, release_without_teardown, requeue_action, run_step,
    select_step, teardown_complete, teardown_recorded, DIRTY_REQUEUE,
};
use crate::user_data::SecretUserData;
use crds::BareMetalHost;
use host_provisioner::{
    Credentials, EventPublisher, NoUserData, ProvisionerError, ProvisionerFactory, UserDataSource,
};
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client};
use kube_runtime::controller::Action;
use kube_runtime::events::Reporter;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Reconciles BareMetalHost resources.
pub struct Reconciler {
    client: Client,
    reporter: Reporter,
    factory: Box<dyn ProvisionerFactory>,
    /// Error backoff per host
    backoffs: HostBackoffs,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("reporter", &self.reporter)
            .finish_non_exhaustive()
    }
}

/// Key used to track per-host state
pub fn host_key(host: &BareMetalHost) -> String {
    format!(
        "{}/{}",
        host.metadata.namespace.as_deref().unwrap_or("default"),
        host.name_or_unknown()
    )
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(client: Client, reporter: Reporter, factory: impl ProvisionerFactory + 'static) -> Self {
        Self {
            client,
            reporter,
            factory: Box::new(factory),
            backoffs: HostBackoffs::new(),
        }
    }

    /// Records an error for a host and returns how long to wait before retrying
    pub fn error_backoff(&self, key: &str) -> Duration {
        self.backoffs.next_backoff(key)
    }

    /// Removes the finalizer so Kubernetes can delete the host
    async fn release_host(&self, api: &Api<BareMetalHost>, host: &BareMetalHost, key: &str) -> Result<Action, ControllerError> {
        info!(host = %key, "Removing finalizer");
        api.patch(
            host.name_or_unknown(),
            &PatchParams::default(),
            &Patch::Merge(&finalizer_patch(host, false)),
        )
        .await?;
        self.backoffs.forget(key);
        Ok(Action::await_change())
    }

    /// Persists the whole status of `host`
    async fn persist_status(&self, api: &Api<BareMetalHost>, host: &mut BareMetalHost) -> Result<(), ControllerError> {
        let name = host.name_or_unknown().to_string();
        let status = host.status_mut();
        status.last_updated = Some(chrono::Utc::now());
        let status_patch = create_host_status_patch(status)?;

        let pp = PatchParams::default();
        api.patch_status(&name, &pp, &Patch::Merge(&status_patch))
            .await
            .map_err(|e| {
                error!(host = %name, "Failed to update BareMetalHost status: {}", e);
                ControllerError::Kube(e)
            })?;
        Ok(())
    }

    /// Loads BMC credentials for `host`
    async fn load_credentials(&self, host: &BareMetalHost, namespace: &str) -> Result<Credentials, ControllerError> {
        let secret_name = &host.spec.bmc.credentials_name;
        if secret_name.is_empty() {
            return Err(ControllerError::Credentials("spec.bmc.credentialsName is empty".to_string()));
        }
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = secrets
            .get_opt(secret_name)
            .await?
            .ok_or_else(|| ControllerError::Credentials(format!("Secret {namespace}/{secret_name} not found")))?;
        credentials_from_secret(&secret)
    }

    /// User data source for `host`
    fn user_data_source(&self, host: &BareMetalHost, namespace: &str) -> Box<dyn UserDataSource> {
        match &host.spec.user_data {
            Some(reference) => {
                let ns = reference.namespace.as_deref().unwrap_or(namespace);
                Box::new(SecretUserData::new(
                    Api::namespaced(self.client.clone(), ns),
                    reference.name.clone(),
                ))
            }
            None => Box::new(NoUserData),
        }
    }

    /// Records a host-level error, persists it and publishes it once.
    async fn report_error(
        &self,
        api: &Api<BareMetalHost>,
        host: &mut BareMetalHost,
        publisher: &dyn EventPublisher,
        event_reason: &str,
        message: String,
    ) -> Result<Action, ControllerError> {
        let key = host_key(host);
        if host.set_error_message(message.clone()) {
            self.persist_status(api, host).await?;
            publisher.publish(event_reason, &message);
        }
        Ok(Action::requeue(self.error_backoff(&key)))
    }

    /// Reconciles a BareMetalHost resource.
    pub async fn reconcile_baremetal_host(&self, host: &BareMetalHost) -> Result<Action, ControllerError> {
        let name = host
            .metadata
            .name
            .clone()
            .ok_or_else(|| ControllerError::InvalidConfig("BareMetalHost missing name".to_string()))?;
        let namespace = host.metadata.namespace.as_deref().unwrap_or("default").to_string();
        let key = host_key(host);
        let api: Api<BareMetalHost> = Api::namespaced(self.client.clone(), &namespace);
        let deleting = host.metadata.deletion_timestamp.is_some();

        let mut host = host.clone();
        if !has_finalizer(&host) {
            if deleting {
                debug!(host = %key, "Host is being deleted and holds no finalizer");
                return Ok(Action::await_change());
            }
            info!(host = %key, "Adding finalizer");
            host = api
                .patch(&name, &PatchParams::default(), &Patch::Merge(&finalizer_patch(&host, true)))
                .await?;
        }

        let publisher: Arc<dyn EventPublisher> =
            Arc::new(KubeEventPublisher::new(self.client.clone(), self.reporter.clone(), &host));

        let phase = host.phase();
        if teardown_recorded(&host, phase) {
            if deleting {
                info!(host = %key, "Teardown complete");
                return self.release_host(&api, &host, &key).await;
            }
            info!(host = %key, "Teardown complete, host is available again");
            recycle(&mut host);
            let next = host.phase();
            record_phase(&mut host, next);
            self.persist_status(&api, &mut host).await?;
            return Ok(Action::requeue(DIRTY_REQUEUE));
        }

        let credentials = match self.load_credentials(&host, &namespace).await {
            Ok(credentials) => credentials,
            Err(ControllerError::Credentials(message)) if release_without_teardown(&host) => {
                warn!(host = %key, "Cannot load BMC credentials, releasing host without teardown: {}", message);
                publisher.publish(reason::REGISTRATION_ERROR, &format!("{message}; deleted without teardown"));
                return self.release_host(&api, &host, &key).await;
            }
            Err(ControllerError::Credentials(message)) => {
                warn!(host = %key, "Cannot load BMC credentials: {}", message);
                return self
                    .report_error(&api, &mut host, publisher.as_ref(), reason::REGISTRATION_ERROR, message)
                    .await;
            }
            Err(e) => return Err(e),
        };

        let step = select_step(&host, phase);
        info!(host = %key, %phase, %step, "Reconciling BareMetalHost");

        let user_data = self.user_data_source(&host, &namespace);
        let outcome = {
            let mut provisioner = self
                .factory
                .new_provisioner(&mut host, credentials, Arc::clone(&publisher))?;
            run_step(provisioner.as_mut(), step, user_data.as_ref(), deleting).await
        };

        let result = match outcome {
            Ok(result) => result,
            Err(e) if e.is_transient() => {
                warn!(
                    host = %key,
                    %step,
                    errors = self.backoffs.error_count(&key),
                    "Provisioning step failed, will retry: {}",
                    e
                );
                return Err(e.into());
            }
            Err(e) => {
                let event_reason = match &e {
                    ProvisionerError::InvalidCredentials(_) => reason::REGISTRATION_ERROR,
                    _ => reason::PROVISIONING_ERROR,
                };
                warn!(host = %key, %step, "Provisioning step rejected: {}", e);
                return self
                    .report_error(&api, &mut host, publisher.as_ref(), event_reason, e.to_string())
                    .await;
            }
        };
        self.backoffs.reset(&key);

        let mut dirty = result.dirty;
        dirty |= host.clear_error();

        let observed = observed_phase(&host, step, &result);
        dirty |= record_phase(&mut host, observed);
        if dirty {
            self.persist_status(&api, &mut host).await?;
            debug!(host = %key, state = %observed, "Persisted BareMetalHost status");
        }

        // The recorded Deprovisioned state is picked up on the next tick
        if teardown_complete(&host, phase, &result) {
            return Ok(Action::requeue(DIRTY_REQUEUE));
        }
        Ok(requeue_action(&result))
    }
}

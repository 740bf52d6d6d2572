//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires the Kubernetes
//! client, the provisioner backend and the BareMetalHost watcher together.

use crate::error::ControllerError;
use crate::events::reporter;
use crate::reconciler::Reconciler;
use crate::watcher::Watcher;
use crds::BareMetalHost;
use host_provisioner::{FixtureFactory, ProvisionerConfig};
use kube::{Api, Client};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Main controller for BareMetalHost provisioning.
#[derive(Debug)]
pub struct Controller {
    host_watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts its watcher.
    pub async fn new(
        namespace: Option<String>,
        config: ProvisionerConfig,
        instance: Option<String>,
    ) -> Result<Self, ControllerError> {
        info!("Initializing BareMetalHost Controller");

        // Create Kubernetes client
        let kube_client = Client::try_default().await?;

        let host_api: Api<BareMetalHost> = match namespace.as_deref() {
            Some(ns) => Api::namespaced(kube_client.clone(), ns),
            None => Api::all(kube_client.clone()),
        };

        let reconciler = Arc::new(Reconciler::new(
            kube_client,
            reporter(instance),
            FixtureFactory::new(config),
        ));

        let watcher = Watcher::new(reconciler, host_api);
        let host_watcher = tokio::spawn(async move {
            if let Err(e) = watcher.watch_baremetal_hosts().await {
                warn!("BareMetalHost watcher error: {}", e);
                return Err(e);
            }
            Ok(())
        });

        Ok(Self { host_watcher })
    }

    /// Runs the controller until the watcher exits.
    pub async fn run(self) -> Result<(), ControllerError> {
        info!("BareMetalHost Controller running");

        self.host_watcher
            .await
            .map_err(|e| ControllerError::Watch(format!("BareMetalHost watcher panicked: {e}")))?
            .map_err(|e| ControllerError::Watch(format!("BareMetalHost watcher error: {e}")))?;

        Ok(())
    }
}

//! BareMetalHost Controller
//!
//! Drives `BareMetalHost` resources through registration, hardware
//! inspection, image provisioning, deprovisioning and power control, one
//! idempotent provisioner step per reconciliation.
//!
//! Configuration (environment):
//! - `WATCH_NAMESPACE`: namespace to watch (all namespaces when unset)
//! - `POD_NAME`: instance name reported on published events
//! - `REGISTRATION_BACKOFF_SECS`, `PROVISION_POLL_DELAY_SECS`,
//!   `DEPROVISION_POLL_DELAY_SECS`: provisioner delays
//! - `RUST_LOG`: log filter (default `info`)

mod backoff;
mod controller;
mod error;
mod events;
mod reconcile_helpers;
mod reconciler;
mod user_data;
mod watcher;

use crate::error::ControllerError;
use controller::Controller;
use host_provisioner::ProvisionerConfig;
use std::env;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // The kube client needs a process-wide rustls provider before it connects
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        debug!("rustls crypto provider already installed");
    }

    info!("Starting BareMetalHost Controller");

    // Load configuration from environment variables
    let namespace = env::var("WATCH_NAMESPACE").ok().filter(|ns| !ns.is_empty());
    let instance = env::var("POD_NAME").ok();
    let config = ProvisionerConfig::from_env()?;

    info!("Configuration:");
    info!("  Namespace: {}", namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Registration backoff: {:?}", config.registration_backoff);
    info!("  Provision poll delay: {:?}", config.provision_poll_delay);
    info!("  Deprovision poll delay: {:?}", config.deprovision_poll_delay);

    // Initialize and run controller
    let controller = Controller::new(namespace, config, instance).await?;
    controller.run().await?;

    Ok(())
}

//! Kubernetes resource watcher.
//!
//! Drives reconciliation of BareMetalHost resources with
//! `kube_runtime::Controller`, which handles reconnection and requeueing.

use crate::error::ControllerError;
use crate::reconciler::{host_key, Reconciler};
use crds::BareMetalHost;
use futures::StreamExt;
use kube::Api;
use kube_runtime::{controller::{Action, Config as ControllerConfig}, watcher, Controller};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Watches BareMetalHost resources and reconciles them.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    host_api: Api<BareMetalHost>,
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher").field("reconciler", &self.reconciler).finish_non_exhaustive()
    }
}

/// Transient failures are retried with the host's Fibonacci backoff
fn error_policy(host: Arc<BareMetalHost>, error: &ControllerError, ctx: Arc<Reconciler>) -> Action {
    let key = host_key(&host);
    let delay = ctx.error_backoff(&key);
    error!(host = %key, ?delay, "Reconciliation error: {}", error);
    Action::requeue(delay)
}

async fn reconcile(host: Arc<BareMetalHost>, ctx: Arc<Reconciler>) -> Result<Action, ControllerError> {
    debug!(host = %host_key(&host), "Reconciling BareMetalHost");
    ctx.reconcile_baremetal_host(&host).await
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(reconciler: Arc<Reconciler>, host_api: Api<BareMetalHost>) -> Self {
        Self { reconciler, host_api }
    }

    /// Starts watching BareMetalHost resources. Runs until the stream ends.
    pub async fn watch_baremetal_hosts(&self) -> Result<(), ControllerError> {
        info!("Starting BareMetalHost watcher");

        // Debounce batches the watch events caused by our own status patches
        let controller_config = ControllerConfig::default()
            .debounce(Duration::from_secs(1))
            .concurrency(3);

        Controller::new(self.host_api.clone(), watcher::Config::default())
            .with_config(controller_config)
            .run(reconcile, error_policy, self.reconciler.clone())
            .for_each(|res| async move {
                match res {
                    Ok((obj, _)) => debug!("Reconciled BareMetalHost {}", obj.name),
                    Err(e) => error!("Controller error for BareMetalHost: {}", e),
                }
            })
            .await;

        Ok(())
    }
}

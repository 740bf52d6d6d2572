//! Kubernetes event transport for provisioner notifications.
//!
//! `KubeEventPublisher` turns the provisioner's fire-and-forget
//! `publish(reason, message)` calls into Kubernetes Events attached to the
//! host object. Each publish is spawned onto the runtime, so a slow API
//! server never stalls a provisioning step.

use crds::BareMetalHost;
use host_provisioner::EventPublisher;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::{Client, Resource};
use kube_runtime::events::{Event, EventType, Recorder, Reporter};
use tracing::{info, warn};

/// Name reported as the source of published events
pub const CONTROLLER_NAME: &str = "baremetal-host-controller";

/// Reasons published by the reconciler itself
pub mod reason {
    /// BMC credentials could not be loaded or are invalid
    pub const REGISTRATION_ERROR: &str = "RegistrationError";
    /// A provisioning step was called without its preconditions
    pub const PROVISIONING_ERROR: &str = "ProvisioningError";
}

/// Builds the event reporter for this controller instance
pub fn reporter(instance: Option<String>) -> Reporter {
    Reporter {
        controller: CONTROLLER_NAME.to_string(),
        instance,
    }
}

/// Publishes events for one host as Kubernetes Events
pub struct KubeEventPublisher {
    recorder: Recorder,
    reference: ObjectReference,
    host: String,
}

impl std::fmt::Debug for KubeEventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeEventPublisher")
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl KubeEventPublisher {
    /// Creates a publisher bound to `host`
    pub fn new(client: Client, reporter: Reporter, host: &BareMetalHost) -> Self {
        Self {
            recorder: Recorder::new(client, reporter),
            reference: host.object_ref(&()),
            host: host.name_or_unknown().to_string(),
        }
    }
}

/// Reasons ending in `Error` are published as warnings
pub(crate) fn event_type(reason: &str) -> EventType {
    if reason.ends_with("Error") {
        EventType::Warning
    } else {
        EventType::Normal
    }
}

impl EventPublisher for KubeEventPublisher {
    fn publish(&self, reason: &str, message: &str) {
        info!(host = %self.host, reason, "{}", message);

        let event = Event {
            type_: event_type(reason),
            reason: reason.to_string(),
            note: Some(message.to_string()),
            action: reason.to_string(),
            secondary: None,
        };
        let recorder = self.recorder.clone();
        let reference = self.reference.clone();
        let host = self.host.clone();
        tokio::spawn(async move {
            if let Err(e) = recorder.publish(&event, &reference).await {
                warn!(host = %host, reason = %event.reason, "Failed to publish event: {}", e);
            }
        });
    }
}

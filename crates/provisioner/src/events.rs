//! Lifecycle event publication
//!
//! Steps report human-readable lifecycle notifications through an injected
//! `EventPublisher`. Publication is fire-and-forget and must not block.

/// Event reasons published by provisioners
pub mod reason {
    /// Host was registered with the provisioning backend
    pub const REGISTERED: &str = "Registered";
    /// Hardware inspection finished
    pub const INSPECTION_COMPLETE: &str = "InspectionComplete";
    /// Desired image was written to the host
    pub const PROVISIONING_COMPLETE: &str = "ProvisioningComplete";
    /// Teardown began
    pub const DEPROVISION_STARTED: &str = "DeprovisionStarted";
    /// Teardown finished
    pub const DEPROVISION_COMPLETE: &str = "DeprovisionComplete";
    /// Host was powered on
    pub const POWER_ON: &str = "PowerOn";
    /// Host was powered off
    pub const POWER_OFF: &str = "PowerOff";
}

/// Sink for lifecycle notifications
///
/// Implementations must be safe to share across hosts and must return
/// without waiting on I/O.
pub trait EventPublisher: Send + Sync {
    /// Publish an event with a machine-readable reason and a message
    fn publish(&self, reason: &str, message: &str);
}

impl<F> EventPublisher for F
where
    F: Fn(&str, &str) + Send + Sync,
{
    fn publish(&self, reason: &str, message: &str) {
        self(reason, message);
    }
}

/// An event captured by `RecordingPublisher`
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEvent {
    /// Event reason
    pub reason: String,
    /// Event message
    pub message: String,
}

/// Publisher that records events in memory, for tests
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Clone, Default)]
pub struct RecordingPublisher {
    events: std::sync::Arc<std::sync::Mutex<Vec<HostEvent>>>,
}

#[cfg(any(test, feature = "test-util"))]
impl RecordingPublisher {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events, oldest first
    pub fn events(&self) -> Vec<HostEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Recorded reasons, oldest first
    pub fn reasons(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.reason).collect()
    }

    /// Number of events recorded with `reason`
    pub fn count(&self, reason: &str) -> usize {
        self.events().iter().filter(|e| e.reason == reason).count()
    }
}

#[cfg(any(test, feature = "test-util"))]
impl EventPublisher for RecordingPublisher {
    fn publish(&self, reason: &str, message: &str) {
        if let Ok(mut events) = self.events.lock() {
            events.push(HostEvent {
                reason: reason.to_string(),
                message: message.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_closure_publisher() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let publisher = move |reason: &str, message: &str| {
            sink.lock().unwrap().push(format!("{reason}: {message}"));
        };

        publisher.publish(reason::POWER_ON, "Host powered on");
        assert_eq!(*seen.lock().unwrap(), vec!["PowerOn: Host powered on".to_string()]);
    }

    #[test]
    fn test_recording_publisher() {
        let recorder = RecordingPublisher::new();
        let shared = recorder.clone();
        shared.publish(reason::REGISTERED, "Registered new host");
        shared.publish(reason::POWER_ON, "Host powered on");

        assert_eq!(recorder.reasons(), vec!["Registered", "PowerOn"]);
        assert_eq!(recorder.count(reason::REGISTERED), 1);
        assert_eq!(recorder.events()[1].message, "Host powered on");
    }
}

//! Provisioning phase of a bare-metal host.
//!
//! The phase is never stored as the source of truth. It is derived from the
//! status fields once per reconciliation tick (see `BareMetalHost::phase`),
//! and the last derived value is mirrored into `status.provisioning.state`
//! for display.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle phase of a bare-metal host
///
/// ```text
/// Unregistered -> Registered -> Inspecting -> Ready -> Provisioning -> Provisioned
///                                                       -> Deprovisioning -> Deprovisioned
/// ```
///
/// Power control is orthogonal and valid in every phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "PascalCase")]
pub enum HostPhase {
    /// No provisioning ID assigned yet
    #[default]
    Unregistered,

    /// Provisioning ID assigned, inspection not yet started
    Registered,

    /// Waiting for hardware details
    Inspecting,

    /// Inspected, no image requested
    Ready,

    /// Desired image not yet written
    Provisioning,

    /// Desired image written
    Provisioned,

    /// Teardown in progress
    Deprovisioning,

    /// Teardown finished
    Deprovisioned,
}

impl HostPhase {
    /// Name as it appears in the status
    pub fn as_str(self) -> &'static str {
        match self {
            HostPhase::Unregistered => "Unregistered",
            HostPhase::Registered => "Registered",
            HostPhase::Inspecting => "Inspecting",
            HostPhase::Ready => "Ready",
            HostPhase::Provisioning => "Provisioning",
            HostPhase::Provisioned => "Provisioned",
            HostPhase::Deprovisioning => "Deprovisioning",
            HostPhase::Deprovisioned => "Deprovisioned",
        }
    }
}

impl fmt::Display for HostPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_serializes_pascal_case() {
        let json = serde_json::to_string(&HostPhase::Deprovisioning).unwrap();
        assert_eq!(json, "\"Deprovisioning\"");
        assert_eq!(HostPhase::Deprovisioning.to_string(), "Deprovisioning");
    }
}

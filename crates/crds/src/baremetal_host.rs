//! BareMetalHost CRD
//!
//! The persisted record of a physical host under provisioning control.
//! Provisioners read and mutate the status through the helpers below; the
//! reconciler owns the object and persists the status.

use crate::hardware::HardwareDetails;
use crate::phase::HostPhase;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "metal3.dcops.microscaler.io",
    version = "v1alpha1",
    kind = "BareMetalHost",
    namespaced,
    status = "BareMetalHostStatus",
    shortname = "bmh",
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.provisioning.state"}"#,
    printcolumn = r#"{"name":"Online","type":"boolean","jsonPath":".spec.online"}"#,
    printcolumn = r#"{"name":"Powered","type":"boolean","jsonPath":".status.poweredOn"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BareMetalHostSpec {
    /// How to reach the baseboard management controller
    pub bmc: BmcDetails,

    /// Desired power state
    #[serde(default)]
    pub online: bool,

    /// Image to write to the host (removing it deprovisions the host)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Image>,

    /// Secret holding cloud-init user data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<SecretReference>,

    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// BMC connection details
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BmcDetails {
    /// BMC address (e.g. "ipmi://192.168.1.10")
    pub address: String,

    /// Name of the Secret holding `username` and `password`
    pub credentials_name: String,
}

/// An image to provision
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    /// Image location
    #[serde(default)]
    pub url: String,

    /// Checksum (or checksum URL) of the image
    #[serde(default)]
    pub checksum: String,
}

/// Reference to a Secret
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    /// Name of the Secret
    pub name: String,

    /// Namespace (defaults to same namespace as the host)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Operational status of a host
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
pub enum OperationalStatus {
    /// Host is healthy
    #[serde(rename = "OK")]
    Ok,

    /// Host has been seen but not yet checked
    #[default]
    #[serde(rename = "discovered")]
    Discovered,

    /// Last operation failed, see `errorMessage`
    #[serde(rename = "error")]
    Error,
}

/// Provisioning backend view of the host
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionStatus {
    /// Identifier assigned by the provisioning backend; empty until registered
    #[serde(default, rename = "ID")]
    #[schemars(rename = "ID")]
    pub id: String,

    /// Last derived phase
    #[serde(default)]
    pub state: HostPhase,

    /// Image most recently written to the host
    #[serde(default)]
    pub image: Image,
}

/// Observed state of a bare-metal host
///
/// Clearable fields are serialized as explicit `null` so that a merge patch
/// of the whole status removes them.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BareMetalHostStatus {
    /// Health of the host
    #[serde(default)]
    pub operational_status: OperationalStatus,

    /// Last error; empty when healthy
    #[serde(default)]
    pub error_message: String,

    /// Hardware inventory, present only between inspection and deprovisioning
    #[serde(default)]
    pub hardware_details: Option<HardwareDetails>,

    /// Provisioning backend state
    #[serde(default)]
    pub provisioning: ProvisionStatus,

    /// Observed power state
    #[serde(default)]
    pub powered_on: bool,

    /// When the status last changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<chrono::DateTime<chrono::Utc>>,
}

impl BareMetalHost {
    /// Object name, or `<unknown>` for objects not yet named
    pub fn name_or_unknown(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or("<unknown>")
    }

    /// Status, materializing the default one on first write
    pub fn status_mut(&mut self) -> &mut BareMetalHostStatus {
        self.status.get_or_insert_with(BareMetalHostStatus::default)
    }

    /// Provisioning ID, empty while unregistered
    pub fn provisioning_id(&self) -> &str {
        self.status.as_ref().map_or("", |s| s.provisioning.id.as_str())
    }

    /// Hardware inventory, if inspection has completed
    pub fn hardware_details(&self) -> Option<&HardwareDetails> {
        self.status.as_ref().and_then(|s| s.hardware_details.as_ref())
    }

    /// Observed power state
    pub fn powered_on(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.powered_on)
    }

    /// Current operational status
    pub fn operational_status(&self) -> OperationalStatus {
        self.status
            .as_ref()
            .map_or(OperationalStatus::default(), |s| s.operational_status)
    }

    /// Current error message, empty when healthy
    pub fn error_message(&self) -> &str {
        self.status.as_ref().map_or("", |s| s.error_message.as_str())
    }

    /// Image recorded as provisioned, if any
    pub fn provisioned_image(&self) -> Option<&Image> {
        self.status
            .as_ref()
            .map(|s| &s.provisioning.image)
            .filter(|image| !image.url.is_empty())
    }

    /// Clears the error state. Returns true if anything changed.
    pub fn clear_error(&mut self) -> bool {
        if self.error_message().is_empty() {
            return false;
        }
        let status = self.status_mut();
        status.error_message.clear();
        status.operational_status = OperationalStatus::Ok;
        true
    }

    /// Records an error. Returns true if anything changed.
    pub fn set_error_message(&mut self, message: impl Into<String>) -> bool {
        let message = message.into();
        let status = self.status_mut();
        if status.error_message == message && status.operational_status == OperationalStatus::Error {
            return false;
        }
        status.error_message = message;
        status.operational_status = OperationalStatus::Error;
        true
    }

    /// Whether the desired image still has to be written
    pub fn needs_provisioning(&self) -> bool {
        let Some(desired) = self.spec.image.as_ref().filter(|i| !i.url.is_empty()) else {
            return false;
        };
        self.provisioned_image()
            .is_none_or(|recorded| recorded.url != desired.url)
    }

    /// Whether the host should be torn down: it is being deleted, its image
    /// was removed while one is still recorded, or a teardown already started
    /// (an image is recorded but the hardware or the ID is gone).
    ///
    /// A recorded image is only forgotten once teardown has finished, so
    /// re-adding an image mid-teardown does not skip the rest of it.
    pub fn deprovision_requested(&self) -> bool {
        if self.metadata.deletion_timestamp.is_some() {
            return true;
        }
        if self.provisioned_image().is_none() {
            return false;
        }
        let image_removed = self.spec.image.as_ref().is_none_or(|i| i.url.is_empty());
        let teardown_started = self.provisioning_id().is_empty() || self.hardware_details().is_none();
        image_removed || teardown_started
    }

    /// Derives the provisioning phase from the status fields.
    pub fn phase(&self) -> HostPhase {
        let registered = !self.provisioning_id().is_empty();
        let inspected = self.hardware_details().is_some();

        if self.deprovision_requested() {
            return if registered || inspected {
                HostPhase::Deprovisioning
            } else {
                HostPhase::Deprovisioned
            };
        }
        if !registered {
            return HostPhase::Unregistered;
        }
        if !inspected {
            return HostPhase::Inspecting;
        }
        if self.needs_provisioning() {
            return HostPhase::Provisioning;
        }
        if self.provisioned_image().is_some() {
            return HostPhase::Provisioned;
        }
        HostPhase::Ready
    }
}

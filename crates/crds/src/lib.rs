//! DCops CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the bare-metal provisioning
//! controller: the `BareMetalHost` resource, its hardware inventory, and the
//! provisioning phase derived from its status.

pub mod baremetal_host;
pub mod hardware;
pub mod phase;

pub use baremetal_host::*;
pub use hardware::*;
pub use phase::*;

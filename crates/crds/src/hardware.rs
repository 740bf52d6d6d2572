//! Hardware inventory discovered during inspection.
//!
//! A `HardwareDetails` record is written to the host status in one piece
//! once inspection completes and is dropped again when deprovisioning starts.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Hardware inventory of a bare-metal host
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HardwareDetails {
    /// Installed memory in GiB
    #[serde(rename = "ramGiB")]
    #[schemars(rename = "ramGiB")]
    pub ram_gib: i64,

    /// Network interfaces
    #[serde(default)]
    pub nics: Vec<Nic>,

    /// Storage devices
    #[serde(default)]
    pub storage: Vec<Storage>,

    /// Processors
    #[serde(default)]
    pub cpus: Vec<Cpu>,
}

/// A network interface card
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Nic {
    /// Interface name (e.g. "nic-1")
    pub name: String,

    /// Device model
    pub model: String,

    /// Network the interface is attached to
    pub network: String,

    /// MAC address
    pub mac: String,

    /// IP address assigned at inspection time
    pub ip: String,

    /// Link speed in Gbps
    pub speed_gbps: i32,
}

/// A storage device
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Storage {
    /// Device name
    pub name: String,

    /// Media type (SSD, HDD, NVMe)
    #[serde(rename = "type")]
    #[schemars(rename = "type")]
    pub storage_type: String,

    /// Capacity in GiB
    #[serde(rename = "sizeGiB")]
    #[schemars(rename = "sizeGiB")]
    pub size_gib: i64,

    /// Device model
    pub model: String,
}

/// A processor
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Cpu {
    /// Architecture (e.g. "x86")
    #[serde(rename = "type")]
    #[schemars(rename = "type")]
    pub cpu_type: String,

    /// Clock speed in GHz
    #[serde(rename = "speedGHz")]
    #[schemars(rename = "speedGHz")]
    pub speed_ghz: i32,
}

impl HardwareDetails {
    /// Total storage capacity across all devices, in GiB
    pub fn total_storage_gib(&self) -> i64 {
        self.storage.iter().map(|s| s.size_gib).sum()
    }
}

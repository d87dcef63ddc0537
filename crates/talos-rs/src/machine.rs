//! Machine API configuration generation types
//!
//! These mirror the `GenerateConfiguration` request/response of the Talos
//! machine service. Every nested config is an owned value rather than an
//! optional pointer, so any field an editor binds to always exists.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::TalosError;

/// Role of the machine in the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineType {
    #[default]
    Unknown,
    /// First control plane node, bootstraps etcd
    Init,
    ControlPlane,
    /// Worker node joining an existing cluster
    Join,
}

impl MachineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MachineType::Unknown => "unknown",
            MachineType::Init => "init",
            MachineType::ControlPlane => "controlplane",
            MachineType::Join => "join",
        }
    }

    /// Whether the machine runs control plane components
    pub fn is_control_plane(&self) -> bool {
        matches!(self, MachineType::Init | MachineType::ControlPlane)
    }

    /// File name talosctl uses for this role's machine config
    pub fn config_filename(&self) -> &'static str {
        if self.is_control_plane() {
            "controlplane.yaml"
        } else {
            "worker.yaml"
        }
    }
}

impl std::fmt::Display for MachineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MachineType {
    type Err = TalosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(MachineType::Unknown),
            "init" => Ok(MachineType::Init),
            "controlplane" => Ok(MachineType::ControlPlane),
            "join" => Ok(MachineType::Join),
            other => Err(TalosError::ConfigInvalid(format!(
                "unknown machine type {:?}",
                other
            ))),
        }
    }
}

/// Request sent to generate a machine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateConfigurationRequest {
    pub config_version: String,
    pub cluster_config: ClusterConfig,
    pub machine_config: MachineConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineConfig {
    #[serde(rename = "type")]
    pub machine_type: MachineType,
    pub install_config: InstallConfig,
    pub network_config: NetworkConfig,
    pub kubernetes_version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallConfig {
    pub install_disk: String,
    pub install_image: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub hostname: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    pub name: String,
    pub control_plane: ControlPlaneConfig,
    pub cluster_network: ClusterNetworkConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlPlaneConfig {
    pub endpoint: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNetworkConfig {
    pub dns_domain: String,
    /// Unset means Talos deploys its default CNI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cni_config: Option<CniConfig>,
}

/// CNI to deploy; `urls` are only honoured when `name` is "custom"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CniConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
}

/// Result of configuration generation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateConfigurationResponse {
    /// Machine config documents, one per generated role
    pub data: Vec<Vec<u8>>,
    /// Client configuration for talking to the new node
    pub talosconfig: Vec<u8>,
}

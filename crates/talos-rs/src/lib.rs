//! talos-rs: Talos machine API surface for the installer
//!
//! Request/response types for configuration generation, disk inventory,
//! and talosctl-backed calls against maintenance mode nodes.

pub mod constants;
pub mod error;
pub mod machine;
pub mod talosctl;
pub mod units;

pub use error::TalosError;
pub use machine::{
    ClusterConfig, ClusterNetworkConfig, CniConfig, ControlPlaneConfig,
    GenerateConfigurationRequest, GenerateConfigurationResponse, InstallConfig, MachineConfig,
    MachineType, NetworkConfig,
};
pub use talosctl::{Disk, apply_config_insecure, gen_config, get_disks_insecure};
pub use units::DiskSize;

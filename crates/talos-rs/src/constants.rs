//! Process-wide defaults shared by the installer

/// Machine config schema version sent with every generate request
pub const CONFIG_VERSION: &str = "v1alpha1";

/// Kubernetes version installed when the user does not pick one
pub const DEFAULT_KUBERNETES_VERSION: &str = "1.32.3";

/// Installer image used to write Talos to the install disk
pub const DEFAULT_INSTALLER_IMAGE: &str = "ghcr.io/siderolabs/installer:v1.9.5";

/// Port the Kubernetes API server is reachable on through the endpoint
pub const DEFAULT_CONTROL_PLANE_PORT: u16 = 6443;

/// CNI deployed by Talos when no custom one is configured
pub const DEFAULT_CNI: &str = "flannel";

pub const DEFAULT_CLUSTER_NAME: &str = "talos-default";

pub const DEFAULT_DNS_DOMAIN: &str = "cluster.local";

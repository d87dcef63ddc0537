//! Boundary to the node being installed
//!
//! The installer only needs three things from the outside world: whether it
//! is joining an existing cluster, the node's disks, and a way to turn the
//! finished request into machine configuration.

use std::path::PathBuf;
use talos_rs::{Disk, GenerateConfigurationRequest, GenerateConfigurationResponse, TalosError};

/// Facts and calls the installer state consumes
///
/// Calls are made once each; failures are returned as-is.
#[allow(async_fn_in_trait)]
pub trait Connection {
    /// Address of the node being installed
    fn node_endpoint(&self) -> &str;

    /// Address of an existing control plane node, when joining a cluster
    fn bootstrap_endpoint(&self) -> Option<&str>;

    fn expanding_cluster(&self) -> bool {
        self.bootstrap_endpoint().is_some()
    }

    async fn disks(&self) -> Result<Vec<Disk>, TalosError>;

    async fn generate_configuration(
        &self,
        request: &GenerateConfigurationRequest,
    ) -> Result<GenerateConfigurationResponse, TalosError>;
}

/// Connection backed by the talosctl binary
#[derive(Debug, Clone)]
pub struct TalosctlConnection {
    node: String,
    bootstrap: Option<String>,
    secrets: Option<PathBuf>,
}

impl TalosctlConnection {
    pub fn new(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            bootstrap: None,
            secrets: None,
        }
    }

    /// Join the cluster whose control plane answers at `endpoint`
    ///
    /// An empty endpoint keeps the connection in bootstrap mode.
    pub fn with_bootstrap_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        self.bootstrap = (!endpoint.is_empty()).then_some(endpoint);
        self
    }

    /// Cluster secrets bundle used when generating config
    ///
    /// Required when joining: without it `talosctl` mints a new CA and the
    /// node could not join the existing cluster.
    pub fn with_secrets(mut self, path: impl Into<PathBuf>) -> Self {
        self.secrets = Some(path.into());
        self
    }
}

impl Connection for TalosctlConnection {
    fn node_endpoint(&self) -> &str {
        &self.node
    }

    fn bootstrap_endpoint(&self) -> Option<&str> {
        self.bootstrap.as_deref()
    }

    async fn disks(&self) -> Result<Vec<Disk>, TalosError> {
        talos_rs::get_disks_insecure(&self.node).await
    }

    async fn generate_configuration(
        &self,
        request: &GenerateConfigurationRequest,
    ) -> Result<GenerateConfigurationResponse, TalosError> {
        if let Some(bootstrap) = &self.bootstrap
            && self.secrets.is_none()
        {
            return Err(TalosError::ConfigInvalid(format!(
                "joining the cluster at {} requires its secrets bundle",
                bootstrap
            )));
        }
        talos_rs::gen_config(request, self.secrets.as_deref()).await
    }
}

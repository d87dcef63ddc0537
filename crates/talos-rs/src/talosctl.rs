//! Talosctl command execution
//!
//! Provides functions to execute talosctl commands and parse their output.
//! The installer talks to nodes that are still in maintenance mode, so every
//! node call goes through `--insecure`.

use crate::error::TalosError;
use crate::machine::{GenerateConfigurationRequest, GenerateConfigurationResponse};
use crate::units::DiskSize;
use std::path::Path;
use tokio::process::Command;

/// Execute a talosctl command and return stdout
///
/// The child is killed if the returned future is dropped, so cancelling the
/// caller cancels the command.
async fn exec_talosctl(args: &[String]) -> Result<String, TalosError> {
    tracing::debug!("talosctl {}", args.join(" "));

    let output = Command::new("talosctl")
        .args(args)
        .kill_on_drop(true)
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(TalosError::Command {
            command: args.iter().take(2).cloned().collect::<Vec<_>>().join(" "),
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Block device reported by a node
#[derive(Debug, Clone, PartialEq)]
pub struct Disk {
    /// Device path (e.g., "/dev/sda")
    pub device_name: String,
    /// Model string, empty when the kernel reports none
    pub model: String,
    pub size: DiskSize,
}

/// Get installable disks of a maintenance mode node
///
/// Executes: talosctl get disks --insecure --nodes <node> -o yaml
pub async fn get_disks_insecure(node: &str) -> Result<Vec<Disk>, TalosError> {
    let args = ["get", "disks", "--insecure", "--nodes", node, "-o", "yaml"];
    let output = exec_talosctl(&args.map(String::from)).await?;
    parse_disks_yaml(&output)
}

/// Generate machine config and talosconfig for a request
///
/// Runs `talosctl gen config` into a scratch directory and reads the
/// generated files back.
pub async fn gen_config(
    request: &GenerateConfigurationRequest,
    secrets: Option<&Path>,
) -> Result<GenerateConfigurationResponse, TalosError> {
    let out_dir = tempfile::tempdir()?;
    let args = gen_config_args(request, out_dir.path(), secrets)?;
    exec_talosctl(&args).await?;

    let machine_type = request.machine_config.machine_type;
    let config_path = out_dir.path().join(machine_type.config_filename());
    let talosconfig_path = out_dir.path().join("talosconfig");

    let config = read_output(&config_path).await?;
    let talosconfig = read_output(&talosconfig_path).await?;

    tracing::info!(
        "Generated {} ({} bytes)",
        machine_type.config_filename(),
        config.len()
    );

    Ok(GenerateConfigurationResponse {
        data: vec![config],
        talosconfig,
    })
}

/// Apply a machine config file to a maintenance mode node
///
/// Executes: talosctl apply-config --insecure --nodes <node> --file <file>
pub async fn apply_config_insecure(node: &str, file: &Path) -> Result<(), TalosError> {
    let args = vec![
        "apply-config".to_string(),
        "--insecure".to_string(),
        "--nodes".to_string(),
        node.to_string(),
        "--file".to_string(),
        file.display().to_string(),
    ];
    exec_talosctl(&args).await?;
    tracing::info!("Applied {} to {}", file.display(), node);
    Ok(())
}

async fn read_output(path: &Path) -> Result<Vec<u8>, TalosError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(TalosError::MissingOutput(path.display().to_string()))
        }
        Err(e) => Err(TalosError::Io(e)),
    }
}

/// Build the argument list for `talosctl gen config`
fn gen_config_args(
    request: &GenerateConfigurationRequest,
    out_dir: &Path,
    secrets: Option<&Path>,
) -> Result<Vec<String>, TalosError> {
    let cluster = &request.cluster_config;
    let machine = &request.machine_config;

    if cluster.name.is_empty() {
        return Err(TalosError::ConfigInvalid(
            "cluster name is empty".to_string(),
        ));
    }
    if cluster.control_plane.endpoint.is_empty() {
        return Err(TalosError::ConfigInvalid(
            "control plane endpoint is empty".to_string(),
        ));
    }

    let output_type = if machine.machine_type.is_control_plane() {
        "controlplane"
    } else {
        "worker"
    };

    let mut args = vec![
        "gen".to_string(),
        "config".to_string(),
        cluster.name.clone(),
        cluster.control_plane.endpoint.clone(),
        "--output".to_string(),
        out_dir.display().to_string(),
        "--output-types".to_string(),
        format!("{},talosconfig", output_type),
    ];

    let mut flag = |name: &str, value: &str| {
        if !value.is_empty() {
            args.push(name.to_string());
            args.push(value.to_string());
        }
    };
    flag("--install-disk", &machine.install_config.install_disk);
    flag("--install-image", &machine.install_config.install_image);
    flag("--kubernetes-version", &machine.kubernetes_version);
    flag("--dns-domain", &cluster.cluster_network.dns_domain);

    if let Some(secrets) = secrets {
        args.push("--with-secrets".to_string());
        args.push(secrets.display().to_string());
    }

    if let Some(patch) = config_patch(request)? {
        args.push("--config-patch".to_string());
        args.push(patch);
    }

    Ok(args)
}

/// Strategic merge patch for fields `gen config` has no flag for
fn config_patch(request: &GenerateConfigurationRequest) -> Result<Option<String>, TalosError> {
    let mut patch = serde_json::Map::new();

    let hostname = &request.machine_config.network_config.hostname;
    if !hostname.is_empty() {
        patch.insert(
            "machine".to_string(),
            serde_json::json!({ "network": { "hostname": hostname } }),
        );
    }

    if let Some(cni) = &request.cluster_config.cluster_network.cni_config {
        patch.insert(
            "cluster".to_string(),
            serde_json::json!({ "network": { "cni": cni } }),
        );
    }

    if patch.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(&patch)?))
}

/// Parse disks YAML output from talosctl
fn parse_disks_yaml(yaml_str: &str) -> Result<Vec<Disk>, TalosError> {
    let mut disks = Vec::new();

    // Split by YAML document separator and parse each
    for doc_str in yaml_str.split("\n---") {
        let doc_str = doc_str.trim().trim_start_matches("---").trim();
        if doc_str.is_empty() {
            continue;
        }

        let doc: serde_yaml::Value = serde_yaml::from_str(doc_str)?;

        let has_id = doc
            .get("metadata")
            .and_then(|m| m.get("id"))
            .and_then(|v| v.as_str())
            .is_some_and(|id| !id.is_empty());
        if !has_id {
            continue;
        }

        let Some(spec) = doc.get("spec") else {
            continue;
        };

        let flag = |key: &str| spec.get(key).and_then(|v| v.as_bool()).unwrap_or(false);
        if flag("readonly") || flag("cdrom") {
            continue;
        }

        let Some(device_name) = spec.get("dev_path").and_then(|v| v.as_str()) else {
            continue;
        };

        let model = spec
            .get("model")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        let size = match spec.get("size") {
            Some(v) => serde_yaml::from_value::<DiskSize>(v.clone())?,
            None => DiskSize::default(),
        };

        disks.push(Disk {
            device_name: device_name.to_string(),
            model,
            size,
        });
    }

    Ok(disks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::{CniConfig, MachineType};

    const DISKS_YAML: &str = r#"
node: 10.5.0.2
metadata:
    namespace: runtime
    type: Disks.block.talos.dev
    id: sda
    version: "1"
spec:
    dev_path: /dev/sda
    size: 256000000000
    pretty_size: 256 GB
    model: ModelA
    readonly: false
    cdrom: false
---
node: 10.5.0.2
metadata:
    namespace: runtime
    type: Disks.block.talos.dev
    id: sr0
    version: "1"
spec:
    dev_path: /dev/sr0
    size: 1073741824
    readonly: true
    cdrom: true
---
node: 10.5.0.2
metadata:
    namespace: runtime
    type: Disks.block.talos.dev
    id: nvme0n1
    version: "1"
spec:
    dev_path: /dev/nvme0n1
    size: 512110190592
"#;

    fn sample_request() -> GenerateConfigurationRequest {
        let mut request = GenerateConfigurationRequest::default();
        request.cluster_config.name = "talos-default".to_string();
        request.cluster_config.control_plane.endpoint = "https://10.5.0.2:6443".to_string();
        request.cluster_config.cluster_network.dns_domain = "cluster.local".to_string();
        request.machine_config.machine_type = MachineType::Init;
        request.machine_config.install_config.install_disk = "/dev/sda".to_string();
        request.machine_config.kubernetes_version = "1.32.3".to_string();
        request
    }

    #[test]
    fn test_parse_disks_keeps_order_and_skips_cdrom() {
        let disks = parse_disks_yaml(DISKS_YAML).unwrap();
        assert_eq!(disks.len(), 2);
        assert_eq!(disks[0].device_name, "/dev/sda");
        assert_eq!(disks[0].model, "ModelA");
        assert_eq!(disks[0].size, DiskSize(256_000_000_000));
        assert_eq!(disks[1].device_name, "/dev/nvme0n1");
        assert_eq!(disks[1].model, "");
    }

    #[test]
    fn test_parse_disks_empty_output() {
        assert!(parse_disks_yaml("").unwrap().is_empty());
    }

    #[test]
    fn test_gen_config_args_for_control_plane() {
        let request = sample_request();
        let args = gen_config_args(&request, Path::new("/tmp/out"), None).unwrap();

        assert_eq!(
            &args[..4],
            ["gen", "config", "talos-default", "https://10.5.0.2:6443"]
        );
        let joined = args.join(" ");
        assert!(joined.contains("--output /tmp/out"));
        assert!(joined.contains("--output-types controlplane,talosconfig"));
        assert!(joined.contains("--install-disk /dev/sda"));
        assert!(joined.contains("--kubernetes-version 1.32.3"));
        assert!(!joined.contains("--install-image"));
        assert!(!joined.contains("--config-patch"));
        assert!(!joined.contains("--with-secrets"));
    }

    #[test]
    fn test_gen_config_args_for_worker_with_secrets() {
        let mut request = sample_request();
        request.machine_config.machine_type = MachineType::Join;
        let secrets = Path::new("secrets.yaml");
        let args = gen_config_args(&request, Path::new("/tmp/out"), Some(secrets)).unwrap();

        let joined = args.join(" ");
        assert!(joined.contains("--output-types worker,talosconfig"));
        assert!(joined.contains("--with-secrets secrets.yaml"));
    }

    #[test]
    fn test_gen_config_args_require_name_and_endpoint() {
        let mut request = sample_request();
        request.cluster_config.name.clear();
        assert!(gen_config_args(&request, Path::new("/tmp"), None).is_err());

        let mut request = sample_request();
        request.cluster_config.control_plane.endpoint.clear();
        assert!(gen_config_args(&request, Path::new("/tmp"), None).is_err());
    }

    #[test]
    fn test_config_patch_carries_hostname_and_cni() {
        let mut request = sample_request();
        request.machine_config.network_config.hostname = "cp-1".to_string();
        request.cluster_config.cluster_network.cni_config = Some(CniConfig {
            name: "custom".to_string(),
            urls: vec!["https://example.com/cni.yaml".to_string()],
        });

        let patch = config_patch(&request).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&patch).unwrap();
        assert_eq!(value["machine"]["network"]["hostname"], "cp-1");
        assert_eq!(value["cluster"]["network"]["cni"]["name"], "custom");
        assert_eq!(
            value["cluster"]["network"]["cni"]["urls"][0],
            "https://example.com/cni.yaml"
        );
    }

    #[test]
    fn test_config_patch_omits_empty_fields() {
        assert_eq!(config_patch(&sample_request()).unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_output_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_output(&dir.path().join("worker.yaml")).await.unwrap_err();
        assert!(matches!(err, TalosError::MissingOutput(_)));
    }
}

//! Installer state
//!
//! Turns the facts a [`Connection`] reports into a pre-filled configuration
//! request, exposes it as an ordered list of editable pages, and hands the
//! finished request back to the connection for generation.
//!
//! The state has two phases. While *editing*, pages may be changed freely.
//! A successful [`InstallerState::gen_config`] moves it to *finalized*, after
//! which edits and further generation are refused. A failed generation
//! leaves it editing so the user can fix the input and try again.

use crate::connection::Connection;
use crate::error::InstallerError;
use crate::item::{ChoiceTable, ConfigDraft, Field, FieldItem};
use crate::page::Page;
use crate::presets::{self, CNI_PRESETS};
use talos_rs::constants::{
    CONFIG_VERSION, DEFAULT_CLUSTER_NAME, DEFAULT_CNI, DEFAULT_CONTROL_PLANE_PORT,
    DEFAULT_DNS_DOMAIN, DEFAULT_INSTALLER_IMAGE, DEFAULT_KUBERNETES_VERSION,
};
use talos_rs::{
    CniConfig, Disk, GenerateConfigurationRequest, GenerateConfigurationResponse, MachineType,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Editing,
    Finalized,
}

/// Interactive installer session
pub struct InstallerState<C> {
    pages: Vec<Page>,
    draft: ConfigDraft,
    conn: C,
    expanding: bool,
    phase: Phase,
}

impl<C: Connection> InstallerState<C> {
    /// Build the default request and its pages from the connection's facts
    ///
    /// Fails only when the disk inventory cannot be fetched.
    pub async fn new(conn: C) -> Result<Self, InstallerError> {
        let expanding = conn.expanding_cluster();

        let mut draft = ConfigDraft {
            request: default_request(),
            cni: DEFAULT_CNI.to_string(),
        };

        let host = match conn.bootstrap_endpoint() {
            Some(bootstrap) if expanding => bootstrap,
            _ => conn.node_endpoint(),
        };
        draft.request.cluster_config.control_plane.endpoint = control_plane_endpoint(host);

        let disks = conn.disks().await.map_err(|e| {
            tracing::error!("Disk inventory of {} failed: {}", conn.node_endpoint(), e);
            InstallerError::Disks(e)
        })?;
        tracing::info!("Found {} disks on {}", disks.len(), conn.node_endpoint());

        let install_disks = disk_choices(&disks, &mut draft)?;
        let machine_types = machine_type_choices(expanding, &mut draft)?;

        let mut network_items = vec![
            FieldItem::new(
                "hostname",
                "Used to statically set the hostname for the machine.",
                Field::Hostname,
            ),
            FieldItem::new(
                "dns domain",
                "The domain used by Kubernetes DNS.\nThe default is `cluster.local`",
                Field::DnsDomain,
            ),
        ];

        // The CNI of an existing cluster can't be changed by a joining node
        if !expanding {
            network_items.push(
                FieldItem::new(
                    "type",
                    "The CNI used.\nCustom CNIs are deployed from manifest URLs.",
                    Field::Cni,
                )
                .with_choices(cni_choices()?),
            );
        }

        let pages = vec![
            Page::new(
                "Installer Params",
                vec![
                    FieldItem::new(
                        "image",
                        "Allows for supplying the image used to perform the installation.",
                        Field::InstallImage,
                    ),
                    FieldItem::new(
                        "install disk",
                        "The disk used for installations.",
                        Field::InstallDisk,
                    )
                    .with_choices(install_disks),
                ],
            )?,
            Page::new(
                "Machine Config",
                vec![
                    FieldItem::new(
                        "machine type",
                        "Defines the role of the machine within the cluster.",
                        Field::MachineType,
                    )
                    .with_choices(machine_types),
                    FieldItem::new(
                        "cluster name",
                        "Configures the cluster's name.",
                        Field::ClusterName,
                    ),
                    FieldItem::new(
                        "control plane endpoint",
                        "Endpoint is the canonical controlplane endpoint, which can be an IP address or a DNS hostname.",
                        Field::ControlPlaneEndpoint,
                    ),
                    FieldItem::new(
                        "kubernetes version",
                        "Kubernetes version to install.",
                        Field::KubernetesVersion,
                    ),
                ],
            )?,
            Page::new("Network Config", network_items)?,
        ];

        tracing::info!(
            "Installer ready: {} mode, endpoint {}",
            if expanding { "expand" } else { "bootstrap" },
            draft.request.cluster_config.control_plane.endpoint
        );

        Ok(Self {
            pages,
            draft,
            conn,
            expanding,
            phase: Phase::Editing,
        })
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn request(&self) -> &GenerateConfigurationRequest {
        &self.draft.request
    }

    pub fn draft(&self) -> &ConfigDraft {
        &self.draft
    }

    /// Selected CNI name or preset key
    pub fn cni(&self) -> &str {
        &self.draft.cni
    }

    pub fn is_expanding(&self) -> bool {
        self.expanding
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn value(&self, field: Field) -> String {
        field.get(&self.draft)
    }

    /// Edit a field in place
    pub fn set(&mut self, field: Field, value: &str) -> Result<(), InstallerError> {
        self.ensure_editing()?;
        field.set(&mut self.draft, value)?;
        tracing::debug!("{} = {:?}", field, value);
        Ok(())
    }

    /// Pick choice `row` of item `item` on page `page`
    pub fn select(&mut self, page: usize, item: usize, row: usize) -> Result<(), InstallerError> {
        self.ensure_editing()?;
        let field_item = self
            .pages
            .get(page)
            .and_then(|p| p.item(item))
            .ok_or(InstallerError::NoSuchItem { page, item })?;
        field_item.select(&mut self.draft, row)?;
        tracing::debug!(
            "{} = {:?}",
            field_item.field(),
            field_item.value(&self.draft)
        );
        Ok(())
    }

    /// Request as it will be sent, rendered as YAML
    pub fn preview_yaml(&self) -> Result<String, InstallerError> {
        let mut draft = self.draft.clone();
        resolve_cni(&mut draft, self.expanding);
        Ok(serde_yaml::to_string(&draft.request)?)
    }

    /// Resolve the CNI selection and generate the machine configuration
    ///
    /// The connection's response or error is returned unchanged.
    pub async fn gen_config(&mut self) -> Result<GenerateConfigurationResponse, InstallerError> {
        self.ensure_editing()?;
        resolve_cni(&mut self.draft, self.expanding);

        tracing::info!(
            "Generating {} config for cluster {}",
            self.draft.request.machine_config.machine_type,
            self.draft.request.cluster_config.name
        );

        let response = self
            .conn
            .generate_configuration(&self.draft.request)
            .await
            .map_err(|e| {
                tracing::error!("Configuration generation failed: {}", e);
                InstallerError::GenerateConfig(e)
            })?;

        self.phase = Phase::Finalized;
        Ok(response)
    }

    fn ensure_editing(&self) -> Result<(), InstallerError> {
        match self.phase {
            Phase::Editing => Ok(()),
            Phase::Finalized => Err(InstallerError::Finalized),
        }
    }
}

fn default_request() -> GenerateConfigurationRequest {
    let mut request = GenerateConfigurationRequest {
        config_version: CONFIG_VERSION.to_string(),
        ..Default::default()
    };

    let machine = &mut request.machine_config;
    machine.machine_type = MachineType::Init;
    machine.kubernetes_version = DEFAULT_KUBERNETES_VERSION.to_string();
    machine.install_config.install_image = DEFAULT_INSTALLER_IMAGE.to_string();

    let cluster = &mut request.cluster_config;
    cluster.name = DEFAULT_CLUSTER_NAME.to_string();
    cluster.cluster_network.dns_domain = DEFAULT_DNS_DOMAIN.to_string();

    request
}

/// `https://<host>:<control plane port>`
pub fn control_plane_endpoint(host: &str) -> String {
    format!("https://{}:{}", host, DEFAULT_CONTROL_PLANE_PORT)
}

/// Disk table in inventory order; the first disk becomes the install disk.
///
/// With no disks the install disk keeps its empty default.
fn disk_choices(disks: &[Disk], draft: &mut ConfigDraft) -> Result<ChoiceTable, InstallerError> {
    let mut table = ChoiceTable::with_header(["device name", "model name", "size"]);

    for (i, disk) in disks.iter().enumerate() {
        if i == 0 {
            Field::InstallDisk.set(draft, &disk.device_name)?;
        }

        table.push(
            disk.device_name.clone(),
            disk.device_name.clone(),
            vec![disk.model.clone(), disk.size.to_string()],
        )?;
    }

    Ok(table)
}

/// Roles the node may take; a new cluster's first node must be init
fn machine_type_choices(
    expanding: bool,
    draft: &mut ConfigDraft,
) -> Result<ChoiceTable, InstallerError> {
    let mut table = ChoiceTable::new();

    if expanding {
        table.push("worker", MachineType::Join.as_str(), vec![])?;
        table.push("control plane", MachineType::ControlPlane.as_str(), vec![])?;
        draft.request.machine_config.machine_type = MachineType::ControlPlane;
    } else {
        table.push("control plane", MachineType::Init.as_str(), vec![])?;
    }

    Ok(table)
}

fn cni_choices() -> Result<ChoiceTable, InstallerError> {
    let mut table = ChoiceTable::with_header(["CNI", "description"]);
    table.push(
        DEFAULT_CNI,
        DEFAULT_CNI,
        vec!["CNI used by Talos by default".to_string()],
    )?;
    for preset in CNI_PRESETS {
        table.push(preset.key, preset.key, vec![preset.description.to_string()])?;
    }
    Ok(table)
}

/// Apply the CNI selection to the request
///
/// A preset key replaces the CNI config wholesale. Any other non-empty key
/// is taken as a plain CNI name when bootstrapping; a joining node keeps
/// the cluster's CNI untouched.
fn resolve_cni(draft: &mut ConfigDraft, expanding: bool) {
    let network = &mut draft.request.cluster_config.cluster_network;

    if let Some(preset) = presets::lookup(&draft.cni) {
        tracing::info!("Using CNI preset {}", preset.key);
        network.cni_config = Some(preset.to_config());
    } else if !expanding && !draft.cni.is_empty() {
        network.cni_config = Some(CniConfig {
            name: draft.cni.clone(),
            urls: Vec::new(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::CILIUM_QUICK_INSTALL;
    use std::sync::Mutex;
    use talos_rs::{DiskSize, TalosError};

    /// In-memory connection recording what it was asked to generate
    struct FakeConnection {
        node: String,
        bootstrap: Option<String>,
        disks: Vec<Disk>,
        disk_error: Option<String>,
        gen_failures: Mutex<u32>,
        generated: Mutex<Vec<GenerateConfigurationRequest>>,
    }

    impl FakeConnection {
        fn bootstrapping(disks: Vec<Disk>) -> Self {
            Self {
                node: "10.5.0.2".to_string(),
                bootstrap: None,
                disks,
                disk_error: None,
                gen_failures: Mutex::new(0),
                generated: Mutex::new(Vec::new()),
            }
        }

        fn expanding(bootstrap: &str, disks: Vec<Disk>) -> Self {
            Self {
                bootstrap: Some(bootstrap.to_string()),
                node: "10.5.0.3".to_string(),
                ..Self::bootstrapping(disks)
            }
        }

        fn last_generated(&self) -> GenerateConfigurationRequest {
            self.generated.lock().unwrap().last().cloned().unwrap()
        }
    }

    impl Connection for FakeConnection {
        fn node_endpoint(&self) -> &str {
            &self.node
        }

        fn bootstrap_endpoint(&self) -> Option<&str> {
            self.bootstrap.as_deref()
        }

        async fn disks(&self) -> Result<Vec<Disk>, TalosError> {
            match &self.disk_error {
                Some(stderr) => Err(TalosError::Command {
                    command: "get disks".to_string(),
                    stderr: stderr.clone(),
                }),
                None => Ok(self.disks.clone()),
            }
        }

        async fn generate_configuration(
            &self,
            request: &GenerateConfigurationRequest,
        ) -> Result<GenerateConfigurationResponse, TalosError> {
            let mut failures = self.gen_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(TalosError::Command {
                    command: "gen config".to_string(),
                    stderr: "boom".to_string(),
                });
            }

            self.generated.lock().unwrap().push(request.clone());
            Ok(GenerateConfigurationResponse {
                data: vec![b"machine: {}".to_vec()],
                talosconfig: b"context: talos-default".to_vec(),
            })
        }
    }

    fn make_disk(name: &str, model: &str, size: u64) -> Disk {
        Disk {
            device_name: name.to_string(),
            model: model.to_string(),
            size: DiskSize(size),
        }
    }

    fn two_disks() -> Vec<Disk> {
        vec![
            make_disk("/dev/sda", "ModelA", 256_000_000_000),
            make_disk("/dev/nvme0n1", "ModelB", 1_000_000_000_000),
        ]
    }

    fn item_fields(page: &Page) -> Vec<Field> {
        page.items().iter().map(FieldItem::field).collect()
    }

    // ==========================================================================
    // Construction
    // ==========================================================================

    #[tokio::test]
    async fn test_bootstrap_pages_include_cni_choice() {
        let state = InstallerState::new(FakeConnection::bootstrapping(two_disks()))
            .await
            .unwrap();

        let titles: Vec<_> = state.pages().iter().map(Page::title).collect();
        assert_eq!(
            titles,
            ["Installer Params", "Machine Config", "Network Config"]
        );

        assert_eq!(
            item_fields(&state.pages()[0]),
            [Field::InstallImage, Field::InstallDisk]
        );
        assert_eq!(
            item_fields(&state.pages()[1]),
            [
                Field::MachineType,
                Field::ClusterName,
                Field::ControlPlaneEndpoint,
                Field::KubernetesVersion
            ]
        );
        assert_eq!(
            item_fields(&state.pages()[2]),
            [Field::Hostname, Field::DnsDomain, Field::Cni]
        );

        let cni = state.pages()[2].item(2).unwrap().choices().unwrap();
        assert_eq!(
            cni.table_rows(),
            vec![
                vec!["CNI", "description"],
                vec!["flannel", "CNI used by Talos by default"],
                vec!["cilium", "Cilium 1.8 installed through quick-install.yaml"],
            ]
        );
        assert_eq!(state.cni(), DEFAULT_CNI);
    }

    #[tokio::test]
    async fn test_bootstrap_defaults() {
        let state = InstallerState::new(FakeConnection::bootstrapping(two_disks()))
            .await
            .unwrap();
        let request = state.request();

        assert!(!state.is_expanding());
        assert_eq!(request.config_version, "v1alpha1");
        assert_eq!(request.machine_config.machine_type, MachineType::Init);
        assert_eq!(
            request.machine_config.kubernetes_version,
            DEFAULT_KUBERNETES_VERSION
        );
        assert_eq!(
            request.machine_config.install_config.install_image,
            DEFAULT_INSTALLER_IMAGE
        );
        assert_eq!(request.cluster_config.name, "talos-default");
        assert_eq!(
            request.cluster_config.cluster_network.dns_domain,
            "cluster.local"
        );
        assert_eq!(
            request.cluster_config.control_plane.endpoint,
            "https://10.5.0.2:6443"
        );
        assert_eq!(request.cluster_config.cluster_network.cni_config, None);

        let machine_types = state.pages()[1].item(0).unwrap().choices().unwrap();
        assert_eq!(machine_types.len(), 1);
        assert_eq!(machine_types.rows()[0].value, "init");
    }

    #[tokio::test]
    async fn test_expanding_pages_omit_cni_choice() {
        let state = InstallerState::new(FakeConnection::expanding("10.0.0.1", two_disks()))
            .await
            .unwrap();

        assert!(state.is_expanding());
        assert_eq!(
            item_fields(&state.pages()[2]),
            [Field::Hostname, Field::DnsDomain]
        );

        let machine_types = state.pages()[1].item(0).unwrap().choices().unwrap();
        let rows: Vec<_> = machine_types
            .rows()
            .iter()
            .map(|c| (c.display.as_str(), c.value.as_str()))
            .collect();
        assert_eq!(
            rows,
            [("worker", "join"), ("control plane", "controlplane")]
        );
        assert_eq!(
            state.request().machine_config.machine_type,
            MachineType::ControlPlane
        );
        assert_eq!(
            state.request().cluster_config.control_plane.endpoint,
            "https://10.0.0.1:6443"
        );
    }

    #[tokio::test]
    async fn test_first_disk_is_default_install_disk() {
        let disks = vec![
            make_disk("/dev/vdb", "VirtIO", 10_000_000_000),
            make_disk("/dev/sda", "ModelA", 256_000_000_000),
            make_disk("/dev/sdb", "ModelB", 512_000_000_000),
        ];
        let state = InstallerState::new(FakeConnection::bootstrapping(disks))
            .await
            .unwrap();

        assert_eq!(state.value(Field::InstallDisk), "/dev/vdb");

        let table = state.pages()[0].item(1).unwrap().choices().unwrap();
        let rows = table.table_rows();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], ["device name", "model name", "size"]);
        assert_eq!(rows[1], ["/dev/vdb", "VirtIO", "10 GB"]);
        assert_eq!(rows[2], ["/dev/sda", "ModelA", "256 GB"]);
    }

    #[tokio::test]
    async fn test_no_disks_leaves_install_disk_empty() {
        let state = InstallerState::new(FakeConnection::bootstrapping(vec![]))
            .await
            .unwrap();

        assert_eq!(state.value(Field::InstallDisk), "");
        let table = state.pages()[0].item(1).unwrap().choices().unwrap();
        assert!(table.is_empty());
        assert_eq!(table.table_rows().len(), 1);
    }

    #[tokio::test]
    async fn test_disk_inventory_failure_aborts_construction() {
        let mut conn = FakeConnection::bootstrapping(two_disks());
        conn.disk_error = Some("connection refused".to_string());

        let err = InstallerState::new(conn).await.err().unwrap();
        match err {
            InstallerError::Disks(TalosError::Command { stderr, .. }) => {
                assert_eq!(stderr, "connection refused")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    // ==========================================================================
    // Editing
    // ==========================================================================

    #[tokio::test]
    async fn test_select_worker_when_expanding() {
        let mut state = InstallerState::new(FakeConnection::expanding("10.0.0.1", two_disks()))
            .await
            .unwrap();

        state.select(1, 0, 0).unwrap();
        assert_eq!(
            state.request().machine_config.machine_type,
            MachineType::Join
        );
        assert_eq!(
            state.pages()[1].item(0).unwrap().selected_choice(state.draft()),
            Some(0)
        );

        assert!(matches!(
            state.select(1, 9, 0),
            Err(InstallerError::NoSuchItem { page: 1, item: 9 })
        ));
        assert!(matches!(
            state.select(1, 0, 5),
            Err(InstallerError::NoSuchChoice { row: 5, .. })
        ));
    }

    #[tokio::test]
    async fn test_edits_are_visible_through_items() {
        let mut state = InstallerState::new(FakeConnection::bootstrapping(two_disks()))
            .await
            .unwrap();

        state.set(Field::ClusterName, "lab").unwrap();
        state.select(0, 1, 1).unwrap();

        let cluster_item = state.pages()[1].item(1).unwrap();
        assert_eq!(cluster_item.value(state.draft()), "lab");
        assert_eq!(
            state.request().machine_config.install_config.install_disk,
            "/dev/nvme0n1"
        );
    }

    // ==========================================================================
    // Finalize
    // ==========================================================================

    #[tokio::test]
    async fn test_preset_overrides_cni_config() {
        let mut state = InstallerState::new(FakeConnection::bootstrapping(two_disks()))
            .await
            .unwrap();

        state.set(Field::Cni, "cilium").unwrap();
        state.gen_config().await.unwrap();

        let sent = state.connection().last_generated();
        assert_eq!(
            sent.cluster_config.cluster_network.cni_config,
            Some(CniConfig {
                name: "custom".to_string(),
                urls: vec![CILIUM_QUICK_INSTALL.to_string()],
            })
        );
    }

    #[tokio::test]
    async fn test_plain_cni_name_has_no_urls() {
        let mut state = InstallerState::new(FakeConnection::bootstrapping(two_disks()))
            .await
            .unwrap();

        state.select(2, 2, 0).unwrap();
        assert_eq!(state.cni(), "flannel");
        state.gen_config().await.unwrap();

        let sent = state.connection().last_generated();
        assert_eq!(
            sent.cluster_config.cluster_network.cni_config,
            Some(CniConfig {
                name: "flannel".to_string(),
                urls: vec![],
            })
        );
    }

    #[tokio::test]
    async fn test_bootstrap_scenario_with_cilium() {
        let disks = vec![make_disk("/dev/sda", "ModelA", 256_000_000_000)];
        let mut state = InstallerState::new(FakeConnection::bootstrapping(disks))
            .await
            .unwrap();

        // Pick "cilium" from the CNI table
        state.select(2, 2, 1).unwrap();
        let response = state.gen_config().await.unwrap();
        assert_eq!(response.data.len(), 1);

        let sent = state.connection().last_generated();
        assert_eq!(sent.config_version, "v1alpha1");
        assert_eq!(sent.machine_config.machine_type, MachineType::Init);
        assert_eq!(sent.machine_config.install_config.install_disk, "/dev/sda");
        assert_eq!(
            sent.machine_config.kubernetes_version,
            DEFAULT_KUBERNETES_VERSION
        );
        assert_eq!(
            sent.machine_config.install_config.install_image,
            DEFAULT_INSTALLER_IMAGE
        );
        let cni = sent.cluster_config.cluster_network.cni_config.unwrap();
        assert_eq!(cni.name, "custom");
        assert_eq!(cni.urls, [CILIUM_QUICK_INSTALL]);
    }

    #[tokio::test]
    async fn test_expand_scenario_defaults() {
        let mut state = InstallerState::new(FakeConnection::expanding("10.0.0.1", two_disks()))
            .await
            .unwrap();

        state.gen_config().await.unwrap();

        let sent = state.connection().last_generated();
        assert_eq!(
            sent.cluster_config.control_plane.endpoint,
            format!("https://10.0.0.1:{}", DEFAULT_CONTROL_PLANE_PORT)
        );
        assert_eq!(sent.machine_config.machine_type, MachineType::ControlPlane);
        assert_eq!(sent.cluster_config.cluster_network.cni_config, None);
    }

    #[tokio::test]
    async fn test_failed_generation_can_be_retried() {
        let conn = FakeConnection::bootstrapping(two_disks());
        *conn.gen_failures.lock().unwrap() = 1;
        let mut state = InstallerState::new(conn).await.unwrap();

        let err = state.gen_config().await.unwrap_err();
        assert!(matches!(
            err,
            InstallerError::GenerateConfig(TalosError::Command { .. })
        ));
        assert_eq!(state.phase(), Phase::Editing);

        state.set(Field::Hostname, "cp-1").unwrap();
        state.gen_config().await.unwrap();
        assert_eq!(state.phase(), Phase::Finalized);
        assert_eq!(
            state.connection().last_generated().machine_config.network_config.hostname,
            "cp-1"
        );
    }

    #[tokio::test]
    async fn test_finalized_state_refuses_edits_and_regeneration() {
        let mut state = InstallerState::new(FakeConnection::bootstrapping(two_disks()))
            .await
            .unwrap();
        state.gen_config().await.unwrap();

        assert!(matches!(
            state.set(Field::Hostname, "late"),
            Err(InstallerError::Finalized)
        ));
        assert!(matches!(
            state.select(0, 1, 0),
            Err(InstallerError::Finalized)
        ));
        assert!(matches!(
            state.gen_config().await,
            Err(InstallerError::Finalized)
        ));
        assert_eq!(state.connection().generated.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_preview_resolves_preset_without_mutating() {
        let mut state = InstallerState::new(FakeConnection::bootstrapping(two_disks()))
            .await
            .unwrap();
        state.set(Field::Cni, "cilium").unwrap();

        let yaml = state.preview_yaml().unwrap();
        assert!(yaml.contains("name: custom"));
        assert!(yaml.contains(CILIUM_QUICK_INSTALL));
        assert_eq!(
            state.request().cluster_config.cluster_network.cni_config,
            None
        );
    }

    #[test]
    fn test_control_plane_endpoint_format() {
        assert_eq!(control_plane_endpoint("node.lan"), "https://node.lan:6443");
    }
}

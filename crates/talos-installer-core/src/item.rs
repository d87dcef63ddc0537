//! Editable configuration fields
//!
//! A [`FieldItem`] never holds its value. It names a [`Field`], which is a
//! stable key path into the [`ConfigDraft`] every item of a session edits,
//! so an edit made through one item is immediately visible to all others.

use crate::error::InstallerError;
use talos_rs::{GenerateConfigurationRequest, MachineType};

/// Request under construction plus the selected CNI preset key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDraft {
    pub request: GenerateConfigurationRequest,
    /// CNI name or preset key, resolved when the config is generated
    pub cni: String,
}

/// Location of an editable value inside a [`ConfigDraft`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    InstallImage,
    InstallDisk,
    MachineType,
    ClusterName,
    ControlPlaneEndpoint,
    KubernetesVersion,
    Hostname,
    DnsDomain,
    Cni,
}

impl Field {
    /// Dotted path of the field in the machine config document
    pub fn path(&self) -> &'static str {
        match self {
            Field::InstallImage => "machine.install.image",
            Field::InstallDisk => "machine.install.disk",
            Field::MachineType => "machine.type",
            Field::ClusterName => "cluster.clusterName",
            Field::ControlPlaneEndpoint => "cluster.controlPlane.endpoint",
            Field::KubernetesVersion => "machine.kubernetesVersion",
            Field::Hostname => "machine.network.hostname",
            Field::DnsDomain => "cluster.network.dnsDomain",
            Field::Cni => "cluster.network.cni",
        }
    }

    /// Read the current value as text
    pub fn get(&self, draft: &ConfigDraft) -> String {
        let machine = &draft.request.machine_config;
        let cluster = &draft.request.cluster_config;
        match self {
            Field::InstallImage => machine.install_config.install_image.clone(),
            Field::InstallDisk => machine.install_config.install_disk.clone(),
            Field::MachineType => machine.machine_type.to_string(),
            Field::ClusterName => cluster.name.clone(),
            Field::ControlPlaneEndpoint => cluster.control_plane.endpoint.clone(),
            Field::KubernetesVersion => machine.kubernetes_version.clone(),
            Field::Hostname => machine.network_config.hostname.clone(),
            Field::DnsDomain => cluster.cluster_network.dns_domain.clone(),
            Field::Cni => draft.cni.clone(),
        }
    }

    /// Write a value in place
    ///
    /// Text fields take anything; the machine type must parse.
    pub fn set(&self, draft: &mut ConfigDraft, value: &str) -> Result<(), InstallerError> {
        let machine = &mut draft.request.machine_config;
        let cluster = &mut draft.request.cluster_config;
        let slot = match self {
            Field::MachineType => {
                let parsed = value.parse::<MachineType>();
                machine.machine_type = parsed.map_err(|source| InstallerError::InvalidValue {
                    field: *self,
                    source,
                })?;
                return Ok(());
            }
            Field::InstallImage => &mut machine.install_config.install_image,
            Field::InstallDisk => &mut machine.install_config.install_disk,
            Field::ClusterName => &mut cluster.name,
            Field::ControlPlaneEndpoint => &mut cluster.control_plane.endpoint,
            Field::KubernetesVersion => &mut machine.kubernetes_version,
            Field::Hostname => &mut machine.network_config.hostname,
            Field::DnsDomain => &mut cluster.cluster_network.dns_domain,
            Field::Cni => &mut draft.cni,
        };
        *slot = value.to_string();
        Ok(())
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// One selectable row of a [`ChoiceTable`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    /// First column, shown to the user
    pub display: String,
    /// Value written to the bound field when selected
    pub value: String,
    /// Remaining columns
    pub extra: Vec<String>,
}

impl Choice {
    /// Display columns of the row
    pub fn columns(&self) -> Vec<&str> {
        std::iter::once(self.display.as_str())
            .chain(self.extra.iter().map(String::as_str))
            .collect()
    }

    fn width(&self) -> usize {
        1 + self.extra.len()
    }
}

/// Ordered set of values a field may take, with an optional header row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChoiceTable {
    header: Option<Vec<String>>,
    rows: Vec<Choice>,
}

impl ChoiceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            header: Some(columns.into_iter().map(Into::into).collect()),
            rows: Vec::new(),
        }
    }

    /// Append a row; its width must match the header, or the first row
    /// when there is no header.
    pub fn push(
        &mut self,
        display: impl Into<String>,
        value: impl Into<String>,
        extra: Vec<String>,
    ) -> Result<(), InstallerError> {
        let choice = Choice {
            display: display.into(),
            value: value.into(),
            extra,
        };

        let expected = match (&self.header, self.rows.first()) {
            (Some(header), _) => Some(header.len()),
            (None, Some(first)) => Some(first.width()),
            (None, None) => None,
        };
        let got = choice.width();
        if let Some(expected) = expected
            && expected != got
        {
            return Err(InstallerError::ChoiceArity {
                display: choice.display,
                expected,
                got,
            });
        }

        self.rows.push(choice);
        Ok(())
    }

    pub fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }

    pub fn rows(&self) -> &[Choice] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the row carrying `value`
    pub fn position(&self, value: &str) -> Option<usize> {
        self.rows.iter().position(|row| row.value == value)
    }

    /// Tabular form: header row (if any) followed by one row per choice
    pub fn table_rows(&self) -> Vec<Vec<String>> {
        self.header
            .iter()
            .cloned()
            .chain(
                self.rows
                    .iter()
                    .map(|row| row.columns().into_iter().map(String::from).collect()),
            )
            .collect()
    }
}

/// A labelled, documented field bound to a location in the draft
#[derive(Debug, Clone, PartialEq)]
pub struct FieldItem {
    label: String,
    help: String,
    field: Field,
    choices: Option<ChoiceTable>,
}

impl FieldItem {
    pub fn new(label: impl Into<String>, help: impl Into<String>, field: Field) -> Self {
        Self {
            label: label.into(),
            help: help.into(),
            field,
            choices: None,
        }
    }

    pub fn with_choices(mut self, choices: ChoiceTable) -> Self {
        self.choices = Some(choices);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn field(&self) -> Field {
        self.field
    }

    pub fn choices(&self) -> Option<&ChoiceTable> {
        self.choices.as_ref()
    }

    pub fn value(&self, draft: &ConfigDraft) -> String {
        self.field.get(draft)
    }

    pub fn set(&self, draft: &mut ConfigDraft, value: &str) -> Result<(), InstallerError> {
        self.field.set(draft, value)
    }

    /// Write the value of choice `row` into the bound field
    pub fn select(&self, draft: &mut ConfigDraft, row: usize) -> Result<(), InstallerError> {
        let choice = self
            .choices
            .as_ref()
            .and_then(|table| table.rows().get(row))
            .ok_or_else(|| InstallerError::NoSuchChoice {
                label: self.label.clone(),
                row,
            })?;
        self.field.set(draft, &choice.value)
    }

    /// Row matching the current value, if any
    pub fn selected_choice(&self, draft: &ConfigDraft) -> Option<usize> {
        self.choices
            .as_ref()
            .and_then(|table| table.position(&self.value(draft)))
    }
}

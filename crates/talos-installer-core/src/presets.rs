//! Built-in CNI presets
//!
//! A preset key selected in the CNI field replaces the whole CNI config of
//! the request when the configuration is generated.

use talos_rs::CniConfig;

/// Fixed CNI configuration shipped with the installer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CniPreset {
    /// Key shown in the CNI choice table
    pub key: &'static str,
    pub description: &'static str,
    /// CNI name written to the config ("custom" for manifest based CNIs)
    pub name: &'static str,
    pub urls: &'static [&'static str],
}

impl CniPreset {
    pub fn to_config(&self) -> CniConfig {
        CniConfig {
            name: self.name.to_string(),
            urls: self.urls.iter().map(|url| url.to_string()).collect(),
        }
    }
}

pub const CILIUM_QUICK_INSTALL: &str =
    "https://raw.githubusercontent.com/cilium/cilium/v1.8/install/kubernetes/quick-install.yaml";

/// All presets, in the order they are offered
pub static CNI_PRESETS: &[CniPreset] = &[CniPreset {
    key: "cilium",
    description: "Cilium 1.8 installed through quick-install.yaml",
    name: "custom",
    urls: &[CILIUM_QUICK_INSTALL],
}];

/// Find the preset registered under `key`
pub fn lookup(key: &str) -> Option<&'static CniPreset> {
    CNI_PRESETS.iter().find(|preset| preset.key == key)
}

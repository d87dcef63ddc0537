//! Error types for talos-rs

use thiserror::Error;

/// Errors that can occur when talking to a Talos node
#[derive(Error, Debug)]
pub enum TalosError {
    /// Failed to parse YAML output or documents
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Failed to build a JSON config patch
    #[error("Failed to encode config patch: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration value
    #[error("Invalid config: {0}")]
    ConfigInvalid(String),

    /// Human readable size could not be parsed
    #[error("Invalid size {0:?}")]
    InvalidSize(String),

    /// IO error (including failure to spawn talosctl)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// talosctl exited with a non-zero status
    #[error("talosctl {command} failed: {stderr}")]
    Command { command: String, stderr: String },

    /// Expected output file was not produced
    #[error("Generated file missing: {0}")]
    MissingOutput(String),
}

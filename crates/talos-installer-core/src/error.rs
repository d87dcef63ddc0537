//! Error types for the installer core

use crate::item::Field;
use talos_rs::TalosError;
use thiserror::Error;

/// Errors raised while assembling or editing the installer state
#[derive(Error, Debug)]
pub enum InstallerError {
    /// Disk inventory could not be fetched at session start
    #[error("Failed to list disks: {0}")]
    Disks(#[source] TalosError),

    /// The configuration generation call failed
    #[error("Failed to generate configuration: {0}")]
    GenerateConfig(#[source] TalosError),

    /// A choice row does not have as many columns as the table
    #[error("Choice {display:?} has {got} columns, table has {expected}")]
    ChoiceArity {
        display: String,
        expected: usize,
        got: usize,
    },

    #[error("Page {0:?} has no items")]
    EmptyPage(String),

    #[error("No item {item} on page {page}")]
    NoSuchItem { page: usize, item: usize },

    #[error("{label} has no choice {row}")]
    NoSuchChoice { label: String, row: usize },

    /// The bound field's type rejected the value
    #[error("Invalid value for {field}: {source}")]
    InvalidValue {
        field: Field,
        #[source]
        source: TalosError,
    },

    #[error("Failed to render request: {0}")]
    Render(#[from] serde_yaml::Error),

    /// Configuration was already generated; the session is over
    #[error("Configuration already generated")]
    Finalized,
}

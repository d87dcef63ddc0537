//! talos-installer-core: Configuration model of the interactive installer
//!
//! Field items bound into a configuration request, the pages that group
//! them, and the installer state that assembles, edits and finalizes them.

pub mod connection;
pub mod error;
pub mod item;
pub mod page;
pub mod presets;
pub mod state;

pub use connection::{Connection, TalosctlConnection};
pub use error::InstallerError;
pub use item::{Choice, ChoiceTable, ConfigDraft, Field, FieldItem};
pub use page::Page;
pub use state::{InstallerState, Phase};

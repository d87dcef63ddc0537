//! talos-installer-tui: Terminal UI for the Talos installer
//!
//! This crate provides a Ratatui-based TUI using the Component pattern
//! that walks the installer pages and generates the machine config.

pub mod action;
pub mod app;
pub mod components;
pub mod tui;

pub use app::App;
pub use components::{InstallerComponent, OutputOptions};

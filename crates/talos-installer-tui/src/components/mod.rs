//! UI components

mod installer;

pub use installer::{InstallerComponent, InstallerView, OutputOptions};

use crate::action::Action;
use color_eyre::Result;
use crossterm::event::KeyEvent;
use ratatui::{Frame, layout::Rect};

/// A drawable piece of the UI that reacts to keys and actions
pub trait Component {
    /// Handle a key press, optionally producing an action for the app
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>>;

    /// React to an action, optionally producing a follow-up action
    fn update(&mut self, action: Action) -> Result<Option<Action>>;

    fn draw(&mut self, frame: &mut Frame, area: Rect) -> Result<()>;
}

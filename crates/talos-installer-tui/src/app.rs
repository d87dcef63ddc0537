//! Application state and main loop

use crate::action::Action;
use crate::components::{Component, InstallerComponent, OutputOptions};
use crate::tui::{self, Tui};
use color_eyre::Result;
use crossterm::event::{self, Event, KeyEventKind};
use std::path::PathBuf;
use std::time::Duration;
use talos_installer_core::{Connection, InstallerState};

/// Main application state
pub struct App<C> {
    /// Whether the application should quit
    should_quit: bool,
    installer: InstallerComponent<C>,
    /// Tick rate for animations (ms)
    tick_rate: Duration,
}

impl<C: Connection> App<C> {
    pub fn new(state: InstallerState<C>, output: OutputOptions) -> Self {
        Self {
            should_quit: false,
            installer: InstallerComponent::new(state, output),
            tick_rate: Duration::from_millis(100),
        }
    }

    /// Run the application
    pub async fn run(&mut self) -> Result<()> {
        // Install panic hook
        tui::install_panic_hook();

        // Initialize terminal
        let mut terminal = tui::init()?;

        // Main loop
        let result = self.main_loop(&mut terminal).await;

        // Restore terminal
        tui::restore()?;

        result
    }

    /// Files written during the session
    pub fn written_files(&self) -> &[PathBuf] {
        self.installer.written_files()
    }

    /// Main event loop
    async fn main_loop(&mut self, terminal: &mut Tui) -> Result<()> {
        loop {
            terminal.draw(|frame| {
                let area = frame.area();
                let _ = self.installer.draw(frame, area);
            })?;

            // The spinner frame is on screen; block on generation until it finishes
            if self.installer.is_generating() {
                self.installer.finalize().await;
                continue;
            }

            // Handle events with timeout
            if event::poll(self.tick_rate)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        if let Some(action) = self.installer.handle_key_event(key)? {
                            self.handle_action(action)?;
                        }
                    }
                    Event::Resize(w, h) => {
                        self.handle_action(Action::Resize(w, h))?;
                    }
                    _ => {}
                }
            } else {
                // Tick for animations
                self.handle_action(Action::Tick)?;
            }

            if self.should_quit {
                break;
            }
        }

        Ok(())
    }

    /// Handle an action
    fn handle_action(&mut self, action: Action) -> Result<()> {
        match action {
            Action::Quit => {
                self.should_quit = true;
            }
            Action::Resize(w, h) => {
                tracing::debug!("Terminal resized to {}x{}", w, h);
            }
            Action::Tick | Action::GenConfig => {
                if let Some(next) = self.installer.update(action)? {
                    self.handle_action(next)?;
                }
            }
        }
        Ok(())
    }
}

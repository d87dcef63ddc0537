//! Installer component - page by page configuration editor
//!
//! Walks the installer pages:
//! 1. Installer Params (image, install disk)
//! 2. Machine Config (role, cluster name, endpoint, Kubernetes version)
//! 3. Network Config (hostname, DNS domain, CNI when bootstrapping)
//!
//! then generates the machine config, writes it to the output directory and
//! optionally applies it to the node.

use crate::action::Action;
use crate::components::Component;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};
use std::path::{Path, PathBuf};
use talos_installer_core::{Connection, FieldItem, InstallerState, Phase};
use talos_rs::{GenerateConfigurationResponse, MachineType};

/// Spinner frames for the generating view
const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Where generated files go and whether to push them to the node
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub dir: PathBuf,
    /// Apply the machine config to the node after writing it
    pub apply: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            apply: false,
        }
    }
}

/// What the component is currently showing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallerView {
    /// Editing the items of a page
    Edit,
    /// Picking a row from the selected item's choice table
    Choose,
    /// Read-only YAML of the request that will be sent
    Review,
    /// Waiting for configuration generation
    Generating,
    /// Config written (and applied, if requested)
    Done,
    Error(String),
}

/// Installer wizard component
pub struct InstallerComponent<C> {
    state: InstallerState<C>,
    output: OutputOptions,
    view: InstallerView,

    /// Index of the page being edited
    page: usize,
    /// Selected item on the page
    item_state: TableState,
    /// Selected row in the choice popup
    choice_state: TableState,

    review_scroll: u16,
    /// Last rejected edit or hint
    status: Option<String>,

    written: Vec<PathBuf>,
    applied: bool,
    spinner_frame: usize,
}

impl<C: Connection> InstallerComponent<C> {
    pub fn new(state: InstallerState<C>, output: OutputOptions) -> Self {
        let mut item_state = TableState::default();
        item_state.select(Some(0));

        Self {
            state,
            output,
            view: InstallerView::Edit,
            page: 0,
            item_state,
            choice_state: TableState::default(),
            review_scroll: 0,
            status: None,
            written: Vec::new(),
            applied: false,
            spinner_frame: 0,
        }
    }

    pub fn view(&self) -> &InstallerView {
        &self.view
    }

    pub fn state(&self) -> &InstallerState<C> {
        &self.state
    }

    pub fn page_index(&self) -> usize {
        self.page
    }

    pub fn item_index(&self) -> usize {
        self.item_state.selected().unwrap_or(0)
    }

    /// Files written by the last successful generation
    pub fn written_files(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn is_generating(&self) -> bool {
        self.view == InstallerView::Generating
    }

    fn current_item(&self) -> Option<&FieldItem> {
        self.state.pages().get(self.page)?.item(self.item_index())
    }

    fn page_len(&self) -> usize {
        self.state.pages().get(self.page).map_or(0, |p| p.len())
    }

    fn transition(&mut self, view: InstallerView) {
        tracing::debug!("Installer: {:?} -> {:?}", self.view, view);
        self.view = view;
    }

    // ============ NAVIGATION ============

    fn select_next_item(&mut self) {
        let len = self.page_len();
        if len > 0 {
            self.item_state.select(Some((self.item_index() + 1) % len));
        }
    }

    fn select_prev_item(&mut self) {
        let len = self.page_len();
        if len > 0 {
            let i = self.item_index();
            self.item_state
                .select(Some(if i == 0 { len - 1 } else { i - 1 }));
        }
    }

    fn next_page(&mut self) {
        if self.page + 1 < self.state.pages().len() {
            self.page += 1;
            self.item_state.select(Some(0));
            self.status = None;
        }
    }

    fn prev_page(&mut self) {
        if self.page > 0 {
            self.page -= 1;
            self.item_state.select(Some(0));
            self.status = None;
        }
    }

    // ============ EDITING ============

    fn edit_current(&mut self, edit: impl FnOnce(&mut String)) {
        let Some(item) = self.current_item() else {
            return;
        };
        let field = item.field();
        let mut value = item.value(self.state.draft());
        edit(&mut value);

        self.status = match self.state.set(field, &value) {
            Ok(()) => None,
            Err(e) => Some(e.to_string()),
        };
    }

    fn open_choices(&mut self) {
        let Some(item) = self.current_item() else {
            return;
        };
        match item.choices() {
            Some(table) if !table.is_empty() => {
                let selected = item.selected_choice(self.state.draft()).unwrap_or(0);
                self.choice_state.select(Some(selected));
                self.transition(InstallerView::Choose);
            }
            Some(_) => {
                self.status = Some(format!("No {} available, type a value", item.label()));
            }
            None => self.select_next_item(),
        }
    }

    fn choice_count(&self) -> usize {
        self.current_item()
            .and_then(|item| item.choices())
            .map_or(0, |table| table.len())
    }

    fn confirm_choice(&mut self) {
        let row = self.choice_state.selected().unwrap_or(0);
        self.status = match self.state.select(self.page, self.item_index(), row) {
            Ok(()) => None,
            Err(e) => Some(e.to_string()),
        };
        self.transition(InstallerView::Edit);
    }

    // ============ GENERATION ============

    /// Generate the config, write it out and optionally apply it
    ///
    /// Failures are shown in the error view rather than returned.
    pub async fn finalize(&mut self) {
        let response = match self.state.gen_config().await {
            Ok(response) => response,
            Err(e) => {
                self.transition(InstallerView::Error(e.to_string()));
                return;
            }
        };

        let machine_type = self.state.request().machine_config.machine_type;
        self.written = match write_outputs(&response, machine_type, &self.output.dir).await {
            Ok(files) => files,
            Err(e) => {
                tracing::error!("Failed to write config: {}", e);
                self.transition(InstallerView::Error(format!(
                    "Failed to write config to {}: {}",
                    self.output.dir.display(),
                    e
                )));
                return;
            }
        };
        for file in &self.written {
            tracing::info!("Wrote {}", file.display());
        }

        if self.output.apply {
            let config = self.output.dir.join(machine_type.config_filename());
            let node = self.state.connection().node_endpoint().to_string();
            if let Err(e) = talos_rs::apply_config_insecure(&node, &config).await {
                self.transition(InstallerView::Error(format!(
                    "Config written but apply to {} failed: {}",
                    node, e
                )));
                return;
            }
            self.applied = true;
        }

        self.transition(InstallerView::Done);
    }

    // ============ KEY HANDLING ============

    /// Handle key events for Edit view
    fn handle_edit_key(&mut self, key: KeyEvent) -> Option<Action> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => Some(Action::Quit),
            KeyCode::Char('g') if ctrl => Some(Action::GenConfig),
            KeyCode::F(10) => Some(Action::GenConfig),
            KeyCode::Char('r') if ctrl => {
                self.open_review();
                None
            }
            KeyCode::F(2) => {
                self.open_review();
                None
            }
            KeyCode::Esc => Some(Action::Quit),
            KeyCode::Down | KeyCode::Tab => {
                self.select_next_item();
                None
            }
            KeyCode::Up | KeyCode::BackTab => {
                self.select_prev_item();
                None
            }
            KeyCode::Right | KeyCode::PageDown => {
                self.next_page();
                None
            }
            KeyCode::Left | KeyCode::PageUp => {
                self.prev_page();
                None
            }
            KeyCode::Enter => {
                self.open_choices();
                None
            }
            KeyCode::Backspace => {
                self.edit_current(|value| {
                    value.pop();
                });
                None
            }
            KeyCode::Char(c) if !ctrl => {
                self.edit_current(|value| value.push(c));
                None
            }
            _ => None,
        }
    }

    /// Handle key events for Choose view
    fn handle_choose_key(&mut self, key: KeyEvent) -> Option<Action> {
        let count = self.choice_count();
        match key.code {
            KeyCode::Up | KeyCode::Char('k') if count > 0 => {
                let i = self.choice_state.selected().unwrap_or(0);
                self.choice_state
                    .select(Some(if i == 0 { count - 1 } else { i - 1 }));
                None
            }
            KeyCode::Down | KeyCode::Char('j') if count > 0 => {
                let i = self.choice_state.selected().unwrap_or(0);
                self.choice_state.select(Some((i + 1) % count));
                None
            }
            KeyCode::Enter => {
                self.confirm_choice();
                None
            }
            KeyCode::Esc => {
                self.transition(InstallerView::Edit);
                None
            }
            _ => None,
        }
    }

    fn open_review(&mut self) {
        self.review_scroll = 0;
        self.transition(InstallerView::Review);
    }

    /// Handle key events for Review view
    fn handle_review_key(&mut self, key: KeyEvent) -> Option<Action> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('g') if ctrl => Some(Action::GenConfig),
            KeyCode::F(10) => Some(Action::GenConfig),
            KeyCode::Up | KeyCode::Char('k') => {
                self.review_scroll = self.review_scroll.saturating_sub(1);
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.review_scroll = self.review_scroll.saturating_add(1);
                None
            }
            KeyCode::Esc | KeyCode::F(2) => {
                self.transition(InstallerView::Edit);
                None
            }
            _ => None,
        }
    }

    /// Handle key events for Error view
    fn handle_error_key(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            // Only a failed generation leaves anything to edit
            KeyCode::Esc | KeyCode::Enter if self.state.phase() == Phase::Editing => {
                self.transition(InstallerView::Edit);
                None
            }
            KeyCode::Char('q') | KeyCode::Esc | KeyCode::Enter => Some(Action::Quit),
            _ => None,
        }
    }

    /// Handle key events for Done view
    fn handle_done_key(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc | KeyCode::Enter => Some(Action::Quit),
            _ => None,
        }
    }

    // ============ DRAWING ============

    /// Draw the header with page indicator
    fn draw_header(&self, frame: &mut Frame, area: Rect) {
        let pages = self.state.pages();
        let mode = if self.state.is_expanding() {
            "expand"
        } else {
            "bootstrap"
        };

        let mut spans = vec![
            Span::styled(
                " Talos Installer ",
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(
                format!("Page {} of {}: ", self.page + 1, pages.len()),
                Style::default().fg(Color::DarkGray),
            ),
        ];
        for (i, page) in pages.iter().enumerate() {
            let style = if i == self.page {
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            spans.push(Span::styled(page.title(), style));
            spans.push(Span::raw("  "));
        }
        spans.push(Span::styled(
            format!("[{}]", mode),
            Style::default().fg(Color::Yellow),
        ));

        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    /// Draw the items of the current page
    fn draw_items(&mut self, frame: &mut Frame, area: Rect) {
        let Some(page) = self.state.pages().get(self.page) else {
            return;
        };
        let draft = self.state.draft();

        let header = Row::new(vec![
            Cell::from("Field").style(Style::default().add_modifier(Modifier::BOLD)),
            Cell::from("Value").style(Style::default().add_modifier(Modifier::BOLD)),
            Cell::from(""),
        ])
        .height(1)
        .style(Style::default().fg(Color::Cyan));

        let rows: Vec<Row> = page
            .items()
            .iter()
            .map(|item| {
                let value = item.value(draft);
                let value_cell = if value.is_empty() {
                    Cell::from("<unset>").style(Style::default().fg(Color::DarkGray))
                } else {
                    Cell::from(value)
                };
                let hint = if item.choices().is_some() {
                    Cell::from("[Enter] choose").style(Style::default().fg(Color::DarkGray))
                } else {
                    Cell::from("")
                };
                Row::new(vec![Cell::from(item.label().to_string()), value_cell, hint])
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Length(24),
                Constraint::Fill(1),
                Constraint::Length(16),
            ],
        )
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {} ", page.title())),
        )
        .row_highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▶ ");

        frame.render_stateful_widget(table, area, &mut self.item_state);
    }

    /// Draw help text of the selected item
    fn draw_help(&self, frame: &mut Frame, area: Rect) {
        let mut lines: Vec<Line> = match self.current_item() {
            Some(item) => item
                .help()
                .lines()
                .map(|l| Line::raw(format!("  {}", l)))
                .collect(),
            None => vec![],
        };
        if let Some(status) = &self.status {
            lines.push(Line::styled(
                format!("  {}", status),
                Style::default().fg(Color::Red),
            ));
        }

        let help = Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title(" Help "));
        frame.render_widget(help, area);
    }

    /// Draw key hints
    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let keys: &[(&str, &str)] = match self.view {
            InstallerView::Choose => &[
                ("[↑↓]", "Navigate"),
                ("[Enter]", "Select"),
                ("[Esc]", "Cancel"),
            ],
            InstallerView::Review => &[
                ("[↑↓]", "Scroll"),
                ("[Ctrl-G]", "Generate"),
                ("[Esc]", "Back"),
            ],
            _ => &[
                ("[↑↓]", "Field"),
                ("[←→]", "Page"),
                ("[Enter]", "Choose"),
                ("[F2]", "Review"),
                ("[Ctrl-G]", "Generate"),
                ("[Esc]", "Quit"),
            ],
        };

        let mut spans = Vec::new();
        for (key, label) in keys {
            spans.push(Span::styled(
                format!(" {} ", key),
                Style::default().fg(Color::Cyan),
            ));
            spans.push(Span::raw(*label));
            spans.push(Span::raw("  "));
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    /// Draw the choice table of the selected item as a popup
    fn draw_choices(&mut self, frame: &mut Frame, area: Rect) {
        let index = self.item_index();
        let page = self.state.pages().get(self.page);
        let Some(item) = page.and_then(|p| p.item(index)) else {
            return;
        };
        let Some(choices) = item.choices() else {
            return;
        };
        let current = item.value(self.state.draft());

        let columns = choices
            .header()
            .map(|h| h.len())
            .or_else(|| choices.rows().first().map(|r| r.columns().len()))
            .unwrap_or(1);

        let rows: Vec<Row> = choices
            .rows()
            .iter()
            .map(|choice| {
                let marker = if choice.value == current { "● " } else { "  " };
                let cells: Vec<Cell> = choice
                    .columns()
                    .into_iter()
                    .enumerate()
                    .map(|(i, col)| {
                        if i == 0 {
                            Cell::from(format!("{}{}", marker, col))
                        } else {
                            Cell::from(col.to_string())
                        }
                    })
                    .collect();
                Row::new(cells)
            })
            .collect();

        let mut table = Table::new(rows, vec![Constraint::Fill(1); columns])
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan))
                    .title(format!(" {} ", item.label())),
            )
            .row_highlight_style(
                Style::default()
                    .bg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD),
            );
        if let Some(header) = choices.header() {
            table = table.header(
                Row::new(
                    header
                        .iter()
                        .map(|h| Cell::from(format!("  {}", h)))
                        .collect::<Vec<_>>(),
                )
                .style(
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ),
            );
        }

        let header_rows = if choices.header().is_some() { 1 } else { 0 };
        let height = choices.len() as u16 + header_rows + 2;
        let popup = centered_rect(70, height, area);
        frame.render_widget(Clear, popup);
        frame.render_stateful_widget(table, popup, &mut self.choice_state);
    }

    /// Draw the request as YAML
    fn draw_review(&self, frame: &mut Frame, area: Rect) {
        let text = match self.state.preview_yaml() {
            Ok(yaml) => yaml,
            Err(e) => format!("Unable to render request: {}", e),
        };

        let review = Paragraph::new(text)
            .scroll((self.review_scroll, 0))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Review Configuration Request "),
            );
        frame.render_widget(review, area);
    }

    fn draw_generating(&self, frame: &mut Frame, area: Rect) {
        let spinner = SPINNER_FRAMES[self.spinner_frame % SPINNER_FRAMES.len()];
        let content = Paragraph::new(vec![
            Line::raw(""),
            Line::from(vec![
                Span::styled(format!("  {} ", spinner), Style::default().fg(Color::Cyan)),
                Span::styled(
                    "Generating machine configuration...",
                    Style::default().fg(Color::Yellow),
                ),
            ]),
        ])
        .block(Block::default().borders(Borders::ALL));

        frame.render_widget(content, area);
    }

    fn draw_done(&self, frame: &mut Frame, area: Rect) {
        let mut lines = vec![
            Line::raw(""),
            Line::styled(
                "  Machine configuration generated",
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            ),
            Line::raw(""),
        ];
        for file in &self.written {
            lines.push(Line::from(vec![
                Span::styled("     Wrote: ", Style::default().fg(Color::DarkGray)),
                Span::styled(file.display().to_string(), Style::default().fg(Color::Cyan)),
            ]));
        }
        if self.applied {
            lines.push(Line::from(vec![
                Span::styled("     Applied to: ", Style::default().fg(Color::DarkGray)),
                Span::styled(
                    self.state.connection().node_endpoint().to_string(),
                    Style::default().fg(Color::Cyan),
                ),
            ]));
        }
        lines.push(Line::raw(""));
        lines.push(Line::from(vec![
            Span::styled(" [Enter] ", Style::default().fg(Color::Green)),
            Span::raw("Exit"),
        ]));

        let content = Paragraph::new(lines).block(Block::default().borders(Borders::ALL));
        frame.render_widget(content, area);
    }

    fn draw_error(&self, frame: &mut Frame, area: Rect, message: &str) {
        let hint = if self.state.phase() == Phase::Editing {
            "  Press [Esc] to go back and edit, [q] to quit."
        } else {
            "  Press [q] to quit."
        };
        let content = Paragraph::new(vec![
            Line::raw(""),
            Line::styled("  Error occurred:", Style::default().fg(Color::Red)),
            Line::raw(""),
            Line::styled(format!("  {}", message), Style::default().fg(Color::White)),
            Line::raw(""),
            Line::styled(hint, Style::default().fg(Color::Yellow)),
        ])
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        );

        frame.render_widget(content, area);
    }
}

impl<C: Connection> Component for InstallerComponent<C> {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        let action = match &self.view {
            InstallerView::Edit => self.handle_edit_key(key),
            InstallerView::Choose => self.handle_choose_key(key),
            InstallerView::Review => self.handle_review_key(key),
            InstallerView::Generating => None,
            InstallerView::Done => self.handle_done_key(key),
            InstallerView::Error(_) => self.handle_error_key(key),
        };

        Ok(action)
    }

    fn update(&mut self, action: Action) -> Result<Option<Action>> {
        match action {
            Action::Tick => {
                self.spinner_frame = (self.spinner_frame + 1) % SPINNER_FRAMES.len();
            }
            Action::GenConfig => {
                self.status = None;
                self.transition(InstallerView::Generating);
            }
            _ => {}
        }
        Ok(None)
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect) -> Result<()> {
        let layout = Layout::vertical([
            Constraint::Length(1), // Header
            Constraint::Fill(1),   // Content
            Constraint::Length(6), // Help
            Constraint::Length(1), // Keys
        ])
        .split(area);

        self.draw_header(frame, layout[0]);

        match &self.view.clone() {
            InstallerView::Edit => {
                self.draw_items(frame, layout[1]);
                self.draw_help(frame, layout[2]);
            }
            InstallerView::Choose => {
                self.draw_items(frame, layout[1]);
                self.draw_help(frame, layout[2]);
                self.draw_choices(frame, layout[1]);
            }
            InstallerView::Review => self.draw_review(frame, layout[1].union(layout[2])),
            InstallerView::Generating => self.draw_generating(frame, layout[1]),
            InstallerView::Done => self.draw_done(frame, layout[1]),
            InstallerView::Error(msg) => self.draw_error(frame, layout[1], msg),
        }

        self.draw_footer(frame, layout[3]);
        Ok(())
    }
}

/// Write the generated machine config and talosconfig into `dir`
async fn write_outputs(
    response: &GenerateConfigurationResponse,
    machine_type: MachineType,
    dir: &Path,
) -> std::io::Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dir).await?;
    let mut written = Vec::new();

    if let Some(config) = response.data.first() {
        let path = dir.join(machine_type.config_filename());
        tokio::fs::write(&path, config).await?;
        written.push(path);
    }

    if !response.talosconfig.is_empty() {
        let path = dir.join("talosconfig");
        tokio::fs::write(&path, &response.talosconfig).await?;
        written.push(path);
    }

    Ok(written)
}

/// Rect of `height` rows and `percent_x` width centered in `area`
fn centered_rect(percent_x: u16, height: u16, area: Rect) -> Rect {
    let vertical = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(height.min(area.height)),
        Constraint::Fill(1),
    ])
    .split(area);
    Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .split(vertical[1])[1]
}

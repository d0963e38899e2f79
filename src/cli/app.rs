use super::autocomplete::Autocompleter;
use super::form::{FormCommand, FormState};
use super::ui;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use patientdb::core::Value;
use patientdb::facade::{DatabaseHandle, HandleState};
use patientdb::session::Session;
use patientdb::sync::ChannelHub;
use ratatui::{
    Terminal,
    backend::{Backend, CrosstermBackend},
    widgets::{Block, Borders},
};
use std::{io, sync::Arc, time::Duration};
use tracing::{error, info, warn};
use tui_textarea::{Input, Key, TextArea};

/// How long to wait for a key before draining change messages.
const TICK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Console,
    Form,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Execute,
    Submit,
    Delete,
    Load,
    Reload,
    NewTab,
    CloseTab,
    Retry,
}

pub struct SessionTab {
    pub title: String,
    pub session: Session,
    pub selected: Option<usize>,
}

impl SessionTab {
    /// Id of the highlighted row, if the listing has an integer `id` column.
    pub fn selected_id(&self) -> Option<i64> {
        let row = self.selected?;
        self.session.records()?.get(row, "id").and_then(Value::as_i64)
    }

    fn row_count(&self) -> usize {
        self.session.records().map_or(0, |r| r.row_count())
    }

    fn select_next(&mut self) {
        let rows = self.row_count();
        self.selected = match (rows, self.selected) {
            (0, _) => None,
            (_, None) => Some(0),
            (rows, Some(i)) => Some((i + 1).min(rows - 1)),
        };
    }

    fn select_prev(&mut self) {
        let rows = self.row_count();
        self.selected = match (rows, self.selected) {
            (0, _) => None,
            (_, None) => Some(rows - 1),
            (_, Some(i)) => Some(i.saturating_sub(1)),
        };
    }

    fn clamp_selection(&mut self) {
        let rows = self.row_count();
        if let Some(i) = self.selected {
            self.selected = if rows == 0 { None } else { Some(i.min(rows - 1)) };
        }
    }
}

pub struct App<'a> {
    handle: Arc<DatabaseHandle>,
    hub: ChannelHub,
    pub tabs: Vec<SessionTab>,
    pub active: usize,
    opened: usize,
    initial_tabs: usize,
    pub mode: Mode,
    pub textarea: TextArea<'a>,
    pub form: FormState,
    pub busy: bool,
    pub exit: bool,

    // Autocomplete State
    pub autocompleter: Autocompleter,
    pub suggestions: Vec<String>,
    pub suggestion_index: usize,
    pub popup_open: bool,
}

impl<'a> App<'a> {
    pub fn new(handle: Arc<DatabaseHandle>, initial_tabs: usize) -> Self {
        let hub = ChannelHub::new(handle.config().channel_capacity);
        let textarea = Self::new_textarea(&handle.config().default_query);

        Self {
            handle,
            hub,
            tabs: Vec::new(),
            active: 0,
            opened: 0,
            initial_tabs: initial_tabs.max(1),
            mode: Mode::Console,
            textarea,
            form: FormState::new(),
            busy: false,
            exit: false,
            autocompleter: Autocompleter::new(),
            suggestions: Vec::new(),
            suggestion_index: 0,
            popup_open: false,
        }
    }

    fn new_textarea(query: &str) -> TextArea<'static> {
        let mut textarea = TextArea::from(query.lines().map(str::to_string));
        textarea.set_placeholder_text(
            "Enter SQL query (Press 'Ctrl+E' to execute, 'Tab' for autocomplete, 'Esc' to quit)",
        );
        textarea.set_block(Block::default().borders(Borders::ALL).title(" SQL Console "));
        textarea
    }

    pub fn handle_state(&self) -> HandleState {
        self.handle.state()
    }

    pub fn active_tab(&self) -> Option<&SessionTab> {
        self.tabs.get(self.active)
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let res = self.run_loop(&mut terminal).await;

        // Restore terminal
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        self.shutdown().await;
        res.map_err(Into::into)
    }

    async fn run_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        terminal.draw(|f| ui::draw(f, self))?;
        self.start().await;

        loop {
            terminal.draw(|f| ui::draw(f, self))?;

            if event::poll(TICK)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        if let Some(command) = self.handle_key(key) {
                            self.busy = true;
                            terminal.draw(|f| ui::draw(f, self))?;
                            self.run_command(command).await;
                            self.busy = false;
                        }
                    }
                }
            }
            if self.exit {
                return Ok(());
            }
            self.drain_changes().await;
        }
    }

    /// Opens the database and the first sessions. On failure the handle is
    /// left `Failed` and the error screen offers a retry.
    async fn start(&mut self) {
        if let Err(err) = self.handle.init().await {
            error!(error = %err, "database unavailable");
            return;
        }
        while self.tabs.len() < self.initial_tabs {
            if !self.open_tab().await {
                break;
            }
        }
        self.autocompleter.refresh(&self.handle).await;
    }

    async fn open_tab(&mut self) -> bool {
        match Session::with_hub(self.handle.clone(), &self.hub) {
            Ok(mut session) => {
                // A failed bootstrap is already on the session's notification line.
                let _ = session.bootstrap().await;
                self.opened += 1;
                self.tabs.push(SessionTab {
                    title: format!("Session {}", self.opened),
                    session,
                    selected: None,
                });
                self.active = self.tabs.len() - 1;
                true
            }
            Err(err) => {
                error!(error = %err, "could not open session");
                false
            }
        }
    }

    fn close_tab(&mut self) {
        if self.active >= self.tabs.len() {
            return;
        }
        let mut tab = self.tabs.remove(self.active);
        tab.session.close();
        info!(tab = %tab.title, "tab closed");

        if self.tabs.is_empty() {
            self.exit = true;
        } else {
            self.active = self.active.min(self.tabs.len() - 1);
        }
    }

    async fn shutdown(&mut self) {
        for tab in &mut self.tabs {
            tab.session.close();
        }
        if let Err(err) = self.handle.dispose().await {
            warn!(error = %err, "database did not close cleanly");
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Option<Command> {
        if !self.handle.is_ready() {
            return match key.code {
                KeyCode::Esc => {
                    self.exit = true;
                    None
                }
                KeyCode::Char('r') if matches!(self.handle.state(), HandleState::Failed(_)) => {
                    Some(Command::Retry)
                }
                _ => None,
            };
        }

        // Navigation inside Popup
        if self.popup_open {
            match key.code {
                KeyCode::Down => {
                    if !self.suggestions.is_empty() {
                        self.suggestion_index = (self.suggestion_index + 1) % self.suggestions.len();
                    }
                    return None;
                }
                KeyCode::Up => {
                    if !self.suggestions.is_empty() {
                        self.suggestion_index = (self.suggestion_index + self.suggestions.len() - 1)
                            % self.suggestions.len();
                    }
                    return None;
                }
                KeyCode::Enter | KeyCode::Tab => {
                    self.accept_suggestion();
                    return None;
                }
                KeyCode::Esc => {
                    self.popup_open = false;
                    return None;
                }
                _ => {
                    // Let the key reach the editor
                    self.popup_open = false;
                }
            }
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => {
                self.exit = true;
                None
            }
            KeyCode::F(2) => {
                self.mode = match self.mode {
                    Mode::Console => Mode::Form,
                    Mode::Form => Mode::Console,
                };
                None
            }
            KeyCode::F(3) => {
                if !self.tabs.is_empty() {
                    self.active = (self.active + 1) % self.tabs.len();
                }
                None
            }
            KeyCode::F(4) => Some(Command::NewTab),
            KeyCode::F(5) => Some(Command::Reload),
            KeyCode::F(6) => Some(Command::Load),
            KeyCode::Char('w') if ctrl => Some(Command::CloseTab),
            KeyCode::Char('d') if ctrl => Some(Command::Delete),
            KeyCode::PageDown => {
                if let Some(tab) = self.tabs.get_mut(self.active) {
                    tab.select_next();
                }
                None
            }
            KeyCode::PageUp => {
                if let Some(tab) = self.tabs.get_mut(self.active) {
                    tab.select_prev();
                }
                None
            }
            KeyCode::Char('e') if ctrl => Some(match self.mode {
                Mode::Console => Command::Execute,
                Mode::Form => Command::Submit,
            }),
            KeyCode::Enter if ctrl && self.mode == Mode::Console => Some(Command::Execute),
            _ => match self.mode {
                Mode::Console => {
                    self.console_key(key);
                    None
                }
                Mode::Form => match self.form.handle_key(key) {
                    FormCommand::Submit => Some(Command::Submit),
                    FormCommand::None => None,
                },
            },
        }
    }

    fn console_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Tab {
            // Trigger autocomplete manually
            self.update_suggestions();
            if !self.suggestions.is_empty() {
                self.popup_open = true;
                self.suggestion_index = 0;
            }
            return;
        }

        self.textarea.input(key);
        // Auto-trigger on typing letters
        if let KeyCode::Char(c) = key.code {
            if c.is_alphabetic() || c == '_' {
                self.update_suggestions();
                self.popup_open = !self.suggestions.is_empty();
            } else {
                self.popup_open = false;
            }
        }
    }

    async fn run_command(&mut self, command: Command) {
        match command {
            Command::Retry => self.start().await,
            Command::NewTab => {
                self.open_tab().await;
            }
            Command::CloseTab => self.close_tab(),
            Command::Execute
            | Command::Submit
            | Command::Delete
            | Command::Load
            | Command::Reload => {
                let Some(tab) = self.tabs.get_mut(self.active) else {
                    return;
                };
                // Outcomes land on the session's notification line.
                match command {
                    Command::Execute => {
                        let sql = self.textarea.lines().join("\n");
                        let _ = tab.session.execute_query(&sql).await;
                    }
                    Command::Submit => {
                        let _ = tab.session.register_patient(&mut self.form.form).await;
                    }
                    Command::Delete => {
                        let id = tab.selected_id();
                        let _ = tab.session.delete_patient(id).await;
                    }
                    Command::Load => {
                        let id = tab.selected_id();
                        if let Ok(patient) = tab.session.load_patient(id).await {
                            self.form.load(&patient);
                            self.mode = Mode::Form;
                        }
                    }
                    _ => {
                        let _ = tab.session.fetch_patients().await;
                    }
                }
                tab.clamp_selection();

                if command == Command::Execute {
                    self.autocompleter.refresh(&self.handle).await;
                }
            }
        }
    }

    async fn drain_changes(&mut self) {
        for tab in &mut self.tabs {
            if tab.session.poll_changes().await > 0 {
                tab.clamp_selection();
            }
        }
    }

    fn update_suggestions(&mut self) {
        let (word, _) = self.get_current_word();
        self.suggestions = self.autocompleter.suggestions(&word);
        self.suggestion_index = 0;
        if self.suggestions.is_empty() {
            self.popup_open = false;
        }
    }

    fn accept_suggestion(&mut self) {
        if self.suggestions.is_empty() {
            return;
        }
        let suggestion = self.suggestions[self.suggestion_index].clone();
        let (word, _) = self.get_current_word();

        for _ in 0..word.chars().count() {
            self.textarea.input(Input {
                key: Key::Backspace,
                ctrl: false,
                alt: false,
                shift: false,
            });
        }

        self.textarea.insert_str(&suggestion);
        self.popup_open = false;
    }

    fn get_current_word(&self) -> (String, usize) {
        let (line_idx, col_idx) = self.textarea.cursor();

        let Some(line) = self.textarea.lines().get(line_idx) else {
            return (String::new(), 0);
        };
        if col_idx == 0 {
            return (String::new(), 0);
        }

        let prefix_chars: Vec<char> = line.chars().take(col_idx).collect();

        // Search backwards for the separator
        match prefix_chars
            .iter()
            .rposition(|&c| !c.is_alphanumeric() && c != '_')
        {
            Some(sep) => (prefix_chars[sep + 1..].iter().collect(), sep + 1),
            None => (prefix_chars.iter().collect(), 0),
        }
    }
}

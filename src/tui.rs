use std::io;
use std::time::Duration;

use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use miette::IntoDiagnostic;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::resolver::{Disambiguation, ManualChoices};

const HELP: &str = "Up/Down select  Enter choose  s skip  Esc stop asking";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerAction {
    None,
    Choose(usize),
    Skip,
    Abort,
}

/// Cursor over the options of one disambiguation.
#[derive(Debug, Clone, Default)]
pub struct PickerState {
    selected: usize,
    len: usize,
}

impl PickerState {
    pub fn new(len: usize) -> Self {
        Self { selected: 0, len }
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> PickerAction {
        if key.kind != KeyEventKind::Press || self.len == 0 {
            return match key.code {
                KeyCode::Esc | KeyCode::Char('q') if key.kind == KeyEventKind::Press => {
                    PickerAction::Abort
                }
                _ => PickerAction::None,
            };
        }
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.checked_sub(1).unwrap_or(self.len - 1);
                PickerAction::None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.selected = (self.selected + 1) % self.len;
                PickerAction::None
            }
            KeyCode::Home => {
                self.selected = 0;
                PickerAction::None
            }
            KeyCode::End => {
                self.selected = self.len - 1;
                PickerAction::None
            }
            KeyCode::Char(ch) if ch.is_ascii_digit() && ch != '0' => {
                let index = ch as usize - '1' as usize;
                if index < self.len {
                    self.selected = index;
                }
                PickerAction::None
            }
            KeyCode::Enter | KeyCode::Char(' ') => PickerAction::Choose(self.selected),
            KeyCode::Char('s') | KeyCode::Tab => PickerAction::Skip,
            KeyCode::Esc | KeyCode::Char('q') => PickerAction::Abort,
            _ => PickerAction::None,
        }
    }
}

/// Full-screen picker asking the user to resolve each ambiguous pair.
pub struct Picker;

impl Picker {
    /// Returns the picks made; skipped pairs stay unresolved. Esc stops
    /// asking and keeps the picks made so far.
    pub fn choose_all(pending: &[&Disambiguation]) -> miette::Result<ManualChoices> {
        let mut choices = ManualChoices::new();
        if pending.is_empty() {
            return Ok(choices);
        }

        let mut stdout = io::stdout();
        enable_raw_mode().into_diagnostic()?;
        stdout.execute(EnterAlternateScreen).into_diagnostic()?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).into_diagnostic()?;
        terminal.clear().into_diagnostic()?;

        let result = Self::run(&mut terminal, pending, &mut choices);

        disable_raw_mode().into_diagnostic()?;
        let mut stdout = io::stdout();
        stdout.execute(LeaveAlternateScreen).into_diagnostic()?;
        result.map(|_| choices)
    }

    fn run(
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
        pending: &[&Disambiguation],
        choices: &mut ManualChoices,
    ) -> miette::Result<()> {
        for (position, item) in pending.iter().enumerate() {
            let mut state = PickerState::new(item.options.len());
            loop {
                terminal
                    .draw(|frame| draw_picker(frame, item, &state, position, pending.len()))
                    .into_diagnostic()?;

                if !event::poll(Duration::from_millis(120)).into_diagnostic()? {
                    continue;
                }
                let Event::Key(key) = event::read().into_diagnostic()? else {
                    continue;
                };
                match state.handle_key(key) {
                    PickerAction::None => {}
                    PickerAction::Choose(index) => {
                        choices.insert(item.key.clone(), item.options[index].clone());
                        break;
                    }
                    PickerAction::Skip => break,
                    PickerAction::Abort => return Ok(()),
                }
            }
        }
        Ok(())
    }
}

fn draw_picker(
    frame: &mut ratatui::Frame,
    item: &Disambiguation,
    state: &PickerState,
    position: usize,
    total: usize,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(4),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            format!("{} ({})", item.key.city, item.key.country),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("  {}/{}", position + 1, total),
            Style::default().fg(Color::DarkGray),
        ),
    ]))
    .block(Block::default().borders(Borders::ALL).title("Select a weather file"));
    frame.render_widget(header, chunks[0]);

    let lines = item
        .options
        .iter()
        .enumerate()
        .map(|(index, option)| {
            if index == state.selected() {
                Line::from(Span::styled(
                    format!("(*) {option}"),
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ))
            } else {
                Line::from(format!("( ) {option}"))
            }
        })
        .collect::<Vec<_>>();
    let list = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Candidates"))
        .wrap(Wrap { trim: false });
    frame.render_widget(list, chunks[1]);

    let help = Paragraph::new(Line::from(Span::styled(
        HELP,
        Style::default().fg(Color::DarkGray),
    )))
    .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help, chunks[2]);
}

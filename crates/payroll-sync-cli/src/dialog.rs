use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use payroll_sync::mapping::{ColumnMapping, MappingChoice, MappingForm};
use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogAction {
    Submit,
    Cancel,
}

/// One row per category, each cycling through `skip` and the discovered columns.
#[derive(Debug)]
pub struct DialogState<'f> {
    form: &'f MappingForm,
    choices: Vec<MappingChoice>,
    current: usize,
}

impl<'f> DialogState<'f> {
    /// Categories start on the column with the same header label, if there is one.
    pub fn new(form: &'f MappingForm) -> Self {
        let choices = form
            .categories
            .iter()
            .map(|category| {
                form.columns
                    .iter()
                    .find(|column| column.label == category.label())
                    .map_or(MappingChoice::Skip, |column| {
                        MappingChoice::Column(column.column)
                    })
            })
            .collect();
        DialogState {
            form,
            choices,
            current: 0,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<DialogAction> {
        let rows = self.choices.len();
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Some(DialogAction::Cancel),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Some(DialogAction::Cancel);
            }
            KeyCode::Enter => return Some(DialogAction::Submit),
            KeyCode::Down | KeyCode::Char('j') if rows > 0 => {
                self.current = (self.current + 1) % rows;
            }
            KeyCode::Up | KeyCode::Char('k') if rows > 0 => {
                self.current = if self.current == 0 {
                    rows - 1
                } else {
                    self.current - 1
                };
            }
            KeyCode::Right | KeyCode::Char('l') => self.cycle(1),
            KeyCode::Left | KeyCode::Char('h') => self.cycle(-1),
            _ => {}
        }
        None
    }

    /// Option 0 is `skip`, option `i` the `i`-th discovered column.
    fn cycle(&mut self, step: isize) {
        let Some(choice) = self.choices.get_mut(self.current) else {
            return;
        };
        let options = self.form.columns.len() as isize + 1;
        let position = match choice {
            MappingChoice::Skip => 0,
            MappingChoice::Column(column) => self
                .form
                .columns
                .iter()
                .position(|label| label.column == *column)
                .map_or(0, |index| index as isize + 1),
        };
        let next = (position + step).rem_euclid(options) as usize;
        *choice = match next {
            0 => MappingChoice::Skip,
            index => MappingChoice::Column(self.form.columns[index - 1].column),
        };
    }

    pub fn mapping(&self) -> ColumnMapping {
        let mut mapping = ColumnMapping::new();
        for (category, choice) in self.form.categories.iter().zip(&self.choices) {
            mapping.set(category.clone(), *choice);
        }
        mapping
    }

    fn choice_label(&self, choice: MappingChoice) -> String {
        match choice {
            MappingChoice::Skip => "skip".to_string(),
            MappingChoice::Column(column) => self
                .form
                .columns
                .iter()
                .find(|label| label.column == column)
                .map(|label| format!("{}  {}", label.letter(), label.label))
                .unwrap_or_else(|| payroll_sync::column_number_to_letter(column)),
        }
    }

    fn lines(&self) -> Vec<Line<'static>> {
        let width = self
            .form
            .categories
            .iter()
            .map(|category| category.label().len())
            .max()
            .unwrap_or(0);

        self.form
            .categories
            .iter()
            .zip(&self.choices)
            .enumerate()
            .map(|(index, (category, choice))| {
                let selected = index == self.current;
                let marker = if selected { "> " } else { "  " };
                let style = if selected {
                    Style::new().add_modifier(Modifier::BOLD)
                } else {
                    Style::new()
                };
                Line::from(vec![
                    Span::styled(format!("{marker}{:<width$}", category.label()), style),
                    Span::raw("  ←  "),
                    Span::styled(self.choice_label(*choice), style),
                    Span::raw("  →"),
                ])
            })
            .collect()
    }
}

/// Show the mapping form in the terminal. `None` when the user backs out.
pub fn choose_mapping(form: &MappingForm) -> Result<Option<ColumnMapping>> {
    if form.categories.is_empty() {
        return Ok(Some(ColumnMapping::new()));
    }

    let mut state = DialogState::new(form);
    let mut terminal = ratatui::init();

    // restore the terminal before reporting errors
    let result = run_dialog(&mut terminal, &mut state);

    ratatui::restore();

    result
}

fn run_dialog(
    terminal: &mut ratatui::DefaultTerminal,
    state: &mut DialogState,
) -> Result<Option<ColumnMapping>> {
    loop {
        terminal.draw(|frame| {
            let chunks =
                Layout::vertical([Constraint::Min(3), Constraint::Length(3)]).split(frame.area());

            let title = format!(
                "Map burden categories ({} categories, {} columns)",
                state.form.categories.len(),
                state.form.columns.len()
            );
            let list = Paragraph::new(state.lines()).block(Block::bordered().title(title));
            frame.render_widget(list, chunks[0]);

            let help = Paragraph::new("↑ ↓ select | ← → change column | Enter apply | q cancel")
                .block(Block::bordered());
            frame.render_widget(help, chunks[1]);
        })?;

        if event::poll(Duration::from_millis(100))?
            && let Event::Key(key) = event::read()?
        {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match state.handle_key(key) {
                Some(DialogAction::Submit) => break Ok(Some(state.mapping())),
                Some(DialogAction::Cancel) => break Ok(None),
                None => {}
            }
        }
    }
}

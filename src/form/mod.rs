//! Interactive condition form: pick columns, set a condition per column, watch the match count,
//! then save the result next to the source file.

mod render;

use crate::condition::{Condition, Operator, UpdateRule};
use crate::error::Result;
use crate::io::{save_path, FileOptions};
use crate::pipeline::{Engine, RowCap};
use crate::request::{FilterRequest, UpdateRequest};
use crate::store::OutputKind;
use crate::table::Table;
use crate::FileFormat;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const NO_MATCH_MESSAGE: &str = "No rows match the given filters.";

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum FormMode {
    #[default]
    Filter,
    Update,
}

impl FormMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormMode::Filter => "Filter",
            FormMode::Update => "Update",
        }
    }

    fn output_kind(&self) -> OutputKind {
        match self {
            FormMode::Filter => OutputKind::Filtered,
            FormMode::Update => OutputKind::Updated,
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum FormFocus {
    #[default]
    MaxRows,
    Column,
    Add,
    Conditions,
    Mode,
    Save,
}

impl FormFocus {
    const ORDER: [FormFocus; 6] = [
        FormFocus::MaxRows,
        FormFocus::Column,
        FormFocus::Add,
        FormFocus::Conditions,
        FormFocus::Mode,
        FormFocus::Save,
    ];

    fn next(self) -> Self {
        let idx = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        Self::ORDER[(idx + 1) % Self::ORDER.len()]
    }

    fn prev(self) -> Self {
        let idx = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        Self::ORDER[(idx + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }
}

/// Field of the selected condition row that receives keys.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum RowField {
    #[default]
    Operator,
    Value,
    Replacement,
    Remove,
}

/// One added column with its condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionRow {
    pub column: String,
    pub operator: Operator,
    pub value: String,
    pub replacement: String,
}

impl ConditionRow {
    fn new(column: String) -> Self {
        Self {
            column,
            operator: Operator::NoOp,
            value: String::new(),
            replacement: String::new(),
        }
    }
}

/// Modal dialog drawn over the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    /// Save `count` rows after a yes.
    Confirm { count: usize },
    Message(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
    Exit,
}

/// Operators in the order the selector cycles through them; the first entry is "no condition".
fn operator_cycle() -> Vec<Operator> {
    std::iter::once(Operator::NoOp)
        .chain(Operator::iterator())
        .collect()
}

pub struct Form {
    pub source: PathBuf,
    pub format: FileFormat,
    file_options: FileOptions,
    output_override: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    table: Table,
    engine: Engine,
    pub columns: Vec<String>,
    pub column_idx: usize,
    pub max_rows: String,
    pub rows: Vec<ConditionRow>,
    pub selected_row: usize,
    pub row_field: RowField,
    pub mode: FormMode,
    pub focus: FormFocus,
    pub match_count: usize,
    pub prompt: Option<Prompt>,
    pub status: Option<String>,
}

impl Form {
    pub fn new(
        source: PathBuf,
        format: FileFormat,
        table: Table,
        engine: Engine,
        default_max_rows: Option<usize>,
    ) -> Self {
        let columns = table.header().to_vec();
        let mut form = Self {
            source,
            format,
            file_options: FileOptions::default(),
            output_override: None,
            output_dir: None,
            table,
            engine,
            columns,
            column_idx: 0,
            max_rows: default_max_rows.map(|n| n.to_string()).unwrap_or_default(),
            rows: Vec::new(),
            selected_row: 0,
            row_field: RowField::default(),
            mode: FormMode::default(),
            focus: FormFocus::default(),
            match_count: 0,
            prompt: None,
            status: None,
        };
        form.refresh_count();
        form
    }

    pub fn with_mode(mut self, mode: FormMode) -> Self {
        self.mode = mode;
        self.refresh_count();
        self
    }

    pub fn with_file_options(mut self, options: FileOptions) -> Self {
        self.file_options = options;
        self
    }

    pub fn with_output(mut self, output: Option<PathBuf>) -> Self {
        self.output_override = output;
        self
    }

    /// Write `filtered_`/`updated_` outputs into `dir` instead of next to the source.
    pub fn with_output_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.output_dir = dir;
        self
    }

    /// Explicit output, else a name derived from the source and the current mode.
    pub fn output_path(&self) -> PathBuf {
        if let Some(path) = &self.output_override {
            return path.clone();
        }
        let kind = self.mode.output_kind();
        match &self.output_dir {
            Some(dir) => {
                let name = self
                    .source
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                dir.join(kind.output_name(&name))
            }
            None => kind.output_path_for(&self.source),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn selected_column(&self) -> Option<&str> {
        self.columns.get(self.column_idx).map(String::as_str)
    }

    /// Add the selected column as a condition row. A column can be added once.
    pub fn add_column(&mut self) {
        let Some(column) = self.selected_column().map(str::to_string) else {
            return;
        };
        if self.rows.iter().any(|r| r.column == column) {
            return;
        }
        self.rows.push(ConditionRow::new(column));
        self.selected_row = self.rows.len() - 1;
        self.refresh_count();
    }

    pub fn remove_row(&mut self, idx: usize) {
        if idx < self.rows.len() {
            self.rows.remove(idx);
            self.selected_row = self.selected_row.min(self.rows.len().saturating_sub(1));
            self.row_field = RowField::Operator;
            self.refresh_count();
        }
    }

    /// Step the operator of row `idx` through the selector list.
    pub fn cycle_operator(&mut self, idx: usize, forward: bool) {
        let cycle = operator_cycle();
        if let Some(row) = self.rows.get_mut(idx) {
            let pos = cycle.iter().position(|op| *op == row.operator).unwrap_or(0);
            let next = if forward {
                (pos + 1) % cycle.len()
            } else {
                (pos + cycle.len() - 1) % cycle.len()
            };
            row.operator = cycle[next];
        }
        self.refresh_count();
    }

    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            FormMode::Filter => FormMode::Update,
            FormMode::Update => FormMode::Filter,
        };
        if self.mode == FormMode::Filter && self.row_field == RowField::Replacement {
            self.row_field = RowField::Value;
        }
        self.refresh_count();
    }

    pub fn row_cap(&self) -> Result<RowCap> {
        RowCap::parse(&self.max_rows)
    }

    /// Current rows as a filter request. Values are trimmed like a text box would be.
    pub fn filter_request(&self) -> Result<FilterRequest> {
        Ok(FilterRequest {
            conditions: self
                .rows
                .iter()
                .map(|r| Condition::new(r.column.clone(), r.operator, r.value.trim()))
                .collect(),
            cap: self.row_cap()?,
            filename: None,
        })
    }

    pub fn update_request(&self) -> Result<UpdateRequest> {
        Ok(UpdateRequest {
            rules: self
                .rows
                .iter()
                .map(|r| {
                    UpdateRule::new(
                        r.column.clone(),
                        r.operator,
                        r.value.trim(),
                        r.replacement.clone(),
                    )
                })
                .collect(),
            cap: self.row_cap()?,
            filename: None,
        })
    }

    /// Recompute the live counter. An invalid row cap shows 0.
    ///
    /// Filter mode counts rows that would be kept; update mode counts kept rows that change.
    pub fn refresh_count(&mut self) {
        self.match_count = match self.mode {
            FormMode::Filter => match self.filter_request() {
                Ok(req) => self.engine.count(&self.table, &req.conditions, req.cap),
                Err(_) => 0,
            },
            FormMode::Update => match self.update_request() {
                Ok(req) => {
                    let updated = self.engine.update(&self.table, &req.rules, req.cap);
                    updated
                        .rows()
                        .iter()
                        .zip(self.table.rows())
                        .filter(|(after, before)| after != before)
                        .count()
                }
                Err(_) => 0,
            },
        };
    }

    /// Rows the output file would contain.
    fn result(&self) -> Result<Table> {
        Ok(match self.mode {
            FormMode::Filter => {
                let req = self.filter_request()?;
                self.engine.filter(&self.table, &req.conditions, req.cap)
            }
            FormMode::Update => {
                let req = self.update_request()?;
                self.engine.update(&self.table, &req.rules, req.cap)
            }
        })
    }

    /// Ask for confirmation, or explain why nothing can be saved.
    pub fn request_save(&mut self) {
        self.prompt = Some(match self.result() {
            Ok(table) if table.is_empty() => Prompt::Message(NO_MATCH_MESSAGE.to_string()),
            Ok(table) => Prompt::Confirm {
                count: table.num_rows(),
            },
            Err(e) => Prompt::Message(format!(
                "Please enter a valid positive integer for the row limit, or leave blank for all. ({})",
                e
            )),
        });
    }

    /// Write the result to the output path in the source format.
    pub fn save(&mut self) -> Result<PathBuf> {
        let table = self.result()?;
        let output = self.output_path();
        save_path(&table, &output, self.format, &self.file_options)?;
        info!(output = %output.display(), rows = table.num_rows(), mode = self.mode.as_str(), "form saved");
        Ok(output)
    }

    fn confirm_save(&mut self) {
        self.prompt = match self.save() {
            Ok(path) => {
                self.status = Some(format!("Saved to {}", path.display()));
                Some(Prompt::Message(format!("File saved to:\n{}", path.display())))
            }
            Err(e) => {
                warn!(error = %e, "form save failed");
                Some(Prompt::Message(format!(
                    "An error occurred:\n{}",
                    crate::error_display::user_message(&e, None)
                )))
            }
        };
    }

    fn row_fields(&self) -> &'static [RowField] {
        match self.mode {
            FormMode::Filter => &[RowField::Operator, RowField::Value, RowField::Remove],
            FormMode::Update => &[
                RowField::Operator,
                RowField::Value,
                RowField::Replacement,
                RowField::Remove,
            ],
        }
    }

    fn move_row_field(&mut self, forward: bool) {
        let fields = self.row_fields();
        let pos = fields.iter().position(|f| *f == self.row_field).unwrap_or(0);
        let next = if forward {
            (pos + 1).min(fields.len() - 1)
        } else {
            pos.saturating_sub(1)
        };
        self.row_field = fields[next];
    }

    fn edit_text(text: &mut String, code: KeyCode) -> bool {
        match code {
            KeyCode::Char(c) => {
                text.push(c);
                true
            }
            KeyCode::Backspace => text.pop().is_some(),
            _ => false,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<FormEvent> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('c') | KeyCode::Char('q') => Some(FormEvent::Exit),
                KeyCode::Char('s') => {
                    self.request_save();
                    None
                }
                _ => None,
            };
        }

        if let Some(prompt) = self.prompt.clone() {
            match prompt {
                Prompt::Confirm { .. } => match key.code {
                    KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                        self.confirm_save()
                    }
                    KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => self.prompt = None,
                    _ => {}
                },
                Prompt::Message(_) => self.prompt = None,
            }
            return None;
        }

        match key.code {
            KeyCode::Esc => return Some(FormEvent::Exit),
            KeyCode::Tab => {
                self.focus = self.focus.next();
                return None;
            }
            KeyCode::BackTab => {
                self.focus = self.focus.prev();
                return None;
            }
            _ => {}
        }

        match self.focus {
            FormFocus::MaxRows => {
                if Self::edit_text(&mut self.max_rows, key.code) {
                    self.refresh_count();
                }
            }
            FormFocus::Column => match key.code {
                KeyCode::Left | KeyCode::Up => {
                    self.column_idx = self.column_idx.saturating_sub(1);
                }
                KeyCode::Right | KeyCode::Down => {
                    if self.column_idx + 1 < self.columns.len() {
                        self.column_idx += 1;
                    }
                }
                KeyCode::Enter => self.add_column(),
                _ => {}
            },
            FormFocus::Add => {
                if matches!(key.code, KeyCode::Enter | KeyCode::Char(' ')) {
                    self.add_column();
                }
            }
            FormFocus::Conditions => self.handle_conditions_key(key.code),
            FormFocus::Mode => {
                if matches!(key.code, KeyCode::Enter | KeyCode::Char(' ')) {
                    self.toggle_mode();
                }
            }
            FormFocus::Save => {
                if key.code == KeyCode::Enter {
                    self.request_save();
                }
            }
        }
        None
    }

    fn handle_conditions_key(&mut self, code: KeyCode) {
        if self.rows.is_empty() {
            return;
        }
        let idx = self.selected_row;
        match code {
            KeyCode::Up => self.selected_row = self.selected_row.saturating_sub(1),
            KeyCode::Down => {
                if self.selected_row + 1 < self.rows.len() {
                    self.selected_row += 1;
                }
            }
            KeyCode::Left => self.move_row_field(false),
            KeyCode::Right => self.move_row_field(true),
            _ => match self.row_field {
                RowField::Operator => match code {
                    KeyCode::Enter | KeyCode::Char(' ') => self.cycle_operator(idx, true),
                    KeyCode::Backspace => self.cycle_operator(idx, false),
                    _ => {}
                },
                RowField::Value => {
                    if Self::edit_text(&mut self.rows[idx].value, code) {
                        self.refresh_count();
                    }
                }
                RowField::Replacement => {
                    if Self::edit_text(&mut self.rows[idx].replacement, code) {
                        self.refresh_count();
                    }
                }
                RowField::Remove => {
                    if code == KeyCode::Enter {
                        self.remove_row(idx);
                    }
                }
            },
        }
    }
}

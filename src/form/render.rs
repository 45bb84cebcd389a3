//! Form rendering.

use super::{Form, FormFocus, FormMode, Prompt, RowField};
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Flex, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, BorderType, Borders, Cell, Clear, Paragraph, Row, Table, Widget, Wrap,
};

const BORDER: Color = Color::Cyan;
const ACTIVE: Color = Color::Yellow;
const COUNT: Color = Color::Blue;

fn border_style(active: bool) -> Style {
    if active {
        Style::default().fg(ACTIVE)
    } else {
        Style::default().fg(BORDER)
    }
}

fn boxed<'a>(title: &'a str, active: bool) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title(title)
        .border_style(border_style(active))
}

impl Widget for &Form {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .title(" CSV/Excel Record Limiter ");
        let inner = block.inner(area);
        block.render(area, buf);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(4),
                Constraint::Length(3),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(inner);

        Paragraph::new(Line::from(vec![
            Span::styled("File: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(self.source.display().to_string()),
            Span::raw(format!("  ({} rows)", self.table.num_rows())),
        ]))
        .render(chunks[0], buf);

        Paragraph::new(self.max_rows.as_str())
            .block(boxed(
                "Max rows (leave blank for all)",
                self.focus == FormFocus::MaxRows,
            ))
            .render(chunks[1], buf);

        let select_layout = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
            .split(chunks[2]);
        let column_label = match self.selected_column() {
            Some(col) => format!("< {} >", col),
            None => String::new(),
        };
        Paragraph::new(column_label)
            .block(boxed("Select column", self.focus == FormFocus::Column))
            .render(select_layout[0], buf);
        Paragraph::new("Add")
            .block(boxed("", self.focus == FormFocus::Add))
            .centered()
            .render(select_layout[1], buf);

        render_conditions(self, chunks[3], buf);

        let footer = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[4]);
        Paragraph::new(format!("Mode: {}", self.mode.as_str()))
            .block(boxed("", self.focus == FormFocus::Mode))
            .centered()
            .render(footer[0], buf);
        Paragraph::new("Process")
            .block(boxed("", self.focus == FormFocus::Save))
            .centered()
            .render(footer[1], buf);

        let count_label = match self.mode {
            FormMode::Filter => format!("Matching rows: {}", self.match_count),
            FormMode::Update => format!("Rows changed: {}", self.match_count),
        };
        Paragraph::new(count_label)
            .style(Style::default().fg(COUNT).add_modifier(Modifier::BOLD))
            .centered()
            .render(chunks[5], buf);

        let hint = self.status.clone().unwrap_or_else(|| {
            "Tab/Shift+Tab move  ←/→ choose  Enter select  Ctrl+S save  Esc quit".to_string()
        });
        Paragraph::new(hint)
            .style(Style::default().fg(Color::DarkGray))
            .render(chunks[6], buf);

        if let Some(prompt) = &self.prompt {
            render_prompt(prompt, area, buf);
        }
    }
}

fn render_conditions(form: &Form, area: Rect, buf: &mut Buffer) {
    let active = form.focus == FormFocus::Conditions;
    let update = form.mode == FormMode::Update;

    let cell_style = |row_idx: usize, field: RowField| {
        if active && row_idx == form.selected_row && form.row_field == field {
            Style::default().fg(ACTIVE).add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        }
    };

    let rows: Vec<Row> = form
        .rows
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let mut cells = vec![
                Cell::from(r.column.as_str()),
                Cell::from(r.operator.label()).style(cell_style(i, RowField::Operator)),
                Cell::from(r.value.as_str()).style(cell_style(i, RowField::Value)),
            ];
            if update {
                cells.push(
                    Cell::from(r.replacement.as_str()).style(cell_style(i, RowField::Replacement)),
                );
            }
            cells.push(Cell::from("Remove").style(cell_style(i, RowField::Remove)));
            Row::new(cells)
        })
        .collect();

    let mut header = vec!["Column", "Condition", "Value"];
    let mut widths = vec![
        Constraint::Percentage(25),
        Constraint::Length(18),
        Constraint::Percentage(25),
    ];
    if update {
        header.push("New value");
        widths.push(Constraint::Percentage(25));
    }
    header.push("");
    widths.push(Constraint::Length(8));

    Table::new(rows, widths)
        .header(Row::new(header).style(Style::default().add_modifier(Modifier::BOLD)))
        .block(boxed("Conditions", active))
        .render(area, buf);
}

fn render_prompt(prompt: &Prompt, area: Rect, buf: &mut Buffer) {
    let (title, text) = match prompt {
        Prompt::Confirm { count } => (
            " Confirm Save ",
            format!(
                "{} row(s) match your filters and will be saved.\n\nDo you want to continue? (y/n)",
                count
            ),
        ),
        Prompt::Message(msg) => (" reclimit ", format!("{}\n\nPress any key", msg)),
    };

    let [popup] = Layout::horizontal([Constraint::Percentage(60)])
        .flex(Flex::Center)
        .areas(area);
    let [popup] = Layout::vertical([Constraint::Length(8)])
        .flex(Flex::Center)
        .areas(popup);

    Clear.render(popup, buf);
    Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .block(boxed(title, true))
        .centered()
        .render(popup, buf);
}

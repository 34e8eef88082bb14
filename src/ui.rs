use ratatui::{
    Frame,
    layout::{Constraint, Layout, Position, Rect},
    style::{Style, Stylize},
    symbols::border,
    text::{Line, Span, Text},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, Wrap},
};

use crate::domain::{APP_TITLE, FOOTER, INSTRUCTIONS};
use crate::model::{MessageLevel, Model, UIData};

pub const CMDLINE_HEIGH: usize = 1;
pub const FOOTER_HEIGHT: usize = 1;
pub const INSTRUCTIONS_HEIGHT: usize = 6;
pub const LIST_HEADER_HEIGHT: usize = 1;
pub const BODY_MIN_HEIGHT: usize = 5;

const OPEN_PROMPT: &str = "Open CSV: ";
const POPUP_WIDTH: u16 = 52;

#[derive(Debug, Default)]
pub struct TableUI {}

impl TableUI {
    pub fn new() -> Self {
        Self {}
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();

        let hints = Line::from(vec![
            " Open ".into(),
            "<O>".blue().bold(),
            " Select ".into(),
            "<Space>".blue().bold(),
            " Charts ".into(),
            "<G>".blue().bold(),
            " Stats ".into(),
            "<S>".blue().bold(),
            " Help ".into(),
            "<?>".blue().bold(),
            " Quit ".into(),
            "<Q> ".blue().bold(),
        ]);
        let block = Block::bordered()
            .title(Line::from(APP_TITLE.bold()).centered())
            .title_bottom(hints.centered())
            .border_set(border::THICK);
        let inner = block.inner(frame.area());
        frame.render_widget(block, frame.area());

        let [header, body, cmdline, footer] = Layout::vertical([
            Constraint::Length(uidata.layout.header_height as u16),
            Constraint::Min(BODY_MIN_HEIGHT as u16),
            Constraint::Length(CMDLINE_HEIGH as u16),
            Constraint::Length(FOOTER_HEIGHT as u16),
        ])
        .areas(inner);

        self.draw_header(uidata, frame, header);

        let [columns, reports] =
            Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)])
                .areas(body);
        self.draw_columns(uidata, frame, columns);
        self.draw_reports(uidata, frame, reports);
        self.draw_cmdline(uidata, frame, cmdline);

        frame.render_widget(Paragraph::new(FOOTER.dim()).centered(), footer);

        if uidata.show_popup {
            self.draw_popup(uidata, frame);
        }
    }

    fn draw_header(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let mut lines: Vec<Line> = uidata
            .banner
            .lines()
            .map(|l| Line::from(l.to_string().yellow()))
            .collect();
        lines.push(Line::from("Instructions:".bold()));
        lines.extend(INSTRUCTIONS.lines().map(|l| Line::from(l.to_string())));
        frame.render_widget(
            Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false }),
            area,
        );
    }

    fn draw_columns(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let begin = uidata.offset_row;
        let end = (begin + uidata.layout.list_height).min(uidata.columns.len());
        let rows = uidata.columns[begin.min(end)..end]
            .iter()
            .enumerate()
            .map(|(idx, c)| {
                let mark = if c.selected.is_some() { "[x]" } else { "[ ]" };
                let order = c.selected.map(|p| format!("#{p}")).unwrap_or_default();
                let kind = if c.numeric {
                    Span::from("numeric").green()
                } else {
                    Span::from("text").magenta()
                };
                let row = Row::new(vec![
                    Cell::from(mark),
                    Cell::from(order),
                    Cell::from(c.name.clone()),
                    Cell::from(c.dtype.clone()),
                    Cell::from(kind),
                ]);
                if begin + idx == uidata.selected_row {
                    row.style(Style::new().reversed())
                } else {
                    row
                }
            });

        let title = format!(" {} ({} rows) ", uidata.name, uidata.nrows);
        let table = Table::new(
            rows,
            [
                Constraint::Length(3),
                Constraint::Length(4),
                Constraint::Fill(1),
                Constraint::Length(10),
                Constraint::Length(8),
            ],
        )
        .header(Row::new(vec!["Sel", "#", "Column", "Type", "Kind"]).bold())
        .block(Block::bordered().title(Line::from(title.bold())));
        frame.render_widget(table, area);
    }

    fn draw_reports(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let mut lines = Vec::new();
        for report in uidata.reports.iter() {
            let state = if report.ready {
                report.state.clone().green()
            } else {
                report.state.clone().dim()
            };
            lines.push(Line::from(vec![
                report.file_name.bold(),
                ": ".into(),
                state,
            ]));
        }

        let mut selection: Vec<_> = uidata
            .columns
            .iter()
            .filter_map(|c| c.selected.map(|p| (p, c.name.as_str())))
            .collect();
        selection.sort_unstable();
        lines.push(Line::from(""));
        lines.push(Line::from("Selection:".bold()));
        if selection.is_empty() {
            lines.push(Line::from("  (none)".dim()));
        }
        for (pos, name) in selection {
            lines.push(Line::from(format!("  {pos}. {name}")));
        }

        frame.render_widget(
            Paragraph::new(Text::from(lines))
                .wrap(Wrap { trim: true })
                .block(Block::bordered().title(" Reports ".bold())),
            area,
        );
    }

    fn draw_cmdline(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        if uidata.active_cmdinput {
            let line = Line::from(vec![
                OPEN_PROMPT.bold(),
                uidata.cmdinput.input.clone().into(),
            ]);
            frame.render_widget(Paragraph::new(line), area);
            let x = area.x + (OPEN_PROMPT.len() + uidata.cmdinput.curser_pos) as u16;
            frame.set_cursor_position(Position::new(x.min(area.right()), area.y));
        } else {
            let message = uidata.status_message.clone();
            let span: Span = match uidata.status_level {
                MessageLevel::Info => Span::from(message),
                MessageLevel::Warning => message.yellow(),
                MessageLevel::Error => message.red().bold(),
            };
            frame.render_widget(Paragraph::new(Line::from(span)), area);
        }
    }

    fn draw_popup(&self, uidata: &UIData, frame: &mut Frame) {
        let area = frame.area();
        let height = (uidata.popup_message.lines().count() + 2) as u16;
        let width = POPUP_WIDTH.min(area.width);
        let popup = Rect::new(
            area.x + area.width.saturating_sub(width) / 2,
            area.y + area.height.saturating_sub(height) / 2,
            width,
            height.min(area.height),
        );
        frame.render_widget(Clear, popup);
        frame.render_widget(
            Paragraph::new(uidata.popup_message.as_str()).block(
                Block::bordered()
                    .title(" Help ".bold())
                    .title_bottom(Line::from(" <Esc> ".blue().bold()).centered())
                    .border_set(border::ROUNDED),
            ),
            popup,
        );
    }
}

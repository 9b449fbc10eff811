use std::time::Duration;

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table, TableState},
};

use crate::domain::Theme;
use crate::model::{Model, Modus, UIData};
use crate::table::SortDirection;

const STATUS_MESSAGE_TIMEOUT: Duration = Duration::from_secs(5);
const COLUMN_PANEL_WIDTH: u16 = 32;
const ROW_NUMBER_WIDTH: u16 = 5;

struct Palette {
    fg: Color,
    bg: Color,
    accent: Color,
    muted: Color,
    selected_fg: Color,
    selected_bg: Color,
    editing_bg: Color,
    invalid: Color,
}

impl Palette {
    fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Palette {
                fg: Color::White,
                bg: Color::Black,
                accent: Color::Cyan,
                muted: Color::DarkGray,
                selected_fg: Color::Black,
                selected_bg: Color::Cyan,
                editing_bg: Color::Rgb(40, 40, 70),
                invalid: Color::Red,
            },
            Theme::Light => Palette {
                fg: Color::Black,
                bg: Color::White,
                accent: Color::Blue,
                muted: Color::Gray,
                selected_fg: Color::White,
                selected_bg: Color::Blue,
                editing_bg: Color::Rgb(220, 225, 250),
                invalid: Color::Red,
            },
        }
    }

    fn base(&self) -> Style {
        Style::default().fg(self.fg).bg(self.bg)
    }
}

#[derive(Default)]
pub struct TableUI {}

impl TableUI {
    pub fn new() -> Self {
        Self {}
    }

    pub fn draw(&self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let palette = Palette::for_theme(uidata.theme);
        let area = frame.area();
        frame.render_widget(Block::default().style(palette.base()), area);

        let [header_area, body_area, footer_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(2),
        ])
        .areas(area);

        render_header(frame, header_area, uidata, &palette);
        if uidata.show_columns {
            let [table_area, columns_area] =
                Layout::horizontal([Constraint::Min(10), Constraint::Length(COLUMN_PANEL_WIDTH)])
                    .areas(body_area);
            render_table(frame, table_area, uidata, &palette, model.modus());
            render_columns(frame, columns_area, uidata, &palette);
        } else {
            render_table(frame, body_area, uidata, &palette, model.modus());
        }
        render_footer(frame, footer_area, uidata, &palette);

        if uidata.popup.is_some() {
            render_popup(frame, area, uidata, &palette);
        }
    }
}

fn render_header(frame: &mut Frame, area: Rect, uidata: &UIData, palette: &Palette) {
    let mut spans = vec![Span::styled(" tabman ", Style::default().fg(palette.accent).bold())];
    spans.push(Span::raw(format!(
        " {} of {} rows ",
        uidata.total_rows, uidata.all_rows
    )));
    if !uidata.search.is_empty() {
        spans.push(Span::styled(
            format!(" search: \"{}\" ", uidata.search),
            Style::default().fg(palette.accent),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn sort_indicator(sort: Option<SortDirection>) -> &'static str {
    match sort {
        Some(SortDirection::Ascending) => " ▲",
        Some(SortDirection::Descending) => " ▼",
        None => "",
    }
}

fn render_table(frame: &mut Frame, area: Rect, uidata: &UIData, palette: &Palette, modus: Modus) {
    let page_info = if uidata.page_count == 0 {
        " no rows ".to_string()
    } else {
        format!(
            " page {}/{}, {} per page ",
            uidata.page + 1,
            uidata.page_count,
            uidata.rows_per_page
        )
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if modus == Modus::COLUMNS {
            palette.muted
        } else {
            palette.accent
        }))
        .title_bottom(Line::from(page_info).right_aligned());

    let header = Row::new(
        std::iter::once(Cell::from("#")).chain(uidata.headers.iter().enumerate().map(|(idx, h)| {
            let text = format!("{}{}", h.label, sort_indicator(h.sort));
            let style = if idx == uidata.selected_column {
                Style::default().fg(palette.accent).add_modifier(Modifier::UNDERLINED)
            } else {
                Style::default().fg(palette.accent)
            };
            Cell::from(text).style(style)
        })),
    )
    .style(Style::default().bold());

    let rows = uidata.rows.iter().enumerate().map(|(row_idx, values)| {
        let number = Cell::from((uidata.first_row_number + row_idx).to_string())
            .style(Style::default().fg(palette.muted));
        if uidata.editing_row == Some(row_idx) {
            let cells = uidata.edit_fields.iter().enumerate().map(|(idx, field)| {
                let mut style = Style::default().bg(palette.editing_bg);
                if !field.valid {
                    style = style.fg(palette.invalid).add_modifier(Modifier::CROSSED_OUT);
                }
                if idx == uidata.selected_field {
                    style = style.add_modifier(Modifier::REVERSED);
                }
                Cell::from(field.value.clone()).style(style)
            });
            Row::new(std::iter::once(number).chain(cells))
        } else {
            let cells = values.iter().enumerate().map(|(col_idx, value)| {
                let cell = Cell::from(value.clone());
                if row_idx == uidata.selected_row && col_idx == uidata.selected_column {
                    cell.style(Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED))
                } else {
                    cell
                }
            });
            Row::new(std::iter::once(number).chain(cells))
        }
    });

    let widths = std::iter::once(Constraint::Length(ROW_NUMBER_WIDTH))
        .chain(uidata.headers.iter().map(|_| Constraint::Fill(1)));

    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .row_highlight_style(
            Style::default()
                .fg(palette.selected_fg)
                .bg(palette.selected_bg),
        );

    let mut state = TableState::default();
    if uidata.editing_row.is_none() && !uidata.rows.is_empty() {
        state.select(Some(uidata.selected_row));
    }
    frame.render_stateful_widget(table, area, &mut state);
}

fn render_columns(frame: &mut Frame, area: Rect, uidata: &UIData, palette: &Palette) {
    let items: Vec<ListItem> = uidata
        .columns
        .iter()
        .map(|c| {
            let mark = if c.visible { "[x]" } else { "[ ]" };
            ListItem::new(format!("{mark} {} ({})", c.label, c.id))
        })
        .collect();
    let list = List::new(items)
        .block(
            Block::default()
                .title(" Columns ")
                .title_style(Style::default().fg(palette.accent).bold())
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.accent)),
        )
        .highlight_style(
            Style::default()
                .fg(palette.selected_fg)
                .bg(palette.selected_bg),
        );
    let mut state = ListState::default();
    state.select(Some(uidata.selected_column_item));
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_footer(frame: &mut Frame, area: Rect, uidata: &UIData, palette: &Palette) {
    let [status_area, cmd_area] =
        Layout::vertical([Constraint::Length(1), Constraint::Length(1)]).areas(area);

    let status = if uidata.last_status_message_update.elapsed() < STATUS_MESSAGE_TIMEOUT {
        Paragraph::new(uidata.status_message.as_str()).style(Style::default().fg(palette.fg))
    } else {
        Paragraph::new("?: help | /: search | e: edit | c: columns | i/x: import/export | q: quit")
            .style(Style::default().fg(palette.muted))
    };
    frame.render_widget(status, status_area);

    if uidata.active_cmdinput
        && let Some(mode) = uidata.cmd_mode
    {
        let prompt = mode.prompt();
        let line = Line::from(vec![
            Span::styled(prompt, Style::default().fg(palette.accent)),
            Span::raw(uidata.cmdinput.input.as_str()),
        ]);
        frame.render_widget(Paragraph::new(line), cmd_area);
        let x = cmd_area.x + (prompt.chars().count() + uidata.cmdinput.cursor_pos) as u16;
        frame.set_cursor_position(Position::new(
            x.min(cmd_area.right().saturating_sub(1)),
            cmd_area.y,
        ));
    }
}

fn render_popup(frame: &mut Frame, area: Rect, uidata: &UIData, palette: &Palette) {
    let Some(popup) = &uidata.popup else {
        return;
    };
    let lines = u16::try_from(popup.message.lines().count()).unwrap_or(u16::MAX);
    let width = (area.width * 3 / 4).max(20).min(area.width);
    let height = lines.saturating_add(2).min(area.height);
    let shown = height.saturating_sub(2);
    let popup_area = Rect::new(
        area.x + area.width.saturating_sub(width) / 2,
        area.y + area.height.saturating_sub(height) / 2,
        width,
        height,
    );

    let mut block = Block::default()
        .title(format!(" {} ", popup.title))
        .title_style(Style::default().fg(palette.accent).bold())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent));
    // Lines are not wrapped so the scroll offset counts message lines.
    if shown < lines {
        let first = popup.scroll.min(lines - 1);
        let last = first.saturating_add(shown).min(lines);
        block = block.title_bottom(
            Line::from(format!(" lines {}-{} of {lines}, up/down to scroll ", first + 1, last))
                .right_aligned(),
        );
    }

    frame.render_widget(Clear, popup_area);
    let paragraph = Paragraph::new(popup.message.as_str())
        .style(palette.base())
        .alignment(Alignment::Left)
        .scroll((popup.scroll, 0))
        .block(block);
    frame.render_widget(paragraph, popup_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{HELP_TEXT, Message, TMConfig};
    use ratatui::{Terminal, backend::TestBackend};

    fn render(model: &Model) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        let ui = TableUI::new();
        terminal.draw(|f| ui.draw(model, f)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|line| line.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<String>>()
            .join("\n")
    }

    #[test]
    fn draws_headers_rows_and_page_info() {
        let model = Model::init(&TMConfig::default());
        let screen = render(&model);
        assert!(screen.contains("Name"));
        assert!(screen.contains("Alice Williams"));
        assert!(screen.contains("page 1/1, 10 per page"));
        assert!(screen.contains("5 of 5 rows"));
    }

    #[test]
    fn draws_sort_marker_and_popup() {
        let mut model = Model::init(&TMConfig::default());
        model.update(Some(Message::Sort)).unwrap();
        assert!(render(&model).contains("Name ▲"));

        model.update(Some(Message::Help)).unwrap();
        assert!(render(&model).contains(" Help "));
    }

    #[test]
    fn long_popup_scrolls() {
        let mut model = Model::init(&TMConfig::default());
        model.update(Some(Message::Help)).unwrap();
        let total = HELP_TEXT.lines().count();
        let screen = render(&model);
        assert!(screen.contains(&format!("lines 1-18 of {total}")));
        assert!(screen.contains("arrows / hjkl"));

        model.update(Some(Message::MoveDown)).unwrap();
        model.update(Some(Message::MoveDown)).unwrap();
        let screen = render(&model);
        assert!(screen.contains(&format!("lines 3-20 of {total}")));
        assert!(!screen.contains("arrows / hjkl"));
    }

    #[test]
    fn draws_column_manager() {
        let mut model = Model::init(&TMConfig::default());
        model.update(Some(Message::ManageColumns)).unwrap();
        let screen = render(&model);
        assert!(screen.contains("Columns"));
        assert!(screen.contains("[x] Email (email)"));
    }
}

use super::app::{App, Mode};
use super::form::Field;
use chrono::Local;
use patientdb::facade::HandleState;
use patientdb::registry::age_from_input;
use patientdb::result::TableView;
use patientdb::view::NotificationKind;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table, TableState,
        Tabs, Wrap,
    },
};

const MAX_COLUMN_WIDTH: usize = 30;

pub fn draw(f: &mut Frame, app: &App) {
    match app.handle_state() {
        HandleState::Ready => draw_main(f, app),
        state => draw_status(f, &state),
    }
}

/// Blocking screen shown while the database is not usable.
fn draw_status(f: &mut Frame, state: &HandleState) {
    let (title, lines, color) = match state {
        HandleState::Failed(message) => (
            " Database unavailable ",
            vec![
                Line::from(format!("The database failed to initialize: {}", message)),
                Line::from(""),
                Line::from("Press 'r' to retry or 'Esc' to quit."),
            ],
            Color::Red,
        ),
        HandleState::Disposed => (
            " Database closed ",
            vec![Line::from("The database has been closed. Press 'Esc' to quit.")],
            Color::DarkGray,
        ),
        _ => (
            " Loading ",
            vec![Line::from("Opening the patient database...")],
            Color::Cyan,
        ),
    };

    let area = centered(f.area(), 70, 7);
    f.render_widget(Clear, area);
    let panel = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(color))
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(panel, area);
}

fn draw_main(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tabs
            Constraint::Min(5),    // Records and editor
            Constraint::Length(1), // Key help
        ])
        .split(f.area());

    draw_tabs(f, app, chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(chunks[1]);
    draw_records(f, app, body[0]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(5)])
        .split(body[1]);
    draw_notification(f, app, right[0]);

    match app.mode {
        Mode::Console => {
            f.render_widget(&app.textarea, right[1]);
            draw_suggestions(f, app, right[1]);
        }
        Mode::Form => draw_form(f, app, right[1]),
    }

    draw_help(f, app, chunks[2]);
}

fn draw_tabs(f: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<String> = app.tabs.iter().map(|t| t.title.clone()).collect();
    let tabs = Tabs::new(titles)
        .select(app.active)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Patient Registration System "),
        )
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );
    f.render_widget(tabs, area);
}

fn draw_records(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().borders(Borders::ALL);
    let Some(tab) = app.active_tab() else {
        f.render_widget(block.title(" Records "), area);
        return;
    };

    let view = tab
        .session
        .records()
        .map(TableView::from_record_set)
        .unwrap_or_default();

    if view.headers.is_empty() {
        let empty = Paragraph::new("No data to display").block(block.title(" Records "));
        f.render_widget(empty, area);
        return;
    }

    let widths: Vec<Constraint> = view
        .column_widths()
        .into_iter()
        .map(|w| Constraint::Length(w.min(MAX_COLUMN_WIDTH) as u16 + 1))
        .collect();

    let header = Row::new(view.headers.iter().map(|h| Cell::from(h.clone())))
        .style(Style::default().add_modifier(Modifier::BOLD));
    let rows = view
        .rows
        .iter()
        .map(|row| Row::new(row.iter().map(|c| Cell::from(c.clone()))));

    let table = Table::new(rows, widths)
        .header(header)
        .block(block.title(format!(" Records ({}) ", view.rows.len())))
        .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol(">> ");

    let mut state = TableState::default().with_selected(tab.selected);
    f.render_stateful_widget(table, area, &mut state);
}

fn draw_notification(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = Vec::new();

    if let Some(tab) = app.active_tab() {
        let view = tab.session.view();
        if app.busy || view.is_loading() {
            spans.push(Span::styled("Working... ", Style::default().fg(Color::Yellow)));
        }
        if let Some(notification) = view.notification() {
            let color = match notification.kind {
                NotificationKind::Success => Color::Green,
                NotificationKind::Error => Color::Red,
            };
            spans.push(Span::styled(
                notification.message.clone(),
                Style::default().fg(color),
            ));
        }
    }

    let status = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title(" Status "));
    f.render_widget(status, area);
}

fn draw_form(f: &mut Frame, app: &App, area: Rect) {
    let label_style = Style::default();
    let focus_style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);
    let hint_style = Style::default().fg(Color::DarkGray);

    let mut lines: Vec<Line> = Vec::new();
    for field in Field::ALL {
        let style = if field == app.form.focus { focus_style } else { label_style };

        if field == Field::Submit {
            let label = if app.busy { "[ Registering... ]" } else { "[ Register patient ]" };
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(label, style)));
            continue;
        }

        let hint = match field {
            Field::Gender | Field::BloodGroup => "  (Left/Right)",
            Field::DateOfBirth => "  (YYYY-MM-DD)",
            _ => "",
        };
        lines.push(Line::from(vec![
            Span::styled(format!("{:<20}", field.label()), style),
            Span::raw(app.form.display(field)),
            Span::styled(hint, hint_style),
        ]));

        if field == Field::DateOfBirth {
            if let Some(age) = age_from_input(&app.form.form.date_of_birth, Local::now().date_naive()) {
                lines.push(Line::from(Span::styled(
                    format!("{:<20}{}", "  Age", age),
                    hint_style,
                )));
            }
        }
    }

    let form = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Register Patient "),
    );
    f.render_widget(form, area);
}

fn draw_help(f: &mut Frame, app: &App, area: Rect) {
    let text = match app.mode {
        Mode::Console => {
            "Ctrl+E run | Tab complete | F2 form | F3/F4 tabs | Ctrl+W close | PgUp/PgDn select | Ctrl+D delete | F6 load selected | F5 reload | Esc quit"
        }
        Mode::Form => {
            "Enter/Ctrl+E register | Tab/Up/Down move | Left/Right choose | F2 console | F6 load selected | Ctrl+D delete | Esc quit"
        }
    };
    f.render_widget(
        Paragraph::new(text).style(Style::default().fg(Color::DarkGray)),
        area,
    );
}

fn draw_suggestions(f: &mut Frame, app: &App, textarea_rect: Rect) {
    if !app.popup_open || app.suggestions.is_empty() {
        return;
    }
    let (row, col) = app.textarea.cursor();

    // Below the cursor line, inside the editor border
    let popup_x = textarea_rect.x + (col as u16) + 1;
    let popup_y = textarea_rect.y + (row as u16) + 2;

    let screen = f.area();
    let width = 30.min(screen.width);
    let height = (app.suggestions.len() as u16 + 2).min(7).min(screen.height);

    let area = Rect::new(
        popup_x.min(screen.width.saturating_sub(width)),
        popup_y.min(screen.height.saturating_sub(height)),
        width,
        height,
    );

    f.render_widget(Clear, area);

    let items: Vec<ListItem> = app
        .suggestions
        .iter()
        .map(|s| ListItem::new(s.as_str()))
        .collect();

    let mut state = ListState::default();
    state.select(Some(app.suggestion_index));

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Suggestions"))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol(">> ");

    f.render_stateful_widget(list, area, &mut state);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

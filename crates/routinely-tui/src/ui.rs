use ratatui::{
    Frame,
    layout::{Constraint, Layout, Margin, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, Clear, List, ListItem, Paragraph, Scrollbar, ScrollbarOrientation,
        ScrollbarState, Wrap,
    },
};
use routinely_core::ChatRole;
use crate::app::{App, FocusPane, HitTarget, InputMode};
use crate::markdown::render_markdown;

const CARD_MIN_WIDTH: u16 = 24;
const CARD_HEIGHT: u16 = 4;
const TOOLTIP_WIDTH: u16 = 40;
const TOOLTIP_MAX_HEIGHT: u16 = 8;

pub const EMPTY_SELECTION_TEXT: &str = "No products selected";

fn border_style(focused: bool) -> Style {
    Style::default().fg(if focused { Color::Cyan } else { Color::DarkGray })
}

fn highlight_style() -> Style {
    Style::default()
        .bg(Color::Blue)
        .fg(Color::White)
        .add_modifier(Modifier::BOLD)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    app.regions.clear();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    // Sidebar, product grid, chat
    let [side_area, grid_column, chat_column] = Layout::horizontal([
        Constraint::Length(28),
        Constraint::Min(30),
        Constraint::Percentage(35),
    ])
    .areas(body_area);

    let [categories_area, selection_area, button_area] = Layout::vertical([
        Constraint::Percentage(45),
        Constraint::Min(4),
        Constraint::Length(3),
    ])
    .areas(side_area);

    let [search_area, grid_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(grid_column);

    render_categories(app, frame, categories_area);
    render_selection(app, frame, selection_area);
    render_generate_button(app, frame, button_area);
    render_search(app, frame, search_area);
    render_chat(app, frame, chat_column);
    // Grid last so its tooltip can overlap neighbouring panes
    render_grid(app, frame, grid_area);

    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let selected = app.store.selection().len();
    let selection_indicator = if selected > 0 {
        format!(" [{} selected]", selected)
    } else {
        String::new()
    };

    let title = Line::from(vec![
        Span::styled(" Routinely ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(selection_indicator, Style::default().fg(Color::Green)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.input_mode {
        InputMode::Normal => " BROWSE ",
        InputMode::Editing => " INPUT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints = match (app.focus, app.input_mode) {
        (FocusPane::Search, InputMode::Editing) => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" done ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" stop typing ", label_style),
        ],
        (FocusPane::Chat, InputMode::Editing) => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" stop typing ", label_style),
        ],
        (FocusPane::Categories, _) => vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" category ", label_style),
        ],
        (FocusPane::Products, _) => vec![
            Span::styled(" hjkl ", key_style),
            Span::styled(" move ", label_style),
            Span::styled(" Space ", key_style),
            Span::styled(" select ", label_style),
        ],
        (FocusPane::Selection, _) => vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" nav ", label_style),
            Span::styled(" d ", key_style),
            Span::styled(" remove ", label_style),
            Span::styled(" D ", key_style),
            Span::styled(" clear all ", label_style),
        ],
        (FocusPane::Chat, _) => vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" Enter ", key_style),
            Span::styled(" type ", label_style),
        ],
        (FocusPane::Search, _) => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" type ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" clear ", label_style),
        ],
    };

    if app.input_mode == InputMode::Normal {
        hints.extend(vec![
            Span::styled(" Tab ", key_style),
            Span::styled(" focus ", label_style),
            Span::styled(" / ", key_style),
            Span::styled(" search ", label_style),
            Span::styled(" g ", key_style),
            Span::styled(" routine ", label_style),
            Span::styled(" i ", key_style),
            Span::styled(" ask ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ]);
    }

    if let Some(status) = &app.status {
        hints.push(Span::styled(
            format!("  {}", status),
            Style::default().bg(Color::Black).fg(Color::Yellow),
        ));
    }

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_categories(app: &mut App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app.focus == FocusPane::Categories))
        .title(" Categories ");
    let inner = block.inner(area);

    let labels = app.category_labels();
    let items: Vec<ListItem> = labels
        .iter()
        .map(|c| ListItem::new(format!(" {} ", c)))
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(highlight_style())
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut app.category_state);

    let offset = app.category_state.offset();
    for row in 0..inner.height as usize {
        let idx = offset + row;
        if idx >= labels.len() {
            break;
        }
        let rect = Rect::new(inner.x, inner.y + row as u16, inner.width, 1);
        app.regions.push((rect, HitTarget::Category(idx)));
    }
}

fn render_search(app: &mut App, frame: &mut Frame, area: Rect) {
    let editing = app.focus == FocusPane::Search && app.input_mode == InputMode::Editing;
    let border_color = if editing {
        Color::Yellow
    } else if app.focus == FocusPane::Search {
        Color::Cyan
    } else {
        Color::DarkGray
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Search products ");

    let input = if app.search_input.is_empty() && !editing {
        Paragraph::new("Press / to search names and descriptions")
            .style(Style::default().fg(Color::DarkGray))
    } else {
        Paragraph::new(app.search_input.as_str()).style(Style::default().fg(Color::Cyan))
    };

    frame.render_widget(input.block(input_block), area);
    app.regions.push((area, HitTarget::SearchBox));

    // Show cursor when editing
    if editing {
        let cursor_x = app.search_input.chars().count() as u16;
        frame.set_cursor_position((
            (area.x + cursor_x + 1).min(area.right().saturating_sub(2)),
            area.y + 1,
        ));
    }
}

fn render_grid(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Products;
    let title = match app.selected_category() {
        "" => format!(" Products ({}) ", app.visible_products.len()),
        category => format!(" {} ({}) ", category, app.visible_products.len()),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(focused))
        .title(title);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if app.visible_products.is_empty() {
        let message = if app.store.catalog().is_empty() {
            "No products loaded"
        } else {
            "No products match your filters"
        };
        let placeholder = Paragraph::new(message).style(Style::default().fg(Color::DarkGray));
        frame.render_widget(placeholder, inner);
        return;
    }

    let columns = (inner.width / CARD_MIN_WIDTH).max(1);
    let card_width = inner.width / columns;
    let rows = (inner.height / CARD_HEIGHT).max(1);
    app.grid_columns = columns as usize;
    app.grid_rows = rows as usize;
    app.scroll_to_cursor();

    let first = app.product_scroll * app.grid_columns;
    let last = (first + app.grid_columns * app.grid_rows).min(app.visible_products.len());
    let mut tooltip_anchor = None;
    let tooltip_name = app.tooltip.visible().cloned();

    for idx in first..last {
        let product = &app.visible_products[idx];
        let slot = idx - first;
        let rect = Rect::new(
            inner.x + (slot % app.grid_columns) as u16 * card_width,
            inner.y + (slot / app.grid_columns) as u16 * CARD_HEIGHT,
            card_width,
            CARD_HEIGHT,
        )
        .intersection(inner);

        let is_cursor = focused && idx == app.product_cursor;
        let is_selected = app.store.is_selected(&product.name);

        let border = if is_cursor {
            Style::default().fg(Color::Cyan).bold()
        } else if is_selected {
            Style::default().fg(Color::Green)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let mut card = Block::default().borders(Borders::ALL).border_style(border);
        if is_selected {
            card = card.title(Span::styled(" ✓ ", Style::default().fg(Color::Green).bold()));
        }

        let name_style = if is_selected {
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
        } else {
            Style::default().add_modifier(Modifier::BOLD)
        };
        let body = Paragraph::new(vec![
            Line::from(Span::styled(product.name.clone(), name_style)),
            Line::from(Span::styled(product.brand.clone(), Style::default().fg(Color::Gray))),
        ])
        .block(card);
        frame.render_widget(body, rect);

        if tooltip_name.as_deref() == Some(product.name.as_str()) {
            tooltip_anchor = Some(rect);
        }
        app.regions.push((rect, HitTarget::Card(product.name.clone())));
    }

    // Scrollbar when rows overflow
    let total_rows = app.visible_products.len().div_ceil(app.grid_columns);
    if total_rows > app.grid_rows {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("^"))
            .end_symbol(Some("v"));
        let mut scrollbar_state = ScrollbarState::new(total_rows).position(app.product_scroll);
        frame.render_stateful_widget(
            scrollbar,
            area.inner(Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }

    if let Some(anchor) = tooltip_anchor {
        let description = app
            .tooltip_product()
            .map(|p| p.description.clone())
            .unwrap_or_default();
        render_tooltip(app, frame, anchor, &description);
    }
}

/// Description popup below the card, or above it when there is no room
fn render_tooltip(app: &mut App, frame: &mut Frame, anchor: Rect, description: &str) {
    let screen = frame.area();
    let width = TOOLTIP_WIDTH.min(screen.width);
    let text_width = width.saturating_sub(2).max(1) as usize;
    let text_lines = (description.chars().count() / text_width + 1) as u16;
    let height = (text_lines + 2).min(TOOLTIP_MAX_HEIGHT).min(screen.height);

    let x = anchor.x.min(screen.right().saturating_sub(width));
    let y = if anchor.bottom() + height <= screen.bottom() {
        anchor.bottom()
    } else {
        anchor.y.saturating_sub(height)
    };
    let popup = Rect::new(x, y, width, height);

    frame.render_widget(Clear, popup);
    let text = if description.is_empty() { "No description" } else { description };
    let tooltip = Paragraph::new(text)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Magenta)),
        );
    frame.render_widget(tooltip, popup);
    app.regions.push((popup, HitTarget::Tooltip));
}

fn render_selection(app: &mut App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app.focus == FocusPane::Selection))
        .title(format!(" Selected ({}) ", app.store.selection().len()));
    let inner = block.inner(area);

    if app.store.selection().is_empty() {
        let placeholder = Paragraph::new(Span::styled(
            EMPTY_SELECTION_TEXT,
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        ))
        .block(block);
        frame.render_widget(placeholder, area);
        return;
    }

    let names: Vec<String> = app
        .store
        .selection()
        .products()
        .iter()
        .map(|p| p.name.clone())
        .collect();
    let items: Vec<ListItem> = names
        .iter()
        .map(|name| {
            ListItem::new(Line::from(vec![
                Span::styled("× ", Style::default().fg(Color::Red).bold()),
                Span::raw(name.clone()),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(highlight_style());

    frame.render_stateful_widget(list, area, &mut app.selection_state);

    let offset = app.selection_state.offset();
    for row in 0..inner.height as usize {
        let idx = offset + row;
        let Some(name) = names.get(idx) else {
            break;
        };
        let y = inner.y + row as u16;
        app.regions.push((Rect::new(inner.x, y, inner.width, 1), HitTarget::SelectionItem(idx)));
        // The × mark removes, pushed last so it wins the hit-test
        app.regions.push((Rect::new(inner.x, y, 2.min(inner.width), 1), HitTarget::RemoveSelected(name.clone())));
    }
}

fn render_generate_button(app: &mut App, frame: &mut Frame, area: Rect) {
    let enabled = !app.store.selection().is_empty() && !app.is_waiting();
    let style = if enabled {
        Style::default().fg(Color::Black).bg(Color::Magenta).bold()
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let button = Paragraph::new(Line::from(Span::styled(" Generate Routine (g) ", style)).centered())
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Magenta)));
    frame.render_widget(button, area);
    app.regions.push((area, HitTarget::GenerateButton));
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(area);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app.focus == FocusPane::Chat && app.input_mode == InputMode::Normal))
        .title(" Routine Assistant ");

    let chat_text = if app.conversation.is_empty() && !app.is_waiting() {
        Text::from(Span::styled(
            "Select products and press g to generate a routine, or i to ask a question...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for msg in app.conversation.history() {
            match msg.role {
                ChatRole::User => {
                    lines.push(Line::from(Span::styled(
                        "You:",
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    )));
                    // User text is shown literally, never parsed
                    for line in msg.content.lines() {
                        lines.push(Line::from(line.to_string()));
                    }
                    lines.push(Line::default());
                }
                ChatRole::Assistant => {
                    lines.push(Line::from(Span::styled(
                        "AI:",
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    )));
                    lines.extend(render_markdown(&msg.content));
                    lines.push(Line::default());
                }
            }
        }

        if let Some(pending) = &app.pending {
            lines.push(Line::from(Span::styled(
                "AI:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("{}{}", pending.kind.pending_label(), dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, chat_area);
    app.regions.push((chat_area, HitTarget::ChatHistory));

    // Input at the bottom - highlight when editing
    let editing = app.focus == FocusPane::Chat && app.input_mode == InputMode::Editing;
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if editing { Color::Yellow } else { Color::DarkGray }))
        .title(" Ask a follow-up ");

    // Calculate visible portion of input with horizontal scrolling
    let inner_width = input_area.width.saturating_sub(2) as usize;
    let cursor_pos = app.chat_cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app.chat_input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, input_area);
    app.regions.push((input_area, HitTarget::ChatInput));

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((input_area.x + cursor_x + 1, input_area.y + 1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use crossterm::event::{KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
    use ratatui::{backend::TestBackend, Terminal};
    use routinely_core::ChatMessage;
    use crate::app::tests::{test_app, EchoBackend};
    use crate::handler::handle_event;
    use crate::tui::AppEvent;

    fn draw(app: &mut App, terminal: &mut Terminal<TestBackend>) -> String {
        terminal.draw(|frame| render(app, frame)).unwrap();
        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        buffer
            .content
            .chunks(width)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn terminal() -> Terminal<TestBackend> {
        Terminal::new(TestBackend::new(140, 36)).unwrap()
    }

    fn region_of(app: &App, target: &HitTarget) -> Rect {
        app.regions
            .iter()
            .find(|(_, t)| t == target)
            .map(|(rect, _)| *rect)
            .expect("target should be on screen")
    }

    #[tokio::test]
    async fn test_removing_last_selection_restores_placeholder() {
        let (mut app, _) = test_app(Arc::new(EchoBackend));
        let mut terminal = terminal();

        assert!(draw(&mut app, &mut terminal).contains(EMPTY_SELECTION_TEXT));

        app.toggle_product("A");
        assert!(!draw(&mut app, &mut terminal).contains(EMPTY_SELECTION_TEXT));

        let remove = region_of(&app, &HitTarget::RemoveSelected("A".to_string()));
        let click = AppEvent::Mouse(MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: remove.x,
            row: remove.y,
            modifiers: KeyModifiers::NONE,
        });
        handle_event(&mut app, click).await.unwrap();

        assert!(app.store.selection().is_empty());
        assert!(draw(&mut app, &mut terminal).contains(EMPTY_SELECTION_TEXT));
    }

    #[test]
    fn test_selected_cards_are_marked() {
        let (mut app, _) = test_app(Arc::new(EchoBackend));
        let mut terminal = terminal();
        app.toggle_product("B");

        let screen = draw(&mut app, &mut terminal);
        assert!(screen.contains("✓"));
        assert!(screen.contains("[1 selected]"));

        let card = region_of(&app, &HitTarget::Card("B".to_string()));
        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        let top_row: String = buffer.content[card.y as usize * width..(card.y as usize + 1) * width]
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(top_row.contains("✓"));
    }

    #[test]
    fn test_empty_filter_placeholder() {
        let (mut app, _) = test_app(Arc::new(EchoBackend));
        let mut terminal = terminal();
        for c in "zzz".chars() {
            app.search_push(c);
        }
        assert!(draw(&mut app, &mut terminal).contains("No products match your filters"));
    }

    #[test]
    fn test_tooltip_shows_description_after_hover() {
        let (mut app, clock) = test_app(Arc::new(EchoBackend));
        let mut terminal = terminal();
        draw(&mut app, &mut terminal);

        let card = region_of(&app, &HitTarget::Card("C".to_string()));
        app.hover(app.hit_test(card.x + 1, card.y + 1));
        assert!(!draw(&mut app, &mut terminal).contains("Night cream"));

        clock.advance(Duration::from_millis(400));
        app.on_tick();
        assert!(draw(&mut app, &mut terminal).contains("Night cream"));
        assert!(app.regions.iter().any(|(_, t)| *t == HitTarget::Tooltip));
    }

    #[test]
    fn test_chat_renders_user_literal_and_assistant_markdown() {
        let (mut app, _) = test_app(Arc::new(EchoBackend));
        let mut terminal = terminal();
        app.conversation.finish::<String>(
            routinely_core::RequestKind::FollowUp,
            Ok("**Cleanse** twice".to_string()),
        );
        app.conversation.begin_follow_up("use **this**");

        let screen = draw(&mut app, &mut terminal);
        assert!(screen.contains("Cleanse twice"));
        assert!(screen.contains("use **this**"));
        assert_eq!(app.conversation.history()[0], ChatMessage::assistant("**Cleanse** twice"));
    }
}

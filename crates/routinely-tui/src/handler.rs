use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use crate::app::{App, FocusPane, HitTarget, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(width, height) => app.on_resize(width, height),
        AppEvent::Tick => app.on_tick(),
    }
    app.poll_pending().await;
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    app.status = None;

    match key.code {
        KeyCode::Char('q') => {
            app.should_quit = true;
            return;
        }
        KeyCode::Tab => {
            app.set_focus(app.focus.next());
            return;
        }
        KeyCode::BackTab => {
            app.set_focus(app.focus.prev());
            return;
        }
        KeyCode::Char('/') => {
            start_editing(app, FocusPane::Search);
            return;
        }
        KeyCode::Char('i') => {
            start_editing(app, FocusPane::Chat);
            return;
        }
        KeyCode::Char('g') => {
            app.generate_routine();
            return;
        }
        KeyCode::Char('D') => {
            app.clear_selection();
            return;
        }
        _ => {}
    }

    match app.focus {
        FocusPane::Categories => handle_categories(app, key),
        FocusPane::Search => handle_search_normal(app, key),
        FocusPane::Products => handle_products(app, key),
        FocusPane::Selection => handle_selection(app, key),
        FocusPane::Chat => handle_chat_normal(app, key),
    }
}

fn start_editing(app: &mut App, pane: FocusPane) {
    app.set_focus(pane);
    app.input_mode = InputMode::Editing;
}

fn handle_categories(app: &mut App, key: KeyEvent) {
    match key.code {
        // Moving applies the filter right away
        KeyCode::Char('j') | KeyCode::Down => app.category_down(),
        KeyCode::Char('k') | KeyCode::Up => app.category_up(),
        KeyCode::Enter | KeyCode::Char('l') | KeyCode::Right => app.set_focus(FocusPane::Products),
        _ => {}
    }
}

fn handle_search_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.input_mode = InputMode::Editing,
        KeyCode::Esc => app.clear_search(),
        KeyCode::Char('j') | KeyCode::Down => app.set_focus(FocusPane::Products),
        _ => {}
    }
}

fn handle_products(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('h') | KeyCode::Left => app.product_left(),
        KeyCode::Char('l') | KeyCode::Right => app.product_right(),
        KeyCode::Char('k') | KeyCode::Up => app.product_up(),
        KeyCode::Char('j') | KeyCode::Down => app.product_down(),
        KeyCode::Home => app.product_first(),
        KeyCode::End => app.product_last(),
        KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Char('x') => app.toggle_current(),
        KeyCode::Esc => app.tooltip.hide(),
        _ => {}
    }
}

fn handle_selection(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.selection_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.selection_nav_up(),
        KeyCode::Char('d') | KeyCode::Char('x') | KeyCode::Delete | KeyCode::Backspace => {
            app.remove_selected_item()
        }
        _ => {}
    }
}

fn handle_chat_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.chat_scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.chat_scroll_up(1),
        KeyCode::PageDown => app.chat_scroll_down(app.chat_height.max(2) / 2),
        KeyCode::PageUp => app.chat_scroll_up(app.chat_height.max(2) / 2),
        KeyCode::Char('G') => app.scroll_chat_to_bottom(),
        KeyCode::Enter => app.input_mode = InputMode::Editing,
        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match app.focus {
        FocusPane::Search => handle_search_editing(app, key),
        FocusPane::Chat => handle_chat_editing(app, key),
        _ => app.input_mode = InputMode::Normal,
    }
}

fn handle_search_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter | KeyCode::Down => {
            app.input_mode = InputMode::Normal;
            app.set_focus(FocusPane::Products);
        }
        // Filtering is live, as the user types
        KeyCode::Backspace => app.search_pop(),
        KeyCode::Char(c) => app.search_push(c),
        _ => {}
    }
}

fn handle_chat_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            if !app.is_waiting() {
                app.submit_chat();
                app.input_mode = InputMode::Normal;
            }
        }
        KeyCode::Backspace => {
            if app.chat_cursor > 0 {
                app.chat_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
                app.chat_input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.chat_input.chars().count();
            if app.chat_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
                app.chat_input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.chat_cursor = app.chat_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.chat_input.chars().count();
            app.chat_cursor = (app.chat_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.chat_cursor = 0;
        }
        KeyCode::End => {
            app.chat_cursor = app.chat_input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
            app.chat_input.insert(byte_pos, c);
            app.chat_cursor += 1;
        }
        _ => {}
    }
}

/// Every mouse event goes through one hit-test against the regions the
/// last render recorded.
fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let target = app.hit_test(mouse.column, mouse.row);

    match mouse.kind {
        MouseEventKind::Moved => app.hover(target),
        MouseEventKind::Down(MouseButton::Left) => {
            app.hover(target.clone());
            if let Some(target) = target {
                click(app, target);
            }
        }
        MouseEventKind::ScrollDown => match target {
            Some(HitTarget::ChatHistory) => app.chat_scroll_down(3),
            Some(HitTarget::Card(_)) => app.product_down(),
            Some(HitTarget::Category(_)) => app.category_down(),
            Some(HitTarget::SelectionItem(_)) | Some(HitTarget::RemoveSelected(_)) => {
                app.selection_nav_down()
            }
            _ => {}
        },
        MouseEventKind::ScrollUp => match target {
            Some(HitTarget::ChatHistory) => app.chat_scroll_up(3),
            Some(HitTarget::Card(_)) => app.product_up(),
            Some(HitTarget::Category(_)) => app.category_up(),
            Some(HitTarget::SelectionItem(_)) | Some(HitTarget::RemoveSelected(_)) => {
                app.selection_nav_up()
            }
            _ => {}
        },
        _ => {}
    }
}

fn click(app: &mut App, target: HitTarget) {
    app.input_mode = InputMode::Normal;

    match target {
        HitTarget::Category(idx) => {
            app.set_focus(FocusPane::Categories);
            app.select_category(idx);
        }
        HitTarget::SearchBox => start_editing(app, FocusPane::Search),
        HitTarget::Card(name) => {
            if let Some(idx) = app.visible_products.iter().position(|p| p.name == name) {
                app.product_cursor = idx;
            }
            app.toggle_product(&name);
        }
        HitTarget::SelectionItem(idx) => {
            app.set_focus(FocusPane::Selection);
            app.selection_state.select(Some(idx));
        }
        HitTarget::RemoveSelected(name) => app.remove_product(&name),
        HitTarget::GenerateButton => app.generate_routine(),
        HitTarget::ChatHistory => app.set_focus(FocusPane::Chat),
        HitTarget::ChatInput => start_editing(app, FocusPane::Chat),
        // Clicking the description itself does not select the card
        HitTarget::Tooltip => {}
    }
}

use std::sync::Arc;
use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use routinely_core::{
    filter_products, Clock, CompletionBackend, Config, Conversation, FileStore, HoverTooltip,
    PendingRequest, Product, ProductStore, RelayClient, RelayError, RequestKind, SystemClock,
};

/// Ticks per animation frame of the pending-reply ellipsis
const TICKS_PER_FRAME: u8 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Categories,
    Search,
    Products,
    Selection,
    Chat,
}

impl FocusPane {
    pub fn next(self) -> Self {
        match self {
            FocusPane::Categories => FocusPane::Search,
            FocusPane::Search => FocusPane::Products,
            FocusPane::Products => FocusPane::Selection,
            FocusPane::Selection => FocusPane::Chat,
            FocusPane::Chat => FocusPane::Categories,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            FocusPane::Categories => FocusPane::Chat,
            FocusPane::Search => FocusPane::Categories,
            FocusPane::Products => FocusPane::Search,
            FocusPane::Selection => FocusPane::Products,
            FocusPane::Chat => FocusPane::Selection,
        }
    }
}

/// What a screen cell belongs to. Recorded during render and used by the
/// single mouse handler to dispatch clicks and hovers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HitTarget {
    Category(usize),
    SearchBox,
    Card(String),
    SelectionItem(usize),
    RemoveSelected(String),
    GenerateButton,
    ChatHistory,
    ChatInput,
    Tooltip,
}

pub struct PendingReply {
    pub kind: RequestKind,
    task: JoinHandle<Result<String, RelayError>>,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,
    pub status: Option<String>,

    // Catalog and selection
    pub store: ProductStore,
    pub category_state: ListState,
    pub search_input: String,
    pub visible_products: Vec<Product>,
    pub product_cursor: usize,
    pub product_scroll: usize, // first visible grid row
    pub grid_columns: usize,   // updated during render
    pub grid_rows: usize,      // visible rows, updated during render
    pub selection_state: ListState,

    // Chat state
    pub conversation: Conversation,
    pub chat_input: String,
    pub chat_cursor: usize, // cursor position in chat_input, in chars
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub pending: Option<PendingReply>,
    pub backend: Arc<dyn CompletionBackend>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation
    tick_count: u8,

    // Hover
    pub tooltip: HoverTooltip<String>,
    pub hovered: Option<HitTarget>,
    pub clock: Box<dyn Clock>,

    // Regions for mouse hit-testing (rebuilt during render)
    pub regions: Vec<(Rect, HitTarget)>,
}

impl App {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let storage = FileStore::new(config.storage_path()?);
        let mut store = ProductStore::new(Box::new(storage));
        store.restore();
        // A failed load leaves the grid empty; the store already logged it
        store.load(config.catalog_source()).await;

        let backend = Arc::new(RelayClient::new(config.relay_url()));
        info!(relay = config.relay_url(), "app initialised");

        Ok(Self::with_parts(store, backend, Box::new(SystemClock)))
    }

    pub fn with_parts(
        store: ProductStore,
        backend: Arc<dyn CompletionBackend>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let mut category_state = ListState::default();
        category_state.select(Some(0));

        let mut app = Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            focus: FocusPane::Products,
            status: None,

            store,
            category_state,
            search_input: String::new(),
            visible_products: Vec::new(),
            product_cursor: 0,
            product_scroll: 0,
            grid_columns: 1,
            grid_rows: 1,
            selection_state: ListState::default(),

            conversation: Conversation::new(),
            chat_input: String::new(),
            chat_cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            pending: None,
            backend,

            animation_frame: 0,
            tick_count: 0,

            tooltip: HoverTooltip::new(),
            hovered: None,
            clock,

            regions: Vec::new(),
        };
        app.refresh_products();
        app.clamp_selection_state();
        app
    }

    // Category picker: index 0 is "All categories"
    pub fn category_labels(&self) -> Vec<String> {
        std::iter::once("All categories".to_string())
            .chain(self.store.catalog().categories().iter().cloned())
            .collect()
    }

    /// Empty string when no category filter applies
    pub fn selected_category(&self) -> &str {
        match self.category_state.selected() {
            Some(i) if i > 0 => self
                .store
                .catalog()
                .categories()
                .get(i - 1)
                .map(String::as_str)
                .unwrap_or(""),
            _ => "",
        }
    }

    pub fn select_category(&mut self, idx: usize) {
        let len = self.store.catalog().categories().len() + 1;
        self.category_state.select(Some(idx.min(len - 1)));
        self.product_cursor = 0;
        self.product_scroll = 0;
        self.refresh_products();
    }

    pub fn category_down(&mut self) {
        let i = self.category_state.selected().unwrap_or(0);
        self.select_category(i + 1);
    }

    pub fn category_up(&mut self) {
        let i = self.category_state.selected().unwrap_or(0);
        self.select_category(i.saturating_sub(1));
    }

    // Search input
    pub fn search_push(&mut self, c: char) {
        self.search_input.push(c);
        self.product_cursor = 0;
        self.product_scroll = 0;
        self.refresh_products();
    }

    pub fn search_pop(&mut self) {
        self.search_input.pop();
        self.refresh_products();
    }

    pub fn clear_search(&mut self) {
        if !self.search_input.is_empty() {
            self.search_input.clear();
            self.refresh_products();
        }
    }

    /// Recompute the visible grid from the catalog and current filters
    pub fn refresh_products(&mut self) {
        self.visible_products = filter_products(
            self.store.catalog().products(),
            self.selected_category(),
            &self.search_input,
        )
        .into_iter()
        .cloned()
        .collect();

        if self.product_cursor >= self.visible_products.len() {
            self.product_cursor = self.visible_products.len().saturating_sub(1);
        }

        // A tooltip for a card that is no longer on screen goes away
        if let Some(name) = self.tooltip.visible() {
            if !self.visible_products.iter().any(|p| &p.name == name) {
                self.tooltip.hide();
            }
        }
        debug!(
            category = self.selected_category(),
            search = %self.search_input,
            visible = self.visible_products.len(),
            "product view refreshed"
        );
    }

    pub fn current_product(&self) -> Option<&Product> {
        self.visible_products.get(self.product_cursor)
    }

    // Grid navigation
    pub fn product_left(&mut self) {
        self.move_cursor_to(self.product_cursor.saturating_sub(1));
    }

    pub fn product_right(&mut self) {
        self.move_cursor_to(self.product_cursor + 1);
    }

    pub fn product_up(&mut self) {
        let cols = self.grid_columns.max(1);
        if self.product_cursor >= cols {
            self.move_cursor_to(self.product_cursor - cols);
        }
    }

    pub fn product_down(&mut self) {
        let cols = self.grid_columns.max(1);
        if self.product_cursor + cols < self.visible_products.len() {
            self.move_cursor_to(self.product_cursor + cols);
        }
    }

    pub fn product_first(&mut self) {
        self.move_cursor_to(0);
    }

    pub fn product_last(&mut self) {
        self.move_cursor_to(self.visible_products.len().saturating_sub(1));
    }

    fn move_cursor_to(&mut self, idx: usize) {
        let len = self.visible_products.len();
        if len == 0 {
            return;
        }
        self.product_cursor = idx.min(len - 1);
        self.scroll_to_cursor();
        self.hover_cursor_card();
    }

    /// Keep the cursor's row inside the visible rows
    pub fn scroll_to_cursor(&mut self) {
        let row = self.product_cursor / self.grid_columns.max(1);
        let rows = self.grid_rows.max(1);
        if row < self.product_scroll {
            self.product_scroll = row;
        } else if row >= self.product_scroll + rows {
            self.product_scroll = row + 1 - rows;
        }
    }

    /// The keyboard cursor resting on a card counts as hovering it
    pub fn hover_cursor_card(&mut self) {
        let now = self.clock.now();
        self.tooltip.leave_card(now);
        if self.focus == FocusPane::Products {
            if let Some(name) = self.current_product().map(|p| p.name.clone()) {
                self.tooltip.enter_card(name, now);
            }
        }
    }

    pub fn set_focus(&mut self, focus: FocusPane) {
        if self.focus == focus {
            return;
        }
        let leaving_products = self.focus == FocusPane::Products;
        self.focus = focus;

        if focus == FocusPane::Products {
            self.hover_cursor_card();
        } else if leaving_products {
            self.tooltip.leave_card(self.clock.now());
        }
        if focus == FocusPane::Selection {
            self.clamp_selection_state();
        }
    }

    // Selection
    pub fn toggle_product(&mut self, name: &str) {
        let selected = self.store.toggle(name);
        debug!(name, selected, "product toggled");
        self.clamp_selection_state();
    }

    pub fn toggle_current(&mut self) {
        if let Some(name) = self.current_product().map(|p| p.name.clone()) {
            self.toggle_product(&name);
        }
    }

    pub fn remove_product(&mut self, name: &str) {
        self.store.remove(name);
        self.clamp_selection_state();
    }

    pub fn remove_selected_item(&mut self) {
        let name = self
            .selection_state
            .selected()
            .and_then(|i| self.store.selection().products().get(i))
            .map(|p| p.name.clone());
        if let Some(name) = name {
            self.remove_product(&name);
        }
    }

    pub fn clear_selection(&mut self) {
        self.store.clear_selection();
        self.clamp_selection_state();
    }

    pub fn selection_nav_down(&mut self) {
        let len = self.store.selection().len();
        if len > 0 {
            let i = self.selection_state.selected().unwrap_or(0);
            self.selection_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn selection_nav_up(&mut self) {
        let i = self.selection_state.selected().unwrap_or(0);
        self.selection_state.select(Some(i.saturating_sub(1)));
    }

    fn clamp_selection_state(&mut self) {
        let len = self.store.selection().len();
        if len == 0 {
            self.selection_state.select(None);
        } else {
            let i = self.selection_state.selected().unwrap_or(0);
            self.selection_state.select(Some(i.min(len - 1)));
        }
    }

    // Chat
    pub fn is_waiting(&self) -> bool {
        self.pending.is_some()
    }

    pub fn generate_routine(&mut self) {
        if self.is_waiting() {
            return;
        }
        if self.store.selection().is_empty() {
            self.status = Some("Select some products first".to_string());
            return;
        }

        let request = self
            .conversation
            .begin_routine(self.store.selection().products());
        self.spawn_request(request);
    }

    pub fn submit_chat(&mut self) {
        if self.is_waiting() {
            return;
        }

        let text = std::mem::take(&mut self.chat_input);
        self.chat_cursor = 0;
        if let Some(request) = self.conversation.begin_follow_up(&text) {
            self.spawn_request(request);
        }
    }

    fn spawn_request(&mut self, request: PendingRequest) {
        info!(kind = ?request.kind, messages = request.messages.len(), "sending chat request");
        self.status = None;
        self.animation_frame = 0;

        let backend = Arc::clone(&self.backend);
        let task = tokio::spawn(async move { backend.complete(&request.messages).await });
        self.pending = Some(PendingReply {
            kind: request.kind,
            task,
        });

        // Scroll to bottom so the pending indicator is visible
        self.scroll_chat_to_bottom();
    }

    /// Records the reply once the outstanding request has finished
    pub async fn poll_pending(&mut self) {
        if self.pending.as_ref().is_some_and(|p| p.task.is_finished()) {
            self.finish_pending().await;
        }
    }

    pub async fn finish_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            match pending.task.await {
                Ok(result) => self.conversation.finish(pending.kind, result),
                Err(join_err) => self.conversation.finish(pending.kind, Err(join_err)),
            }
            self.scroll_chat_to_bottom();
        }
    }

    pub fn chat_scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
    }

    pub fn chat_scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_chat_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 40 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            40
        };

        let mut total_lines: u16 = 0;
        for msg in self.conversation.history() {
            total_lines += 1; // Role line ("You:" or "AI:")
            for line in msg.content.lines() {
                // Character count, not byte length, for UTF-8 content
                let char_count = line.chars().count();
                total_lines += (char_count / wrap_width + 1) as u16;
            }
            total_lines += 1; // Blank line after message
        }
        if self.pending.is_some() {
            total_lines += 2;
        }

        let visible_height = if self.chat_height > 0 { self.chat_height } else { 20 };
        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }

    /// Tick: animation frames and tooltip deadlines
    pub fn on_tick(&mut self) {
        if self.pending.is_some() {
            self.tick_count = (self.tick_count + 1) % TICKS_PER_FRAME;
            if self.tick_count == 0 {
                self.animation_frame = (self.animation_frame + 1) % 3;
            }
        }
        self.tooltip.tick(self.clock.now());
    }

    /// Regions and the tooltip anchor belong to the old layout
    pub fn on_resize(&mut self, width: u16, height: u16) {
        debug!(width, height, "terminal resized");
        self.regions.clear();
        self.hovered = None;
        self.tooltip.hide();
    }

    // Mouse hover and hit-testing
    pub fn hit_test(&self, x: u16, y: u16) -> Option<HitTarget> {
        // Later regions are drawn on top
        self.regions
            .iter()
            .rev()
            .find(|(rect, _)| point_in_rect(x, y, *rect))
            .map(|(_, target)| target.clone())
    }

    /// Feed the pointer's current target into the tooltip state machine
    pub fn hover(&mut self, target: Option<HitTarget>) {
        if self.hovered == target {
            return;
        }
        let now = self.clock.now();

        match self.hovered.take() {
            Some(HitTarget::Card(_)) => self.tooltip.leave_card(now),
            Some(HitTarget::Tooltip) => self.tooltip.leave_tooltip(),
            _ => {}
        }
        match &target {
            Some(HitTarget::Card(name)) => self.tooltip.enter_card(name.clone(), now),
            Some(HitTarget::Tooltip) => self.tooltip.enter_tooltip(),
            _ => {}
        }
        self.hovered = target;
    }

    pub fn tooltip_product(&self) -> Option<&Product> {
        let name = self.tooltip.visible()?;
        self.visible_products.iter().find(|p| &p.name == name)
    }
}

/// Check if a point is within a rectangle
pub fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::Duration;
    use async_trait::async_trait;
    use routinely_core::{Catalog, ChatMessage, ManualClock, MemoryStore};

    pub(crate) fn product(name: &str, category: &str, description: &str) -> Product {
        Product {
            name: name.to_string(),
            brand: "Brand".to_string(),
            category: category.to_string(),
            image: String::new(),
            description: description.to_string(),
        }
    }

    pub(crate) struct EchoBackend;

    #[async_trait]
    impl CompletionBackend for EchoBackend {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String, RelayError> {
            Ok(format!("**Step** for {} messages", messages.len()))
        }
    }

    pub(crate) struct FailingBackend;

    #[async_trait]
    impl CompletionBackend for FailingBackend {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, RelayError> {
            Err(RelayError::EmptyResponse)
        }
    }

    pub(crate) fn test_app(backend: Arc<dyn CompletionBackend>) -> (App, ManualClock) {
        let catalog = Catalog::from_products(vec![
            product("A", "skincare", "Vitamin C serum"),
            product("B", "makeup", "Matte lipstick"),
            product("C", "skincare", "Night cream"),
        ]);
        let store = ProductStore::with_catalog(catalog, Box::new(MemoryStore::new()));
        let clock = ManualClock::new();
        (App::with_parts(store, backend, Box::new(clock.clone())), clock)
    }

    fn visible_names(app: &App) -> Vec<&str> {
        app.visible_products.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn test_category_filter_updates_view() {
        let (mut app, _) = test_app(Arc::new(EchoBackend));
        assert_eq!(app.category_labels(), ["All categories", "skincare", "makeup"]);

        app.select_category(1);
        assert_eq!(app.selected_category(), "skincare");
        assert_eq!(visible_names(&app), ["A", "C"]);

        app.search_push('n');
        app.search_push('i');
        assert_eq!(visible_names(&app), ["C"]);

        app.select_category(0);
        assert_eq!(visible_names(&app), ["C"]);
        app.clear_search();
        assert_eq!(visible_names(&app), ["A", "B", "C"]);
    }

    #[test]
    fn test_grid_cursor_moves_by_rows() {
        let (mut app, _) = test_app(Arc::new(EchoBackend));
        app.grid_columns = 2;
        app.product_down();
        assert_eq!(app.current_product().map(|p| p.name.as_str()), Some("C"));
        app.product_down();
        assert_eq!(app.product_cursor, 2);
        app.product_up();
        app.product_right();
        assert_eq!(app.current_product().map(|p| p.name.as_str()), Some("B"));
    }

    #[test]
    fn test_toggle_and_remove_keep_list_state_in_range() {
        let (mut app, _) = test_app(Arc::new(EchoBackend));
        app.toggle_product("A");
        app.toggle_product("B");
        app.selection_nav_down();
        app.remove_selected_item();

        assert_eq!(app.store.selection().names(), ["A"]);
        assert_eq!(app.selection_state.selected(), Some(0));

        app.toggle_product("A");
        assert!(app.store.selection().is_empty());
        assert_eq!(app.selection_state.selected(), None);
    }

    #[test]
    fn test_keyboard_cursor_hover_shows_tooltip() {
        let (mut app, clock) = test_app(Arc::new(EchoBackend));
        app.hover_cursor_card();

        clock.advance(Duration::from_millis(399));
        app.on_tick();
        assert!(app.tooltip_product().is_none());

        clock.advance(Duration::from_millis(1));
        app.on_tick();
        assert_eq!(app.tooltip_product().map(|p| p.name.as_str()), Some("A"));

        app.set_focus(FocusPane::Chat);
        clock.advance(Duration::from_millis(100));
        app.on_tick();
        assert!(app.tooltip_product().is_none());
    }

    #[test]
    fn test_mouse_hover_onto_tooltip_keeps_it_open() {
        let (mut app, clock) = test_app(Arc::new(EchoBackend));
        app.set_focus(FocusPane::Chat);

        app.hover(Some(HitTarget::Card("B".to_string())));
        clock.advance(Duration::from_millis(400));
        app.on_tick();
        assert_eq!(app.tooltip.visible().map(String::as_str), Some("B"));

        app.hover(Some(HitTarget::Tooltip));
        clock.advance(Duration::from_millis(500));
        app.on_tick();
        assert_eq!(app.tooltip.visible().map(String::as_str), Some("B"));

        app.hover(None);
        assert!(app.tooltip.visible().is_none());
    }

    #[tokio::test]
    async fn test_generate_routine_round_trip() {
        let (mut app, _) = test_app(Arc::new(EchoBackend));
        app.generate_routine();
        assert!(!app.is_waiting());
        assert!(app.status.is_some());

        app.toggle_product("A");
        app.generate_routine();
        assert!(app.is_waiting());

        // A second request while one is outstanding is ignored
        app.chat_input = "ignored".to_string();
        app.submit_chat();
        assert_eq!(app.conversation.history().len(), 1);

        app.finish_pending().await;
        let history = app.conversation.history();
        assert_eq!(history.len(), 2);
        // Display message plus the hidden prompt
        assert_eq!(history[1], ChatMessage::assistant("**Step** for 2 messages"));
    }

    #[tokio::test]
    async fn test_failed_request_appends_error_text() {
        let (mut app, _) = test_app(Arc::new(FailingBackend));
        app.chat_input = "hi".to_string();
        app.submit_chat();
        app.finish_pending().await;

        assert_eq!(
            app.conversation.history(),
            [
                ChatMessage::user("hi"),
                ChatMessage::assistant(routinely_core::chat::FOLLOW_UP_ERROR_MESSAGE),
            ]
        );
        assert!(app.chat_input.is_empty());
    }
}

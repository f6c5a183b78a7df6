pub mod chat;
pub mod clock;
pub mod config;
pub mod filter;
pub mod product;
pub mod relay;
pub mod selection;
pub mod state;
pub mod storage;
pub mod store;
pub mod tooltip;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export main types for convenience
pub use chat::{Conversation, PendingRequest, RequestKind};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use filter::{categories, filter_products};
pub use product::{Catalog, Product};
pub use relay::{CompletionBackend, RelayClient, RelayError};
pub use selection::Selection;
pub use state::{ChatMessage, ChatRole};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use store::ProductStore;
pub use tooltip::{HoverTooltip, TooltipState};

//! Catalog plus the persisted selection.
//!
//! Every selection mutation is written straight through to the backing
//! [`KeyValueStore`]. Failures here never surface to the user: a catalog that
//! cannot be loaded stays empty, a corrupt stored selection restores as
//! empty, and a failed write keeps the in-memory change.

use tracing::{debug, info, warn};
use crate::product::{Catalog, Product};
use crate::selection::Selection;
use crate::storage::KeyValueStore;

pub const SELECTION_KEY: &str = "selectedProducts";

pub struct ProductStore {
    catalog: Catalog,
    loaded: bool,
    selection: Selection,
    storage: Box<dyn KeyValueStore>,
}

impl ProductStore {
    pub fn new(storage: Box<dyn KeyValueStore>) -> Self {
        Self {
            catalog: Catalog::new(),
            loaded: false,
            selection: Selection::new(),
            storage,
        }
    }

    /// Store with an already loaded catalog; `load` becomes a no-op
    pub fn with_catalog(catalog: Catalog, storage: Box<dyn KeyValueStore>) -> Self {
        Self {
            catalog,
            loaded: true,
            selection: Selection::new(),
            storage,
        }
    }

    /// Loads the catalog once. Returns whether a catalog is available.
    pub async fn load(&mut self, source: &str) -> bool {
        if self.loaded {
            return true;
        }

        match Catalog::load(source).await {
            Ok(catalog) => {
                self.catalog = catalog;
                self.loaded = true;
            }
            Err(e) => {
                warn!(source, error = %e, "failed to load catalog");
            }
        }
        self.loaded
    }

    /// Replaces the in-memory selection with the stored one
    pub fn restore(&mut self) {
        let stored = match self.storage.get(SELECTION_KEY) {
            Ok(Some(stored)) => stored,
            Ok(None) => {
                self.selection = Selection::new();
                return;
            }
            Err(e) => {
                warn!(error = %e, "failed to read stored selection");
                self.selection = Selection::new();
                return;
            }
        };

        self.selection = match serde_json::from_str::<Vec<Product>>(&stored) {
            Ok(products) => Selection::from_products(products),
            Err(e) => {
                warn!(error = %e, "stored selection is malformed, starting empty");
                Selection::new()
            }
        };
        info!(count = self.selection.len(), "selection restored");
    }

    /// Adds or removes the named product. Returns whether it is selected
    /// afterwards. Names missing from the catalog cannot be added.
    pub fn toggle(&mut self, name: &str) -> bool {
        if self.selection.remove(name).is_some() {
            self.persist();
            return false;
        }

        match self.catalog.get_by_name(name) {
            Some(product) => {
                self.selection.insert(product.clone());
                self.persist();
                true
            }
            None => {
                debug!(name, "ignoring toggle of unknown product");
                false
            }
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.selection.remove(name);
        self.persist();
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.persist();
    }

    pub fn is_selected(&self, name: &str) -> bool {
        self.selection.contains(name)
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn persist(&mut self) {
        let result = serde_json::to_string(self.selection.products())
            .map_err(anyhow::Error::from)
            .and_then(|json| self.storage.set(SELECTION_KEY, &json));

        if let Err(e) = result {
            warn!(error = %e, "failed to persist selection");
        }
    }
}

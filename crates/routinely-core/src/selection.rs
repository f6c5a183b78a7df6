use crate::product::Product;

/// Insertion-ordered set of products, unique by name
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Selection {
    products: Vec<Product>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a selection from stored records, keeping the first of any
    /// duplicate names.
    pub fn from_products(products: impl IntoIterator<Item = Product>) -> Self {
        let mut selection = Self::new();
        for product in products {
            selection.insert(product);
        }
        selection
    }

    pub fn contains(&self, name: &str) -> bool {
        self.products.iter().any(|p| p.name == name)
    }

    /// Returns false if a product with the same name was already present
    pub fn insert(&mut self, product: Product) -> bool {
        if self.contains(&product.name) {
            return false;
        }
        self.products.push(product);
        true
    }

    /// Returns the removed product, if it was selected
    pub fn remove(&mut self, name: &str) -> Option<Product> {
        let idx = self.products.iter().position(|p| p.name == name)?;
        Some(self.products.remove(idx))
    }

    pub fn clear(&mut self) {
        self.products.clear();
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn names(&self) -> Vec<&str> {
        self.products.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

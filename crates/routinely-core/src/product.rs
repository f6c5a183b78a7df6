use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use anyhow::{Context, Result, anyhow};
use tracing::{info, warn};
use crate::filter::categories;

/// A catalog entry. Text fields that are missing or `null` read as empty.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Product {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub brand: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub category: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub image: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Default, Clone)]
pub struct Catalog {
    products: Vec<Product>,
    categories: Vec<String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_products(products: Vec<Product>) -> Self {
        let mut catalog = Self {
            products,
            categories: Vec::new(),
        };
        catalog.build_indexes();
        catalog
    }

    /// Parses `{"products": [...]}` or a bare array. Records without a name
    /// are skipped since the selection is keyed by name.
    pub fn from_json(content: &str) -> Result<Self> {
        let items = match serde_json::from_str::<Value>(content).context("catalog is not valid JSON")? {
            Value::Object(mut document) => document
                .remove("products")
                .ok_or_else(|| anyhow!("catalog object has no \"products\" field"))?,
            items @ Value::Array(_) => items,
            _ => return Err(anyhow!("catalog must be an object or an array")),
        };

        let products: Vec<Product> =
            serde_json::from_value(items).context("invalid product list")?;
        let total = products.len();
        let products: Vec<Product> = products
            .into_iter()
            .filter(|p| !p.name.trim().is_empty())
            .collect();
        if products.len() < total {
            warn!(skipped = total - products.len(), "skipping products without a name");
        }

        Ok(Self::from_products(products))
    }

    /// Load from a file path or an `http(s)://` URL
    pub async fn load(source: &str) -> Result<Self> {
        Self::load_with(&Client::new(), source).await
    }

    pub async fn load_with(client: &Client, source: &str) -> Result<Self> {
        let content = if source.starts_with("http://") || source.starts_with("https://") {
            let response = client.get(source).send().await?;
            if !response.status().is_success() {
                return Err(anyhow!(
                    "Catalog request to {} failed with status: {}",
                    source,
                    response.status()
                ));
            }
            response.text().await?
        } else {
            tokio::fs::read_to_string(source).await?
        };

        let catalog = Self::from_json(&content)?;

        info!(
            source,
            products = catalog.products.len(),
            categories = catalog.categories.len(),
            "catalog loaded"
        );

        Ok(catalog)
    }

    fn build_indexes(&mut self) {
        self.categories = categories(&self.products);
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }
}

#[cfg(test)]
pub(crate) fn product(name: &str, category: &str, description: &str) -> Product {
    Product {
        name: name.to_string(),
        brand: "Brand".to_string(),
        category: category.to_string(),
        image: format!("https://img.example/{}.jpg", name),
        description: description.to_string(),
    }
}

//! Category and free-text filtering over the catalog.

use std::collections::HashSet;
use crate::product::Product;

/// Returns the products matching both the category and the search term, in
/// catalog order.
///
/// An empty `category` or an empty (after trimming) `search` disables that
/// predicate. The category is an exact match; the search term is a
/// case-insensitive substring match against the name or the description.
pub fn filter_products<'a>(products: &'a [Product], category: &str, search: &str) -> Vec<&'a Product> {
    let term = search.trim().to_lowercase();

    products
        .iter()
        .filter(|product| category.is_empty() || product.category == category)
        .filter(|product| term.is_empty() || matches_term(product, &term))
        .collect()
}

/// Distinct categories in first-seen order, so the picker follows the
/// catalog file
pub fn categories(products: &[Product]) -> Vec<String> {
    let mut seen = HashSet::new();
    products
        .iter()
        .filter(|p| seen.insert(p.category.as_str()))
        .map(|p| p.category.clone())
        .collect()
}

/// `term` must already be lower-cased
fn matches_term(product: &Product, term: &str) -> bool {
    product.name.to_lowercase().contains(term)
        || product.description.to_lowercase().contains(term)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::product;

    fn catalog() -> Vec<Product> {
        vec![
            product("A", "skincare", "Vitamin C serum"),
            product("B", "makeup", "Matte lipstick"),
            product("Night Cream", "skincare", "Rich overnight moisture"),
            product("Serum Primer", "makeup", "Blurring base"),
        ]
    }

    fn names(products: &[&Product]) -> Vec<String> {
        products.iter().map(|p| p.name.clone()).collect()
    }

    #[test]
    fn test_categories_keep_first_seen_order() {
        assert_eq!(categories(&catalog()), ["skincare", "makeup"]);
        assert!(categories(&[]).is_empty());
    }

    #[test]
    fn test_category_only() {
        let products = vec![product("A", "skincare", ""), product("B", "makeup", "")];
        assert_eq!(names(&filter_products(&products, "skincare", "")), ["A"]);
    }

    #[test]
    fn test_no_filters_returns_everything() {
        let products = catalog();
        assert_eq!(filter_products(&products, "", "   ").len(), products.len());
    }

    #[test]
    fn test_search_matches_name_or_description_case_insensitively() {
        let products = catalog();
        assert_eq!(
            names(&filter_products(&products, "", "SERUM")),
            ["A", "Serum Primer"]
        );
        assert_eq!(names(&filter_products(&products, "", " moisture ")), ["Night Cream"]);
    }

    #[test]
    fn test_category_and_search_combine() {
        let products = catalog();
        assert_eq!(names(&filter_products(&products, "makeup", "serum")), ["Serum Primer"]);
        assert!(filter_products(&products, "fragrance", "").is_empty());
    }

    #[test]
    fn test_result_is_ordered_subsequence_satisfying_predicates() {
        let products = catalog();
        for category in ["", "skincare", "makeup", "haircare"] {
            for term in ["", "a", "serum", "RICH", "zzz"] {
                let result = filter_products(&products, category, term);

                let mut cursor = 0;
                for item in &result {
                    if !category.is_empty() {
                        assert_eq!(item.category, category);
                    }
                    if !term.is_empty() {
                        assert!(matches_term(item, &term.to_lowercase()));
                    }
                    let offset = products[cursor..]
                        .iter()
                        .position(|p| p == *item)
                        .expect("result must be a subsequence of the catalog");
                    cursor += offset + 1;
                }
            }
        }
    }
}

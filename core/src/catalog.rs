//! Product catalog — the read-only SKU index the simulation draws from.
//!
//! Built once at startup and never mutated. Category and SKU lists keep the
//! order of the source file: that order is part of every pick decision
//! (a pick draws an index into these lists).

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::{
    error::{SimError, SimResult},
    types::Sku,
};

pub mod category {
    pub const MILK: &str = "Milk";
    pub const CEREAL: &str = "Cereal";
    pub const BABY_FOOD: &str = "Baby Food";
    pub const DIAPERS: &str = "Diapers";
    pub const PEANUT_BUTTER: &str = "Peanut Butter";
    pub const BREAD: &str = "Bread";
    pub const JELLY_JAM: &str = "Jelly/Jam";

    /// Catch-all report group for every non-special category.
    pub const OTHER: &str = "Other";
}

/// Categories modelled explicitly by a purchase rule, in report order.
pub const SPECIAL_CATEGORIES: [&str; 7] = [
    category::MILK,
    category::CEREAL,
    category::BABY_FOOD,
    category::DIAPERS,
    category::PEANUT_BUTTER,
    category::BREAD,
    category::JELLY_JAM,
];

pub fn is_special(category: &str) -> bool {
    SPECIAL_CATEGORIES.contains(&category)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub sku: Sku,
    pub name: String,
    #[serde(rename = "type", alias = "category")]
    pub category: String,
    pub base_price: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct ProductFile {
    products: Vec<Product>,
}

#[derive(Debug, Clone, Default)]
pub struct ProductCatalog {
    products: HashMap<Sku, Product>,
    by_category: HashMap<String, Vec<Sku>>,
    all_skus: Vec<Sku>,
}

impl ProductCatalog {
    /// Build the index. Rejects SKU 0, duplicate SKUs and bad prices.
    pub fn from_products(products: Vec<Product>) -> SimResult<Self> {
        let mut catalog = Self::default();
        let mut seen = HashSet::with_capacity(products.len());
        for p in products {
            if p.sku == 0 {
                return Err(SimError::InvalidCatalog {
                    reason: format!("product '{}' has SKU 0", p.name),
                });
            }
            if !seen.insert(p.sku) {
                return Err(SimError::InvalidCatalog {
                    reason: format!("duplicate SKU {}", p.sku),
                });
            }
            if !p.base_price.is_finite() || p.base_price < 0.0 {
                return Err(SimError::InvalidCatalog {
                    reason: format!("SKU {} has invalid base price {}", p.sku, p.base_price),
                });
            }
            catalog.all_skus.push(p.sku);
            catalog
                .by_category
                .entry(p.category.clone())
                .or_default()
                .push(p.sku);
            catalog.products.insert(p.sku, p);
        }
        Ok(catalog)
    }

    /// A small fixed catalog covering every special category plus a handful
    /// of other products. Used by tests and as the runner's fallback.
    pub fn demo() -> Self {
        const ROWS: [(Sku, &str, &str, f64); 18] = [
            (1001, "Whole Milk 1gal", category::MILK, 3.49),
            (1002, "Skim Milk 1gal", category::MILK, 3.29),
            (1101, "Corn Flakes", category::CEREAL, 4.19),
            (1102, "Oat Rings", category::CEREAL, 3.99),
            (1201, "Apple Puree Jar", category::BABY_FOOD, 1.25),
            (1301, "Diapers Size 3", category::DIAPERS, 24.99),
            (1401, "Creamy Peanut Butter", category::PEANUT_BUTTER, 3.79),
            (1501, "White Sandwich Bread", category::BREAD, 2.49),
            (1502, "Whole Wheat Bread", category::BREAD, 2.99),
            (1601, "Strawberry Jam", category::JELLY_JAM, 3.15),
            (2001, "Bananas 1lb", "Produce", 0.59),
            (2002, "Gala Apples 3lb", "Produce", 4.49),
            (2101, "Paper Towels 6pk", "Household", 8.99),
            (2102, "Dish Soap", "Household", 2.79),
            (2201, "Potato Chips", "Snacks", 3.49),
            (2202, "Pretzels", "Snacks", 2.99),
            (2301, "Ground Coffee", "Beverages", 7.99),
            (2302, "Orange Juice", "Beverages", 3.89),
        ];
        let products = ROWS
            .iter()
            .map(|(sku, name, category, price)| Product {
                sku: *sku,
                name: (*name).to_string(),
                category: (*category).to_string(),
                base_price: *price,
            })
            .collect();
        // Fixed rows above are unique and priced.
        Self::from_products(products).unwrap_or_default()
    }

    /// Load `{ "products": [ { "sku", "name", "type", "base_price" }, ... ] }`.
    pub fn load(path: impl AsRef<Path>) -> SimResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| SimError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ProductFile = serde_json::from_str(&content)?;
        let catalog = Self::from_products(file.products)?;
        log::info!(
            "Loaded {} products in {} categories from {}",
            catalog.len(),
            catalog.by_category.len(),
            path.display()
        );
        Ok(catalog)
    }

    pub fn product_by_sku(&self, sku: Sku) -> Option<&Product> {
        self.products.get(&sku)
    }

    /// SKUs of `category` in catalog order. Empty for unknown categories.
    pub fn skus_by_category(&self, category: &str) -> &[Sku] {
        self.by_category
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn all_skus(&self) -> &[Sku] {
        &self.all_skus
    }

    pub fn len(&self) -> usize {
        self.all_skus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all_skus.is_empty()
    }
}

/// Which categories are reported on their own. Every other category rolls
/// up into Other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryGrouping {
    named: Vec<String>,
}

impl Default for CategoryGrouping {
    fn default() -> Self {
        Self::special()
    }
}

impl CategoryGrouping {
    /// The seven rule categories.
    pub fn special() -> Self {
        Self::new(SPECIAL_CATEGORIES)
    }

    pub fn new<S: Into<String>>(named: impl IntoIterator<Item = S>) -> Self {
        let mut out: Vec<String> = Vec::new();
        for n in named {
            let n = n.into();
            if n != category::OTHER && !out.contains(&n) {
                out.push(n);
            }
        }
        Self { named: out }
    }

    pub fn group_of<'a>(&'a self, category: &'a str) -> &'a str {
        if self.named.iter().any(|n| n == category) {
            category
        } else {
            category::OTHER
        }
    }

    /// Named groups in order, then Other.
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.named
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(category::OTHER))
    }

    /// Number of catalog SKUs that roll up into `group`.
    pub fn item_count(&self, catalog: &ProductCatalog, group: &str) -> usize {
        if group == category::OTHER {
            let named: usize = self
                .named
                .iter()
                .map(|c| catalog.skus_by_category(c).len())
                .sum();
            catalog.len() - named
        } else {
            catalog.skus_by_category(group).len()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(sku: Sku, category: &str, price: f64) -> Product {
        Product { sku, name: format!("item-{sku}"), category: category.into(), base_price: price }
    }

    #[test]
    fn indexes_keep_source_order() {
        let catalog = ProductCatalog::from_products(vec![
            product(30, category::MILK, 2.0),
            product(10, "Snacks", 1.0),
            product(20, category::MILK, 3.0),
        ])
        .unwrap();
        assert_eq!(catalog.all_skus(), &[30, 10, 20]);
        assert_eq!(catalog.skus_by_category(category::MILK), &[30, 20]);
        assert!(catalog.skus_by_category(category::BREAD).is_empty());
    }

    #[test]
    fn rejects_duplicates_and_bad_prices() {
        let dup = ProductCatalog::from_products(vec![product(1, "A", 1.0), product(1, "B", 1.0)]);
        assert!(matches!(dup, Err(SimError::InvalidCatalog { .. })));
        let neg = ProductCatalog::from_products(vec![product(1, "A", -0.5)]);
        assert!(matches!(neg, Err(SimError::InvalidCatalog { .. })));
        let zero = ProductCatalog::from_products(vec![product(0, "A", 1.0)]);
        assert!(matches!(zero, Err(SimError::InvalidCatalog { .. })));
    }

    #[test]
    fn other_group_counts_everything_non_special() {
        let catalog = ProductCatalog::from_products(vec![
            product(1, category::MILK, 2.0),
            product(2, category::BREAD, 2.0),
            product(3, "Snacks", 1.0),
            product(4, "Soap", 1.0),
        ])
        .unwrap();
        let grouping = CategoryGrouping::special();
        assert_eq!(grouping.item_count(&catalog, category::OTHER), 2);
        assert_eq!(grouping.item_count(&catalog, category::MILK), 1);
        assert_eq!(grouping.group_of("Soap"), category::OTHER);
        assert_eq!(grouping.group_of(category::BREAD), category::BREAD);
    }

    #[test]
    fn custom_grouping() {
        let grouping = CategoryGrouping::new(["Snacks", "Other", "Snacks"]);
        assert_eq!(grouping.groups().collect::<Vec<_>>(), vec!["Snacks", category::OTHER]);
        assert_eq!(grouping.group_of(category::MILK), category::OTHER);
        assert_eq!(grouping.group_of("Snacks"), "Snacks");
    }

    #[test]
    fn parses_type_field() {
        let json = r#"{"products":[{"sku":5,"name":"Whole Milk","type":"Milk","base_price":3.49}]}"#;
        let file: ProductFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.products[0].category, category::MILK);
    }
}

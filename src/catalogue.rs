//! Product catalogue: the ordered `category -> products` mapping and the expiry offset multiset the record generator
//! draws from.
//!
//! The catalogue is immutable once built. It is either the built-in meat-department default or a JSON document of
//! the following shape:
//!
//! ```json
//! {
//!   "categories": [ { "name": "Beef", "products": ["Ribeye Steak", "Short Rib"] } ],
//!   "expiry_offsets": [-2, -1, 0, 1, 1, 2, 2, 3, 5, 5, 7]
//! }
//! ```
//!
//! A list of categories is used instead of a JSON object because the declared order is significant: it is the order
//! of the "all categories" concatenation and of the table rows.

use std::collections::HashSet;
use std::path::Path;

use garde::Validate;
use serde::Deserialize;
use serde::Serialize;

use crate::error::Result;
use crate::error::VizError;

/// Day offsets relative to "today". Near-term values are repeated so that the alert buckets are populated in a typical
/// run.
pub const DEFAULT_EXPIRY_OFFSETS: [i64; 11] = [-2, -1, 0, 1, 1, 2, 2, 3, 5, 5, 7];

const DEFAULT_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "Beef",
        &[
            "Ribeye Steak",
            "Ground Beef 80/20",
            "Chuck Roast",
            "Sirloin Tip",
            "Beef Tenderloin",
            "Short Rib",
            "T-Bone Steak",
            "Beef Brisket",
        ],
    ),
    (
        "Pork",
        &[
            "Pork Shoulder",
            "Pork Belly",
            "Baby Back Ribs",
            "Pork Tenderloin",
            "Ham Hock",
            "Pork Chops",
        ],
    ),
    (
        "Chicken",
        &[
            "Whole Chicken",
            "Chicken Breast",
            "Chicken Thighs",
            "Chicken Wings",
            "Chicken Drumsticks",
            "Ground Chicken",
        ],
    ),
    (
        "Seafood",
        &[
            "Atlantic Salmon",
            "Shrimp (16/20)",
            "Tilapia Fillet",
            "Cod Fillet",
            "Sea Bass",
            "Scallops",
        ],
    ),
    (
        "Halal",
        &[
            "MINA Halal Chicken Leg",
            "MINA Halal Whole Chicken",
            "MINA Halal Drumstick",
            "MINA Halal Ground Chicken",
            "MINA Halal Breast (Bone-in)",
            "MINA Halal BSB VP",
            "MINA Halal Chicken Breast",
            "MINA Halal Thigh",
        ],
    ),
];

fn default_expiry_offsets() -> Vec<i64> {
    DEFAULT_EXPIRY_OFFSETS.to_vec()
}

fn unique_products(products: &Vec<String>, _ctx: &()) -> garde::Result {
    let mut seen = HashSet::with_capacity(products.len());
    for product in products {
        if !seen.insert(product.as_str()) {
            return Err(garde::Error::new(format!("duplicate product '{product}'")));
        }
    }
    Ok(())
}

fn unique_categories(categories: &Vec<Category>, _ctx: &()) -> garde::Result {
    let mut seen = HashSet::with_capacity(categories.len());
    for category in categories {
        if !seen.insert(category.name.as_str()) {
            return Err(garde::Error::new(format!("duplicate category '{}'", category.name)));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct Category {
    #[garde(length(min = 1))]
    name:     String,
    #[garde(length(min = 1), inner(length(min = 1)), custom(unique_products))]
    products: Vec<String>,
}

impl Category {
    pub fn new<S: ToString>(name: S, products: impl IntoIterator<Item = impl ToString>) -> Self {
        Self {
            name:     name.to_string(),
            products: products.into_iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn products(&self) -> &[String] {
        &self.products
    }
}

/// Validated catalogue. Deserializing goes through the same checks as [`Catalogue::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(try_from = "CatalogueDef")]
pub struct Catalogue {
    #[garde(length(min = 1), dive, custom(unique_categories))]
    categories:     Vec<Category>,
    /// Bounded to a century either way.
    #[garde(length(min = 1), inner(range(min = -36_500, max = 36_500)))]
    expiry_offsets: Vec<i64>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogueDef {
    categories:     Vec<Category>,
    #[serde(default = "default_expiry_offsets")]
    expiry_offsets: Vec<i64>,
}

impl TryFrom<CatalogueDef> for Catalogue {
    type Error = String;

    fn try_from(def: CatalogueDef) -> std::result::Result<Self, Self::Error> {
        let catalogue = Self {
            categories:     def.categories,
            expiry_offsets: def.expiry_offsets,
        };
        catalogue
            .validate()
            .map_err(|report| report.to_string().trim().to_string())?;
        Ok(catalogue)
    }
}

impl Catalogue {
    /// Build a validated catalogue.
    pub fn new(categories: Vec<Category>, expiry_offsets: Vec<i64>) -> Result<Self> {
        Self::try_from(CatalogueDef {
            categories,
            expiry_offsets,
        })
        .map_err(VizError::InvalidCatalogue)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|err| VizError::InvalidCatalogue(err.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        log::debug!("Loading catalogue from {}", path.display());
        Self::from_json_str(&json)
    }

    /// Products of `category` in declaration order.
    pub fn products(&self, category: &str) -> Result<&[String]> {
        self.categories
            .iter()
            .find(|c| c.name == category)
            .map(|c| c.products.as_slice())
            .ok_or_else(|| VizError::UnknownCategory(category.to_string()))
    }

    pub fn contains(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c.name == category)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.name.as_str())
    }

    pub fn expiry_offsets(&self) -> &[i64] {
        &self.expiry_offsets
    }

    pub fn product_count(&self) -> usize {
        self.categories.iter().map(|c| c.products.len()).sum()
    }
}

impl Default for Catalogue {
    fn default() -> Self {
        Self {
            categories:     DEFAULT_CATEGORIES
                .iter()
                .map(|(name, products)| Category::new(name, products.iter()))
                .collect(),
            expiry_offsets: default_expiry_offsets(),
        }
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::ProductError;

// ============================================================================
// Product Value Objects
// ============================================================================

pub type ProductId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductCategory {
    Combo,
    Lanche,
    Bebida,
    Acompanhamento,
    Sobremesa,
}

impl ProductCategory {
    pub const ALL: [ProductCategory; 5] = [
        ProductCategory::Combo,
        ProductCategory::Lanche,
        ProductCategory::Bebida,
        ProductCategory::Acompanhamento,
        ProductCategory::Sobremesa,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductCategory::Combo => "Combo",
            ProductCategory::Lanche => "Lanche",
            ProductCategory::Bebida => "Bebida",
            ProductCategory::Acompanhamento => "Acompanhamento",
            ProductCategory::Sobremesa => "Sobremesa",
        }
    }
}

impl fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductCategory {
    type Err = ProductError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProductCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| ProductError::InvalidProduct(format!("unknown category {s:?}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductImage {
    pub image_url: String,
}

/// Product as submitted for creation or update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductForm {
    pub name: String,
    pub description: String,
    pub category: ProductCategory,
    pub price: f64,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    #[serde(default)]
    pub combo_products_ids: Option<Vec<ProductId>>,
}

impl ProductForm {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        category: ProductCategory,
        price: f64,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            category,
            price,
            images: Vec::new(),
            combo_products_ids: None,
        }
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.images.push(ProductImage {
            image_url: url.into(),
        });
        self
    }

    pub fn with_combo_products(mut self, ids: impl IntoIterator<Item = ProductId>) -> Self {
        self.combo_products_ids = Some(ids.into_iter().collect());
        self
    }

    pub fn combo_member_ids(&self) -> &[ProductId] {
        self.combo_products_ids.as_deref().unwrap_or(&[])
    }

    pub fn validate(&self) -> Result<(), ProductError> {
        if self.name.trim().is_empty() {
            return Err(ProductError::InvalidProduct("name is required".into()));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(ProductError::InvalidProduct(format!(
                "price must be a non-negative number, got {}",
                self.price
            )));
        }
        if self.category == ProductCategory::Combo && self.combo_member_ids().is_empty() {
            return Err(ProductError::InvalidProduct(
                "a combo must list at least one product".into(),
            ));
        }
        Ok(())
    }
}

/// Product as read back from the catalog. Combo members are resolved one
/// level deep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub category: ProductCategory,
    pub price: f64,
    pub images: Vec<ProductImage>,
    pub combo_products: Option<Vec<Product>>,
}

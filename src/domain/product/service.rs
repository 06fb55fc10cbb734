use std::sync::Arc;

use super::errors::ProductError;
use super::value_objects::{Product, ProductCategory, ProductForm, ProductId};
use crate::store::ProductCatalog;

// ============================================================================
// Product Service - validation in front of the catalog store
// ============================================================================

pub struct ProductService {
    catalog: Arc<dyn ProductCatalog>,
}

impl ProductService {
    pub fn new(catalog: Arc<dyn ProductCatalog>) -> Self {
        Self { catalog }
    }

    pub fn categories(&self) -> Vec<ProductCategory> {
        ProductCategory::ALL.to_vec()
    }

    pub async fn create_product(&self, form: ProductForm) -> Result<ProductId, ProductError> {
        self.validate(&form).await?;

        let id = self.catalog.create_product(&form).await?;
        tracing::info!(product_id = id, category = %form.category, name = %form.name, "Product created");
        Ok(id)
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Product, ProductError> {
        self.catalog
            .get_product(id)
            .await?
            .ok_or(ProductError::NotFound(id))
    }

    pub async fn list_by_category(&self, category: ProductCategory) -> Result<Vec<Product>, ProductError> {
        Ok(self.catalog.list_by_category(category).await?)
    }

    pub async fn update_product(&self, id: ProductId, form: ProductForm) -> Result<(), ProductError> {
        self.validate(&form).await?;
        if form.combo_member_ids().contains(&id) {
            return Err(ProductError::InvalidProduct(
                "a combo cannot contain itself".into(),
            ));
        }

        if !self.catalog.update_product(id, &form).await? {
            return Err(ProductError::NotFound(id));
        }
        tracing::info!(product_id = id, "Product updated");
        Ok(())
    }

    pub async fn delete_product(&self, id: ProductId) -> Result<(), ProductError> {
        if !self.catalog.delete_product(id).await? {
            return Err(ProductError::NotFound(id));
        }
        tracing::info!(product_id = id, "Product deleted");
        Ok(())
    }

    async fn validate(&self, form: &ProductForm) -> Result<(), ProductError> {
        form.validate()?;

        let members = form.combo_member_ids();
        if members.is_empty() {
            return Ok(());
        }
        let missing = self.catalog.find_missing(members).await?;
        if let Some(first) = missing.first() {
            return Err(ProductError::InvalidProduct(format!(
                "combo references unknown product {first}"
            )));
        }
        Ok(())
    }
}

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::product::{Product, ProductCategory, ProductForm, ProductId, ProductImage};
use crate::store::{ProductCatalog, StoreError};

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    description: String,
    category: String,
    price: f64,
}

impl ProductRow {
    fn category(&self) -> Result<ProductCategory, StoreError> {
        self.category
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("product {}: {e}", self.id)))
    }
}

#[derive(Clone)]
pub struct PgProductCatalog {
    pool: PgPool,
}

impl PgProductCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn images_for(&self, ids: &[i64]) -> Result<HashMap<i64, Vec<ProductImage>>, StoreError> {
        let rows: Vec<(i64, String)> = sqlx::query_as(
            "SELECT product_id, image_url FROM product_images
             WHERE product_id = ANY($1)
             ORDER BY id",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut images: HashMap<i64, Vec<ProductImage>> = HashMap::new();
        for (product_id, image_url) in rows {
            images
                .entry(product_id)
                .or_default()
                .push(ProductImage { image_url });
        }
        Ok(images)
    }

    /// Builds products with images; combo members are left unresolved.
    async fn plain(&self, rows: Vec<ProductRow>) -> Result<Vec<Product>, StoreError> {
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut images = self.images_for(&ids).await?;

        rows.into_iter()
            .map(|row| {
                Ok(Product {
                    id: row.id,
                    category: row.category()?,
                    images: images.remove(&row.id).unwrap_or_default(),
                    name: row.name,
                    description: row.description,
                    price: row.price,
                    combo_products: None,
                })
            })
            .collect()
    }

    /// Resolves the members of every combo in `products`, one level deep.
    async fn resolve_combos(&self, products: &mut [Product]) -> Result<(), StoreError> {
        let combo_ids: Vec<i64> = products
            .iter()
            .filter(|p| p.category == ProductCategory::Combo)
            .map(|p| p.id)
            .collect();
        if combo_ids.is_empty() {
            return Ok(());
        }

        let links: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT combo_id, product_id FROM combo_products
             WHERE combo_id = ANY($1)
             ORDER BY combo_id, position",
        )
        .bind(&combo_ids)
        .fetch_all(&self.pool)
        .await?;

        let member_ids: Vec<i64> = links
            .iter()
            .map(|(_, member)| *member)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let member_rows: Vec<ProductRow> = sqlx::query_as(
            "SELECT id, name, description, category, price FROM products WHERE id = ANY($1)",
        )
        .bind(&member_ids)
        .fetch_all(&self.pool)
        .await?;
        let members: HashMap<i64, Product> = self
            .plain(member_rows)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        for product in products.iter_mut().filter(|p| p.category == ProductCategory::Combo) {
            product.combo_products = Some(
                links
                    .iter()
                    .filter(|(combo, _)| *combo == product.id)
                    .filter_map(|(_, member)| members.get(member).cloned())
                    .collect(),
            );
        }
        Ok(())
    }

    async fn write_children(
        tx: &mut Transaction<'_, Postgres>,
        id: ProductId,
        form: &ProductForm,
    ) -> Result<(), StoreError> {
        for image in &form.images {
            sqlx::query("INSERT INTO product_images (product_id, image_url) VALUES ($1, $2)")
                .bind(id)
                .bind(&image.image_url)
                .execute(&mut **tx)
                .await?;
        }
        for (position, member) in form.combo_member_ids().iter().enumerate() {
            sqlx::query(
                "INSERT INTO combo_products (combo_id, product_id, position) VALUES ($1, $2, $3)",
            )
            .bind(id)
            .bind(member)
            .bind(position as i32)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ProductCatalog for PgProductCatalog {
    async fn find_missing(&self, ids: &[ProductId]) -> Result<Vec<ProductId>, StoreError> {
        let found: Vec<(i64,)> = sqlx::query_as("SELECT id FROM products WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        let found: HashSet<i64> = found.into_iter().map(|(id,)| id).collect();

        Ok(ids.iter().copied().filter(|id| !found.contains(id)).collect())
    }

    async fn create_product(&self, form: &ProductForm) -> Result<ProductId, StoreError> {
        let mut tx = self.pool.begin().await?;

        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO products (name, description, category, price)
             VALUES ($1, $2, $3, $4)
             RETURNING id",
        )
        .bind(&form.name)
        .bind(&form.description)
        .bind(form.category.as_str())
        .bind(form.price)
        .fetch_one(&mut *tx)
        .await?;

        Self::write_children(&mut tx, id, form).await?;
        tx.commit().await?;
        Ok(id)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row: Option<ProductRow> = sqlx::query_as(
            "SELECT id, name, description, category, price FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut products = self.plain(vec![row]).await?;
        self.resolve_combos(&mut products).await?;
        Ok(products.pop())
    }

    async fn list_by_category(&self, category: ProductCategory) -> Result<Vec<Product>, StoreError> {
        let rows: Vec<ProductRow> = sqlx::query_as(
            "SELECT id, name, description, category, price FROM products
             WHERE category = $1
             ORDER BY id",
        )
        .bind(category.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut products = self.plain(rows).await?;
        self.resolve_combos(&mut products).await?;
        Ok(products)
    }

    async fn update_product(&self, id: ProductId, form: &ProductForm) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE products SET name = $1, description = $2, category = $3, price = $4,
                                 updated_at = now()
             WHERE id = $5",
        )
        .bind(&form.name)
        .bind(&form.description)
        .bind(form.category.as_str())
        .bind(form.price)
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if updated == 0 {
            return Ok(false);
        }

        sqlx::query("DELETE FROM product_images WHERE product_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM combo_products WHERE combo_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        Self::write_children(&mut tx, id, form).await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, StoreError> {
        let deleted = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted == 1)
    }
}

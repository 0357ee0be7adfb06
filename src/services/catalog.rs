//! Category and product administration plus catalog browsing.

use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::aggregates::{Category, CategoryChanges, NewProduct, Product, ProductChanges};
use crate::error::{AppError, Result};
use crate::store::{PageRequest, ProductFilter, Store, StoreError};

const CATEGORY_NOT_FOUND: &str = "Category not found";
const DUPLICATE_CATEGORY: &str = "Category with this name already exists";
const PRODUCT_NOT_FOUND: &str = "Product not found";
const DUPLICATE_SKU: &str = "Product with this SKU already exists";

pub struct CatalogService<'a> {
    store: &'a dyn Store,
}

impl<'a> CatalogService<'a> {
    pub fn new(store: &'a dyn Store) -> Self { Self { store } }

    pub async fn categories(&self) -> Result<Vec<Category>> {
        self.store.list_categories().await.map_err(AppError::store("Server error while fetching categories"))
    }

    pub async fn category(&self, id: Uuid) -> Result<Category> {
        self.store
            .category_by_id(id)
            .await
            .map_err(AppError::store("Server error while fetching category"))?
            .filter(|c| c.is_active)
            .ok_or_else(|| AppError::not_found(CATEGORY_NOT_FOUND))
    }

    #[instrument(skip(self, description, image))]
    pub async fn create_category(&self, name: &str, description: Option<String>, image: Option<String>) -> Result<Category> {
        let name = name.trim();
        if self.store.category_by_name(name).await?.is_some() {
            return Err(AppError::bad_request(DUPLICATE_CATEGORY));
        }
        let category = Category::create(name, description, image);
        self.store.insert_category(&category).await.map_err(conflict_as(DUPLICATE_CATEGORY))?;
        info!(category_id = %category.id, "category created");
        Ok(category)
    }

    #[instrument(skip(self, changes))]
    pub async fn update_category(&self, id: Uuid, mut changes: CategoryChanges) -> Result<Category> {
        let mut category = self.store.category_by_id(id).await?.ok_or_else(|| AppError::not_found(CATEGORY_NOT_FOUND))?;
        if let Some(name) = changes.name.as_mut() {
            *name = name.trim().to_string();
            let taken = self.store.category_by_name(name).await?.is_some_and(|other| other.id != id);
            if taken {
                return Err(AppError::bad_request(DUPLICATE_CATEGORY));
            }
        }
        category.apply(changes);
        self.store.update_category(&category).await.map_err(conflict_as(DUPLICATE_CATEGORY))?;
        Ok(category)
    }

    /// Soft delete: the category is hidden, its products are untouched.
    #[instrument(skip(self))]
    pub async fn delete_category(&self, id: Uuid) -> Result<()> {
        let mut category = self.store.category_by_id(id).await?.ok_or_else(|| AppError::not_found(CATEGORY_NOT_FOUND))?;
        category.deactivate();
        self.store.update_category(&category).await.map_err(AppError::store("Server error while deleting category"))
    }

    pub async fn products(&self, filter: &ProductFilter, page: PageRequest) -> Result<(Vec<Product>, u64)> {
        self.store
            .list_products(filter, page)
            .await
            .map_err(AppError::store("Server error while fetching products"))
    }

    pub async fn product(&self, id: Uuid) -> Result<Product> {
        self.store
            .product_by_id(id)
            .await
            .map_err(AppError::store("Server error while fetching product"))?
            .filter(|p| p.is_active)
            .ok_or_else(|| AppError::not_found(PRODUCT_NOT_FOUND))
    }

    #[instrument(skip(self, new), fields(sku = %new.sku))]
    pub async fn create_product(&self, new: NewProduct) -> Result<Product> {
        self.ensure_category(new.category_id).await?;
        if self.store.product_by_sku(new.sku.as_str()).await?.is_some() {
            return Err(AppError::bad_request(DUPLICATE_SKU));
        }
        let product = Product::create(new);
        self.store.insert_product(&product).await.map_err(conflict_as(DUPLICATE_SKU))?;
        info!(product_id = %product.id, "product created");
        Ok(product)
    }

    #[instrument(skip(self, changes))]
    pub async fn update_product(&self, id: Uuid, changes: ProductChanges) -> Result<Product> {
        let mut product = self.store.product_by_id(id).await?.ok_or_else(|| AppError::not_found(PRODUCT_NOT_FOUND))?;
        if let Some(category_id) = changes.category_id {
            self.ensure_category(category_id).await?;
        }
        if let Some(sku) = &changes.sku {
            let taken = self.store.product_by_sku(sku.as_str()).await?.is_some_and(|other| other.id != id);
            if taken {
                return Err(AppError::bad_request(DUPLICATE_SKU));
            }
        }
        let restock = changes.stock;
        product.apply(changes);
        self.store.update_product(&product).await.map_err(conflict_as(DUPLICATE_SKU))?;
        if let Some(stock) = restock {
            self.store.set_stock(id, stock).await.map_err(AppError::store("Server error while updating stock"))?;
        }
        // stock may have moved since the read
        Ok(self.store.product_by_id(id).await?.unwrap_or(product))
    }

    /// Soft delete. Existing orders keep their line snapshots; carts drop the
    /// product on their next read.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: Uuid) -> Result<()> {
        let mut product = self.store.product_by_id(id).await?.ok_or_else(|| AppError::not_found(PRODUCT_NOT_FOUND))?;
        product.deactivate();
        self.store.update_product(&product).await.map_err(AppError::store("Server error while deleting product"))
    }

    async fn ensure_category(&self, id: Uuid) -> Result<()> {
        match self.store.category_by_id(id).await? {
            Some(category) if category.is_active => Ok(()),
            _ => Err(AppError::bad_request(CATEGORY_NOT_FOUND)),
        }
    }
}

fn conflict_as(message: &'static str) -> impl FnOnce(StoreError) -> AppError {
    move |err| match err {
        StoreError::Conflict(_) => AppError::bad_request(message),
        other => AppError::from(other),
    }
}

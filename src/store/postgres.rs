//! `PostgreSQL` store.
//!
//! Cart lines, order lines and addresses are JSONB documents; everything the
//! catalog filters on is a plain column.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::time::Duration;
use uuid::Uuid;

use super::{
    CartStore, CatalogStore, OrderFilter, OrderStore, PageRequest, ProductFilter, ProductSort, StoreError, UserStore,
};
use crate::domain::aggregates::{Cart, Category, Order, Product, User};

const USER_COLUMNS: &str =
    "id, name, email, password_hash, role, address, phone, is_active, created_at, updated_at";
const CATEGORY_COLUMNS: &str = "id, name, description, image, is_active, created_at, updated_at";
const PRODUCT_COLUMNS: &str = "id, name, description, price, original_price, category_id, images, stock, sku, \
     tags, is_active, featured, created_at, updated_at";
const CART_COLUMNS: &str = "id, user_id, items, total_amount, created_at, updated_at";
const ORDER_COLUMNS: &str = "id, user_id, order_number, items, total_amount, status, payment_status, \
     payment_method, payment_id, shipping_address, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and run pending migrations.
    pub async fn connect(database_url: &SecretString, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url.expose_secret())
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self::from_pool(pool))
    }

    /// Wrap an already migrated pool.
    pub fn from_pool(pool: PgPool) -> Self { Self { pool } }
}

fn conflict_on_unique(e: sqlx::Error, what: &str) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(format!("{what} already exists")),
        _ => StoreError::Database(e),
    }
}

fn push_product_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    qb.push(" WHERE is_active = TRUE");
    if let Some(category_id) = filter.category_id {
        qb.push(" AND category_id = ").push_bind(category_id);
    }
    if let Some(min) = filter.min_price {
        qb.push(" AND price >= ").push_bind(min);
    }
    if let Some(max) = filter.max_price {
        qb.push(" AND price <= ").push_bind(max);
    }
    if filter.featured_only {
        qb.push(" AND featured = TRUE");
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", search.replace('%', "\\%").replace('_', "\\_"));
        qb.push(" AND (name ILIKE ").push_bind(pattern.clone());
        qb.push(" OR description ILIKE ").push_bind(pattern.clone());
        qb.push(" OR EXISTS (SELECT 1 FROM unnest(tags) AS tag WHERE tag ILIKE ").push_bind(pattern);
        qb.push("))");
    }
}

fn product_order_by(sort: ProductSort) -> &'static str {
    match sort {
        ProductSort::NewestFirst => " ORDER BY created_at DESC, id DESC",
        ProductSort::OldestFirst => " ORDER BY created_at ASC, id ASC",
        ProductSort::PriceAsc => " ORDER BY price ASC, id ASC",
        ProductSort::PriceDesc => " ORDER BY price DESC, id ASC",
        ProductSort::NameAsc => " ORDER BY name ASC, id ASC",
        ProductSort::NameDesc => " ORDER BY name DESC, id ASC",
    }
}

fn push_order_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
    qb.push(" WHERE TRUE");
    if let Some(user_id) = filter.user_id {
        qb.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
}

fn page_bounds(page: PageRequest) -> (i64, i64) {
    (i64::from(page.limit), i64::try_from(page.offset()).unwrap_or(i64::MAX))
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, role, address, phone, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(user.id).bind(&user.name).bind(&user.email).bind(&user.password_hash).bind(user.role)
        .bind(Json(&user.address)).bind(&user.phone).bind(user.is_active).bind(user.created_at).bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "email"))?;
        Ok(())
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        Ok(sqlx::query_as::<_, User>(&sql).bind(email).fetch_optional(&self.pool).await?)
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE users SET name = $2, role = $3, address = $4, phone = $5, is_active = $6, updated_at = $7 \
             WHERE id = $1",
        )
        .bind(user.id).bind(&user.name).bind(user.role).bind(Json(&user.address)).bind(&user.phone)
        .bind(user.is_active).bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn insert_category(&self, category: &Category) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO categories (id, name, description, image, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(category.id).bind(&category.name).bind(&category.description).bind(&category.image)
        .bind(category.is_active).bind(category.created_at).bind(category.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "category name"))?;
        Ok(())
    }

    async fn category_by_id(&self, id: Uuid) -> Result<Option<Category>, StoreError> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1");
        Ok(sqlx::query_as::<_, Category>(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn category_by_name(&self, name: &str) -> Result<Option<Category>, StoreError> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE LOWER(name) = LOWER($1)");
        Ok(sqlx::query_as::<_, Category>(&sql).bind(name).fetch_optional(&self.pool).await?)
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE is_active = TRUE ORDER BY name ASC");
        Ok(sqlx::query_as::<_, Category>(&sql).fetch_all(&self.pool).await?)
    }

    async fn update_category(&self, category: &Category) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE categories SET name = $2, description = $3, image = $4, is_active = $5, updated_at = $6 \
             WHERE id = $1",
        )
        .bind(category.id).bind(&category.name).bind(&category.description).bind(&category.image)
        .bind(category.is_active).bind(category.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "category name"))?;
        Ok(())
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO products (id, name, description, price, original_price, category_id, images, stock, sku, \
             tags, is_active, featured, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(product.id).bind(&product.name).bind(&product.description).bind(product.price)
        .bind(product.original_price).bind(product.category_id).bind(&product.images).bind(product.stock)
        .bind(&product.sku).bind(&product.tags).bind(product.is_active).bind(product.featured)
        .bind(product.created_at).bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "sku"))?;
        Ok(())
    }

    async fn product_by_id(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        Ok(sqlx::query_as::<_, Product>(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn product_by_sku(&self, sku: &str) -> Result<Option<Product>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = $1");
        Ok(sqlx::query_as::<_, Product>(&sql).bind(sku).fetch_optional(&self.pool).await?)
    }

    async fn products_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Product>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)");
        Ok(sqlx::query_as::<_, Product>(&sql).bind(ids).fetch_all(&self.pool).await?)
    }

    async fn list_products(&self, filter: &ProductFilter, page: PageRequest) -> Result<(Vec<Product>, u64), StoreError> {
        let (limit, offset) = page_bounds(page);

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
        push_product_filter(&mut qb, filter);
        qb.push(product_order_by(filter.sort));
        qb.push(" LIMIT ").push_bind(limit).push(" OFFSET ").push_bind(offset);
        let rows = qb.build_query_as::<Product>().fetch_all(&self.pool).await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
        push_product_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        Ok((rows, u64::try_from(total).unwrap_or(0)))
    }

    async fn update_product(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE products SET name = $2, description = $3, price = $4, original_price = $5, category_id = $6, \
             images = $7, sku = $8, tags = $9, is_active = $10, featured = $11, updated_at = $12 \
             WHERE id = $1",
        )
        .bind(product.id).bind(&product.name).bind(&product.description).bind(product.price)
        .bind(product.original_price).bind(product.category_id).bind(&product.images)
        .bind(&product.sku).bind(&product.tags).bind(product.is_active).bind(product.featured)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "sku"))?;
        Ok(())
    }

    async fn set_stock(&self, id: Uuid, stock: i32) -> Result<(), StoreError> {
        let updated = sqlx::query("UPDATE products SET stock = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(stock.max(0))
            .execute(&self.pool)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::Stale(format!("product {id} does not exist")));
        }
        Ok(())
    }
}

#[async_trait]
impl CartStore for PgStore {
    async fn cart_for_user(&self, user_id: Uuid) -> Result<Option<Cart>, StoreError> {
        let sql = format!("SELECT {CART_COLUMNS} FROM carts WHERE user_id = $1");
        Ok(sqlx::query_as::<_, Cart>(&sql).bind(user_id).fetch_optional(&self.pool).await?)
    }

    async fn save_cart(&self, cart: &Cart) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO carts (id, user_id, items, total_amount, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (user_id) DO UPDATE SET items = EXCLUDED.items, total_amount = EXCLUDED.total_amount, \
             updated_at = EXCLUDED.updated_at",
        )
        .bind(cart.id()).bind(cart.user_id()).bind(Json(cart.items())).bind(cart.total_amount())
        .bind(cart.created_at()).bind(cart.updated_at())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn place_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for item in order.items() {
            let updated = sqlx::query(
                "UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1 AND stock >= $2",
            )
            .bind(item.product_id)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;
            if updated.rows_affected() == 0 {
                let available: Option<i32> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
                    .bind(item.product_id)
                    .fetch_optional(&mut *tx)
                    .await?;
                // dropping `tx` rolls back the decrements already applied
                return Err(StoreError::InsufficientStock { product_id: item.product_id, available: available.unwrap_or(0) });
            }
        }

        sqlx::query(
            "INSERT INTO orders (id, user_id, order_number, items, total_amount, status, payment_status, \
             payment_method, payment_id, shipping_address, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(order.id()).bind(order.user_id()).bind(order.order_number()).bind(Json(order.items()))
        .bind(order.total_amount()).bind(order.status()).bind(order.payment_status()).bind(order.payment_method())
        .bind(order.payment_id()).bind(Json(order.shipping_address())).bind(order.created_at()).bind(order.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "order number"))?;

        let sql = format!("SELECT {CART_COLUMNS} FROM carts WHERE user_id = $1 FOR UPDATE");
        let cart = sqlx::query_as::<_, Cart>(&sql).bind(order.user_id()).fetch_optional(&mut *tx).await?;
        if let Some(mut cart) = cart {
            // lines added after the checkout read stay in the cart
            if cart.prune(|id| !order.contains_product(id)) > 0 {
                sqlx::query("UPDATE carts SET items = $2, total_amount = $3, updated_at = $4 WHERE id = $1")
                    .bind(cart.id())
                    .bind(Json(cart.items()))
                    .bind(cart.total_amount())
                    .bind(cart.updated_at())
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn order_by_id(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        Ok(sqlx::query_as::<_, Order>(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn list_orders(&self, filter: &OrderFilter, page: PageRequest) -> Result<(Vec<Order>, u64), StoreError> {
        let (limit, offset) = page_bounds(page);

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {ORDER_COLUMNS} FROM orders"));
        push_order_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ").push_bind(limit).push(" OFFSET ").push_bind(offset);
        let rows = qb.build_query_as::<Order>().fetch_all(&self.pool).await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders");
        push_order_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        Ok((rows, u64::try_from(total).unwrap_or(0)))
    }

    async fn update_order_status(&self, order: &Order) -> Result<(), StoreError> {
        let updated = sqlx::query(
            "UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1 AND status <> 'cancelled'",
        )
        .bind(order.id()).bind(order.status()).bind(order.updated_at())
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::Stale(format!("order {} is cancelled or missing", order.id())));
        }
        Ok(())
    }

    async fn cancel_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE orders SET status = 'cancelled', updated_at = $2 \
             WHERE id = $1 AND status IN ('pending', 'confirmed')",
        )
        .bind(order.id())
        .bind(order.updated_at())
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::Stale(format!("order {} can no longer be cancelled", order.id())));
        }

        for item in order.items() {
            sqlx::query("UPDATE products SET stock = stock + $2, updated_at = NOW() WHERE id = $1")
                .bind(item.product_id)
                .bind(item.quantity)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

//! Transactional paths of the PostgreSQL store.
//!
//! Each test gets a fresh migrated database from `#[sqlx::test]`. They need
//! `DATABASE_URL` pointing at a server, so they only run with
//! `cargo test -- --ignored`.

use std::collections::HashMap;

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use storefront_commerce::domain::aggregates::{
    Cart, Category, Checkout, NewProduct, Order, PaymentMethod, Product, Role, ShippingAddress, User,
};
use storefront_commerce::domain::value_objects::Sku;
use storefront_commerce::store::{CartStore, CatalogStore, OrderStore, PgStore, StoreError, UserStore};

async fn customer(store: &PgStore) -> User {
    let user = User::register("Jane", format!("jane-{}@shop.test", Uuid::now_v7()), "hash".into(), Role::User);
    store.insert_user(&user).await.unwrap();
    user
}

async fn product(store: &PgStore, category: &Category, name: &str, price: i64, stock: i32) -> Product {
    let product = Product::create(NewProduct {
        name: name.into(),
        description: format!("{name} stored in postgres"),
        price: Decimal::from(price),
        original_price: None,
        category_id: category.id,
        images: vec![],
        stock,
        sku: Sku::new(format!("PG-{name}")).unwrap(),
        tags: vec![],
        featured: false,
    });
    store.insert_product(&product).await.unwrap();
    product
}

fn checkout() -> Checkout {
    Checkout {
        payment_method: PaymentMethod::Cod,
        payment_id: None,
        shipping_address: ShippingAddress {
            name: "Jane Doe".into(),
            street: "12 Park Street".into(),
            city: "Pune".into(),
            state: "MH".into(),
            zip_code: "411001".into(),
            country: "India".into(),
            phone: "9876543210".into(),
        },
    }
}

/// Save a cart holding `lines` and build the order it would place.
async fn order_for(store: &PgStore, user: &User, lines: &[(&Product, i32)]) -> Order {
    let mut cart = Cart::for_user(user.id);
    for (product, quantity) in lines {
        cart.add_item(product, *quantity).unwrap();
    }
    store.save_cart(&cart).await.unwrap();
    let products: HashMap<Uuid, Product> = lines.iter().map(|(p, _)| (p.id, (*p).clone())).collect();
    Order::place(&cart, &products, checkout()).unwrap()
}

async fn stock_of(store: &PgStore, id: Uuid) -> i32 {
    store.product_by_id(id).await.unwrap().unwrap().stock
}

async fn setup(pool: PgPool) -> (PgStore, Category) {
    let store = PgStore::from_pool(pool);
    let category = Category::create("Shoes", None, None);
    store.insert_category(&category).await.unwrap();
    (store, category)
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn test_place_order_rolls_back_on_short_stock(pool: PgPool) {
    let (store, category) = setup(pool).await;
    let user = customer(&store).await;
    let boot = product(&store, &category, "Boot", 50, 5).await;
    let sandal = product(&store, &category, "Sandal", 20, 1).await;
    let order = order_for(&store, &user, &[(&boot, 2), (&sandal, 1)]).await;

    // someone else buys the last sandal between checkout read and placement
    store.set_stock(sandal.id, 0).await.unwrap();

    let err = store.place_order(&order).await.unwrap_err();
    assert!(matches!(err, StoreError::InsufficientStock { product_id, available: 0 } if product_id == sandal.id));
    assert_eq!(stock_of(&store, boot.id).await, 5);
    assert!(store.order_by_id(order.id()).await.unwrap().is_none());
    assert_eq!(store.cart_for_user(user.id).await.unwrap().unwrap().items().len(), 2);
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn test_place_order_keeps_unordered_cart_lines(pool: PgPool) {
    let (store, category) = setup(pool).await;
    let user = customer(&store).await;
    let boot = product(&store, &category, "Boot", 50, 5).await;
    let hat = product(&store, &category, "Hat", 15, 3).await;
    let order = order_for(&store, &user, &[(&boot, 2)]).await;

    let mut cart = store.cart_for_user(user.id).await.unwrap().unwrap();
    cart.add_item(&hat, 1).unwrap();
    store.save_cart(&cart).await.unwrap();

    store.place_order(&order).await.unwrap();
    assert_eq!(stock_of(&store, boot.id).await, 3);
    let cart = store.cart_for_user(user.id).await.unwrap().unwrap();
    assert_eq!(cart.items().len(), 1);
    assert_eq!(cart.items()[0].product_id, hat.id);
    assert_eq!(cart.total_amount(), Decimal::from(15));
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn test_cancel_restores_stock_once(pool: PgPool) {
    let (store, category) = setup(pool).await;
    let user = customer(&store).await;
    let boot = product(&store, &category, "Boot", 50, 5).await;
    let mut order = order_for(&store, &user, &[(&boot, 2)]).await;
    store.place_order(&order).await.unwrap();
    assert_eq!(stock_of(&store, boot.id).await, 3);

    order.cancel().unwrap();
    store.cancel_order(&order).await.unwrap();
    assert_eq!(stock_of(&store, boot.id).await, 5);

    let err = store.cancel_order(&order).await.unwrap_err();
    assert!(matches!(err, StoreError::Stale(_)));
    assert_eq!(stock_of(&store, boot.id).await, 5);
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn test_product_write_leaves_stock_alone(pool: PgPool) {
    let (store, category) = setup(pool).await;
    let user = customer(&store).await;
    let boot = product(&store, &category, "Boot", 50, 5).await;
    let mut snapshot = store.product_by_id(boot.id).await.unwrap().unwrap();

    let order = order_for(&store, &user, &[(&boot, 2)]).await;
    store.place_order(&order).await.unwrap();

    snapshot.name = "Winter Boot".into();
    store.update_product(&snapshot).await.unwrap();
    let stored = store.product_by_id(boot.id).await.unwrap().unwrap();
    assert_eq!(stored.name, "Winter Boot");
    assert_eq!(stored.stock, 3);
}

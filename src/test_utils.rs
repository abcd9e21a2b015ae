//! Shared test utilities for the storefront core.
//!
//! This module provides common helper functions for setting up an in-memory
//! store and creating test documents with sensible defaults.

use crate::{
    core::{
        customer::{self, NewCustomerProfile},
        identity::Identity,
        product::{self, NewProduct},
        view::ViewState,
    },
    entities::{ProductCategory, product as product_entity},
    errors::Result,
    store::Store,
};
use futures::{Stream, StreamExt};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// How long a test waits for the next emission before giving up.
const EMISSION_TIMEOUT: Duration = Duration::from_secs(5);

pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized,
/// wrapped in a [`Store`].
pub async fn setup_test_store() -> Result<Store> {
    init_test_tracing();
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(Store::new(db))
}

/// Creates a customer whose display name is "Test Customer".
pub async fn create_test_customer(store: &Store, customer_id: &str) -> Result<Identity> {
    let identity = Identity::customer(customer_id);
    customer::create_customer(
        store,
        &identity,
        NewCustomerProfile {
            display_name: Some("Test Customer".to_string()),
            email: Some(format!("{customer_id}@example.com")),
        },
    )
    .await?;
    Ok(identity)
}

/// Creates a customer holding the administrator role.
pub async fn create_test_admin(store: &Store, customer_id: &str) -> Result<Identity> {
    let identity = create_test_customer(store, customer_id).await?;
    customer::set_admin(store, customer_id, true).await?;
    Ok(identity)
}

/// Product defaults: title "Product {id}", Protein, price 10.0, 1000 g.
pub fn test_new_product(id: &str) -> NewProduct {
    NewProduct {
        id: id.to_string(),
        title: format!("Product {id}"),
        description: "Test product".to_string(),
        thumbnail: format!("https://cdn.example.com/{id}.png"),
        category: ProductCategory::Protein,
        flavors: vec!["Vanilla".to_string(), "Chocolate".to_string()],
        weight: Some(1000),
        price: 10.0,
        is_popular: false,
        is_discounted: false,
        is_new: false,
    }
}

/// Inserts a product with [`test_new_product`] defaults, bypassing the admin check.
pub async fn create_test_product(store: &Store, id: &str) -> Result<product_entity::Model> {
    product::insert_product(store, test_new_product(id)).await
}

/// Inserts a custom product, bypassing the admin check.
pub async fn create_custom_product(
    store: &Store,
    new_product: NewProduct,
) -> Result<product_entity::Model> {
    product::insert_product(store, new_product).await
}

/// Next item of a stream, or `None` if it ended or stayed silent too long.
pub async fn next_item<S>(stream: &mut S) -> Option<S::Item>
where
    S: Stream + Unpin,
{
    tokio::time::timeout(EMISSION_TIMEOUT, stream.next())
        .await
        .ok()
        .flatten()
}

/// Next non-`Loading` state of a view.
pub async fn next_settled<T, S>(view: &mut S) -> Option<ViewState<T>>
where
    S: Stream<Item = ViewState<T>> + Unpin,
{
    loop {
        match next_item(view).await? {
            ViewState::Loading => {}
            settled => return Some(settled),
        }
    }
}

/// Waits until the view settles on a `Success` satisfying `predicate`.
///
/// Live views may emit intermediate snapshots while a write propagates; this
/// skips them. Returns `None` on timeout, end of stream or an `Error` state.
pub async fn wait_for<T, S, P>(view: &mut S, mut predicate: P) -> Option<T>
where
    S: Stream<Item = ViewState<T>> + Unpin,
    P: FnMut(&T) -> bool,
{
    loop {
        match next_settled(view).await? {
            ViewState::Success(data) if predicate(&data) => return Some(data),
            ViewState::Success(_) => {}
            ViewState::Error(message) => {
                tracing::warn!("View failed while waiting: {}", message);
                return None;
            }
            ViewState::Loading => {}
        }
    }
}

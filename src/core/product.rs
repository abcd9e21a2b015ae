//! Product business logic - catalog reads, admin writes and seeding.
//!
//! Shoppers only ever read products. Creating, editing and deleting require
//! the administrator role; seeding from the catalog file bypasses it and is
//! meant for boot time only.

use crate::{
    core::{
        customer::require_admin,
        identity::Identity,
        resolver::{dedupe_ids, resolve_products},
        view::{Subscription, ViewState, error_message, live_view, single},
    },
    entities::{Flavors, Product, ProductCategory, product},
    errors::{Error, Result},
    store::{Collection, Store},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::Deserialize;
use std::future::Future;
use tracing::{debug, info};

const PRODUCT_CONTEXT: &str = "Error while reading a Product";
const PRODUCTS_CONTEXT: &str = "Error while reading Products";

/// Promotion flags the storefront lists products by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductFlag {
    New,
    Popular,
    Discounted,
}

impl ProductFlag {
    const fn column(self) -> product::Column {
        match self {
            Self::New => product::Column::IsNew,
            Self::Popular => product::Column::IsPopular,
            Self::Discounted => product::Column::IsDiscounted,
        }
    }
}

/// Everything needed to create or overwrite a product.
///
/// Also the shape of one `[[products]]` entry in the catalog file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewProduct {
    /// Catalog id
    pub id: String,
    /// Display title
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub thumbnail: String,
    /// Catalog category
    pub category: ProductCategory,
    #[serde(default)]
    pub flavors: Vec<String>,
    #[serde(default)]
    pub weight: Option<i32>,
    /// List price
    pub price: f64,
    #[serde(default)]
    pub is_popular: bool,
    #[serde(default)]
    pub is_discounted: bool,
    #[serde(default)]
    pub is_new: bool,
}

impl NewProduct {
    /// Rejects blank ids and titles, negative or non-finite prices and non-positive weights.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::Validation {
                message: "Product id cannot be empty".to_string(),
            });
        }

        if self.title.trim().is_empty() {
            return Err(Error::Validation {
                message: "Product title cannot be empty".to_string(),
            });
        }

        if self.price < 0.0 || !self.price.is_finite() {
            return Err(Error::InvalidAmount { amount: self.price });
        }

        if let Some(weight) = self.weight {
            if weight <= 0 {
                return Err(Error::Validation {
                    message: format!("Product weight must be positive, got {weight}"),
                });
            }
        }
        Ok(())
    }

    fn apply_to(self, active: &mut product::ActiveModel) {
        active.title = Set(self.title.trim().to_string());
        active.description = Set(self.description);
        active.thumbnail = Set(self.thumbnail);
        active.category = Set(self.category);
        active.flavors = Set(Flavors(self.flavors));
        active.weight = Set(self.weight);
        active.price = Set(self.price);
        active.is_popular = Set(self.is_popular);
        active.is_discounted = Set(self.is_discounted);
        active.is_new = Set(self.is_new);
    }
}

/// Retrieves a product by id.
pub async fn get_product_by_id(
    db: &DatabaseConnection,
    product_id: &str,
) -> Result<Option<product::Model>> {
    Product::find_by_id(product_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Products in `category`, newest first.
pub async fn get_products_by_category(
    db: &DatabaseConnection,
    category: ProductCategory,
) -> Result<Vec<product::Model>> {
    Product::find()
        .filter(product::Column::Category.eq(category))
        .order_by_desc(product::Column::CreatedAt)
        .order_by_asc(product::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Products carrying `flag`, newest first.
pub async fn get_products_by_flag(
    db: &DatabaseConnection,
    flag: ProductFlag,
) -> Result<Vec<product::Model>> {
    Product::find()
        .filter(flag.column().eq(true))
        .order_by_desc(product::Column::CreatedAt)
        .order_by_asc(product::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Inserts a validated product without any role check.
pub(crate) async fn insert_product(
    store: &Store,
    new_product: NewProduct,
) -> Result<product::Model> {
    new_product.validate()?;

    let id = new_product.id.trim().to_string();
    let mut active = product::ActiveModel {
        id: Set(id.clone()),
        rate: Set(0),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    new_product.apply_to(&mut active);

    let created = active.insert(store.db()).await?;
    store.publish(Collection::Products, &id);
    Ok(created)
}

/// Adds a product to the catalog. Administrators only.
pub async fn create_product(
    store: &Store,
    identity: &Identity,
    new_product: NewProduct,
) -> Result<product::Model> {
    let admin_id = require_admin(store, identity).await?;
    let created = insert_product(store, new_product).await?;
    info!("Admin {} created product {}", admin_id, created.id);
    Ok(created)
}

/// Overwrites the product with the same id. Administrators only.
///
/// Rating and creation time are kept.
pub async fn update_product(
    store: &Store,
    identity: &Identity,
    product: NewProduct,
) -> Result<product::Model> {
    let admin_id = require_admin(store, identity).await?;
    product.validate()?;

    let mut active: product::ActiveModel = Product::find_by_id(product.id.trim())
        .one(store.db())
        .await?
        .ok_or_else(|| Error::ProductNotFound {
            id: product.id.clone(),
        })?
        .into();
    product.apply_to(&mut active);

    let updated = active.update(store.db()).await?;
    info!("Admin {} updated product {}", admin_id, updated.id);
    store.publish(Collection::Products, &updated.id);
    Ok(updated)
}

/// Removes a product from the catalog. Administrators only.
///
/// Carts and orders keep referencing the id; views render such lines with
/// placeholder details.
pub async fn delete_product(store: &Store, identity: &Identity, product_id: &str) -> Result<()> {
    let admin_id = require_admin(store, identity).await?;

    let result = Product::delete_by_id(product_id).exec(store.db()).await?;
    if result.rows_affected == 0 {
        return Err(Error::ProductNotFound {
            id: product_id.to_string(),
        });
    }

    info!("Admin {} deleted product {}", admin_id, product_id);
    store.publish(Collection::Products, product_id);
    Ok(())
}

/// Inserts every catalog entry whose id is not in the database yet.
///
/// Existing products are left untouched, so edits made through the admin
/// operations survive a restart. Returns the number of products inserted.
pub async fn seed_catalog(store: &Store, products: &[NewProduct]) -> Result<usize> {
    let mut inserted = 0;
    for new_product in products {
        if get_product_by_id(store.db(), new_product.id.trim())
            .await?
            .is_some()
        {
            debug!("Product {} already exists, skipping", new_product.id);
            continue;
        }
        insert_product(store, new_product.clone()).await?;
        inserted += 1;
    }
    info!(
        "Seeded {} of {} catalog products",
        inserted,
        products.len()
    );
    Ok(inserted)
}

fn products_view<F, Fut>(store: &Store, query: F) -> Subscription<ViewState<Vec<product::Model>>>
where
    F: Fn(DatabaseConnection) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Vec<product::Model>>> + Send + 'static,
{
    live_view(store.watch(&[Collection::Products], query), |snapshot| {
        single(ViewState::from_result(PRODUCTS_CONTEXT, snapshot))
    })
}

/// Live view of a single product.
#[must_use]
pub fn product_by_id_flow(store: &Store, product_id: &str) -> Subscription<ViewState<product::Model>> {
    let product_id = product_id.to_string();
    let snapshots = store.watch(&[Collection::Products], move |db| {
        let product_id = product_id.clone();
        async move { get_product_by_id(&db, &product_id).await }
    });

    live_view(snapshots, |snapshot| {
        let state = match snapshot {
            Ok(Some(product)) => ViewState::Success(product),
            Ok(None) => ViewState::Error("Queried product does not exist.".to_string()),
            Err(e) => ViewState::Error(error_message(PRODUCT_CONTEXT, &e)),
        };
        single(state)
    })
}

/// Live view of the products with the given ids, resolved in batches.
///
/// Ids that match no product are left out.
#[must_use]
pub fn products_by_ids_flow(
    store: &Store,
    ids: Vec<String>,
) -> Subscription<ViewState<Vec<product::Model>>> {
    let ids = dedupe_ids(ids);
    let batch_size = store.batch_size();
    products_view(store, move |db| {
        let ids = ids.clone();
        async move { resolve_products(&db, &ids, batch_size).await }
    })
}

/// Live view of a category, newest first.
#[must_use]
pub fn products_by_category_flow(
    store: &Store,
    category: ProductCategory,
) -> Subscription<ViewState<Vec<product::Model>>> {
    products_view(store, move |db| async move {
        get_products_by_category(&db, category).await
    })
}

/// Live view of the products carrying a promotion flag, newest first.
#[must_use]
pub fn products_by_flag_flow(
    store: &Store,
    flag: ProductFlag,
) -> Subscription<ViewState<Vec<product::Model>>> {
    products_view(store, move |db| async move { get_products_by_flag(&db, flag).await })
}

//! Favorite business logic - the favorite toggle and the favorites views.
//!
//! A favorite row is keyed by [`favorite_key`]; its presence alone means the
//! product is favorited.

use crate::{
    core::{
        identity::Identity,
        resolver::{dedupe_ids, resolve_products, resolve_products_incrementally},
        view::{Subscription, ViewState, error_message, failed_view, live_view, single, switch_latest},
    },
    entities::{Favorite, favorite, product},
    errors::Result,
    store::{Collection, Store},
};
use futures::{StreamExt, stream::BoxStream};
use sea_orm::{QueryOrder, QuerySelect, Set, prelude::*};
use tracing::{debug, instrument};

const FAVORITES_CONTEXT: &str = "Error while reading favorites";

/// Document key of `customer_id`'s favorite on `product_id`.
///
/// Plain concatenation: `u1` and `p9` give `u1p9`.
#[must_use]
pub fn favorite_key(customer_id: &str, product_id: &str) -> String {
    format!("{customer_id}{product_id}")
}

/// Whether the signed-in customer has favorited `product_id`.
pub async fn is_favorite(store: &Store, identity: &Identity, product_id: &str) -> Result<bool> {
    let customer_id = identity.customer_id()?;
    Ok(Favorite::find_by_id(favorite_key(customer_id, product_id))
        .one(store.db())
        .await?
        .is_some())
}

/// Adds the product to the signed-in customer's favorites, or removes it if present.
///
/// Returns `true` when the product is favorited afterwards. As with likes,
/// check and write are separate statements.
#[instrument(skip(store))]
pub async fn toggle_favorite(store: &Store, identity: &Identity, product_id: &str) -> Result<bool> {
    let customer_id = identity.customer_id()?;
    let key = favorite_key(customer_id, product_id);

    let favorited = if Favorite::find_by_id(key.clone())
        .one(store.db())
        .await?
        .is_some()
    {
        Favorite::delete_by_id(key.clone()).exec(store.db()).await?;
        false
    } else {
        favorite::ActiveModel {
            id: Set(key.clone()),
            customer_id: Set(customer_id.to_string()),
            product_id: Set(product_id.to_string()),
            created_at: Set(chrono::Utc::now()),
        }
        .insert(store.db())
        .await?;
        true
    };

    debug!("Favorite {} is now {}", key, favorited);
    store.publish(Collection::Favorites, key);
    Ok(favorited)
}

async fn favorite_exists(db: &DatabaseConnection, key: &str) -> Result<bool> {
    Ok(Favorite::find_by_id(key).one(db).await?.is_some())
}

/// Favorited product ids of a customer, most recent first.
pub async fn get_favorite_product_ids(
    db: &DatabaseConnection,
    customer_id: &str,
) -> Result<Vec<String>> {
    let ids: Vec<String> = Favorite::find()
        .select_only()
        .column(favorite::Column::ProductId)
        .filter(favorite::Column::CustomerId.eq(customer_id))
        .order_by_desc(favorite::Column::CreatedAt)
        .order_by_asc(favorite::Column::Id)
        .into_tuple()
        .all(db)
        .await?;
    Ok(dedupe_ids(ids))
}

/// Live list of the signed-in customer's favorite products.
///
/// For each new set of favorites the products arrive batch by batch, each
/// emission holding everything resolved so far. Catalog edits re-resolve the
/// current set and emit once, without the partial steps.
#[must_use]
pub fn favorites_flow(
    store: &Store,
    identity: &Identity,
) -> Subscription<ViewState<Vec<product::Model>>> {
    let customer_id = match identity.customer_id() {
        Ok(id) => id.to_string(),
        Err(e) => return failed_view(FAVORITES_CONTEXT, &e),
    };

    let favorite_ids = store.watch(&[Collection::Favorites], move |db| {
        let customer_id = customer_id.clone();
        async move { get_favorite_product_ids(&db, &customer_id).await }
    });

    let store = store.clone();
    live_view(
        favorite_ids,
        move |snapshot| -> BoxStream<'static, ViewState<Vec<product::Model>>> {
            let ids = match snapshot {
                Ok(ids) => ids,
                Err(e) => return single(ViewState::Error(error_message(FAVORITES_CONTEXT, &e))),
            };
            if ids.is_empty() {
                return single(ViewState::Success(Vec::new()));
            }

            let db = store.db().clone();
            let batch_size = store.batch_size();
            let catalog_ticks = store.changes(&[Collection::Products]).enumerate();
            switch_latest(catalog_ticks, move |(tick, ())| {
                let to_state =
                    |products: Result<Vec<product::Model>>| ViewState::from_result(FAVORITES_CONTEXT, products);
                if tick == 0 {
                    resolve_products_incrementally(db.clone(), ids.clone(), batch_size)
                        .map(to_state)
                        .boxed()
                } else {
                    let db = db.clone();
                    let ids = ids.clone();
                    futures::stream::once(async move {
                        to_state(resolve_products(&db, &ids, batch_size).await)
                    })
                    .boxed()
                }
            })
            .boxed()
        },
    )
}

/// Live favorite flag of one product for the signed-in customer.
#[must_use]
pub fn is_favorite_flow(
    store: &Store,
    identity: &Identity,
    product_id: &str,
) -> Subscription<ViewState<bool>> {
    let key = match identity.customer_id() {
        Ok(customer_id) => favorite_key(customer_id, product_id),
        Err(e) => return failed_view(FAVORITES_CONTEXT, &e),
    };

    let snapshots = store.watch(&[Collection::Favorites], move |db| {
        let key = key.clone();
        async move { favorite_exists(&db, &key).await }
    });

    live_view(snapshots, |snapshot| {
        single(ViewState::from_result(FAVORITES_CONTEXT, snapshot))
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_favorite_key_is_plain_concatenation() {
        assert_eq!(favorite_key("u1", "p9"), "u1p9");
    }

    #[tokio::test]
    async fn test_toggle_favorite_is_idempotent_in_pairs() -> Result<()> {
        let store = setup_test_store().await?;
        let identity = create_test_customer(&store, "u1").await?;

        assert!(toggle_favorite(&store, &identity, "p9").await?);
        let row = Favorite::find_by_id("u1p9".to_string())
            .one(store.db())
            .await?
            .unwrap();
        assert_eq!(row.customer_id, "u1");
        assert_eq!(row.product_id, "p9");
        assert!(is_favorite(&store, &identity, "p9").await?);

        assert!(!toggle_favorite(&store, &identity, "p9").await?);
        assert!(Favorite::find().all(store.db()).await?.is_empty());
        assert!(!is_favorite(&store, &identity, "p9").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_toggle_favorite_requires_identity() -> Result<()> {
        let store = setup_test_store().await?;
        let result = toggle_favorite(&store, &Identity::anonymous(), "p9").await;
        assert!(matches!(result, Err(crate::errors::Error::NotAuthenticated)));
        Ok(())
    }

    #[tokio::test]
    async fn test_is_favorite_flow_follows_toggles() -> Result<()> {
        let store = setup_test_store().await?;
        let identity = create_test_customer(&store, "u1").await?;

        let mut view = is_favorite_flow(&store, &identity, "p1");
        assert_eq!(next_item(&mut view).await, Some(ViewState::Loading));
        assert_eq!(next_item(&mut view).await, Some(ViewState::Success(false)));

        toggle_favorite(&store, &identity, "p1").await?;
        assert_eq!(next_item(&mut view).await, Some(ViewState::Success(true)));
        Ok(())
    }

    #[tokio::test]
    async fn test_favorites_flow_emits_growing_batches() -> Result<()> {
        let store = setup_test_store().await?.with_batch_size(10);
        let identity = create_test_customer(&store, "u1").await?;
        for i in 0..25 {
            let id = format!("p{i:02}");
            create_test_product(&store, &id).await?;
            toggle_favorite(&store, &identity, &id).await?;
        }

        let mut view = favorites_flow(&store, &identity);
        assert_eq!(next_item(&mut view).await, Some(ViewState::Loading));
        let mut lengths = Vec::new();
        while lengths.last() != Some(&25) {
            let products = next_item(&mut view).await.unwrap().success().unwrap();
            lengths.push(products.len());
        }
        assert_eq!(lengths, vec![10, 20, 25]);
        Ok(())
    }

    #[tokio::test]
    async fn test_favorites_flow_skips_missing_products() -> Result<()> {
        let store = setup_test_store().await?;
        let identity = create_test_customer(&store, "u1").await?;
        create_test_product(&store, "p1").await?;
        toggle_favorite(&store, &identity, "p1").await?;
        toggle_favorite(&store, &identity, "gone").await?;

        let mut view = favorites_flow(&store, &identity);
        let products = wait_for(&mut view, |_| true).await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].id, "p1");

        toggle_favorite(&store, &identity, "p1").await?;
        let emptied = wait_for(&mut view, Vec::is_empty).await;
        assert!(emptied.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_favorites_flow_without_identity() -> Result<()> {
        let store = setup_test_store().await?;
        let mut view = favorites_flow(&store, &Identity::anonymous());
        let state = next_settled(&mut view).await.unwrap();
        assert_eq!(
            state.error_message(),
            Some("Error while reading favorites: User is not available.")
        );
        Ok(())
    }
}

//! Comment business logic - reviews, the like toggle and the comment views.
//!
//! A like is a row keyed by [`like_key`], so one customer can like a comment
//! at most once. The comment's `thumb_up_count` is a denormalized counter
//! kept in step by [`toggle_like`]; it is never recomputed from like rows.

use crate::{
    core::{
        identity::Identity,
        resolver::{dedupe_ids, resolve_in_batches, resolve_products},
        view::{Subscription, ViewState, failed_view, live_view, single},
    },
    entities::{Comment, CommentLike, Customer, comment, comment_like, customer},
    errors::{Error, Result},
    store::{Collection, Store},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use std::collections::HashMap;
use tracing::{debug, info, instrument};

const COMMENTS_CONTEXT: &str = "Error while reading comments";

/// Shown for products that no longer exist.
pub const UNKNOWN_PRODUCT: &str = "Unknown";

/// Document key of the like `customer_id` gave `comment_id`.
#[must_use]
pub fn like_key(comment_id: &str, customer_id: &str) -> String {
    format!("{comment_id}_{customer_id}")
}

/// Result of [`toggle_like`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeToggle {
    /// Whether the caller likes the comment now
    pub liked: bool,
    /// Counter after the toggle
    pub thumb_up_count: i32,
}

/// One review to write, see [`create_comments`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub product_id: String,
    pub order_id: String,
    /// 1 to 5, or 0 for no rating
    pub rate: i32,
    pub description: Option<String>,
}

/// A comment as listed on a product page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentItem {
    pub id: String,
    pub product_id: String,
    /// Author email, empty when the author is gone
    pub customer_account: String,
    pub content: String,
    pub rating: i32,
    pub likes: i32,
    pub created_at: DateTime<Utc>,
}

/// Product summary attached to comments listed for an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductInfo {
    pub id: String,
    pub name: String,
    pub thumbnail: String,
}

/// A comment as listed on an order page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentView {
    pub id: String,
    pub customer_id: String,
    pub product: ProductInfo,
    pub order_id: String,
    pub rate: i32,
    pub thumb_up_count: i32,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Orderings offered for a product's comments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommentSort {
    /// Newest first
    #[default]
    Newest,
    /// Best rated first
    RatingHigh,
    /// Worst rated first
    RatingLow,
    /// Only comments with text, newest first
    HasContent,
}

/// Reorders (and for [`CommentSort::HasContent`], filters) `items`.
#[must_use]
pub fn sort_comments(mut items: Vec<CommentItem>, sort: CommentSort) -> Vec<CommentItem> {
    match sort {
        CommentSort::Newest => items.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        CommentSort::RatingHigh => items.sort_by(|a, b| b.rating.cmp(&a.rating)),
        CommentSort::RatingLow => items.sort_by_key(|item| item.rating),
        CommentSort::HasContent => {
            items.retain(|item| !item.content.trim().is_empty());
            items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
    }
    items
}

/// Mean of the non-zero ratings rounded to one decimal, 0 when nothing is rated.
#[must_use]
pub fn average_rating(items: &[CommentItem]) -> f64 {
    let rated: Vec<f64> = items
        .iter()
        .filter(|item| item.rating > 0)
        .map(|item| f64::from(item.rating))
        .collect();
    if rated.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = rated.iter().sum::<f64>() / rated.len() as f64;
    (mean * 10.0).round() / 10.0
}

fn check_rate(rate: i32) -> Result<()> {
    if (0..=5).contains(&rate) {
        Ok(())
    } else {
        Err(Error::InvalidRating { rate })
    }
}

async fn find_comment(db: &DatabaseConnection, comment_id: &str) -> Result<comment::Model> {
    Comment::find_by_id(comment_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::CommentNotFound {
            id: comment_id.to_string(),
        })
}

/// Writes several reviews at once, typically one per product of an order.
///
/// All rates are checked before anything is written; the inserts share one
/// transaction.
#[instrument(skip(store, comments), fields(count = comments.len()))]
pub async fn create_comments(
    store: &Store,
    identity: &Identity,
    comments: Vec<NewComment>,
) -> Result<Vec<comment::Model>> {
    let customer_id = identity.customer_id()?;
    for new_comment in &comments {
        check_rate(new_comment.rate)?;
    }

    let now = Utc::now();
    let txn = store.db().begin().await?;
    let mut created = Vec::with_capacity(comments.len());
    for new_comment in comments {
        let model = comment::ActiveModel {
            id: Set(uuid::Uuid::new_v4().simple().to_string()),
            customer_id: Set(customer_id.to_string()),
            product_id: Set(new_comment.product_id),
            order_id: Set(new_comment.order_id),
            rate: Set(new_comment.rate),
            thumb_up_count: Set(0),
            description: Set(new_comment.description),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
        created.push(model);
    }
    txn.commit().await?;

    info!("Customer {} wrote {} comments", customer_id, created.len());
    for model in &created {
        store.publish(Collection::Comments, &model.id);
    }
    Ok(created)
}

/// Edits the rating and text of one of the signed-in customer's comments.
#[instrument(skip(store, description))]
pub async fn update_comment(
    store: &Store,
    identity: &Identity,
    comment_id: &str,
    rate: i32,
    description: Option<String>,
) -> Result<comment::Model> {
    let customer_id = identity.customer_id()?;
    check_rate(rate)?;

    let existing = find_comment(store.db(), comment_id).await?;
    if existing.customer_id != customer_id {
        debug!("Comment {} is not written by {}", comment_id, customer_id);
        return Err(Error::CommentNotFound {
            id: comment_id.to_string(),
        });
    }

    let mut active: comment::ActiveModel = existing.into();
    active.rate = Set(rate);
    active.description = Set(description);
    active.updated_at = Set(Utc::now());
    let updated = active.update(store.db()).await?;

    store.publish(Collection::Comments, comment_id);
    Ok(updated)
}

/// Whether the signed-in customer likes `comment_id`.
pub async fn has_liked(store: &Store, identity: &Identity, comment_id: &str) -> Result<bool> {
    let customer_id = identity.customer_id()?;
    Ok(CommentLike::find_by_id(like_key(comment_id, customer_id))
        .one(store.db())
        .await?
        .is_some())
}

/// Likes the comment, or takes the like back if it is already there.
///
/// The counter moves by one in the matching direction and never drops below
/// zero. Check and write are separate statements; two concurrent toggles by
/// the same customer can both observe the same state.
#[instrument(skip(store))]
pub async fn toggle_like(store: &Store, identity: &Identity, comment_id: &str) -> Result<LikeToggle> {
    let customer_id = identity.customer_id()?;
    let target = find_comment(store.db(), comment_id).await?;

    let key = like_key(comment_id, customer_id);
    let existing = CommentLike::find_by_id(key.clone()).one(store.db()).await?;

    let (liked, thumb_up_count) = if existing.is_some() {
        CommentLike::delete_by_id(key.clone()).exec(store.db()).await?;
        (false, (target.thumb_up_count - 1).max(0))
    } else {
        comment_like::ActiveModel {
            id: Set(key.clone()),
            comment_id: Set(comment_id.to_string()),
            customer_id: Set(customer_id.to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(store.db())
        .await?;
        (true, target.thumb_up_count.saturating_add(1))
    };

    let mut active: comment::ActiveModel = target.into();
    active.thumb_up_count = Set(thumb_up_count);
    active.updated_at = Set(Utc::now());
    active.update(store.db()).await?;

    debug!(
        "Customer {} {} comment {} ({} likes)",
        customer_id,
        if liked { "liked" } else { "unliked" },
        comment_id,
        thumb_up_count
    );
    store.publish(Collection::CommentLikes, key);
    store.publish(Collection::Comments, comment_id);
    Ok(LikeToggle {
        liked,
        thumb_up_count,
    })
}

async fn read_comments_by_product(
    db: &DatabaseConnection,
    product_id: &str,
    batch_size: usize,
) -> Result<Vec<CommentItem>> {
    let comments = Comment::find()
        .filter(comment::Column::ProductId.eq(product_id))
        .order_by_desc(comment::Column::CreatedAt)
        .order_by_asc(comment::Column::Id)
        .all(db)
        .await?;
    if comments.is_empty() {
        return Ok(Vec::new());
    }

    let author_ids = dedupe_ids(comments.iter().map(|c| c.customer_id.clone()));
    let authors =
        resolve_in_batches::<Customer, _>(db, customer::Column::Id, &author_ids, batch_size)
            .await?;
    let emails: HashMap<String, String> = authors
        .into_iter()
        .map(|author| (author.id, author.email))
        .collect();

    Ok(comments
        .into_iter()
        .map(|c| CommentItem {
            customer_account: emails.get(&c.customer_id).cloned().unwrap_or_default(),
            content: c.description.unwrap_or_default(),
            id: c.id,
            product_id: c.product_id,
            rating: c.rate,
            likes: c.thumb_up_count,
            created_at: c.created_at,
        })
        .collect())
}

async fn read_comments_by_order(
    db: &DatabaseConnection,
    order_id: &str,
    batch_size: usize,
) -> Result<Vec<CommentView>> {
    let comments = Comment::find()
        .filter(comment::Column::OrderId.eq(order_id))
        .order_by_asc(comment::Column::CreatedAt)
        .order_by_asc(comment::Column::Id)
        .all(db)
        .await?;
    if comments.is_empty() {
        return Ok(Vec::new());
    }

    let product_ids = dedupe_ids(comments.iter().map(|c| c.product_id.clone()));
    let products: HashMap<String, ProductInfo> = resolve_products(db, &product_ids, batch_size)
        .await?
        .into_iter()
        .map(|p| {
            (
                p.id.clone(),
                ProductInfo {
                    id: p.id,
                    name: p.title,
                    thumbnail: p.thumbnail,
                },
            )
        })
        .collect();

    Ok(comments
        .into_iter()
        .map(|c| CommentView {
            product: products
                .get(&c.product_id)
                .cloned()
                .unwrap_or_else(|| ProductInfo {
                    id: c.product_id.clone(),
                    name: UNKNOWN_PRODUCT.to_string(),
                    thumbnail: String::new(),
                }),
            id: c.id,
            customer_id: c.customer_id,
            order_id: c.order_id,
            rate: c.rate,
            thumb_up_count: c.thumb_up_count,
            description: c.description,
            created_at: c.created_at,
            updated_at: c.updated_at,
        })
        .collect())
}

/// Live list of a product's comments with author emails, newest first.
#[must_use]
pub fn comments_by_product_flow(
    store: &Store,
    identity: &Identity,
    product_id: &str,
) -> Subscription<ViewState<Vec<CommentItem>>> {
    if let Err(e) = identity.customer_id() {
        return failed_view(COMMENTS_CONTEXT, &e);
    }

    let product_id = product_id.to_string();
    let batch_size = store.batch_size();
    let snapshots = store.watch(&[Collection::Comments, Collection::Customers], move |db| {
        let product_id = product_id.clone();
        async move { read_comments_by_product(&db, &product_id, batch_size).await }
    });

    live_view(snapshots, |snapshot| {
        single(ViewState::from_result(COMMENTS_CONTEXT, snapshot))
    })
}

/// Live list of the comments written for an order, with product summaries.
#[must_use]
pub fn comments_by_order_flow(
    store: &Store,
    identity: &Identity,
    order_id: &str,
) -> Subscription<ViewState<Vec<CommentView>>> {
    if let Err(e) = identity.customer_id() {
        return failed_view(COMMENTS_CONTEXT, &e);
    }

    let order_id = order_id.to_string();
    let batch_size = store.batch_size();
    let snapshots = store.watch(&[Collection::Comments, Collection::Products], move |db| {
        let order_id = order_id.clone();
        async move { read_comments_by_order(&db, &order_id, batch_size).await }
    });

    live_view(snapshots, |snapshot| {
        single(ViewState::from_result(COMMENTS_CONTEXT, snapshot))
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;
    use chrono::Duration;

    fn review(product_id: &str, rate: i32) -> NewComment {
        NewComment {
            product_id: product_id.to_string(),
            order_id: "o1".to_string(),
            rate,
            description: Some(format!("Rated {rate}")),
        }
    }

    fn item(id: &str, rating: i32, content: &str, age_minutes: i64) -> CommentItem {
        CommentItem {
            id: id.to_string(),
            product_id: "p1".to_string(),
            customer_account: String::new(),
            content: content.to_string(),
            rating,
            likes: 0,
            created_at: Utc::now() - Duration::minutes(age_minutes),
        }
    }

    #[test]
    fn test_like_key_format() {
        assert_eq!(like_key("c1", "u1"), "c1_u1");
    }

    #[test]
    fn test_sort_comments() {
        let items = vec![item("old", 5, "", 30), item("new", 1, "text", 1), item("mid", 3, "ok", 10)];

        let ids = |items: Vec<CommentItem>| items.into_iter().map(|i| i.id).collect::<Vec<_>>();
        assert_eq!(ids(sort_comments(items.clone(), CommentSort::Newest)), ["new", "mid", "old"]);
        assert_eq!(ids(sort_comments(items.clone(), CommentSort::RatingHigh)), ["old", "mid", "new"]);
        assert_eq!(ids(sort_comments(items.clone(), CommentSort::RatingLow)), ["new", "mid", "old"]);
        assert_eq!(ids(sort_comments(items, CommentSort::HasContent)), ["new", "mid"]);
    }

    #[test]
    fn test_average_rating_ignores_unrated() {
        assert_eq!(average_rating(&[]), 0.0);
        assert_eq!(average_rating(&[item("a", 0, "", 1)]), 0.0);
        let items = [item("a", 5, "", 1), item("b", 4, "", 1), item("c", 4, "", 1), item("d", 0, "", 1)];
        assert_eq!(average_rating(&items), 4.3);
    }

    #[tokio::test]
    async fn test_create_comments_validates_all_before_writing() -> Result<()> {
        let store = setup_test_store().await?;
        let identity = create_test_customer(&store, "u1").await?;

        let result = create_comments(&store, &identity, vec![review("p1", 4), review("p2", 6)]).await;
        assert!(matches!(result, Err(Error::InvalidRating { rate: 6 })));
        assert!(Comment::find().all(store.db()).await?.is_empty());

        let created = create_comments(&store, &identity, vec![review("p1", 4), review("p2", 0)]).await?;
        assert_eq!(created.len(), 2);
        assert!(created.iter().all(|c| c.thumb_up_count == 0));
        Ok(())
    }

    #[tokio::test]
    async fn test_toggle_like_is_idempotent_in_pairs() -> Result<()> {
        let store = setup_test_store().await?;
        let author = create_test_customer(&store, "author").await?;
        let reader = create_test_customer(&store, "u1").await?;
        let comment_id = create_comments(&store, &author, vec![review("p1", 5)]).await?[0]
            .id
            .clone();

        let liked = toggle_like(&store, &reader, &comment_id).await?;
        assert_eq!(liked, LikeToggle { liked: true, thumb_up_count: 1 });
        assert!(has_liked(&store, &reader, &comment_id).await?);
        assert!(
            CommentLike::find_by_id(like_key(&comment_id, "u1"))
                .one(store.db())
                .await?
                .is_some()
        );

        let unliked = toggle_like(&store, &reader, &comment_id).await?;
        assert_eq!(unliked, LikeToggle { liked: false, thumb_up_count: 0 });
        assert!(!has_liked(&store, &reader, &comment_id).await?);
        assert!(CommentLike::find().all(store.db()).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_unlike_never_drops_counter_below_zero() -> Result<()> {
        let store = setup_test_store().await?;
        let author = create_test_customer(&store, "author").await?;
        let reader = create_test_customer(&store, "u1").await?;
        let comment_id = create_comments(&store, &author, vec![review("p1", 5)]).await?[0]
            .id
            .clone();

        toggle_like(&store, &reader, &comment_id).await?;
        // Counter drifted to zero while the like row still exists.
        let mut drifted: comment::ActiveModel = find_comment(store.db(), &comment_id).await?.into();
        drifted.thumb_up_count = Set(0);
        drifted.update(store.db()).await?;

        let outcome = toggle_like(&store, &reader, &comment_id).await?;
        assert_eq!(outcome.thumb_up_count, 0);
        assert_eq!(find_comment(store.db(), &comment_id).await?.thumb_up_count, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_toggle_like_on_missing_comment_writes_nothing() -> Result<()> {
        let store = setup_test_store().await?;
        let reader = create_test_customer(&store, "u1").await?;

        let result = toggle_like(&store, &reader, "ghost").await;
        assert!(matches!(result, Err(Error::CommentNotFound { .. })));
        assert!(CommentLike::find().all(store.db()).await?.is_empty());

        let anonymous = toggle_like(&store, &Identity::anonymous(), "ghost").await;
        assert!(matches!(anonymous, Err(Error::NotAuthenticated)));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_comment_only_by_author() -> Result<()> {
        let store = setup_test_store().await?;
        let author = create_test_customer(&store, "author").await?;
        let other = create_test_customer(&store, "u1").await?;
        let original = create_comments(&store, &author, vec![review("p1", 2)]).await?.remove(0);

        let edited = update_comment(&store, &author, &original.id, 5, Some("Better".to_string())).await?;
        assert_eq!(edited.rate, 5);
        assert_eq!(edited.description.as_deref(), Some("Better"));
        assert!(edited.updated_at >= original.updated_at);

        assert!(matches!(
            update_comment(&store, &other, &original.id, 1, None).await,
            Err(Error::CommentNotFound { .. })
        ));
        assert!(matches!(
            update_comment(&store, &author, &original.id, -1, None).await,
            Err(Error::InvalidRating { rate: -1 })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_comments_by_product_flow_resolves_author_emails() -> Result<()> {
        let store = setup_test_store().await?;
        let author = create_test_customer(&store, "author").await?;
        let reader = create_test_customer(&store, "u1").await?;
        create_comments(&store, &author, vec![review("p1", 4), review("p2", 3)]).await?;

        let mut view = comments_by_product_flow(&store, &reader, "p1");
        let items = wait_for(&mut view, |_| true).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].customer_account, "author@example.com");
        assert_eq!(items[0].content, "Rated 4");

        let comment_id = items[0].id.clone();
        toggle_like(&store, &reader, &comment_id).await?;
        let liked = wait_for(&mut view, |items| items[0].likes == 1).await;
        assert!(liked.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_comments_by_order_flow_uses_product_fallback() -> Result<()> {
        let store = setup_test_store().await?;
        let identity = create_test_customer(&store, "u1").await?;
        create_test_product(&store, "p1").await?;
        create_comments(&store, &identity, vec![review("p1", 4), review("gone", 2)]).await?;

        let mut view = comments_by_order_flow(&store, &identity, "o1");
        let views = wait_for(&mut view, |views| views.len() == 2).await.unwrap();
        let known = views.iter().find(|v| v.product.id == "p1").unwrap();
        assert_eq!(known.product.name, "Product p1");
        let orphan = views.iter().find(|v| v.product.id == "gone").unwrap();
        assert_eq!(orphan.product.name, UNKNOWN_PRODUCT);
        assert_eq!(orphan.product.thumbnail, "");

        let mut anonymous = comments_by_order_flow(&store, &Identity::anonymous(), "o1");
        let state = next_settled(&mut anonymous).await.unwrap();
        assert_eq!(
            state.error_message(),
            Some("Error while reading comments: User is not available.")
        );
        Ok(())
    }
}

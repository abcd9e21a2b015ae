//! Batched reference resolution.
//!
//! `IN` lookups are capped at a fixed number of keys, so long id lists are
//! split into consecutive chunks, queried one chunk at a time and merged.
//! Ids with no matching row are dropped; callers render a placeholder.

use crate::{
    core::view::Subscription,
    entities::{Product, product},
    errors::Result,
    store::{Collection, Store},
};
use futures::{Stream, stream};
use sea_orm::{ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::collections::HashSet;
use tracing::{debug, trace};

/// Maximum number of keys per `IN` lookup.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Removes duplicate ids, keeping first occurrences in order.
pub fn dedupe_ids<I>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

/// Fetches every row of `E` whose `column` is one of `ids`, `batch_size` keys per query.
///
/// An empty `ids` returns immediately without touching the database. A zero
/// `batch_size` is treated as 1.
pub async fn resolve_in_batches<E, C>(
    db: &C,
    column: E::Column,
    ids: &[String],
    batch_size: usize,
) -> Result<Vec<E::Model>>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    if ids.is_empty() {
        trace!("No ids to resolve");
        return Ok(Vec::new());
    }

    let mut resolved = Vec::with_capacity(ids.len());
    for (index, chunk) in ids.chunks(batch_size.max(1)).enumerate() {
        let rows = E::find()
            .filter(column.is_in(chunk.iter().cloned()))
            .all(db)
            .await?;
        trace!(
            "Batch {} resolved {} of {} ids",
            index,
            rows.len(),
            chunk.len()
        );
        resolved.extend(rows);
    }
    debug!("Resolved {} of {} ids", resolved.len(), ids.len());
    Ok(resolved)
}

/// Resolves product ids in batches.
pub async fn resolve_products<C>(
    db: &C,
    ids: &[String],
    batch_size: usize,
) -> Result<Vec<product::Model>>
where
    C: ConnectionTrait,
{
    resolve_in_batches::<Product, _>(db, product::Column::Id, ids, batch_size).await
}

/// Resolves product ids batch by batch, yielding everything resolved so far
/// after each batch.
///
/// Lengths of successive items never decrease and the last item covers every
/// id that exists. The stream ends after the first error.
pub fn resolve_products_incrementally(
    db: DatabaseConnection,
    ids: Vec<String>,
    batch_size: usize,
) -> impl Stream<Item = Result<Vec<product::Model>>> + Send {
    let chunks: Vec<Vec<String>> = ids
        .chunks(batch_size.max(1))
        .map(<[String]>::to_vec)
        .collect();

    stream::unfold(
        (db, chunks.into_iter(), Vec::new(), false),
        |(db, mut chunks, mut resolved, failed)| async move {
            if failed {
                return None;
            }
            let chunk = chunks.next()?;
            match resolve_products(&db, &chunk, chunk.len()).await {
                Ok(rows) => {
                    resolved.extend(rows);
                    Some((Ok(resolved.clone()), (db, chunks, resolved, false)))
                }
                Err(e) => Some((Err(e), (db, chunks, resolved, true))),
            }
        },
    )
}

/// Live lookup of `ids` that re-resolves whenever the catalog changes.
pub fn watch_products(store: &Store, ids: Vec<String>) -> Subscription<Result<Vec<product::Model>>> {
    let batch_size = store.batch_size();
    store.watch(&[Collection::Products], move |db| {
        let ids = ids.clone();
        async move { resolve_products(&db, &ids, batch_size).await }
    })
}

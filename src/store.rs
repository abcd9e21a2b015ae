//! Change feed over the SeaORM connection.
//!
//! Every mutation in [`crate::core`] publishes a [`Change`] after it commits.
//! Live queries subscribe to the feed and re-run whenever a collection they
//! read from changes, emitting the full current result set each time.

use crate::core::resolver::DEFAULT_BATCH_SIZE;
use crate::core::view::Subscription;
use crate::errors::Result;
use sea_orm::DatabaseConnection;
use std::future::Future;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, trace};

/// Capacity of the change feed before slow subscribers start lagging.
pub const DEFAULT_CHANGE_CAPACITY: usize = 256;

/// Document collections that can be watched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Customers and their private role records
    Customers,
    /// Catalog
    Products,
    /// Orders
    Orders,
    /// Comments
    Comments,
    /// Comment likes
    CommentLikes,
    /// Favorites
    Favorites,
}

/// A committed write to one document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Change {
    /// Collection written to
    pub collection: Collection,
    /// Key of the written document
    pub key: String,
}

/// Database handle plus the change feed that drives live queries.
#[derive(Clone, Debug)]
pub struct Store {
    db: DatabaseConnection,
    changes: broadcast::Sender<Change>,
    batch_size: usize,
}

impl Store {
    /// Wraps a connection with a change feed of default capacity.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self::with_capacity(db, DEFAULT_CHANGE_CAPACITY)
    }

    /// Wraps a connection with a change feed holding up to `capacity` pending changes.
    #[must_use]
    pub fn with_capacity(db: DatabaseConnection, capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity.max(1));
        Self {
            db,
            changes,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Sets how many ids a single `IN` lookup may carry.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// The underlying connection.
    #[must_use]
    pub const fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Batch size used by reference resolution.
    #[must_use]
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Announces a committed write. Call only after the write is durable.
    pub fn publish(&self, collection: Collection, key: impl Into<String>) {
        let change = Change {
            collection,
            key: key.into(),
        };
        trace!("Publishing change {:?}", change);
        if self.changes.send(change).is_err() {
            trace!("No live subscribers for {:?}", collection);
        }
    }

    /// Raw access to the change feed.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.changes.subscribe()
    }

    /// Emits one tick right away and one after every change to `collections`.
    #[must_use]
    pub fn changes(&self, collections: &'static [Collection]) -> Subscription<()> {
        let mut rx = self.changes.subscribe();
        Subscription::spawn(move |tx| async move {
            loop {
                if tx.send(()).await.is_err() {
                    return;
                }
                if !next_relevant(&mut rx, collections).await {
                    return;
                }
            }
        })
    }

    /// Runs `query` now and after every change to `collections`.
    ///
    /// Consecutive identical snapshots are emitted once. A failing query is
    /// emitted as `Err` and ends the subscription.
    #[must_use]
    pub fn watch<T, F, Fut>(
        &self,
        collections: &'static [Collection],
        query: F,
    ) -> Subscription<Result<T>>
    where
        T: Clone + PartialEq + Send + 'static,
        F: Fn(DatabaseConnection) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        // Subscribe before the first query so no write can slip in between.
        let mut rx = self.changes.subscribe();
        let db = self.db.clone();
        Subscription::spawn(move |tx| async move {
            let mut last: Option<T> = None;
            loop {
                match query(db.clone()).await {
                    Ok(snapshot) => {
                        if last.as_ref() == Some(&snapshot) {
                            trace!("Snapshot unchanged for {:?}", collections);
                        } else {
                            last = Some(snapshot.clone());
                            if tx.send(Ok(snapshot)).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        debug!("Live query over {:?} failed: {}", collections, e);
                        if tx.send(Err(e)).await.is_err() {
                            trace!("Subscriber gone before error delivery");
                        }
                        return;
                    }
                }
                if !next_relevant(&mut rx, collections).await {
                    return;
                }
            }
        })
    }
}

/// Waits for a change touching `collections`. Returns `false` once the feed is closed.
async fn next_relevant(rx: &mut broadcast::Receiver<Change>, collections: &[Collection]) -> bool {
    loop {
        match rx.recv().await {
            Ok(change) if collections.contains(&change.collection) => {
                trace!("Relevant change {:?}", change);
                return true;
            }
            Ok(_) => {}
            Err(RecvError::Lagged(missed)) => {
                debug!("Change feed lagged by {} events, re-evaluating", missed);
                return true;
            }
            Err(RecvError::Closed) => return false,
        }
    }
}

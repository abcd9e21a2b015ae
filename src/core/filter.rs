//! Client-side search and category filtering over live views.
//!
//! [`SearchFilter`] holds the current query and category and recombines them
//! with the latest upstream state whenever any of the three changes. Query
//! edits are debounced; category changes apply at once.

use crate::{
    config::settings::Settings,
    core::{
        order::OrderView,
        view::{Subscription, ViewState},
    },
    entities::{ProductCategory, ShipStatus, product},
};
use futures::{Stream, StreamExt};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::trace;

/// Default quiet period before a query edit is applied.
pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);

/// Something that can be searched by title and narrowed by category.
pub trait Filterable {
    /// Category type items are grouped by.
    type Category: PartialEq;

    /// Text matched against the search query.
    fn title(&self) -> &str;

    /// The item's category.
    fn category(&self) -> Self::Category;
}

impl Filterable for product::Model {
    type Category = ProductCategory;

    fn title(&self) -> &str {
        &self.title
    }

    fn category(&self) -> ProductCategory {
        self.category
    }
}

/// Orders are searched by order number and grouped by shipping status.
impl Filterable for OrderView {
    type Category = ShipStatus;

    fn title(&self) -> &str {
        &self.id
    }

    fn category(&self) -> ShipStatus {
        self.ship_status
    }
}

/// Whether `item` passes both the query and the category filter.
///
/// A blank query and a `None` category match everything. Title matching is a
/// case-insensitive substring test on the query as typed, surrounding spaces
/// included.
pub fn matches<T: Filterable>(item: &T, query: &str, category: Option<&T::Category>) -> bool {
    let title_ok =
        query.trim().is_empty() || item.title().to_lowercase().contains(&query.to_lowercase());
    let category_ok = category.is_none_or(|wanted| item.category() == *wanted);
    title_ok && category_ok
}

/// Items passing [`matches`], in their original order.
pub fn filter_items<T>(items: &[T], query: &str, category: Option<&T::Category>) -> Vec<T>
where
    T: Filterable + Clone,
{
    items
        .iter()
        .filter(|item| matches(*item, query, category))
        .cloned()
        .collect()
}

/// Filters a `Success` list; `Loading` and `Error` pass through untouched.
pub fn filter_state<T>(
    state: &ViewState<Vec<T>>,
    query: &str,
    category: Option<&T::Category>,
) -> ViewState<Vec<T>>
where
    T: Filterable + Clone,
{
    match state {
        ViewState::Loading => ViewState::Loading,
        ViewState::Success(items) => ViewState::Success(filter_items(items, query, category)),
        ViewState::Error(message) => ViewState::Error(message.clone()),
    }
}

/// Search query and category selection shared by the views it is applied to.
#[derive(Debug)]
pub struct SearchFilter<C> {
    query: watch::Sender<String>,
    category: watch::Sender<Option<C>>,
    debounce: Duration,
}

impl<C> Default for SearchFilter<C>
where
    C: Clone + PartialEq + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_DEBOUNCE)
    }
}

impl<C> SearchFilter<C>
where
    C: Clone + PartialEq + Send + Sync + 'static,
{
    /// Empty query, no category, query edits applied after `debounce` of quiet.
    #[must_use]
    pub fn new(debounce: Duration) -> Self {
        Self {
            query: watch::Sender::new(String::new()),
            category: watch::Sender::new(None),
            debounce,
        }
    }

    /// Empty filter using the configured search debounce.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.search_debounce())
    }

    /// Replaces the search query.
    pub fn set_query(&self, query: impl Into<String>) {
        self.query.send_replace(query.into());
    }

    /// Current search query.
    #[must_use]
    pub fn query(&self) -> String {
        self.query.borrow().clone()
    }

    /// Selects a category, or clears the selection with `None`.
    pub fn set_category(&self, category: Option<C>) {
        self.category.send_replace(category);
    }

    /// Selects `category`, or clears the selection if it is already selected.
    pub fn toggle_category(&self, category: C) {
        self.category.send_modify(|current| {
            *current = if current.as_ref() == Some(&category) {
                None
            } else {
                Some(category)
            };
        });
    }

    /// Currently selected category.
    #[must_use]
    pub fn category(&self) -> Option<C> {
        self.category.borrow().clone()
    }

    /// Filters every state of `upstream` by the current query and category.
    ///
    /// Emits again whenever the upstream emits, the category changes, or the
    /// query settles after an edit. Nothing is emitted before the first
    /// upstream state. The result keeps running after the upstream ends so
    /// the last state can still be re-filtered.
    pub fn apply<T, S>(&self, upstream: S) -> Subscription<ViewState<Vec<T>>>
    where
        T: Filterable<Category = C> + Clone + Send + Sync + 'static,
        S: Stream<Item = ViewState<Vec<T>>> + Send + 'static,
    {
        let mut query_rx = self.query.subscribe();
        let mut category_rx = self.category.subscribe();
        let debounce = self.debounce;

        Subscription::spawn(move |tx| async move {
            let mut upstream = Box::pin(upstream);
            let mut upstream_open = true;
            let mut query_open = true;
            let mut category_open = true;

            let mut latest: Option<ViewState<Vec<T>>> = None;
            let mut query = query_rx.borrow_and_update().clone();
            let mut category = category_rx.borrow_and_update().clone();
            let mut query_deadline: Option<Instant> = None;

            loop {
                if !upstream_open && !query_open && !category_open {
                    return;
                }

                let refilter = tokio::select! {
                    state = upstream.next(), if upstream_open => match state {
                        Some(state) => {
                            latest = Some(state);
                            true
                        }
                        None => {
                            upstream_open = false;
                            false
                        }
                    },
                    changed = query_rx.changed(), if query_open => {
                        if changed.is_ok() {
                            query_deadline = Some(Instant::now() + debounce);
                        } else {
                            query_open = false;
                        }
                        false
                    },
                    changed = category_rx.changed(), if category_open => {
                        if changed.is_ok() {
                            category = category_rx.borrow_and_update().clone();
                            true
                        } else {
                            category_open = false;
                            false
                        }
                    },
                    () = sleep_until(query_deadline) => {
                        query_deadline = None;
                        query = query_rx.borrow_and_update().clone();
                        trace!("Search query settled on {:?}", query);
                        true
                    },
                };

                if refilter {
                    if let Some(state) = &latest {
                        if tx
                            .send(filter_state(state, &query, category.as_ref()))
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                }
            }
        })
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

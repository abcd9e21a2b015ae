//! Order business logic - checkout, fulfilment updates and the order history views.
//!
//! An order keeps its own copy of the purchased cart lines. Prices shown for
//! an order come from that copy; the live catalog supplies titles and
//! thumbnails, and fills in fields an older copy lacks. Orders are soft-deleted and every read skips
//! deleted rows.

use crate::{
    core::{
        cart::CartItemView,
        customer::{load_for_update, require_admin, save_cart},
        identity::Identity,
        resolver::{dedupe_ids, watch_products},
        view::{Subscription, ViewState, error_message, failed_view, live_view, single},
    },
    entities::{
        CartLine, Order, PayMethod, PhoneNumber, ShipStatus, embedded::CartLines, order, product,
    },
    errors::{Error, Result},
    store::{Collection, Store},
};
use chrono::{DateTime, Utc};
use futures::{StreamExt, stream::BoxStream};
use sea_orm::{ConnectionTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use std::collections::HashMap;
use tracing::{debug, info, instrument};

const ORDERS_CONTEXT: &str = "Error while reading order records";

/// Input for [`create_order`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    /// Purchased lines, stored as an immutable snapshot
    pub items: Vec<CartLine>,
    pub total_amount: f64,
    pub pay_method: PayMethod,
    /// Recipient name
    pub consignee: String,
    pub address: String,
    pub phone: PhoneNumber,
    /// Opaque payment gateway token
    pub token: Option<String>,
}

impl NewOrder {
    fn validate(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(Error::EmptyOrder);
        }
        if let Some(line) = self.items.iter().find(|line| line.quantity == 0) {
            return Err(Error::InvalidQuantity {
                quantity: line.quantity,
            });
        }
        if self.total_amount < 0.0 || !self.total_amount.is_finite() {
            return Err(Error::InvalidAmount {
                amount: self.total_amount,
            });
        }
        Ok(())
    }
}

/// An order joined with the live catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderView {
    /// Order number
    pub id: String,
    pub customer_id: String,
    pub items: Vec<CartItemView>,
    pub total_amount: f64,
    pub token: Option<String>,
    pub pay_method: PayMethod,
    pub consignee: String,
    pub address: String,
    pub phone: PhoneNumber,
    pub ship_status: ShipStatus,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub arrived_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Order number: `yyyyMMddHHmmss` in UTC followed by four uppercase hex characters.
#[must_use]
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let suffix: String = uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(4)
        .collect();
    format!("{}{}", now.format("%Y%m%d%H%M%S"), suffix.to_uppercase())
}

/// Rebuilds one order line from its snapshot and the product, if it still exists.
///
/// Weight and price fall back to the product's when the snapshot has none.
/// Flavor falls back only when the product offers exactly one. A snapshot
/// price, when present, always wins over the catalog price.
#[must_use]
pub fn resolve_order_item(line: &CartLine, product: Option<&product::Model>) -> CartItemView {
    let mut item = CartItemView::from_line(line, product);
    if let Some(product) = product {
        item.weight = line.weight.or(product.weight);
        if item.flavor.is_none() {
            if let [only] = product.flavors.0.as_slice() {
                item.flavor = Some(only.clone());
            }
        }
    }
    item
}

pub(crate) fn build_order_views(
    orders: &[order::Model],
    products: &[product::Model],
) -> Vec<OrderView> {
    let by_id: HashMap<&str, &product::Model> =
        products.iter().map(|p| (p.id.as_str(), p)).collect();
    orders
        .iter()
        .map(|order| OrderView {
            id: order.id.clone(),
            customer_id: order.customer_id.clone(),
            items: order
                .items
                .0
                .iter()
                .map(|line| resolve_order_item(line, by_id.get(line.product_id.as_str()).copied()))
                .collect(),
            total_amount: order.total_amount,
            token: order.token.clone(),
            pay_method: order.pay_method,
            consignee: order.consignee.clone(),
            address: order.address.clone(),
            phone: order.phone.clone(),
            ship_status: order.ship_status,
            created_at: order.created_at,
            paid_at: order.paid_at,
            shipped_at: order.shipped_at,
            arrived_at: order.arrived_at,
            completed_at: order.completed_at,
        })
        .collect()
}

/// Active orders of a customer, newest first.
pub async fn get_customer_orders<C>(db: &C, customer_id: &str) -> Result<Vec<order::Model>>
where
    C: ConnectionTrait,
{
    Order::find()
        .filter(order::Column::CustomerId.eq(customer_id))
        .filter(order::Column::IsDeleted.eq(false))
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

async fn find_active_order<C>(db: &C, order_id: &str) -> Result<order::Model>
where
    C: ConnectionTrait,
{
    Order::find_by_id(order_id)
        .filter(order::Column::IsDeleted.eq(false))
        .one(db)
        .await?
        .ok_or_else(|| Error::OrderNotFound {
            id: order_id.to_string(),
        })
}

/// Inserts the order and empties the customer's cart inside `txn`.
async fn place_order<C>(txn: &C, customer_id: &str, new_order: NewOrder) -> Result<order::Model>
where
    C: ConnectionTrait,
{
    new_order.validate()?;
    // Fails with CustomerNotFound before anything is written.
    load_for_update(txn, customer_id).await?;

    let now = Utc::now();
    let created = order::ActiveModel {
        id: Set(generate_order_number(now)),
        customer_id: Set(customer_id.to_string()),
        items: Set(CartLines(new_order.items)),
        total_amount: Set(new_order.total_amount),
        token: Set(new_order.token),
        pay_method: Set(new_order.pay_method),
        consignee: Set(new_order.consignee),
        address: Set(new_order.address),
        phone: Set(new_order.phone),
        ship_status: Set(ShipStatus::Pending),
        created_at: Set(now),
        paid_at: Set(None),
        shipped_at: Set(None),
        arrived_at: Set(None),
        completed_at: Set(None),
        is_deleted: Set(false),
        deleted_at: Set(None),
        deleted_by: Set(None),
    }
    .insert(txn)
    .await?;

    save_cart(txn, customer_id, Vec::new()).await?;
    Ok(created)
}

/// Places an order for the signed-in customer and clears their cart.
///
/// Both writes happen in one transaction.
#[instrument(skip(store, new_order), fields(items = new_order.items.len()))]
pub async fn create_order(
    store: &Store,
    identity: &Identity,
    new_order: NewOrder,
) -> Result<order::Model> {
    let customer_id = identity.customer_id()?;

    let txn = store.db().begin().await?;
    let created = place_order(&txn, customer_id, new_order).await?;
    txn.commit().await?;

    info!("Customer {} placed order {}", customer_id, created.id);
    store.publish(Collection::Orders, &created.id);
    store.publish(Collection::Customers, customer_id);
    Ok(created)
}

/// Places an order from the current cart and the saved consignee.
///
/// The total is the sum of the cart line subtotals.
#[instrument(skip(store, token))]
pub async fn checkout(
    store: &Store,
    identity: &Identity,
    pay_method: PayMethod,
    token: Option<String>,
) -> Result<order::Model> {
    let customer_id = identity.customer_id()?;

    let txn = store.db().begin().await?;
    let customer = load_for_update(&txn, customer_id).await?;
    let consignee = customer.consignee_info.ok_or_else(|| Error::Validation {
        message: "No consignee information saved for checkout".to_string(),
    })?;
    let items = customer.cart.0;
    let total_amount = items.iter().map(CartLine::subtotal).sum();

    let created = place_order(
        &txn,
        customer_id,
        NewOrder {
            items,
            total_amount,
            pay_method,
            consignee: consignee.name,
            address: format!(
                "{}, {} {}",
                consignee.address, consignee.postal_code, consignee.city
            ),
            phone: consignee.phone,
            token,
        },
    )
    .await?;
    txn.commit().await?;

    info!("Customer {} checked out order {}", customer_id, created.id);
    store.publish(Collection::Orders, &created.id);
    store.publish(Collection::Customers, customer_id);
    Ok(created)
}

/// Soft-deletes one of the signed-in customer's orders.
///
/// Orders of other customers are reported as not found.
#[instrument(skip(store))]
pub async fn delete_order(store: &Store, identity: &Identity, order_id: &str) -> Result<()> {
    let customer_id = identity.customer_id()?;

    let existing = find_active_order(store.db(), order_id).await?;
    if existing.customer_id != customer_id {
        debug!("Order {} does not belong to {}", order_id, customer_id);
        return Err(Error::OrderNotFound {
            id: order_id.to_string(),
        });
    }

    let mut active: order::ActiveModel = existing.into();
    active.is_deleted = Set(true);
    active.deleted_at = Set(Some(Utc::now()));
    active.deleted_by = Set(Some(customer_id.to_string()));
    active.update(store.db()).await?;

    info!("Customer {} deleted order {}", customer_id, order_id);
    store.publish(Collection::Orders, order_id);
    Ok(())
}

/// Moves an order to `status`. Administrators only.
///
/// Reaching `Shipped`, `Delivered` or `Completed` stamps the matching
/// timestamp once; later updates keep the first stamp.
#[instrument(skip(store))]
pub async fn update_ship_status(
    store: &Store,
    identity: &Identity,
    order_id: &str,
    status: ShipStatus,
) -> Result<order::Model> {
    let admin_id = require_admin(store, identity).await?;

    let existing = find_active_order(store.db(), order_id).await?;
    let now = Some(Utc::now());
    let mut active: order::ActiveModel = existing.clone().into();
    active.ship_status = Set(status);
    match status {
        ShipStatus::Shipped if existing.shipped_at.is_none() => active.shipped_at = Set(now),
        ShipStatus::Delivered if existing.arrived_at.is_none() => active.arrived_at = Set(now),
        ShipStatus::Completed if existing.completed_at.is_none() => {
            active.completed_at = Set(now);
        }
        _ => {}
    }

    let updated = active.update(store.db()).await?;
    info!(
        "Admin {} moved order {} to {:?}",
        admin_id, order_id, status
    );
    store.publish(Collection::Orders, order_id);
    Ok(updated)
}

/// Records a payment confirmation on one of the signed-in customer's orders.
#[instrument(skip(store, token))]
pub async fn mark_paid(
    store: &Store,
    identity: &Identity,
    order_id: &str,
    token: String,
) -> Result<order::Model> {
    let customer_id = identity.customer_id()?;

    let existing = find_active_order(store.db(), order_id).await?;
    if existing.customer_id != customer_id {
        return Err(Error::OrderNotFound {
            id: order_id.to_string(),
        });
    }

    let mut active: order::ActiveModel = existing.into();
    active.token = Set(Some(token));
    active.paid_at = Set(Some(Utc::now()));
    let updated = active.update(store.db()).await?;

    info!("Order {} marked paid", order_id);
    store.publish(Collection::Orders, order_id);
    Ok(updated)
}

/// Joins `orders` with the live catalog; re-joins on every catalog change.
fn join_with_catalog(
    store: &Store,
    orders: Vec<order::Model>,
) -> BoxStream<'static, Result<Vec<OrderView>>> {
    let ids = dedupe_ids(orders.iter().flat_map(|order| order.items.product_ids()));
    if ids.is_empty() {
        let views = build_order_views(&orders, &[]);
        return futures::stream::once(futures::future::ready(Ok(views))).boxed();
    }

    watch_products(store, ids)
        .map(move |products| products.map(|products| build_order_views(&orders, &products)))
        .boxed()
}

fn watch_orders(store: &Store, customer_id: String) -> Subscription<Result<Vec<order::Model>>> {
    store.watch(&[Collection::Orders], move |db| {
        let customer_id = customer_id.clone();
        async move { get_customer_orders(&db, &customer_id).await }
    })
}

/// Live order history of the signed-in customer, newest first.
#[must_use]
pub fn orders_flow(store: &Store, identity: &Identity) -> Subscription<ViewState<Vec<OrderView>>> {
    let customer_id = match identity.customer_id() {
        Ok(id) => id.to_string(),
        Err(e) => return failed_view(ORDERS_CONTEXT, &e),
    };

    let store_for_join = store.clone();
    live_view(
        watch_orders(store, customer_id),
        move |snapshot| match snapshot {
            Ok(orders) => join_with_catalog(&store_for_join, orders)
                .map(|views| ViewState::from_result(ORDERS_CONTEXT, views))
                .boxed(),
            Err(e) => single(ViewState::Error(error_message(ORDERS_CONTEXT, &e))),
        },
    )
}

/// Live view of one order of the signed-in customer.
///
/// Reads the same order list as [`orders_flow`] and picks the order out of it.
#[must_use]
pub fn order_by_id_flow(
    store: &Store,
    identity: &Identity,
    order_id: &str,
) -> Subscription<ViewState<OrderView>> {
    let customer_id = match identity.customer_id() {
        Ok(id) => id.to_string(),
        Err(e) => return failed_view(ORDERS_CONTEXT, &e),
    };

    let order_id = order_id.to_string();
    let store_for_join = store.clone();
    live_view(
        watch_orders(store, customer_id),
        move |snapshot| -> BoxStream<'static, ViewState<OrderView>> {
            let orders = match snapshot {
                Ok(orders) => orders,
                Err(e) => return single(ViewState::Error(error_message(ORDERS_CONTEXT, &e))),
            };
            let Some(order) = orders.into_iter().find(|order| order.id == order_id) else {
                return single(ViewState::Error("Order record does not exist.".to_string()));
            };

            join_with_catalog(&store_for_join, vec![order])
                .map(|views| match views {
                    Ok(views) => views.into_iter().next().map_or_else(
                        || ViewState::Error("Order record does not exist.".to_string()),
                        ViewState::Success,
                    ),
                    Err(e) => ViewState::Error(error_message(ORDERS_CONTEXT, &e)),
                })
                .boxed()
        },
    )
}

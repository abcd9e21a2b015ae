//! Cart business logic - the embedded cart on the customer row and its live view.
//!
//! Every mutation is a read-modify-write of the whole cart inside one
//! transaction. Lines describing the same variant are merged, so a cart never
//! holds two lines with the same product, flavor, weight and price.

use crate::{
    core::{
        customer::{get_customer, load_for_update, save_cart},
        identity::Identity,
        resolver::{dedupe_ids, watch_products},
        view::{Subscription, ViewState, error_message, failed_view, live_view, single},
    },
    entities::{CartLine, product},
    errors::{Error, Result},
    store::{Collection, Store},
};
use futures::{StreamExt, stream::BoxStream};
use sea_orm::TransactionTrait;
use std::collections::HashMap;
use tracing::{debug, instrument};

const CART_CONTEXT: &str = "Error while reading cart items";

/// A cart line joined with the live catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct CartItemView {
    /// Line id
    pub id: String,
    pub product_id: String,
    /// Current catalog title, empty when the product is gone
    pub product_title: String,
    /// Current catalog thumbnail, empty when the product is gone
    pub thumbnail: String,
    /// Unit price stored on the line, or the catalog price when the line has none
    pub price: f64,
    pub weight: Option<i32>,
    pub flavor: Option<String>,
    pub quantity: u32,
}

impl CartItemView {
    /// Joins `line` with its product, if the product still exists.
    #[must_use]
    pub fn from_line(line: &CartLine, product: Option<&product::Model>) -> Self {
        Self {
            id: line.id.clone(),
            product_id: line.product_id.clone(),
            product_title: product.map(|p| p.title.clone()).unwrap_or_default(),
            thumbnail: product.map(|p| p.thumbnail.clone()).unwrap_or_default(),
            price: line
                .price
                .or_else(|| product.map(|p| p.price))
                .unwrap_or_default(),
            weight: line.weight,
            flavor: line.flavor.clone(),
            quantity: line.quantity,
        }
    }

    /// Price times quantity.
    #[must_use]
    pub fn subtotal(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

/// Sum of all line subtotals.
#[must_use]
pub fn cart_total(items: &[CartItemView]) -> f64 {
    items.iter().map(CartItemView::subtotal).sum()
}

/// Adds `line` to `cart`, merging it into an existing line of the same variant.
pub fn merge_line(cart: &mut Vec<CartLine>, line: CartLine) {
    if let Some(existing) = cart.iter_mut().find(|existing| existing.same_variant(&line)) {
        existing.quantity = existing.quantity.saturating_add(line.quantity);
    } else {
        cart.push(line);
    }
}

/// Joins `lines` with `products`, keeping the cart order.
pub(crate) fn build_item_views(lines: &[CartLine], products: &[product::Model]) -> Vec<CartItemView> {
    let by_id: HashMap<&str, &product::Model> =
        products.iter().map(|p| (p.id.as_str(), p)).collect();
    lines
        .iter()
        .map(|line| CartItemView::from_line(line, by_id.get(line.product_id.as_str()).copied()))
        .collect()
}

const fn check_quantity(quantity: u32) -> Result<()> {
    if quantity == 0 {
        Err(Error::InvalidQuantity { quantity })
    } else {
        Ok(())
    }
}

/// Applies `edit` to the cart of the signed-in customer in one transaction.
async fn modify_cart<F>(store: &Store, identity: &Identity, edit: F) -> Result<Vec<CartLine>>
where
    F: FnOnce(&mut Vec<CartLine>) -> Result<()> + Send,
{
    let customer_id = identity.customer_id()?;

    let txn = store.db().begin().await?;
    let mut cart = load_for_update(&txn, customer_id).await?.cart.0;
    edit(&mut cart)?;
    save_cart(&txn, customer_id, cart.clone()).await?;
    txn.commit().await?;

    store.publish(Collection::Customers, customer_id);
    Ok(cart)
}

/// Adds a line to the cart of the signed-in customer. Returns the new cart.
#[instrument(skip(store, line), fields(product_id = %line.product_id))]
pub async fn add_item_to_cart(
    store: &Store,
    identity: &Identity,
    line: CartLine,
) -> Result<Vec<CartLine>> {
    check_quantity(line.quantity)?;
    let cart = modify_cart(store, identity, |cart| {
        merge_line(cart, line);
        Ok(())
    })
    .await?;
    debug!("Cart now holds {} lines", cart.len());
    Ok(cart)
}

/// Sets the quantity of one cart line.
#[instrument(skip(store))]
pub async fn update_cart_item_quantity(
    store: &Store,
    identity: &Identity,
    line_id: &str,
    quantity: u32,
) -> Result<()> {
    check_quantity(quantity)?;
    modify_cart(store, identity, |cart| {
        let line = cart
            .iter_mut()
            .find(|line| line.id == line_id)
            .ok_or_else(|| Error::CartItemNotFound {
                id: line_id.to_string(),
            })?;
        line.quantity = quantity;
        Ok(())
    })
    .await?;
    Ok(())
}

/// Removes one cart line.
#[instrument(skip(store))]
pub async fn delete_cart_item(store: &Store, identity: &Identity, line_id: &str) -> Result<()> {
    modify_cart(store, identity, |cart| {
        let before = cart.len();
        cart.retain(|line| line.id != line_id);
        if cart.len() == before {
            return Err(Error::CartItemNotFound {
                id: line_id.to_string(),
            });
        }
        Ok(())
    })
    .await?;
    Ok(())
}

/// Empties the cart.
#[instrument(skip(store))]
pub async fn delete_all_cart_items(store: &Store, identity: &Identity) -> Result<()> {
    modify_cart(store, identity, |cart| {
        cart.clear();
        Ok(())
    })
    .await?;
    Ok(())
}

/// Live view of the signed-in customer's cart joined with the catalog.
///
/// Follows both the customer row and the catalog. A cart change drops the
/// product lookup still running for the previous cart.
#[must_use]
pub fn cart_flow(store: &Store, identity: &Identity) -> Subscription<ViewState<Vec<CartItemView>>> {
    let customer_id = match identity.customer_id() {
        Ok(id) => id.to_string(),
        Err(e) => return failed_view(CART_CONTEXT, &e),
    };

    let customers = store.watch(&[Collection::Customers], move |db| {
        let customer_id = customer_id.clone();
        async move { get_customer(&db, &customer_id).await }
    });

    let store = store.clone();
    live_view(
        customers,
        move |snapshot| -> BoxStream<'static, ViewState<Vec<CartItemView>>> {
            let lines = match snapshot {
                Ok(Some(customer)) => customer.cart,
                Ok(None) => {
                    return single(ViewState::Error(
                        "Queried customer document does not exist.".to_string(),
                    ));
                }
                Err(e) => return single(ViewState::Error(error_message(CART_CONTEXT, &e))),
            };

            let ids = dedupe_ids(lines.iter().map(|line| line.product_id.clone()));
            if ids.is_empty() {
                return single(ViewState::Success(Vec::new()));
            }

            watch_products(&store, ids)
                .map(move |products| {
                    ViewState::from_result(
                        CART_CONTEXT,
                        products.map(|products| build_item_views(&lines, &products)),
                    )
                })
                .boxed()
        },
    )
}

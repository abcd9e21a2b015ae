//! Embedded values - JSON sub-documents stored inside customer and order rows.
//!
//! These are never addressed on their own; they are read and replaced
//! wholesale together with the row that owns them.

use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

/// One line of a cart, also used as the immutable item snapshot of an order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    /// Opaque generated token identifying the line
    pub id: String,
    /// Referenced product
    pub product_id: String,
    /// Unit price agreed when the line was added; absent on some older lines
    #[serde(default)]
    pub price: Option<f64>,
    /// Package weight in grams, if the product comes in weights
    #[serde(default)]
    pub weight: Option<i32>,
    /// Selected flavor, if the product comes in flavors
    #[serde(default)]
    pub flavor: Option<String>,
    /// Number of units
    pub quantity: u32,
}

impl CartLine {
    /// Builds a line with a freshly generated id.
    #[must_use]
    pub fn new(
        product_id: impl Into<String>,
        price: f64,
        weight: Option<i32>,
        flavor: Option<String>,
        quantity: u32,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            product_id: product_id.into(),
            price: Some(price),
            weight,
            flavor,
            quantity,
        }
    }

    /// True when both lines describe the same purchasable variant:
    /// same product, flavor, weight and price.
    #[must_use]
    pub fn same_variant(&self, other: &Self) -> bool {
        self.product_id == other.product_id
            && self.flavor == other.flavor
            && self.weight == other.weight
            && match (self.price, other.price) {
                (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
                (a, b) => a.is_none() && b.is_none(),
            }
    }

    /// Price times quantity; a line without a price counts as free.
    #[must_use]
    pub fn subtotal(&self) -> f64 {
        self.price.unwrap_or_default() * f64::from(self.quantity)
    }
}

/// Ordered list of cart lines stored as a single JSON column.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct CartLines(pub Vec<CartLine>);

impl CartLines {
    /// Distinct product ids in first-seen order.
    #[must_use]
    pub fn product_ids(&self) -> Vec<String> {
        crate::core::resolver::dedupe_ids(self.0.iter().map(|line| line.product_id.clone()))
    }
}

/// Flavor names offered for a product.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct Flavors(pub Vec<String>);

/// Phone number split into dial code and local number.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct PhoneNumber {
    /// International dial code, e.g. 886
    pub dial_code: i32,
    /// Local number
    pub number: String,
}

/// Shipping recipient saved on the customer for checkout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct ConsigneeInfo {
    /// Recipient name
    pub name: String,
    /// Recipient phone
    pub phone: PhoneNumber,
    /// City
    pub city: String,
    /// Postal code
    pub postal_code: String,
    /// Street address
    pub address: String,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_same_variant_compares_all_key_fields() {
        let line = CartLine::new("p1", 10.0, Some(100), Some("A".to_string()), 1);
        let same = CartLine::new("p1", 10.0, Some(100), Some("A".to_string()), 2);
        assert!(line.same_variant(&same));
        assert_ne!(line.id, same.id);

        let other_flavor = CartLine::new("p1", 10.0, Some(100), Some("B".to_string()), 1);
        let other_weight = CartLine::new("p1", 10.0, Some(200), Some("A".to_string()), 1);
        let other_price = CartLine::new("p1", 12.0, Some(100), Some("A".to_string()), 1);
        let other_product = CartLine::new("p2", 10.0, Some(100), Some("A".to_string()), 1);
        assert!(!line.same_variant(&other_flavor));
        assert!(!line.same_variant(&other_weight));
        assert!(!line.same_variant(&other_price));
        assert!(!line.same_variant(&other_product));
    }

    #[test]
    fn test_product_ids_are_deduplicated_in_order() {
        let lines = CartLines(vec![
            CartLine::new("p2", 1.0, None, None, 1),
            CartLine::new("p1", 1.0, None, None, 1),
            CartLine::new("p2", 2.0, None, None, 1),
        ]);
        assert_eq!(lines.product_ids(), vec!["p2".to_string(), "p1".to_string()]);
    }

    #[test]
    fn test_legacy_line_without_optional_fields_deserializes() {
        let line: CartLine =
            serde_json::from_str(r#"{"id":"x","product_id":"p1","quantity":3}"#).unwrap();
        assert_eq!(line.price, None);
        assert_eq!(line.weight, None);
        assert_eq!(line.flavor, None);
        assert_eq!(line.quantity, 3);
    }
}

//! Order entity - Checkout results with an immutable item snapshot.
//!
//! Orders are never physically removed. Deleting sets `is_deleted` together
//! with the audit fields, and every read filters deleted rows out.

use super::embedded::{CartLines, PhoneNumber};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::StringLen;
use serde::{Deserialize, Serialize};

/// How the customer pays
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum PayMethod {
    /// Paid to the courier on delivery
    #[sea_orm(string_value = "CashOnDelivery")]
    CashOnDelivery,
    /// Paid through the PayPal gateway
    #[sea_orm(string_value = "PayPal")]
    PayPal,
}

/// Fulfilment progress of an order
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum ShipStatus {
    /// Waiting to be shipped
    #[sea_orm(string_value = "Pending")]
    Pending,
    /// Handed to the carrier
    #[sea_orm(string_value = "Shipped")]
    Shipped,
    /// In transit
    #[sea_orm(string_value = "Shipping")]
    Shipping,
    /// Arrived at the consignee
    #[sea_orm(string_value = "Delivered")]
    Delivered,
    /// Closed
    #[sea_orm(string_value = "Completed")]
    Completed,
}

/// Order database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    /// Order number, see [`crate::core::order::generate_order_number`]
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Buyer
    pub customer_id: String,
    /// Items copied from the cart at checkout; never rewritten
    #[sea_orm(column_type = "Json")]
    pub items: CartLines,
    /// Amount charged
    pub total_amount: f64,
    /// Opaque payment gateway token
    pub token: Option<String>,
    /// Payment method
    pub pay_method: PayMethod,
    /// Recipient name
    pub consignee: String,
    /// Shipping address
    pub address: String,
    /// Recipient phone
    #[sea_orm(column_type = "Json")]
    pub phone: PhoneNumber,
    /// Fulfilment status
    pub ship_status: ShipStatus,
    /// Checkout time
    pub created_at: DateTimeUtc,
    /// Payment confirmation time
    pub paid_at: Option<DateTimeUtc>,
    /// Hand-over to carrier
    pub shipped_at: Option<DateTimeUtc>,
    /// Arrival at the consignee
    pub arrived_at: Option<DateTimeUtc>,
    /// Closing time
    pub completed_at: Option<DateTimeUtc>,
    /// Soft delete flag
    pub is_deleted: bool,
    /// When the order was soft-deleted
    pub deleted_at: Option<DateTimeUtc>,
    /// Who soft-deleted the order
    pub deleted_by: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

//! Customer entity - One record per signed-in identity.
//!
//! Profile fields, the embedded cart and the saved consignee live on the same
//! row. The administrator flag is kept apart in [`super::customer_role`].

use super::embedded::{CartLines, ConsigneeInfo, PhoneNumber};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Customer database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "customers")]
pub struct Model {
    /// Identity uid issued by the auth provider
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Account email
    pub email: String,
    /// City of the profile address
    pub city: Option<String>,
    /// Postal code of the profile address
    pub postal_code: Option<i32>,
    /// Street address
    pub address: Option<String>,
    /// Contact phone
    #[sea_orm(column_type = "Json", nullable)]
    pub phone_number: Option<PhoneNumber>,
    /// Cart lines, replaced wholesale on every cart mutation
    #[sea_orm(column_type = "Json")]
    pub cart: CartLines,
    /// Saved shipping recipient
    #[sea_orm(column_type = "Json", nullable)]
    pub consignee_info: Option<ConsigneeInfo>,
    /// When the record was first created
    pub created_at: DateTimeUtc,
}

/// Customers are referenced by id only.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

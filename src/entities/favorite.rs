//! Favorite entity - Presence of a row means "favorited".

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Favorite database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "favorites")]
pub struct Model {
    /// Compound key `"{customer_id}{product_id}"`
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Owner
    pub customer_id: String,
    /// Favorited product
    pub product_id: String,
    /// When it was favorited
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

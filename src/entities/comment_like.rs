//! Comment like entity - At most one per (comment, customer) pair.
//!
//! The primary key is the concatenation built by
//! [`crate::core::comment::like_key`], so a second like for the same pair
//! cannot be stored.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Comment like database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "comment_likes")]
pub struct Model {
    /// Compound key `"{comment_id}_{customer_id}"`
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Liked comment
    pub comment_id: String,
    /// Customer who liked it
    pub customer_id: String,
    /// When the like was given
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

//! Comment entity - Ratings and reviews left on ordered products.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Comment database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "comments")]
pub struct Model {
    /// Generated id
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Author
    pub customer_id: String,
    /// Reviewed product
    pub product_id: String,
    /// Order the product was bought in
    pub order_id: String,
    /// Rating from 1 to 5, 0 when unrated
    pub rate: i32,
    /// Number of likes, maintained by the like toggle
    pub thumb_up_count: i32,
    /// Free text
    pub description: Option<String>,
    /// When the comment was written
    pub created_at: DateTimeUtc,
    /// Last edit or like change
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

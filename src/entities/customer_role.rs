//! Customer role entity - Private per-customer flags.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Role record, keyed by the customer id
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "customer_roles")]
pub struct Model {
    /// Owning customer
    #[sea_orm(primary_key, auto_increment = false)]
    pub customer_id: String,
    /// Grants catalog write access
    pub is_admin: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

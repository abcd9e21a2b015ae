//! Product entity - Catalog items shown in the storefront.
//!
//! Read-only for shoppers; written through the admin operations in
//! [`crate::core::product`].

use super::embedded::Flavors;
use sea_orm::entity::prelude::*;
use sea_orm::Iterable;
use sea_orm::sea_query::StringLen;
use serde::{Deserialize, Serialize};

/// Catalog category
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum ProductCategory {
    /// Protein powders and bars
    #[sea_orm(string_value = "Protein")]
    Protein,
    /// Creatine
    #[sea_orm(string_value = "Creatine")]
    Creatine,
    /// Pre-workout boosters
    #[sea_orm(string_value = "PreWorkout")]
    PreWorkout,
    /// Mass gainers
    #[sea_orm(string_value = "Gainers")]
    Gainers,
    /// Shakers, bags and other gear
    #[sea_orm(string_value = "Accessories")]
    Accessories,
}

impl ProductCategory {
    /// Parses a category name case-insensitively.
    #[must_use]
    pub fn from_name(value: &str) -> Option<Self> {
        Self::iter().find(|category| category.to_value().eq_ignore_ascii_case(value.trim()))
    }
}

/// Product database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Catalog id
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Display title
    pub title: String,
    /// Long description
    pub description: String,
    /// Thumbnail URL
    pub thumbnail: String,
    /// Catalog category
    pub category: ProductCategory,
    /// Offered flavors, empty when not applicable
    #[sea_orm(column_type = "Json")]
    pub flavors: Flavors,
    /// Package weight in grams
    pub weight: Option<i32>,
    /// Current list price
    pub price: f64,
    /// Promoted as popular
    pub is_popular: bool,
    /// Promoted as discounted
    pub is_discounted: bool,
    /// Promoted as new
    pub is_new: bool,
    /// Average rating, 0 when unrated
    pub rate: i32,
    /// When the product was added to the catalog
    pub created_at: DateTimeUtc,
}

/// Products are referenced by id only; no cascades.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_name() {
        assert_eq!(
            ProductCategory::from_name("protein"),
            Some(ProductCategory::Protein)
        );
        assert_eq!(
            ProductCategory::from_name(" PreWorkout "),
            Some(ProductCategory::PreWorkout)
        );
        assert_eq!(ProductCategory::from_name("snacks"), None);
    }
}

//! Entity module - Contains all SeaORM entity definitions for the document collections.
//! Each entity has a Model struct for data and an Entity struct for operations.
//! Embedded JSON sub-documents live in [`embedded`].

pub mod comment;
pub mod comment_like;
pub mod customer;
pub mod customer_role;
pub mod embedded;
pub mod favorite;
pub mod order;
pub mod product;

// Re-export specific types to avoid conflicts
pub use comment::{Column as CommentColumn, Entity as Comment, Model as CommentModel};
pub use comment_like::{
    Column as CommentLikeColumn, Entity as CommentLike, Model as CommentLikeModel,
};
pub use customer::{Column as CustomerColumn, Entity as Customer, Model as CustomerModel};
pub use customer_role::{
    Column as CustomerRoleColumn, Entity as CustomerRole, Model as CustomerRoleModel,
};
pub use embedded::{CartLine, CartLines, ConsigneeInfo, Flavors, PhoneNumber};
pub use favorite::{Column as FavoriteColumn, Entity as Favorite, Model as FavoriteModel};
pub use order::{Column as OrderColumn, Entity as Order, Model as OrderModel, PayMethod, ShipStatus};
pub use product::{
    Column as ProductColumn, Entity as Product, Model as ProductModel, ProductCategory,
};

//! Core business logic - storefront operations independent of any UI.
//!
//! Mutations are async free functions taking the [`Store`](crate::store::Store)
//! and the caller's [`Identity`](identity::Identity). Live views return a
//! [`Subscription`](view::Subscription) of [`ViewState`](view::ViewState)s.

pub mod cart;
pub mod comment;
pub mod customer;
pub mod favorite;
pub mod filter;
pub mod identity;
pub mod order;
pub mod product;
pub mod resolver;
pub mod view;

//! Unified error type for the storefront data core.
//!
//! Every public operation returns [`Result`]; live views turn errors into
//! [`ViewState::Error`](crate::core::view::ViewState) messages instead of
//! propagating them.

use thiserror::Error;

/// All failures surfaced by the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// No signed-in customer accompanied the call.
    #[error("User is not available.")]
    NotAuthenticated,

    /// The operation needs the administrator role.
    #[error("Administrator privileges are required.")]
    NotAdmin,

    #[error("Customer not found: {id}")]
    CustomerNotFound { id: String },

    #[error("Order record does not exist: {id}")]
    OrderNotFound { id: String },

    #[error("Comment does not exist: {id}")]
    CommentNotFound { id: String },

    #[error("Product not found: {id}")]
    ProductNotFound { id: String },

    #[error("Cart item not found: {id}")]
    CartItemNotFound { id: String },

    #[error("An order must contain at least one item")]
    EmptyOrder,

    #[error("Invalid quantity: {quantity}")]
    InvalidQuantity { quantity: u32 },

    #[error("Invalid rating: {rate} (expected 0 to 5)")]
    InvalidRating { rate: i32 },

    #[error("Invalid amount: {amount}")]
    InvalidAmount { amount: f64 },

    #[error("Invalid input: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

/// Coarse classification of an [`Error`] for presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No current user.
    NotAuthenticated,
    /// A targeted document was absent, or the caller may not touch it.
    NotFound,
    /// The caller supplied invalid input.
    Invalid,
    /// Store, I/O, configuration or environment failure.
    Backend,
}

impl Error {
    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotAuthenticated => ErrorKind::NotAuthenticated,
            Self::CustomerNotFound { .. }
            | Self::OrderNotFound { .. }
            | Self::CommentNotFound { .. }
            | Self::ProductNotFound { .. }
            | Self::CartItemNotFound { .. }
            | Self::NotAdmin => ErrorKind::NotFound,
            Self::EmptyOrder
            | Self::InvalidQuantity { .. }
            | Self::InvalidRating { .. }
            | Self::InvalidAmount { .. }
            | Self::Validation { .. } => ErrorKind::Invalid,
            Self::Config { .. } | Self::Database(_) | Self::Io(_) | Self::EnvVar(_) => {
                ErrorKind::Backend
            }
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

//! Caller identity passed explicitly into every operation.

use crate::errors::{Error, Result};

/// Who is calling: a signed-in customer or nobody.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Identity {
    customer_id: Option<String>,
}

impl Identity {
    /// No signed-in user.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self { customer_id: None }
    }

    /// A signed-in customer. Blank ids count as anonymous.
    #[must_use]
    pub fn customer(customer_id: impl Into<String>) -> Self {
        let customer_id = customer_id.into();
        Self {
            customer_id: (!customer_id.trim().is_empty()).then_some(customer_id),
        }
    }

    /// The signed-in customer id, or [`Error::NotAuthenticated`].
    pub fn customer_id(&self) -> Result<&str> {
        self.customer_id.as_deref().ok_or(Error::NotAuthenticated)
    }

    /// True when a customer is signed in.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.customer_id.is_some()
    }
}

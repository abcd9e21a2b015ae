//! Customer business logic - profile records, roles and the live profile view.
//!
//! A customer row is created once per identity on first sign-in and keyed by
//! the identity uid. The administrator flag lives in a separate role row so
//! profile edits can never grant it.

use crate::{
    core::{
        identity::Identity,
        view::{Subscription, ViewState, error_message, failed_view, live_view, single},
    },
    entities::{
        CartLine, ConsigneeInfo, Customer as CustomerEntity, CustomerRole, PhoneNumber, customer,
        customer_role, embedded::CartLines,
    },
    errors::{Error, Result},
    store::{Collection, Store},
};
use sea_orm::{ConnectionTrait, Set, TransactionTrait, prelude::*};
use tracing::{debug, info};

/// Placeholder for profile fields the identity provider did not supply.
pub const UNKNOWN: &str = "Unknown";

const CUSTOMER_CONTEXT: &str = "Error while reading a Customer information";

/// Profile data available from the identity provider at first sign-in.
#[derive(Debug, Clone, Default)]
pub struct NewCustomerProfile {
    /// Display name, split into first and last name
    pub display_name: Option<String>,
    /// Account email
    pub email: Option<String>,
}

/// Editable profile fields. Identity, email, cart and role are not editable here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    pub city: Option<String>,
    pub postal_code: Option<i32>,
    pub address: Option<String>,
    pub phone_number: Option<PhoneNumber>,
}

/// Customer profile joined with its role.
#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub city: Option<String>,
    pub postal_code: Option<i32>,
    pub address: Option<String>,
    pub phone_number: Option<PhoneNumber>,
    pub cart: Vec<CartLine>,
    pub consignee_info: Option<ConsigneeInfo>,
    pub is_admin: bool,
}

impl Customer {
    fn from_parts(model: customer::Model, role: Option<customer_role::Model>) -> Self {
        Self {
            id: model.id,
            first_name: model.first_name,
            last_name: model.last_name,
            email: model.email,
            city: model.city,
            postal_code: model.postal_code,
            address: model.address,
            phone_number: model.phone_number,
            cart: model.cart.0,
            consignee_info: model.consignee_info,
            is_admin: role.is_some_and(|role| role.is_admin),
        }
    }

    /// "First Last", trimmed.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Splits a display name into first name and the remaining words.
///
/// Missing parts become [`UNKNOWN`].
#[must_use]
pub fn split_display_name(display_name: Option<&str>) -> (String, String) {
    let mut words = display_name.unwrap_or_default().split_whitespace();
    let first = words.next().unwrap_or(UNKNOWN).to_string();
    let rest = words.collect::<Vec<_>>().join(" ");
    let last = if rest.is_empty() {
        UNKNOWN.to_string()
    } else {
        rest
    };
    (first, last)
}

/// Creates the customer record for `identity` if it does not exist yet.
///
/// Calling this again for an existing customer returns the stored row
/// unchanged. A fresh customer gets an empty cart and a non-admin role row.
pub async fn create_customer(
    store: &Store,
    identity: &Identity,
    profile: NewCustomerProfile,
) -> Result<customer::Model> {
    let customer_id = identity.customer_id()?;

    let txn = store.db().begin().await?;
    if let Some(existing) = CustomerEntity::find_by_id(customer_id).one(&txn).await? {
        txn.commit().await?;
        debug!("Customer {} already exists", customer_id);
        return Ok(existing);
    }

    let (first_name, last_name) = split_display_name(profile.display_name.as_deref());
    let email = profile
        .email
        .filter(|email| !email.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string());

    let created = customer::ActiveModel {
        id: Set(customer_id.to_string()),
        first_name: Set(first_name),
        last_name: Set(last_name),
        email: Set(email),
        city: Set(None),
        postal_code: Set(None),
        address: Set(None),
        phone_number: Set(None),
        cart: Set(CartLines::default()),
        consignee_info: Set(None),
        created_at: Set(chrono::Utc::now()),
    }
    .insert(&txn)
    .await?;

    customer_role::ActiveModel {
        customer_id: Set(customer_id.to_string()),
        is_admin: Set(false),
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!("Created customer {}", customer_id);
    store.publish(Collection::Customers, customer_id);
    Ok(created)
}

/// Loads a customer joined with its role, `None` if there is no such customer.
pub async fn get_customer<C>(db: &C, customer_id: &str) -> Result<Option<Customer>>
where
    C: ConnectionTrait,
{
    let Some(model) = CustomerEntity::find_by_id(customer_id).one(db).await? else {
        return Ok(None);
    };
    let role = CustomerRole::find_by_id(customer_id).one(db).await?;
    Ok(Some(Customer::from_parts(model, role)))
}

/// Reads the signed-in customer once.
pub async fn read_customer(store: &Store, identity: &Identity) -> Result<Customer> {
    let customer_id = identity.customer_id()?;
    get_customer(store.db(), customer_id)
        .await?
        .ok_or_else(|| Error::CustomerNotFound {
            id: customer_id.to_string(),
        })
}

/// Live view of the signed-in customer, role included.
#[must_use]
pub fn customer_flow(store: &Store, identity: &Identity) -> Subscription<ViewState<Customer>> {
    let customer_id = match identity.customer_id() {
        Ok(id) => id.to_string(),
        Err(e) => return failed_view(CUSTOMER_CONTEXT, &e),
    };

    let snapshots = store.watch(&[Collection::Customers], move |db| {
        let customer_id = customer_id.clone();
        async move { get_customer(&db, &customer_id).await }
    });

    live_view(snapshots, |snapshot| {
        let state = match snapshot {
            Ok(Some(customer)) => ViewState::Success(customer),
            Ok(None) => ViewState::Error("Queried customer document does not exist.".to_string()),
            Err(e) => ViewState::Error(error_message(CUSTOMER_CONTEXT, &e)),
        };
        single(state)
    })
}

/// Updates the editable profile fields of the signed-in customer.
pub async fn update_customer(
    store: &Store,
    identity: &Identity,
    update: ProfileUpdate,
) -> Result<customer::Model> {
    let customer_id = identity.customer_id()?;

    if update.first_name.trim().is_empty() || update.last_name.trim().is_empty() {
        return Err(Error::Validation {
            message: "First and last name cannot be empty".to_string(),
        });
    }

    let mut active: customer::ActiveModel = load_for_update(store.db(), customer_id).await?.into();
    active.first_name = Set(update.first_name.trim().to_string());
    active.last_name = Set(update.last_name.trim().to_string());
    active.city = Set(update.city);
    active.postal_code = Set(update.postal_code);
    active.address = Set(update.address);
    active.phone_number = Set(update.phone_number);

    let updated = active.update(store.db()).await?;
    debug!("Updated profile of customer {}", customer_id);
    store.publish(Collection::Customers, customer_id);
    Ok(updated)
}

/// Saves the shipping recipient used by checkout.
pub async fn update_consignee_info(
    store: &Store,
    identity: &Identity,
    info: ConsigneeInfo,
) -> Result<()> {
    let customer_id = identity.customer_id()?;

    let mut active: customer::ActiveModel = load_for_update(store.db(), customer_id).await?.into();
    active.consignee_info = Set(Some(info));
    active.update(store.db()).await?;

    store.publish(Collection::Customers, customer_id);
    Ok(())
}

/// Whether the signed-in customer holds the administrator role.
pub async fn is_admin(store: &Store, identity: &Identity) -> Result<bool> {
    let customer_id = identity.customer_id()?;
    Ok(CustomerRole::find_by_id(customer_id)
        .one(store.db())
        .await?
        .is_some_and(|role| role.is_admin))
}

/// Grants or revokes the administrator role.
///
/// Not reachable through any customer-facing operation; meant for operator
/// tooling and bootstrap.
pub async fn set_admin(store: &Store, customer_id: &str, is_admin: bool) -> Result<()> {
    if CustomerEntity::find_by_id(customer_id)
        .one(store.db())
        .await?
        .is_none()
    {
        return Err(Error::CustomerNotFound {
            id: customer_id.to_string(),
        });
    }

    let role = customer_role::ActiveModel {
        customer_id: Set(customer_id.to_string()),
        is_admin: Set(is_admin),
    };
    match CustomerRole::find_by_id(customer_id).one(store.db()).await? {
        Some(_) => {
            role.update(store.db()).await?;
        }
        None => {
            role.insert(store.db()).await?;
        }
    }

    info!("Set admin={} for customer {}", is_admin, customer_id);
    store.publish(Collection::Customers, customer_id);
    Ok(())
}

/// Fails with [`Error::NotAdmin`] unless the identity holds the administrator role.
pub(crate) async fn require_admin<'a>(store: &Store, identity: &'a Identity) -> Result<&'a str> {
    let customer_id = identity.customer_id()?;
    if is_admin(store, identity).await? {
        Ok(customer_id)
    } else {
        debug!("Customer {} attempted an admin operation", customer_id);
        Err(Error::NotAdmin)
    }
}

/// Loads the customer row for a read-modify-write inside `db`.
pub(crate) async fn load_for_update<C>(db: &C, customer_id: &str) -> Result<customer::Model>
where
    C: ConnectionTrait,
{
    CustomerEntity::find_by_id(customer_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::CustomerNotFound {
            id: customer_id.to_string(),
        })
}

/// Replaces the embedded cart of `customer_id` inside `db`.
pub(crate) async fn save_cart<C>(db: &C, customer_id: &str, cart: Vec<CartLine>) -> Result<()>
where
    C: ConnectionTrait,
{
    customer::ActiveModel {
        id: Set(customer_id.to_string()),
        cart: Set(CartLines(cart)),
        ..Default::default()
    }
    .update(db)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_split_display_name() {
        assert_eq!(
            split_display_name(Some("Ada King Lovelace")),
            ("Ada".to_string(), "King Lovelace".to_string())
        );
        assert_eq!(
            split_display_name(Some("Plato")),
            ("Plato".to_string(), UNKNOWN.to_string())
        );
        assert_eq!(
            split_display_name(None),
            (UNKNOWN.to_string(), UNKNOWN.to_string())
        );
        assert_eq!(
            split_display_name(Some("   ")),
            (UNKNOWN.to_string(), UNKNOWN.to_string())
        );
    }

    #[tokio::test]
    async fn test_create_customer_is_idempotent() -> Result<()> {
        let store = setup_test_store().await?;
        let identity = Identity::customer("u1");

        let first = create_customer(
            &store,
            &identity,
            NewCustomerProfile {
                display_name: Some("Jane Doe".to_string()),
                email: Some("jane@example.com".to_string()),
            },
        )
        .await?;
        assert_eq!(first.first_name, "Jane");
        assert_eq!(first.last_name, "Doe");
        assert!(first.cart.0.is_empty());

        let second = create_customer(
            &store,
            &identity,
            NewCustomerProfile {
                display_name: Some("Someone Else".to_string()),
                email: None,
            },
        )
        .await?;
        assert_eq!(second, first);
        assert!(!is_admin(&store, &identity).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_customer_defaults_missing_fields() -> Result<()> {
        let store = setup_test_store().await?;
        let created = create_customer(
            &store,
            &Identity::customer("u1"),
            NewCustomerProfile::default(),
        )
        .await?;
        assert_eq!(created.first_name, UNKNOWN);
        assert_eq!(created.last_name, UNKNOWN);
        assert_eq!(created.email, UNKNOWN);
        Ok(())
    }

    #[tokio::test]
    async fn test_anonymous_identity_is_rejected() -> Result<()> {
        let store = setup_test_store().await?;
        let anonymous = Identity::anonymous();

        let result = create_customer(&store, &anonymous, NewCustomerProfile::default()).await;
        assert!(matches!(result, Err(Error::NotAuthenticated)));
        assert!(matches!(
            read_customer(&store, &anonymous).await,
            Err(Error::NotAuthenticated)
        ));

        let mut view = customer_flow(&store, &anonymous);
        assert_eq!(next_item(&mut view).await, Some(ViewState::Loading));
        let failed = next_item(&mut view).await.unwrap();
        assert_eq!(
            failed.error_message(),
            Some("Error while reading a Customer information: User is not available.")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_read_missing_customer() -> Result<()> {
        let store = setup_test_store().await?;
        let result = read_customer(&store, &Identity::customer("ghost")).await;
        assert!(matches!(result, Err(Error::CustomerNotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_customer_keeps_cart_and_email() -> Result<()> {
        let store = setup_test_store().await?;
        let identity = create_test_customer(&store, "u1").await?;

        let updated = update_customer(
            &store,
            &identity,
            ProfileUpdate {
                first_name: " Grace ".to_string(),
                last_name: "Hopper".to_string(),
                city: Some("Arlington".to_string()),
                postal_code: Some(22201),
                address: Some("1 Navy Way".to_string()),
                phone_number: Some(PhoneNumber {
                    dial_code: 1,
                    number: "5550100".to_string(),
                }),
            },
        )
        .await?;
        assert_eq!(updated.first_name, "Grace");
        assert_eq!(updated.email, "u1@example.com");
        assert_eq!(updated.postal_code, Some(22201));

        let blank = update_customer(&store, &identity, ProfileUpdate::default()).await;
        assert!(matches!(blank, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_consignee_info() -> Result<()> {
        let store = setup_test_store().await?;
        let identity = create_test_customer(&store, "u1").await?;
        let info = ConsigneeInfo {
            name: "Jane Doe".to_string(),
            phone: PhoneNumber {
                dial_code: 44,
                number: "2079460000".to_string(),
            },
            city: "London".to_string(),
            postal_code: "SW1A".to_string(),
            address: "10 Downing St".to_string(),
        };

        update_consignee_info(&store, &identity, info.clone()).await?;
        let customer = read_customer(&store, &identity).await?;
        assert_eq!(customer.consignee_info, Some(info.clone()));

        let missing = update_consignee_info(&store, &Identity::customer("ghost"), info).await;
        assert!(matches!(missing, Err(Error::CustomerNotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_customer_flow_follows_role_changes() -> Result<()> {
        let store = setup_test_store().await?;
        let identity = create_test_customer(&store, "u1").await?;

        let mut view = customer_flow(&store, &identity);
        let customer = wait_for(&mut view, |_| true).await.unwrap();
        assert!(!customer.is_admin);
        assert_eq!(customer.full_name(), "Test Customer");

        set_admin(&store, "u1", true).await?;
        let promoted = wait_for(&mut view, |customer| customer.is_admin).await;
        assert!(promoted.is_some());
        assert!(require_admin(&store, &identity).await.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn test_customer_flow_reports_missing_document() -> Result<()> {
        let store = setup_test_store().await?;
        let mut view = customer_flow(&store, &Identity::customer("ghost"));
        let state = next_settled(&mut view).await.unwrap();
        assert_eq!(
            state.error_message(),
            Some("Queried customer document does not exist.")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_require_admin_rejects_regular_customer() -> Result<()> {
        let store = setup_test_store().await?;
        let identity = create_test_customer(&store, "u1").await?;
        assert!(matches!(
            require_admin(&store, &identity).await,
            Err(Error::NotAdmin)
        ));
        assert!(matches!(
            set_admin(&store, "ghost", true).await,
            Err(Error::CustomerNotFound { .. })
        ));
        Ok(())
    }
}

//! Entity descriptors and primary-key resolution.
//!
//! The storage schema does not use a uniform primary-key naming convention:
//! the three business entities key on `<entity>_id` columns while newer join
//! tables use a plain `id`. [`EntityDescriptor`] captures that resolution once
//! so the generic repository can adapt per entity without per-entity
//! subclassing. The mapping is total and constant for the process lifetime.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Primary-key column used by entities without an explicit override.
pub const DEFAULT_PRIMARY_KEY_FIELD: &str = "id";

/// Closed set of entity types the generic repository can operate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityName {
    /// A customer organisation.
    Customer,
    /// A financial account owned by a customer.
    Account,
    /// A person associated with a customer.
    User,
    /// The user-to-account association with its role and status.
    UserAccount,
}

/// Every entity the generic repository can serve.
pub const ALL_ENTITIES: [EntityName; 4] = [
    EntityName::Customer,
    EntityName::Account,
    EntityName::User,
    EntityName::UserAccount,
];

impl EntityName {
    /// Canonical singular name used in operation descriptions and metadata.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Account => "account",
            Self::User => "user",
            Self::UserAccount => "user_account",
        }
    }

    /// Backing table name.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Customer => "customers",
            Self::Account => "accounts",
            Self::User => "users",
            Self::UserAccount => "user_accounts",
        }
    }

    /// Resolved primary-key column for this entity.
    ///
    /// Entities absent from the override table fall back to
    /// [`DEFAULT_PRIMARY_KEY_FIELD`].
    #[must_use]
    pub const fn primary_key_field(self) -> &'static str {
        match self {
            Self::Customer => "customer_id",
            Self::Account => "account_id",
            Self::User => "user_id",
            Self::UserAccount => DEFAULT_PRIMARY_KEY_FIELD,
        }
    }

    /// Build the static descriptor for this entity.
    #[must_use]
    pub const fn descriptor(self) -> EntityDescriptor {
        EntityDescriptor {
            name: self,
            primary_key_field: self.primary_key_field(),
        }
    }
}

impl fmt::Display for EntityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an entity name cannot be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntityNameError {
    /// The supplied name was empty or whitespace.
    #[error("entity name must not be empty")]
    Empty,
    /// The supplied name does not match a known entity.
    #[error("unknown entity: {0}")]
    Unknown(String),
}

impl FromStr for EntityName {
    type Err = EntityNameError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(EntityNameError::Empty);
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "customer" | "customers" => Ok(Self::Customer),
            "account" | "accounts" => Ok(Self::Account),
            "user" | "users" => Ok(Self::User),
            "user_account" | "user_accounts" => Ok(Self::UserAccount),
            other => Err(EntityNameError::Unknown(other.to_owned())),
        }
    }
}

/// Static description of one entity type: its name and resolved key column.
///
/// # Examples
/// ```
/// use crm_backend::domain::EntityName;
///
/// let descriptor = EntityName::Customer.descriptor();
/// assert_eq!(descriptor.primary_key_field, "customer_id");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDescriptor {
    /// The entity this descriptor belongs to.
    pub name: EntityName,
    /// Resolved primary-key column name.
    pub primary_key_field: &'static str,
}

#[cfg(test)]
mod tests {
    //! Descriptor table and name-resolution coverage.

    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(EntityName::Customer, "customer_id")]
    #[case(EntityName::Account, "account_id")]
    #[case(EntityName::User, "user_id")]
    #[case(EntityName::UserAccount, "id")]
    fn primary_key_resolution_is_total(#[case] entity: EntityName, #[case] field: &str) {
        assert_eq!(entity.primary_key_field(), field);
        assert_eq!(entity.descriptor().primary_key_field, field);
    }

    #[rstest]
    #[case("customer", EntityName::Customer)]
    #[case("Customers", EntityName::Customer)]
    #[case("ACCOUNT", EntityName::Account)]
    #[case("users", EntityName::User)]
    #[case(" user_accounts ", EntityName::UserAccount)]
    fn parses_singular_and_plural_forms(#[case] input: &str, #[case] expected: EntityName) {
        assert_eq!(input.parse::<EntityName>(), Ok(expected));
    }

    #[rstest]
    fn every_entity_round_trips_through_its_names() {
        for entity in ALL_ENTITIES {
            assert_eq!(entity.as_str().parse::<EntityName>(), Ok(entity));
            assert_eq!(entity.table().parse::<EntityName>(), Ok(entity));
            assert_eq!(entity.descriptor().name, entity);
        }
    }

    #[rstest]
    fn rejects_empty_and_unknown_names() {
        assert_eq!("   ".parse::<EntityName>(), Err(EntityNameError::Empty));
        assert_eq!(
            "invoice".parse::<EntityName>(),
            Err(EntityNameError::Unknown("invoice".into()))
        );
    }
}

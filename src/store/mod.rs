use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    customer::{AccountNumber, Customer, IdentityField, NewCustomer},
    user::{NewUser, User},
};

pub mod in_memory_store;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unique constraint violated on {field}")]
    UniqueViolation { field: IdentityField },
    #[error("Balance of account {account_number} must not become negative")]
    NegativeBalance { account_number: AccountNumber },
    #[error("Account {account_number} changed since version {expected} was read")]
    VersionConflict {
        account_number: AccountNumber,
        expected: u64,
    },
    #[error("Account {account_number} does not exist")]
    MissingRecord { account_number: AccountNumber },
    #[error("Store is unavailable: {0}")]
    Unavailable(String),
}

/// Single-column predicate against one of the customer unique indexes.
#[derive(Debug, Clone, Copy)]
pub enum CustomerLookup<'a> {
    NationalId(&'a str),
    Phone(&'a str),
    AccountNumber(&'a AccountNumber),
}

pub trait UserRepository: Send + Sync {
    /// Exact, case-sensitive match.
    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Assigns the id. Fails with [`StoreError::UniqueViolation`] if the email
    /// is taken.
    fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;
}

pub trait CustomerRepository: Send + Sync {
    /// Returns a customer matching *any* of `lookups`, or `None`.
    fn find_customer(
        &self,
        lookups: &[CustomerLookup<'_>],
    ) -> Result<Option<Customer>, StoreError>;

    fn find_customer_by_account_number(
        &self,
        account_number: &AccountNumber,
    ) -> Result<Option<Customer>, StoreError> {
        self.find_customer(&[CustomerLookup::AccountNumber(account_number)])
    }

    /// Stores a customer with a zero balance.
    fn insert_customer(&self, customer: NewCustomer) -> Result<Customer, StoreError>;

    /// Conditional write of `customer.balance`.
    ///
    /// Succeeds only if the stored version still equals `customer.version`,
    /// otherwise returns [`StoreError::VersionConflict`] and leaves the row
    /// untouched. On success the returned row carries the bumped version.
    fn update_customer(
        &self,
        customer: &Customer,
        updated_at: DateTime<Utc>,
    ) -> Result<Customer, StoreError>;
}

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::{Decimal, prelude::Zero};

use crate::{
    customer::{AccountNumber, Customer, CustomerId, IdentityField, NewCustomer},
    user::{NewUser, User, UserId},
};

use super::{CustomerLookup, CustomerRepository, StoreError, UserRepository};

#[derive(Default)]
struct Tables {
    users: HashMap<String, User>,
    last_user_id: UserId,
    customers: HashMap<AccountNumber, Customer>,
    national_ids: HashMap<String, AccountNumber>,
    phones: HashMap<String, AccountNumber>,
    last_customer_id: CustomerId,
}

/// Store keeping both tables in process memory.
///
/// Every call takes the table lock once, so each call is serializable.
/// Unique indexes and the non-negative balance check are enforced here in
/// the same way a relational schema would.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn customers(&self) -> Vec<Customer> {
        let mut customers: Vec<_> = self.tables.read().customers.values().cloned().collect();
        customers.sort_by_key(|customer| customer.id);
        customers
    }
}

impl Tables {
    fn lookup(&self, lookup: &CustomerLookup<'_>) -> Option<&Customer> {
        let account_number = match lookup {
            CustomerLookup::NationalId(national_id) => self.national_ids.get(*national_id)?,
            CustomerLookup::Phone(phone) => self.phones.get(*phone)?,
            CustomerLookup::AccountNumber(account_number) => *account_number,
        };
        self.customers.get(account_number)
    }
}

impl UserRepository for InMemoryStore {
    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().users.get(email).cloned())
    }

    fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.write();
        if tables.users.contains_key(&user.email) {
            return Err(StoreError::UniqueViolation {
                field: IdentityField::Email,
            });
        }
        tables.last_user_id += 1;
        let stored = User {
            id: tables.last_user_id,
            email: user.email,
            password_hash: user.password_hash,
            created_at: user.created_at,
            updated_at: user.created_at,
        };
        tables.users.insert(stored.email.clone(), stored.clone());
        Ok(stored)
    }
}

impl CustomerRepository for InMemoryStore {
    fn find_customer(
        &self,
        lookups: &[CustomerLookup<'_>],
    ) -> Result<Option<Customer>, StoreError> {
        let tables = self.tables.read();
        Ok(lookups
            .iter()
            .find_map(|lookup| tables.lookup(lookup))
            .cloned())
    }

    fn insert_customer(&self, customer: NewCustomer) -> Result<Customer, StoreError> {
        let mut tables = self.tables.write();
        let violated = if tables.national_ids.contains_key(&customer.national_id) {
            Some(IdentityField::NationalId)
        } else if tables.phones.contains_key(&customer.phone) {
            Some(IdentityField::Phone)
        } else if tables.customers.contains_key(&customer.account_number) {
            Some(IdentityField::AccountNumber)
        } else {
            None
        };
        if let Some(field) = violated {
            return Err(StoreError::UniqueViolation { field });
        }

        tables.last_customer_id += 1;
        let stored = Customer {
            id: tables.last_customer_id,
            name: customer.name,
            national_id: customer.national_id,
            phone: customer.phone,
            account_number: customer.account_number,
            balance: Decimal::zero(),
            version: 0,
            created_at: customer.created_at,
            updated_at: customer.created_at,
        };
        tables
            .national_ids
            .insert(stored.national_id.clone(), stored.account_number.clone());
        tables
            .phones
            .insert(stored.phone.clone(), stored.account_number.clone());
        tables
            .customers
            .insert(stored.account_number.clone(), stored.clone());
        Ok(stored)
    }

    fn update_customer(
        &self,
        customer: &Customer,
        updated_at: DateTime<Utc>,
    ) -> Result<Customer, StoreError> {
        if customer.balance < Decimal::zero() {
            return Err(StoreError::NegativeBalance {
                account_number: customer.account_number.clone(),
            });
        }
        let mut tables = self.tables.write();
        let Some(stored) = tables.customers.get_mut(&customer.account_number) else {
            return Err(StoreError::MissingRecord {
                account_number: customer.account_number.clone(),
            });
        };
        if stored.version != customer.version {
            return Err(StoreError::VersionConflict {
                account_number: customer.account_number.clone(),
                expected: customer.version,
            });
        }
        stored.balance = customer.balance;
        stored.version += 1;
        stored.updated_at = updated_at;
        Ok(stored.clone())
    }
}

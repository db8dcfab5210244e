use std::sync::Arc;

use mockable::Clock;
use parking_lot::Mutex;
use rand::{SeedableRng, rngs::StdRng};
use tracing::{error, info, warn};

use crate::{
    command::RegisterCustomerCommand,
    customer::{AccountNumber, Customer, IdentityField, NewCustomer},
    store::{CustomerLookup, CustomerRepository, StoreError},
};

use super::BankError;

/// Opens customer accounts with a freshly generated account number.
pub struct Registrar<C> {
    store: Arc<C>,
    clock: Arc<dyn Clock + Send + Sync>,
    rng: Mutex<StdRng>,
    account_number_attempts: u32,
}

impl<C> Registrar<C>
where
    C: CustomerRepository,
{
    pub fn new(
        store: Arc<C>,
        clock: Arc<dyn Clock + Send + Sync>,
        account_number_attempts: u32,
    ) -> Self {
        Self {
            store,
            clock,
            rng: Mutex::new(StdRng::from_entropy()),
            account_number_attempts: account_number_attempts.max(1),
        }
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    /// A customer sharing either the national ID or the phone number with an
    /// existing one is rejected.
    pub fn register(&self, command: &RegisterCustomerCommand) -> Result<Customer, BankError> {
        let existing = self.store.find_customer(&[
            CustomerLookup::NationalId(&command.national_id),
            CustomerLookup::Phone(&command.phone),
        ])?;
        if let Some(existing) = existing {
            let field = if existing.national_id == command.national_id {
                IdentityField::NationalId
            } else {
                IdentityField::Phone
            };
            info!(
                national_id = %command.national_id,
                phone = %command.phone,
                %field,
                "customer registration rejected: duplicate identity"
            );
            return Err(BankError::DuplicateIdentity(field));
        }

        let mut attempt = 1;
        loop {
            let account_number = AccountNumber::generate(&mut *self.rng.lock());
            let result = self.store.insert_customer(NewCustomer {
                name: command.name.clone(),
                national_id: command.national_id.clone(),
                phone: command.phone.clone(),
                account_number: account_number.clone(),
                created_at: self.clock.utc(),
            });
            match result {
                Ok(customer) => {
                    info!(
                        name = %customer.name,
                        account_number = %customer.account_number,
                        "customer registered"
                    );
                    return Ok(customer);
                }
                Err(StoreError::UniqueViolation {
                    field: IdentityField::AccountNumber,
                }) if attempt < self.account_number_attempts => {
                    warn!(%account_number, attempt, "account number collision, regenerating");
                    attempt += 1;
                }
                Err(StoreError::UniqueViolation {
                    field: field @ (IdentityField::NationalId | IdentityField::Phone),
                }) => {
                    info!(%field, "customer registration rejected: duplicate identity");
                    return Err(BankError::DuplicateIdentity(field));
                }
                Err(err) => {
                    error!(error = %err, "failed to register customer");
                    return Err(err.into());
                }
            }
        }
    }
}

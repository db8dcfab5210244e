use std::sync::Arc;

use dashmap::DashMap;
use mockable::Clock;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use crate::{
    command::TransactionCommand,
    customer::{AccountNumber, Customer},
    store::{CustomerRepository, StoreError},
};

use super::BankError;

/// Deposits, withdrawals and balance lookups.
///
/// Mutations of one account run one at a time behind a per-account lock.
/// Inside the lock the write is still conditional on the version that was
/// read, so a writer outside this process cannot be overwritten silently.
pub struct Ledger<C> {
    store: Arc<C>,
    clock: Arc<dyn Clock + Send + Sync>,
    locks: DashMap<AccountNumber, Arc<Mutex<()>>>,
    max_attempts: u32,
}

impl<C> Ledger<C>
where
    C: CustomerRepository,
{
    pub fn new(store: Arc<C>, clock: Arc<dyn Clock + Send + Sync>, max_attempts: u32) -> Self {
        Self {
            store,
            clock,
            locks: DashMap::new(),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn balance(&self, account_number: &AccountNumber) -> Result<Decimal, BankError> {
        let customer = self.load(account_number)?;
        debug!(%account_number, balance = %customer.balance, "balance queried");
        Ok(customer.balance)
    }

    /// Returns the balance after the command was applied. On any error the
    /// stored balance is left as it was.
    pub fn execute(&self, command: &TransactionCommand) -> Result<Decimal, BankError> {
        let account_number = command.account_number();
        // unknown accounts never get a lock entry
        self.load(account_number)?;

        let lock = self.account_lock(account_number);
        let _guard = lock.lock();

        for attempt in 1..=self.max_attempts {
            let mut customer = self.load(account_number)?;
            let event = customer.handle_transaction(command).inspect_err(|err| {
                info!(%account_number, error = %err, "transaction rejected");
            })?;
            customer.apply(&event);

            match self.store.update_customer(&customer, self.clock.utc()) {
                Ok(updated) => {
                    info!(
                        %account_number,
                        action = ?command.action(),
                        amount = %event.amount(),
                        new_balance = %updated.balance,
                        "transaction applied"
                    );
                    return Ok(updated.balance);
                }
                Err(StoreError::VersionConflict { expected, .. }) => {
                    debug!(
                        %account_number,
                        attempt,
                        expected,
                        "balance changed underneath, retrying"
                    );
                }
                Err(StoreError::MissingRecord { .. }) => {
                    return Err(BankError::AccountNotFound(account_number.clone()));
                }
                Err(err) => {
                    error!(%account_number, error = %err, "failed to update balance");
                    return Err(err.into());
                }
            }
        }

        warn!(
            %account_number,
            attempts = self.max_attempts,
            "giving up after repeated update conflicts"
        );
        Err(BankError::ConcurrentUpdateConflict(account_number.clone()))
    }

    fn load(&self, account_number: &AccountNumber) -> Result<Customer, BankError> {
        match self.store.find_customer_by_account_number(account_number) {
            Ok(Some(customer)) => Ok(customer),
            Ok(None) => {
                info!(%account_number, "account not found");
                Err(BankError::AccountNotFound(account_number.clone()))
            }
            Err(err) => {
                error!(%account_number, error = %err, "failed to load account");
                Err(err.into())
            }
        }
    }

    fn account_lock(&self, account_number: &AccountNumber) -> Arc<Mutex<()>> {
        self.locks
            .entry(account_number.clone())
            .or_default()
            .value()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicU32, Ordering},
        thread,
    };

    use chrono::{DateTime, Utc};
    use rust_decimal::prelude::FromPrimitive;

    use super::*;
    use crate::{
        bank::InternalError,
        command::TransactionAction,
        credentials::token::test_clock::ManualClock,
        customer::{CustomerError, NewCustomer},
        store::{CustomerLookup, in_memory_store::InMemoryStore},
    };

    fn amount(value: u32) -> Decimal {
        Decimal::from_u32(value).unwrap()
    }

    fn open_account<C: CustomerRepository>(store: &C, account_number: &str) -> AccountNumber {
        store
            .insert_customer(NewCustomer {
                name: "Ana".to_owned(),
                national_id: format!("nik-{account_number}"),
                phone: format!("hp-{account_number}"),
                account_number: AccountNumber::from(account_number),
                created_at: Utc::now(),
            })
            .unwrap()
            .account_number
    }

    fn ledger<C: CustomerRepository>(store: Arc<C>, attempts: u32) -> Ledger<C> {
        Ledger::new(store, Arc::new(ManualClock::new()), attempts)
    }

    fn command(
        account: &AccountNumber,
        action: TransactionAction,
        value: u32,
    ) -> TransactionCommand {
        TransactionCommand::new(account.clone(), action, amount(value)).unwrap()
    }

    #[test]
    fn scenario() {
        let store = Arc::new(InMemoryStore::default());
        let account = open_account(store.as_ref(), "0000000001");
        let ledger = ledger(store, 3);

        assert_eq!(ledger.balance(&account).unwrap(), Decimal::ZERO);
        let balance = ledger
            .execute(&command(&account, TransactionAction::Deposit, 50_000))
            .unwrap();
        assert_eq!(balance, amount(50_000));
        let balance = ledger
            .execute(&command(&account, TransactionAction::Withdraw, 20_000))
            .unwrap();
        assert_eq!(balance, amount(30_000));

        let err = ledger
            .execute(&command(&account, TransactionAction::Withdraw, 1_000_000))
            .unwrap_err();
        assert!(matches!(
            err,
            BankError::Customer(CustomerError::InsufficientFunds { .. })
        ));
        assert_eq!(ledger.balance(&account).unwrap(), amount(30_000));
    }

    #[test]
    fn unknown_account() {
        let store = Arc::new(InMemoryStore::default());
        let ledger = ledger(store, 3);
        let missing = AccountNumber::from("9999999999");

        let err = ledger.balance(&missing).unwrap_err();
        assert!(matches!(err, BankError::AccountNotFound(ref n) if *n == missing));
        let err = ledger
            .execute(&command(&missing, TransactionAction::Deposit, 1))
            .unwrap_err();
        assert!(matches!(err, BankError::AccountNotFound(_)));
        assert!(ledger.locks.is_empty());
    }

    #[test]
    fn balance_never_goes_negative_under_contention() {
        let store = Arc::new(InMemoryStore::default());
        let account = open_account(store.as_ref(), "0000000001");
        let ledger = ledger(store, 3);
        ledger
            .execute(&command(&account, TransactionAction::Deposit, 1_000))
            .unwrap();

        let succeeded = AtomicU32::new(0);
        thread::scope(|s| {
            for _ in 0..16 {
                s.spawn(|| {
                    for _ in 0..10 {
                        match ledger.execute(&command(&account, TransactionAction::Withdraw, 7)) {
                            Ok(balance) => {
                                assert!(balance >= Decimal::ZERO);
                                succeeded.fetch_add(1, Ordering::SeqCst);
                            }
                            Err(BankError::Customer(CustomerError::InsufficientFunds { .. })) => {}
                            Err(err) => panic!("unexpected error: {err}"),
                        }
                    }
                });
            }
        });

        // 1000 / 7 = 142 withdrawals fit
        assert_eq!(succeeded.load(Ordering::SeqCst), 142);
        assert_eq!(ledger.balance(&account).unwrap(), amount(6));
    }

    #[test]
    fn accounts_do_not_share_locks() {
        let store = Arc::new(InMemoryStore::default());
        let first = open_account(store.as_ref(), "0000000001");
        let second = open_account(store.as_ref(), "0000000002");
        let ledger = ledger(store, 3);

        let lock = ledger.account_lock(&first);
        let _held = lock.lock();
        // would block forever if the second account shared the first one's lock
        let balance = ledger
            .execute(&command(&second, TransactionAction::Deposit, 5))
            .unwrap();
        assert_eq!(balance, amount(5));
    }

    /// Store whose first `failures` writes fail with `fail_with`.
    struct FailingStore {
        inner: InMemoryStore,
        failures: AtomicU32,
        fail_with: fn(&Customer) -> StoreError,
    }

    impl CustomerRepository for FailingStore {
        fn find_customer(
            &self,
            lookups: &[CustomerLookup<'_>],
        ) -> Result<Option<Customer>, StoreError> {
            self.inner.find_customer(lookups)
        }

        fn insert_customer(&self, customer: NewCustomer) -> Result<Customer, StoreError> {
            self.inner.insert_customer(customer)
        }

        fn update_customer(
            &self,
            customer: &Customer,
            updated_at: DateTime<Utc>,
        ) -> Result<Customer, StoreError> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err((self.fail_with)(customer));
            }
            self.inner.update_customer(customer, updated_at)
        }
    }

    fn version_conflict(customer: &Customer) -> StoreError {
        StoreError::VersionConflict {
            account_number: customer.account_number.clone(),
            expected: customer.version,
        }
    }

    fn failing_store(
        failures: u32,
        fail_with: fn(&Customer) -> StoreError,
    ) -> (Arc<FailingStore>, AccountNumber) {
        let store = Arc::new(FailingStore {
            inner: InMemoryStore::default(),
            failures: AtomicU32::new(failures),
            fail_with,
        });
        let account = open_account(store.as_ref(), "0000000001");
        (store, account)
    }

    fn stored_balance(store: &FailingStore, account: &AccountNumber) -> Decimal {
        store
            .find_customer_by_account_number(account)
            .unwrap()
            .unwrap()
            .balance
    }

    #[test]
    fn retries_after_version_conflict() {
        let (store, account) = failing_store(2, version_conflict);
        let ledger = ledger(store, 3);
        let balance = ledger
            .execute(&command(&account, TransactionAction::Deposit, 10))
            .unwrap();
        assert_eq!(balance, amount(10));
    }

    #[test]
    fn gives_up_after_bounded_retries() {
        let (store, account) = failing_store(3, version_conflict);
        let ledger = ledger(store.clone(), 3);
        let err = ledger
            .execute(&command(&account, TransactionAction::Deposit, 10))
            .unwrap_err();
        assert!(matches!(err, BankError::ConcurrentUpdateConflict(_)));
        assert!(!err.is_internal());
        assert_eq!(stored_balance(&store, &account), Decimal::ZERO);
    }

    #[test]
    fn storage_failure_is_internal_and_keeps_balance() {
        let (store, account) =
            failing_store(1, |_| StoreError::Unavailable("connection reset".to_owned()));
        let ledger = ledger(store.clone(), 3);
        let err = ledger
            .execute(&command(&account, TransactionAction::Deposit, 10))
            .unwrap_err();
        assert!(err.is_internal());
        assert!(matches!(
            err,
            BankError::Internal(InternalError::Store(StoreError::Unavailable(_)))
        ));
        assert_eq!(stored_balance(&store, &account), Decimal::ZERO);
    }

    #[test]
    fn account_removed_during_update_is_not_found() {
        let (store, account) = failing_store(1, |customer| StoreError::MissingRecord {
            account_number: customer.account_number.clone(),
        });
        let ledger = ledger(store, 3);
        let err = ledger
            .execute(&command(&account, TransactionAction::Deposit, 1))
            .unwrap_err();
        assert!(matches!(err, BankError::AccountNotFound(ref n) if *n == account));
    }
}

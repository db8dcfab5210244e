use std::{fmt, ops::RangeInclusive};

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::command::{TransactionAction, TransactionCommand};

pub type CustomerId = u64;

pub const ACCOUNT_NUMBER_DIGITS: usize = 10;

const ACCOUNT_NUMBER_RANGE: RangeInclusive<u64> = 1_000_000_000..=9_999_999_999;

/// System generated, immutable identifier of a customer's account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct AccountNumber(String);

impl AccountNumber {
    /// Draws a fresh 10-digit account number.
    ///
    /// Nothing here checks the number against existing accounts, so two
    /// customers may in principle receive the same one. The store's unique
    /// index is what finally rejects such a collision.
    pub fn generate<R: Rng>(rng: &mut R) -> Self {
        let value = rng.gen_range(ACCOUNT_NUMBER_RANGE);
        Self(format!("{value:0width$}", width = ACCOUNT_NUMBER_DIGITS))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for AccountNumber {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for AccountNumber {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fields that carry a uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityField {
    Email,
    NationalId,
    Phone,
    AccountNumber,
}

impl fmt::Display for IdentityField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Email => "email",
            Self::NationalId => "national ID",
            Self::Phone => "phone number",
            Self::AccountNumber => "account number",
        };
        f.write_str(name)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum BalanceEventKind {
    Deposited,
    Withdrawn,
}

#[derive(Debug)]
pub struct BalanceEvent {
    amount: Decimal,
    kind: BalanceEventKind,
    new_balance: Decimal,
}

impl BalanceEvent {
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn kind(&self) -> &BalanceEventKind {
        &self.kind
    }

    pub fn new_balance(&self) -> Decimal {
        self.new_balance
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CustomerError {
    #[error("Insufficient funds: balance is {balance}, requested {requested}")]
    InsufficientFunds { balance: Decimal, requested: Decimal },
    #[error("Deposit of {requested} would overflow balance {balance}")]
    BalanceOverflow { balance: Decimal, requested: Decimal },
}

/// Bank account holder together with the account balance.
///
/// `version` is bumped by the store on every successful update and is used
/// for conditional writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub national_id: String,
    pub phone: String,
    pub account_number: AccountNumber,
    pub balance: Decimal,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Customer row as handed to the store before an id is assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCustomer {
    pub name: String,
    pub national_id: String,
    pub phone: String,
    pub account_number: AccountNumber,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn apply(&mut self, event: &BalanceEvent) {
        self.balance = event.new_balance;
    }

    /// Checks the command against the current balance without touching it.
    /// The resulting balance is computed here, so [`Customer::apply`] cannot
    /// fail.
    pub fn handle_transaction(
        &self,
        command: &TransactionCommand,
    ) -> Result<BalanceEvent, CustomerError> {
        let amount = command.amount();
        match command.action() {
            TransactionAction::Deposit => {
                let new_balance = self.balance.checked_add(amount).ok_or(
                    CustomerError::BalanceOverflow {
                        balance: self.balance,
                        requested: amount,
                    },
                )?;
                Ok(BalanceEvent {
                    amount,
                    kind: BalanceEventKind::Deposited,
                    new_balance,
                })
            }
            TransactionAction::Withdraw => {
                let insufficient = CustomerError::InsufficientFunds {
                    balance: self.balance,
                    requested: amount,
                };
                if self.balance < amount {
                    return Err(insufficient);
                }
                let new_balance = self.balance.checked_sub(amount).ok_or(insufficient)?;
                Ok(BalanceEvent {
                    amount,
                    kind: BalanceEventKind::Withdrawn,
                    new_balance,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};
    use rust_decimal::prelude::{FromPrimitive, Zero};

    use super::*;

    fn customer() -> Customer {
        let now = Utc::now();
        Customer {
            id: 1,
            name: "Ana".to_owned(),
            national_id: "1111111111".to_owned(),
            phone: "08111".to_owned(),
            account_number: AccountNumber::from("0000000001"),
            balance: Decimal::zero(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn command(action: TransactionAction, amount: u32) -> TransactionCommand {
        TransactionCommand::new(
            AccountNumber::from("0000000001"),
            action,
            Decimal::from_u32(amount).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn generated_account_numbers_have_ten_digits() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let number = AccountNumber::generate(&mut rng);
            assert_eq!(number.as_str().len(), ACCOUNT_NUMBER_DIGITS);
            assert!(number.as_str().chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn same_seed_generates_same_number() {
        let first = AccountNumber::generate(&mut StdRng::seed_from_u64(42));
        let second = AccountNumber::generate(&mut StdRng::seed_from_u64(42));
        assert_eq!(first, second);
    }

    #[test]
    fn apply_events() {
        let mut acc = customer();
        acc.apply(&BalanceEvent {
            amount: Decimal::from_u32(10).unwrap(),
            kind: BalanceEventKind::Deposited,
            new_balance: Decimal::from_u32(10).unwrap(),
        });
        assert_eq!(acc.balance, Decimal::from_u32(10).unwrap());
        acc.apply(&BalanceEvent {
            amount: Decimal::from_u32(3).unwrap(),
            kind: BalanceEventKind::Withdrawn,
            new_balance: Decimal::from_u32(7).unwrap(),
        });
        assert_eq!(acc.balance, Decimal::from_u32(7).unwrap());
    }

    #[test]
    fn handle_transaction() {
        let mut acc = customer();

        let deposit_evt = acc
            .handle_transaction(&command(TransactionAction::Deposit, 13))
            .unwrap();
        assert_eq!(deposit_evt.amount(), Decimal::from_u32(13).unwrap());
        assert_eq!(deposit_evt.kind(), &BalanceEventKind::Deposited);

        // nothing deposited yet
        let withdrawal_cmd = command(TransactionAction::Withdraw, 5);
        let err = acc.handle_transaction(&withdrawal_cmd).unwrap_err();
        assert_eq!(
            err,
            CustomerError::InsufficientFunds {
                balance: Decimal::zero(),
                requested: Decimal::from_u32(5).unwrap(),
            }
        );
        assert_eq!(acc.balance, Decimal::zero());

        acc.apply(&deposit_evt);
        let withdrawal_evt = acc.handle_transaction(&withdrawal_cmd).unwrap();
        assert_eq!(withdrawal_evt.kind(), &BalanceEventKind::Withdrawn);
        acc.apply(&withdrawal_evt);
        assert_eq!(acc.balance, Decimal::from_u32(8).unwrap());
    }

    #[test]
    fn withdraw_exact_balance_is_allowed() {
        let mut acc = customer();
        acc.balance = Decimal::from_u32(20).unwrap();
        let evt = acc
            .handle_transaction(&command(TransactionAction::Withdraw, 20))
            .unwrap();
        acc.apply(&evt);
        assert_eq!(acc.balance, Decimal::zero());
    }

    #[test]
    fn deposit_overflow_is_rejected() {
        let mut acc = customer();
        acc.balance = Decimal::MAX;
        let cmd = TransactionCommand::new(
            acc.account_number.clone(),
            TransactionAction::Deposit,
            Decimal::ONE,
        )
        .unwrap();
        let err = acc.handle_transaction(&cmd).unwrap_err();
        assert_eq!(
            err,
            CustomerError::BalanceOverflow {
                balance: Decimal::MAX,
                requested: Decimal::ONE,
            }
        );
        assert_eq!(acc.balance, Decimal::MAX);
    }
}

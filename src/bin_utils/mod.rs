//! Bootstraps [`crate::bank::Bank`] for the binary and the integration tests:
//! replays an operation script against an in-memory store and prints every
//! registered customer's balance.

use std::{
    collections::HashMap,
    io::{Read, Write},
    sync::Arc,
};

use anyhow::{Context, Result};
use mockable::DefaultClock;
use rand::{SeedableRng, rngs::StdRng};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;

use crate::{
    bank::{Bank, BankError},
    command::{
        CommandError, Credentials, OperationKind, RegisterCustomerCommand, TransactionAction,
        TransactionCommand,
    },
    config::BankConfig,
    customer::AccountNumber,
    store::in_memory_store::InMemoryStore,
};
use csv_parser::{CsvOperationParser, Operation};
use csv_printer::{CustomerBalance, print_balances};

pub mod cli;
pub mod csv_parser;
pub mod csv_printer;
pub mod logging;

/// Why a single script row was not applied.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Malformed row: {0}")]
    Parse(#[from] csv::Error),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Bank(#[from] BankError),
    #[error("Customer `{0}` is already registered in this script")]
    AliasInUse(String),
    #[error("Balance of `{customer}` is {actual}, expected {expected}")]
    BalanceMismatch {
        customer: String,
        expected: Decimal,
        actual: Decimal,
    },
}

impl ReplayError {
    /// Rows rejected for business reasons, as opposed to broken input or
    /// failures inside the bank.
    pub fn is_rejection(&self) -> bool {
        match self {
            Self::Bank(err) => !err.is_internal(),
            Self::Parse(_) | Self::Command(_) | Self::AliasInUse(_) => false,
            Self::BalanceMismatch { .. } => true,
        }
    }
}

pub struct Service<'w, R, W: 'w> {
    pub input: R,
    pub output: &'w mut W,
    pub config: BankConfig,
    /// User the script runs as. It is registered on the fresh store and then
    /// logged in.
    pub operator: Credentials,
    /// Fixes the account number sequence when set.
    pub seed: Option<u64>,
    pub error_printer: Box<dyn FnMut(u64, ReplayError)>,
}

impl<'w, R, W> Service<'w, R, W>
where
    R: Read,
    W: Write + 'w,
{
    pub fn run(mut self) -> Result<()> {
        let store = Arc::new(InMemoryStore::default());
        let mut bank = Bank::new(store.clone(), &self.config, Arc::new(DefaultClock))
            .context("Failed to set up the bank")?;
        if let Some(seed) = self.seed {
            bank = bank.with_rng(StdRng::seed_from_u64(seed));
        }

        bank.register_user(&self.operator)
            .context("Failed to register the operator")?;
        let token = bank
            .login(&self.operator)
            .context("Failed to log in as the operator")?;

        let mut replay = Replay {
            bank: &bank,
            token: token.as_str(),
            aliases: HashMap::new(),
        };
        for (line, row) in CsvOperationParser::new(self.input) {
            let result = row
                .map_err(ReplayError::from)
                .and_then(|operation| replay.apply(operation));
            if let Err(err) = result {
                (self.error_printer)(line, err);
            }
        }

        let names: HashMap<_, _> = replay
            .aliases
            .into_iter()
            .map(|(alias, account_number)| (account_number, alias))
            .collect();
        print_balances(
            self.output,
            store.customers().into_iter().filter_map(|customer| {
                let alias = names.get(&customer.account_number)?;
                Some(CustomerBalance {
                    customer: alias.clone(),
                    account_number: customer.account_number,
                    name: customer.name,
                    balance: customer.balance,
                })
            }),
        )
    }
}

struct Replay<'a> {
    bank: &'a Bank<InMemoryStore>,
    token: &'a str,
    aliases: HashMap<String, AccountNumber>,
}

impl Replay<'_> {
    fn apply(&mut self, operation: Operation) -> Result<(), ReplayError> {
        match operation.kind {
            OperationKind::Register => {
                if self.aliases.contains_key(&operation.customer) {
                    return Err(ReplayError::AliasInUse(operation.customer));
                }
                let command = RegisterCustomerCommand::parse(
                    operation.name.as_deref().unwrap_or_default(),
                    operation.nik.as_deref().unwrap_or_default(),
                    operation.phone.as_deref().unwrap_or_default(),
                )?;
                let customer = self.bank.register_customer(self.token, &command)?;
                self.aliases.insert(operation.customer, customer.account_number);
            }
            OperationKind::Deposit => self.transact(&operation, TransactionAction::Deposit)?,
            OperationKind::Withdraw => self.transact(&operation, TransactionAction::Withdraw)?,
            OperationKind::Balance => {
                let account_number = self.resolve(&operation.customer);
                let actual = self.bank.balance(self.token, &account_number)?;
                info!(
                    customer = %operation.customer,
                    %account_number,
                    balance = %actual,
                    "balance checked"
                );
                match operation.amount {
                    Some(expected) if expected != actual => {
                        return Err(ReplayError::BalanceMismatch {
                            customer: operation.customer,
                            expected,
                            actual,
                        });
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn transact(
        &self,
        operation: &Operation,
        action: TransactionAction,
    ) -> Result<(), ReplayError> {
        let account_number = self.resolve(&operation.customer);
        let command =
            TransactionCommand::parse(account_number.as_str(), operation.amount, action)?;
        self.bank.execute(self.token, &command)?;
        Ok(())
    }

    /// Unbound aliases are taken as literal account numbers.
    fn resolve(&self, customer: &str) -> AccountNumber {
        self.aliases
            .get(customer)
            .cloned()
            .unwrap_or_else(|| AccountNumber::from(customer))
    }
}

use std::sync::Arc;

use mockable::Clock;
use rand::rngs::StdRng;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;
use zeroize::Zeroizing;

use crate::{
    command::{
        CommandError, Credentials, RegisterCustomerCommand, TransactionAction, TransactionCommand,
    },
    config::BankConfig,
    credentials::{PasswordError, PasswordHasher, TokenError, TokenIssuer},
    customer::{AccountNumber, Customer, CustomerError, IdentityField},
    store::{CustomerRepository, StoreError, UserRepository},
    user::Session,
};

pub mod auth;
pub mod ledger;
pub mod registrar;

pub use auth::AuthService;
pub use ledger::Ledger;
pub use registrar::Registrar;

/// Failures reported to callers of [`Bank`].
///
/// Everything except [`BankError::Internal`] is an expected business
/// outcome. Token problems of any kind are reported as
/// [`BankError::Unauthenticated`].
#[derive(Debug, Error)]
pub enum BankError {
    #[error(transparent)]
    Validation(#[from] CommandError),
    #[error("The {0} is already registered")]
    DuplicateIdentity(IdentityField),
    #[error("Account {0} not found")]
    AccountNotFound(AccountNumber),
    #[error(transparent)]
    Customer(#[from] CustomerError),
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Unauthenticated")]
    Unauthenticated,
    #[error("Account {0} is being updated concurrently, try again")]
    ConcurrentUpdateConflict(AccountNumber),
    #[error("Internal error")]
    Internal(#[from] InternalError),
}

#[derive(Debug, Error)]
pub enum InternalError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error(transparent)]
    Token(#[from] TokenError),
}

impl BankError {
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

impl From<StoreError> for BankError {
    fn from(err: StoreError) -> Self {
        Self::Internal(InternalError::Store(err))
    }
}

impl From<PasswordError> for BankError {
    fn from(err: PasswordError) -> Self {
        Self::Internal(InternalError::Password(err))
    }
}

/// Entry point tying authentication, registration and the ledger together.
///
/// Every customer operation first authenticates the caller's bearer token.
/// Any authenticated user may act on any account number.
pub struct Bank<S> {
    auth: AuthService<S>,
    registrar: Registrar<S>,
    ledger: Ledger<S>,
}

impl<S> Bank<S>
where
    S: UserRepository + CustomerRepository,
{
    pub fn new(
        store: Arc<S>,
        config: &BankConfig,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Result<Self, BankError> {
        let hasher = PasswordHasher::new(config.password)?;
        let tokens = TokenIssuer::new(&config.jwt_secret, clock.clone());
        Ok(Self {
            auth: AuthService::new(store.clone(), hasher, tokens, clock.clone())?,
            registrar: Registrar::new(
                store.clone(),
                clock.clone(),
                config.account_number_attempts,
            ),
            ledger: Ledger::new(store, clock, config.max_update_attempts),
        })
    }

    /// Replaces the entropy source used for account numbers.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.registrar = self.registrar.with_rng(rng);
        self
    }

    pub fn register_user(
        &self,
        credentials: &Credentials,
    ) -> Result<Zeroizing<String>, BankError> {
        self.auth.register(credentials)
    }

    pub fn login(&self, credentials: &Credentials) -> Result<Zeroizing<String>, BankError> {
        self.auth.login(credentials)
    }

    pub fn authenticate(&self, token: &str) -> Result<Session, BankError> {
        self.auth.authenticate(token)
    }

    pub fn register_customer(
        &self,
        token: &str,
        command: &RegisterCustomerCommand,
    ) -> Result<Customer, BankError> {
        let session = self.authenticate(token)?;
        debug!(user_id = session.user_id, "registering customer");
        self.registrar.register(command)
    }

    pub fn deposit(
        &self,
        token: &str,
        account_number: &AccountNumber,
        amount: Decimal,
    ) -> Result<Decimal, BankError> {
        let command =
            TransactionCommand::new(account_number.clone(), TransactionAction::Deposit, amount)?;
        self.execute(token, &command)
    }

    pub fn withdraw(
        &self,
        token: &str,
        account_number: &AccountNumber,
        amount: Decimal,
    ) -> Result<Decimal, BankError> {
        let command =
            TransactionCommand::new(account_number.clone(), TransactionAction::Withdraw, amount)?;
        self.execute(token, &command)
    }

    /// Applies a deposit or withdrawal, returning the new balance. The amount
    /// was checked when the command was built.
    pub fn execute(
        &self,
        token: &str,
        command: &TransactionCommand,
    ) -> Result<Decimal, BankError> {
        let session = self.authenticate(token)?;
        debug!(
            user_id = session.user_id,
            account_number = %command.account_number(),
            action = ?command.action(),
            "executing transaction"
        );
        self.ledger.execute(command)
    }

    pub fn balance(
        &self,
        token: &str,
        account_number: &AccountNumber,
    ) -> Result<Decimal, BankError> {
        let session = self.authenticate(token)?;
        debug!(user_id = session.user_id, %account_number, "querying balance");
        self.ledger.balance(account_number)
    }
}

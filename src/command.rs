use std::fmt;

use rust_decimal::{Decimal, prelude::Zero};
use serde::Deserialize;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::customer::AccountNumber;

pub const MIN_PASSWORD_LEN: usize = 6;

/// Row kinds accepted by the operation script replayed by the binary.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Register,
    Deposit,
    Withdraw,
    Balance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionAction {
    Deposit,
    Withdraw,
}

/// A deposit or withdrawal of a strictly positive amount. Only built through
/// [`TransactionCommand::new`] or [`TransactionCommand::parse`].
#[derive(Debug, Clone)]
pub struct TransactionCommand {
    account_number: AccountNumber,
    action: TransactionAction,
    amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterCustomerCommand {
    pub name: String,
    pub national_id: String,
    pub phone: String,
}

/// Email/password pair used for both registration and login.
///
/// The password is wiped from memory once the value is dropped.
#[derive(Clone)]
pub struct Credentials {
    email: String,
    password: Zeroizing<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Field `{field}` must not be empty")]
    EmptyField { field: &'static str },
    #[error("Email address is malformed")]
    InvalidEmail,
    #[error("Password must be at least {min} characters long")]
    PasswordTooShort { min: usize },
    #[error("Amount is required for {action:?}")]
    AmountRequired { action: TransactionAction },
    #[error("Amount must be greater than zero for {action:?}")]
    NonPositiveAmount { action: TransactionAction },
}

fn required(field: &'static str, value: &str) -> Result<String, CommandError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(CommandError::EmptyField { field })
    } else {
        Ok(trimmed.to_owned())
    }
}

impl TransactionCommand {
    pub fn new(
        account_number: AccountNumber,
        action: TransactionAction,
        amount: Decimal,
    ) -> Result<Self, CommandError> {
        if amount <= Decimal::zero() {
            return Err(CommandError::NonPositiveAmount { action });
        }
        Ok(Self {
            account_number,
            action,
            amount,
        })
    }

    pub fn parse(
        account_number: &str,
        amount: Option<Decimal>,
        action: TransactionAction,
    ) -> Result<Self, CommandError> {
        let account_number = AccountNumber::from(required("account_number", account_number)?);
        let Some(amount) = amount else {
            return Err(CommandError::AmountRequired { action });
        };
        Self::new(account_number, action, amount)
    }

    pub fn account_number(&self) -> &AccountNumber {
        &self.account_number
    }

    pub fn action(&self) -> TransactionAction {
        self.action
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }
}

impl RegisterCustomerCommand {
    pub fn parse(name: &str, national_id: &str, phone: &str) -> Result<Self, CommandError> {
        Ok(Self {
            name: required("name", name)?,
            national_id: required("national_id", national_id)?,
            phone: required("phone", phone)?,
        })
    }
}

impl Credentials {
    /// Emails are kept exactly as supplied (apart from surrounding
    /// whitespace) since lookups are case-sensitive.
    pub fn parse(email: &str, password: &str) -> Result<Self, CommandError> {
        let email = required("email", email)?;
        if !is_plausible_email(&email) {
            return Err(CommandError::InvalidEmail);
        }
        if password.is_empty() {
            return Err(CommandError::EmptyField { field: "password" });
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(CommandError::PasswordTooShort {
                min: MIN_PASSWORD_LEN,
            });
        }
        Ok(Self {
            email,
            password: Zeroizing::new(password.to_owned()),
        })
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &str {
        self.password.as_str()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

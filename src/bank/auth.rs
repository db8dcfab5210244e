use std::sync::Arc;

use mockable::Clock;
use tracing::{error, info, warn};
use zeroize::Zeroizing;

use crate::{
    command::Credentials,
    credentials::{PasswordError, PasswordHasher, TokenError, TokenIssuer},
    customer::IdentityField,
    store::{StoreError, UserRepository},
    user::{NewUser, Session, User},
};

use super::{BankError, InternalError};

/// User registration, login and bearer-token checks.
pub struct AuthService<U> {
    store: Arc<U>,
    hasher: PasswordHasher,
    tokens: TokenIssuer,
    clock: Arc<dyn Clock + Send + Sync>,
    /// Verified against on unknown emails so both login failures cost one
    /// Argon2 run.
    dummy_hash: String,
}

impl<U> AuthService<U>
where
    U: UserRepository,
{
    pub fn new(
        store: Arc<U>,
        hasher: PasswordHasher,
        tokens: TokenIssuer,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Result<Self, PasswordError> {
        let dummy_hash = hasher.hash("unknown-user-password")?;
        Ok(Self {
            store,
            hasher,
            tokens,
            clock,
            dummy_hash,
        })
    }

    /// Creates the user and returns a token for it.
    pub fn register(&self, credentials: &Credentials) -> Result<Zeroizing<String>, BankError> {
        let email = credentials.email();
        if self.store.find_user_by_email(email)?.is_some() {
            info!(email, "registration rejected: email already registered");
            return Err(BankError::DuplicateIdentity(IdentityField::Email));
        }

        let password_hash = self.hasher.hash(credentials.password()).inspect_err(|err| {
            error!(error = %err, "failed to hash password");
        })?;
        let user = self
            .store
            .insert_user(NewUser {
                email: email.to_owned(),
                password_hash,
                created_at: self.clock.utc(),
            })
            .map_err(|err| match err {
                StoreError::UniqueViolation { field } => {
                    info!(email, "registration rejected: email already registered");
                    BankError::DuplicateIdentity(field)
                }
                err => {
                    error!(error = %err, "failed to store user");
                    err.into()
                }
            })?;

        let token = self.issue(&user)?;
        info!(email, user_id = user.id, "user registered");
        Ok(token)
    }

    /// Unknown email and wrong password are indistinguishable to the caller.
    pub fn login(&self, credentials: &Credentials) -> Result<Zeroizing<String>, BankError> {
        let email = credentials.email();
        let Some(user) = self.store.find_user_by_email(email)? else {
            // result ignored, only the work matters
            let _ = self.hasher.verify(credentials.password(), &self.dummy_hash);
            info!(email, "login rejected: unknown email");
            return Err(BankError::InvalidCredentials);
        };

        let matches = self
            .hasher
            .verify(credentials.password(), &user.password_hash)
            .inspect_err(|err| error!(error = %err, user_id = user.id, "failed to verify password"))?;
        if !matches {
            info!(email, "login rejected: wrong password");
            return Err(BankError::InvalidCredentials);
        }

        let token = self.issue(&user)?;
        info!(email, user_id = user.id, "user logged in");
        Ok(token)
    }

    pub fn authenticate(&self, token: &str) -> Result<Session, BankError> {
        self.tokens.verify(token).map_err(|err| {
            match &err {
                TokenError::Expired { exp } => warn!(exp, "rejected expired token"),
                err => warn!(error = %err, "rejected invalid token"),
            }
            BankError::Unauthenticated
        })
    }

    fn issue(&self, user: &User) -> Result<Zeroizing<String>, BankError> {
        self.tokens.issue(&Session::from(user)).map_err(|err| {
            error!(error = %err, user_id = user.id, "failed to sign token");
            BankError::Internal(InternalError::Token(err))
        })
    }
}

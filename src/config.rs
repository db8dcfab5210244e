use std::fmt;

use zeroize::Zeroizing;

use crate::credentials::HashParams;

pub const DEFAULT_MAX_UPDATE_ATTEMPTS: u32 = 3;

/// Settings handed to [`crate::bank::Bank::new`]. Built once per process by
/// the caller; nothing in the library reads the environment.
#[derive(Clone)]
pub struct BankConfig {
    /// HS256 signing secret for bearer tokens.
    pub jwt_secret: Zeroizing<Vec<u8>>,
    pub password: HashParams,
    /// Optimistic write attempts per deposit/withdraw before giving up with
    /// a conflict.
    pub max_update_attempts: u32,
    /// Account numbers drawn per registration. `1` keeps the plain random
    /// draw; larger values regenerate when the store reports a collision.
    pub account_number_attempts: u32,
}

impl BankConfig {
    pub fn new(jwt_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            jwt_secret: Zeroizing::new(jwt_secret.into()),
            password: HashParams::default(),
            max_update_attempts: DEFAULT_MAX_UPDATE_ATTEMPTS,
            account_number_attempts: 1,
        }
    }

    pub fn with_password_params(mut self, params: HashParams) -> Self {
        self.password = params;
        self
    }

    pub fn with_max_update_attempts(mut self, attempts: u32) -> Self {
        self.max_update_attempts = attempts.max(1);
        self
    }

    pub fn with_account_number_attempts(mut self, attempts: u32) -> Self {
        self.account_number_attempts = attempts.max(1);
        self
    }
}

impl fmt::Debug for BankConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BankConfig")
            .field("jwt_secret", &"<redacted>")
            .field("password", &self.password)
            .field("max_update_attempts", &self.max_update_attempts)
            .field("account_number_attempts", &self.account_number_attempts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_builders() {
        let config = BankConfig::new("secret");
        assert_eq!(config.jwt_secret.as_slice(), b"secret");
        assert_eq!(config.max_update_attempts, DEFAULT_MAX_UPDATE_ATTEMPTS);
        assert_eq!(config.account_number_attempts, 1);
        assert_eq!(config.password, HashParams::default());

        let config = config
            .with_max_update_attempts(0)
            .with_account_number_attempts(4);
        assert_eq!(config.max_update_attempts, 1);
        assert_eq!(config.account_number_attempts, 4);
        assert!(format!("{config:?}").contains("<redacted>"));
    }
}

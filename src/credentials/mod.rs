//! Credential primitives: password digests and bearer tokens.

pub mod password;
pub mod token;

pub use password::{HashParams, PasswordError, PasswordHasher};
pub use token::{Claims, TOKEN_TTL_HOURS, TokenError, TokenIssuer};

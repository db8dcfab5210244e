/// Validated inputs: credentials, customer registration and
/// deposit/withdraw commands later executed by [`bank`].
pub mod command;

/// Customer accounts and their balances.
/// The balance is modified using events, which are created by handling commands
pub mod customer;

pub mod user;

/// Repository interfaces, plus "in memory" implementation.
///
/// NOTE: the in memory store is enough for the binary and the tests, but the
/// traits are the integration point for a real database.
pub mod store;

/// Password hashing and bearer tokens.
pub mod credentials;

pub mod config;

/// Coordinates authentication, customer registration and balance changes.
pub mod bank;

/// Bootstraps [`bank`] for the binary. It lives here so the integration
/// tests can drive it too.
pub mod bin_utils;

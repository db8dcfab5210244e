//! Command line of the `savings-ledger` binary.

use std::path::PathBuf;

use clap::Parser;

use crate::{
    command::Credentials,
    config::{BankConfig, DEFAULT_MAX_UPDATE_ATTEMPTS},
};

use super::logging::LogFormat;

/// Replays a CSV script of customer operations against a fresh in-memory
/// bank and prints the resulting balances as CSV.
///
/// Script columns: `type,customer,name,nik,phone,amount` where `type` is one
/// of `register`, `deposit`, `withdraw` or `balance`.
#[derive(Parser)]
#[command(name = "savings-ledger", version)]
pub struct Cli {
    /// Operation script to replay.
    pub input: PathBuf,

    /// HS256 secret used to sign bearer tokens.
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Email of the user the script runs as.
    #[arg(long, env = "LEDGER_OPERATOR_EMAIL", default_value = "operator@ledger.local")]
    pub operator_email: String,

    /// Password of the user the script runs as.
    #[arg(long, env = "LEDGER_OPERATOR_PASSWORD", hide_env_values = true)]
    pub operator_password: String,

    /// Optimistic write attempts per deposit or withdrawal.
    #[arg(long, default_value_t = DEFAULT_MAX_UPDATE_ATTEMPTS)]
    pub max_update_attempts: u32,

    /// Account numbers drawn per registration before giving up on collisions.
    #[arg(long, default_value_t = 1)]
    pub account_number_attempts: u32,

    /// Seed for account number generation, for reproducible reports.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Default log filter. `RUST_LOG` takes precedence when set.
    #[arg(long, default_value = "info")]
    pub log_level: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl Cli {
    pub fn bank_config(&self) -> BankConfig {
        BankConfig::new(self.jwt_secret.as_bytes())
            .with_max_update_attempts(self.max_update_attempts)
            .with_account_number_attempts(self.account_number_attempts)
    }

    pub fn operator(&self) -> anyhow::Result<Credentials> {
        Ok(Credentials::parse(
            &self.operator_email,
            &self.operator_password,
        )?)
    }
}

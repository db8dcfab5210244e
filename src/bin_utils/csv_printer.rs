use std::io::Write;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::customer::AccountNumber;

/// One line of the final report.
#[derive(Debug, Serialize)]
pub struct CustomerBalance {
    pub customer: String,
    pub account_number: AccountNumber,
    pub name: String,
    pub balance: Decimal,
}

pub fn print_balances<W: Write>(
    output: &mut W,
    balances: impl IntoIterator<Item = CustomerBalance>,
) -> Result<()> {
    let mut writer = csv::Writer::from_writer(output);
    for row in balances {
        let account_number = row.account_number.clone();
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write balance of account {account_number}"))?;
    }
    writer.flush().context("Failed to flush balance report")
}

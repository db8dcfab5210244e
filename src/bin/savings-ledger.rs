use std::fs::File;

use anyhow::{Context, Result};
use clap::Parser;
use savings_ledger::bin_utils::{Service, cli::Cli, logging::init_logging};
use tracing::{error, info};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format)?;

    let filename = cli.input.display().to_string();
    let file = File::open(&cli.input).with_context(|| format!("Failed to open `{filename}`"))?;

    let service = Service {
        input: file,
        output: &mut std::io::stdout(),
        config: cli.bank_config(),
        operator: cli.operator().context("Invalid operator credentials")?,
        seed: cli.seed,
        error_printer: Box::new(|line, err| {
            if err.is_rejection() {
                // business outcomes, not technical errors
                info!(line, error = %err, "operation rejected");
            } else {
                error!(line, error = %err, "operation failed");
            }
        }),
    };
    service.run()
}

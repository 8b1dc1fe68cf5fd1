//! Binary entry point for the `atp-remediate` CLI.

use std::io::{self, Write};
use std::process;
use std::sync::Arc;

use clap::Parser;
use thiserror::Error;

use atp_remediate::{
    ConfigError, JsonReportWriter, LoggingError, OciCliService, RemediateConfig, RemediationRun,
    RunError, RunReceipt, RunSummary, init_tracing,
};

mod cli;

use cli::Cli;

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Logging(#[from] LoggingError),
    #[error("{0}")]
    Run(#[from] RunError),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let exit_code = match execute(&cli).await {
        Ok(receipt) => {
            write_receipt(io::stdout(), &receipt);
            0
        }
        Err(err) => {
            write_error(io::stderr(), &err);
            1
        }
    };

    process::exit(exit_code);
}

async fn execute(cli: &Cli) -> Result<RunReceipt, CliError> {
    let config = resolve_config(cli)?;
    init_tracing(config.verbose)?;

    let service = Arc::new(OciCliService::with_process_runner(config.oci_settings()));
    let writer = JsonReportWriter::new(config.report_dir());
    let receipt = RemediationRun::new(service, writer, config.dry_run)
        .with_pool_size(config.pool_size()?)
        .with_stagger(config.stagger())
        .execute()
        .await?;
    Ok(receipt)
}

fn resolve_config(cli: &Cli) -> Result<RemediateConfig, CliError> {
    let mut config = RemediateConfig::load_without_cli_args()?;
    apply_overrides(&mut config, cli);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(config: &mut RemediateConfig, cli: &Cli) {
    config.verbose |= cli.verbose;
    config.dry_run |= cli.dry_run;
    config.instance_principal |= cli.instance_principal;
    if let Some(profile) = &cli.profile {
        config.profile.clone_from(profile);
    }
    if let Some(threads) = cli.threads {
        config.threads = threads;
    }
    if let Some(report_dir) = &cli.report_dir {
        config.report_dir.clone_from(report_dir);
    }
}

fn write_summary(target: &mut impl Write, summary: &RunSummary, dry_run: bool) {
    let prefix = if dry_run { "DRYRUN: " } else { "" };
    writeln!(
        target,
        "{prefix}processed {} databases: {} remediated, {} unchanged, {} skipped, {} failed",
        summary.total, summary.remediated, summary.unchanged, summary.skipped, summary.failed
    )
    .ok();
}

fn write_receipt(mut target: impl Write, receipt: &RunReceipt) {
    write_summary(&mut target, &receipt.summary(), receipt.report.dry_run);
    writeln!(target, "report written to {}", receipt.location).ok();
}

fn write_error(mut target: impl Write, err: &CliError) {
    if let CliError::Run(RunError::Report { summary, .. }) = err {
        write_summary(&mut target, summary, false);
    }
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;

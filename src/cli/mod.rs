//! Command-line interface definitions for the `atp-remediate` binary.
//!
//! This module centralises the clap parser so both the binary and the build
//! script can reuse it when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `atp-remediate` binary.
///
/// Every flag overrides the value loaded from configuration files and
/// `ATP_REMEDIATE_*` environment variables.
#[derive(Debug, Parser)]
#[command(
    name = "atp-remediate",
    version,
    about = "Normalise serverless Autonomous Databases to ECPU, GB storage, BYOL, and a stop schedule"
)]
pub(crate) struct Cli {
    /// Emit debug-level logs.
    #[arg(short, long)]
    pub(crate) verbose: bool,
    /// OCI CLI config profile used for authentication.
    #[arg(long, value_name = "PROFILE", conflicts_with = "instance_principal")]
    pub(crate) profile: Option<String>,
    /// Authenticate with the host's instance principal.
    #[arg(long, alias = "instanceprincipal")]
    pub(crate) instance_principal: bool,
    /// Report intended changes without mutating any database.
    #[arg(long, alias = "dryrun")]
    pub(crate) dry_run: bool,
    /// Maximum number of databases processed concurrently.
    #[arg(short = 't', long, value_name = "N")]
    pub(crate) threads: Option<usize>,
    /// Directory receiving the JSON report.
    #[arg(long, value_name = "DIR")]
    pub(crate) report_dir: Option<String>,
}

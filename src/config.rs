//! Configuration loading via `ortho-config`.

use std::ffi::OsString;
use std::num::NonZeroUsize;
use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::dispatch::DEFAULT_POOL_SIZE;
use crate::oci::{
    DEFAULT_OCI_BIN, DEFAULT_PROFILE, DEFAULT_SEARCH_LIMIT, DEFAULT_WORKLOAD_TYPE, OciAuth,
    OciSettings, PollPolicy,
};

const CONFIG_FILE_NAME: &str = "atp-remediate.toml";

/// Longest accepted lifecycle wait, one day.
pub const MAX_WAIT_TIMEOUT_SECS: u64 = 86_400;

/// Run settings layered from defaults, configuration files, and environment
/// variables. CLI flags are applied on top by the binary.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "ATP_REMEDIATE",
    discovery(
        app_name = "atp-remediate",
        env_var = "ATP_REMEDIATE_CONFIG_PATH",
        config_file_name = "atp-remediate.toml",
        dotfile_name = ".atp-remediate.toml",
        project_file_name = "atp-remediate.toml"
    )
)]
#[expect(
    clippy::struct_excessive_bools,
    reason = "configuration struct with user-facing toggles that are naturally booleans"
)]
pub struct RemediateConfig {
    /// Report intended changes without mutating anything.
    #[ortho_config(default = false)]
    pub dry_run: bool,
    /// Maximum number of instances processed concurrently.
    #[ortho_config(default = 5)]
    pub threads: usize,
    /// Emit debug-level logs.
    #[ortho_config(default = false)]
    pub verbose: bool,
    /// `oci` config-file profile used unless instance-principal auth is on.
    #[ortho_config(default = DEFAULT_PROFILE.to_owned())]
    pub profile: String,
    /// Authenticate with the host's instance principal.
    #[ortho_config(default = false)]
    pub instance_principal: bool,
    /// Directory receiving the JSON report.
    #[ortho_config(default = ".".to_owned())]
    pub report_dir: String,
    /// Path to the `oci` executable.
    #[ortho_config(default = DEFAULT_OCI_BIN.to_owned())]
    pub oci_bin: String,
    /// Seconds between lifecycle polls.
    #[ortho_config(default = 10)]
    pub poll_interval_secs: u64,
    /// Seconds before a lifecycle wait gives up.
    #[ortho_config(default = 1800)]
    pub wait_timeout_secs: u64,
    /// Page size of the candidate search.
    #[ortho_config(default = DEFAULT_SEARCH_LIMIT)]
    pub search_limit: u32,
    /// Workload type selecting candidate databases.
    #[ortho_config(default = DEFAULT_WORKLOAD_TYPE.to_owned())]
    pub workload_type: String,
    /// Delay before each worker's first call, in milliseconds.
    #[ortho_config(default = 500)]
    pub stagger_millis: u64,
}

impl Default for RemediateConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            threads: DEFAULT_POOL_SIZE.get(),
            verbose: false,
            profile: DEFAULT_PROFILE.to_owned(),
            instance_principal: false,
            report_dir: String::from("."),
            oci_bin: DEFAULT_OCI_BIN.to_owned(),
            poll_interval_secs: 10,
            wait_timeout_secs: 1800,
            search_limit: DEFAULT_SEARCH_LIMIT,
            workload_type: DEFAULT_WORKLOAD_TYPE.to_owned(),
            stagger_millis: 500,
        }
    }
}

impl RemediateConfig {
    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("atp-remediate")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages name the environment
    /// variable and configuration key that fix the problem.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when a value is unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pool_size()?;
        if !self.instance_principal {
            require_text(&self.profile, "profile", "--profile")?;
        }
        require_text(&self.oci_bin, "oci_bin", "")?;
        require_text(&self.workload_type, "workload_type", "")?;
        require_text(&self.report_dir, "report_dir", "--report-dir")?;
        if self.search_limit == 0 {
            return Err(invalid("search_limit", "must be at least 1", ""));
        }
        if self.poll_interval_secs == 0 {
            return Err(invalid("poll_interval_secs", "must be at least 1", ""));
        }
        if self.wait_timeout_secs > MAX_WAIT_TIMEOUT_SECS {
            return Err(invalid(
                "wait_timeout_secs",
                &format!("must not exceed {MAX_WAIT_TIMEOUT_SECS}"),
                "",
            ));
        }
        Ok(())
    }

    /// Concurrency bound for the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when `threads` is zero.
    pub fn pool_size(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.threads)
            .ok_or_else(|| invalid("threads", "must be at least 1", "--threads"))
    }

    /// Authentication mode for the `oci` CLI.
    #[must_use]
    pub fn auth(&self) -> OciAuth {
        if self.instance_principal {
            OciAuth::InstancePrincipal
        } else {
            OciAuth::Profile(self.profile.trim().to_owned())
        }
    }

    /// Lifecycle poll bounds.
    #[must_use]
    pub const fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.poll_interval_secs),
            timeout: Duration::from_secs(self.wait_timeout_secs),
        }
    }

    /// Settings for the CLI-backed service.
    #[must_use]
    pub fn oci_settings(&self) -> OciSettings {
        OciSettings {
            oci_bin: self.oci_bin.trim().to_owned(),
            auth: self.auth(),
            workload_type: self.workload_type.trim().to_owned(),
            search_limit: self.search_limit,
            poll: self.poll_policy(),
        }
    }

    /// Per-worker start delay.
    #[must_use]
    pub const fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_millis)
    }

    /// Directory receiving reports.
    #[must_use]
    pub fn report_dir(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(self.report_dir.trim())
    }
}

fn require_text(value: &str, key: &str, flag: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(invalid(key, "must not be blank", flag));
    }
    Ok(())
}

fn invalid(key: &str, problem: &str, flag: &str) -> ConfigError {
    let env_var = format!("ATP_REMEDIATE_{}", key.to_ascii_uppercase());
    let hint = if flag.is_empty() {
        format!("set {env_var} or {key} in {CONFIG_FILE_NAME}")
    } else {
        format!("pass {flag}, set {env_var}, or set {key} in {CONFIG_FILE_NAME}")
    };
    ConfigError::InvalidValue(format!("{key} {problem}: {hint}"))
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a configuration value is present but unusable.
    #[error("invalid configuration: {0}")]
    InvalidValue(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn config() -> RemediateConfig {
        RemediateConfig::default()
    }

    #[rstest]
    fn defaults_are_valid(config: RemediateConfig) {
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.pool_size().map(NonZeroUsize::get), Ok(5));
        assert_eq!(config.auth(), OciAuth::Profile(String::from("DEFAULT")));
        assert_eq!(config.stagger(), Duration::from_millis(500));
        assert_eq!(config.poll_policy(), PollPolicy::default());
    }

    #[rstest]
    fn zero_threads_are_rejected_with_guidance(mut config: RemediateConfig) {
        config.threads = 0;
        let err = config.validate().expect_err("zero threads should be rejected");
        let message = err.to_string();
        assert!(message.contains("ATP_REMEDIATE_THREADS"), "{message}");
        assert!(message.contains("--threads"), "{message}");
        assert!(message.contains("atp-remediate.toml"), "{message}");
    }

    #[rstest]
    #[case::profile(|c: &mut RemediateConfig| c.profile = String::from("  "), "profile")]
    #[case::oci_bin(|c: &mut RemediateConfig| c.oci_bin.clear(), "oci_bin")]
    #[case::workload(|c: &mut RemediateConfig| c.workload_type.clear(), "workload_type")]
    #[case::report_dir(|c: &mut RemediateConfig| c.report_dir.clear(), "report_dir")]
    #[case::search_limit(|c: &mut RemediateConfig| c.search_limit = 0, "search_limit")]
    #[case::poll(|c: &mut RemediateConfig| c.poll_interval_secs = 0, "poll_interval_secs")]
    #[case::wait(|c: &mut RemediateConfig| c.wait_timeout_secs = u64::MAX, "wait_timeout_secs")]
    fn blank_or_zero_values_are_rejected(
        mut config: RemediateConfig,
        #[case] mutate: fn(&mut RemediateConfig),
        #[case] key: &str,
    ) {
        mutate(&mut config);
        let err = config.validate().expect_err("validation should fail");
        assert!(err.to_string().contains(key), "{err}");
    }

    #[rstest]
    fn longest_wait_timeout_is_accepted(mut config: RemediateConfig) {
        config.wait_timeout_secs = MAX_WAIT_TIMEOUT_SECS;
        assert_eq!(config.validate(), Ok(()));
    }

    #[rstest]
    fn instance_principal_ignores_profile(mut config: RemediateConfig) {
        config.instance_principal = true;
        config.profile.clear();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.oci_settings().auth, OciAuth::InstancePrincipal);
    }

    #[rstest]
    fn oci_settings_carry_configured_knobs(mut config: RemediateConfig) {
        config.oci_bin = String::from(" /opt/oci/bin/oci ");
        config.workload_type = String::from("DW");
        config.search_limit = 50;
        config.poll_interval_secs = 3;
        config.wait_timeout_secs = 60;

        let settings = config.oci_settings();

        assert_eq!(settings.oci_bin, "/opt/oci/bin/oci");
        assert_eq!(settings.workload_type, "DW");
        assert_eq!(settings.search_limit, 50);
        assert_eq!(
            settings.poll,
            PollPolicy {
                interval: Duration::from_secs(3),
                timeout: Duration::from_secs(60),
            }
        );
    }
}

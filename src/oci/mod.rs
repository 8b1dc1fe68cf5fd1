//! [`DatabaseService`] implementation that shells out to the `oci` CLI.
//!
//! Every call runs one `oci` command through a [`CommandRunner`] and parses
//! its JSON output. Authentication is passed on each invocation, either as a
//! config-file profile or as instance-principal auth.

mod types;

use std::ffi::OsString;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use shell_escape::unix::escape;
use tokio::time::sleep;
use tracing::debug;

use crate::instance::{InstanceId, InstanceRecord, LifecycleState};
use crate::runner::{CommandOutput, CommandRunner, ProcessCommandRunner};
use crate::service::{DatabaseService, InstanceUpdate, ServiceError, ServiceFuture};
use types::{AutonomousDatabase, Envelope, SearchCollection};

/// Default `oci` CLI binary name.
pub const DEFAULT_OCI_BIN: &str = "oci";

/// Default config-file profile.
pub const DEFAULT_PROFILE: &str = "DEFAULT";

/// Workload type enumerated by default.
pub const DEFAULT_WORKLOAD_TYPE: &str = "ATP";

/// Page size of the candidate search; every page is fetched.
pub const DEFAULT_SEARCH_LIMIT: u32 = 1000;

/// Default interval between lifecycle polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default upper bound on a single lifecycle wait.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(1800);

/// How the CLI authenticates.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OciAuth {
    /// Named profile from the CLI config file.
    Profile(String),
    /// Instance-principal credentials of the host.
    InstancePrincipal,
}

impl OciAuth {
    fn args(&self) -> Vec<OsString> {
        match self {
            Self::Profile(profile) => vec![OsString::from("--profile"), OsString::from(profile)],
            Self::InstancePrincipal => vec![
                OsString::from("--auth"),
                OsString::from("instance_principal"),
            ],
        }
    }
}

impl Default for OciAuth {
    fn default() -> Self {
        Self::Profile(DEFAULT_PROFILE.to_owned())
    }
}

/// Bounds for lifecycle polling.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollPolicy {
    /// Delay between polls.
    pub interval: Duration,
    /// Give up once this much time has passed.
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }
}

/// Settings for [`OciCliService`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OciSettings {
    /// Path to the `oci` binary.
    pub oci_bin: String,
    /// Authentication mode.
    pub auth: OciAuth,
    /// Workload type used to filter candidates.
    pub workload_type: String,
    /// Search page size.
    pub search_limit: u32,
    /// Lifecycle poll bounds.
    pub poll: PollPolicy,
}

impl Default for OciSettings {
    fn default() -> Self {
        Self {
            oci_bin: DEFAULT_OCI_BIN.to_owned(),
            auth: OciAuth::default(),
            workload_type: DEFAULT_WORKLOAD_TYPE.to_owned(),
            search_limit: DEFAULT_SEARCH_LIMIT,
            poll: PollPolicy::default(),
        }
    }
}

impl OciSettings {
    /// Structured-search query selecting autonomous databases of the
    /// configured workload type.
    #[must_use]
    pub fn search_query(&self) -> String {
        format!(
            "query autonomousdatabase resources return allAdditionalFields where (workloadType=\"{}\")",
            self.workload_type
        )
    }
}

/// Control plane backed by the `oci` CLI.
#[derive(Clone, Debug)]
pub struct OciCliService<R: CommandRunner> {
    settings: OciSettings,
    runner: R,
}

impl OciCliService<ProcessCommandRunner> {
    /// Creates a service wired to the real process runner.
    #[must_use]
    pub const fn with_process_runner(settings: OciSettings) -> Self {
        Self::new(settings, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> OciCliService<R> {
    /// Creates a service using the provided settings and runner.
    #[must_use]
    pub const fn new(settings: OciSettings, runner: R) -> Self {
        Self { settings, runner }
    }

    /// Settings in use.
    #[must_use]
    pub const fn settings(&self) -> &OciSettings {
        &self.settings
    }

    async fn run_oci(&self, args: Vec<OsString>, resource: &str) -> Result<String, ServiceError> {
        let mut full = self.settings.auth.args();
        full.extend(args);
        debug!(command = %render_command(&self.settings.oci_bin, &full), "running oci");
        let output = self.runner.run(&self.settings.oci_bin, &full).await?;
        self.check_oci_output(output, resource).map(|out| out.stdout)
    }

    fn check_oci_output(
        &self,
        output: CommandOutput,
        resource: &str,
    ) -> Result<CommandOutput, ServiceError> {
        if output.is_success() {
            return Ok(output);
        }
        let status_text = output
            .code
            .map_or_else(|| String::from("unknown"), |code| code.to_string());
        Err(ServiceError::CommandFailure {
            program: self.settings.oci_bin.clone(),
            status_text,
            stderr: format!("{resource}: {}", output.stderr.trim()),
        })
    }

    async fn get(&self, id: &InstanceId) -> Result<InstanceRecord, ServiceError> {
        let args = database_args("get", id);
        let stdout = self.run_oci(args, "autonomous database").await?;
        let envelope: Envelope<AutonomousDatabase> = parse(&stdout, "autonomous database")?;
        Ok(InstanceRecord::from(envelope.data))
    }

    async fn search(&self) -> Result<Vec<InstanceId>, ServiceError> {
        let args = vec![
            OsString::from("search"),
            OsString::from("resource"),
            OsString::from("structured-search"),
            OsString::from("--query-text"),
            OsString::from(self.settings.search_query()),
            OsString::from("--limit"),
            OsString::from(self.settings.search_limit.to_string()),
            OsString::from("--all"),
        ];
        let stdout = self.run_oci(args, "structured search").await?;
        if stdout.trim().is_empty() {
            return Ok(Vec::new());
        }
        let envelope: Envelope<SearchCollection> = parse(&stdout, "structured search")?;
        if envelope.next_page.is_some() {
            return Err(ServiceError::Remote {
                message: format!(
                    "structured search returned more than one page of {} results; \
                     refusing to process a partial candidate list",
                    self.settings.search_limit
                ),
            });
        }
        let ids: Vec<InstanceId> = envelope
            .data
            .items
            .into_iter()
            .map(|item| InstanceId::from(item.identifier))
            .collect();
        debug!(count = ids.len(), workload = %self.settings.workload_type, "candidates found");
        Ok(ids)
    }

    async fn start(&self, id: &InstanceId) -> Result<(), ServiceError> {
        self.run_oci(database_args("start", id), "start")
            .await
            .map(|_| ())
    }

    async fn update(&self, id: &InstanceId, update: &InstanceUpdate) -> Result<(), ServiceError> {
        let mut args = database_args("update", id);
        args.extend(update_args(update)?);
        args.push(OsString::from("--force"));
        self.run_oci(args, "update").await.map(|_| ())
    }

    async fn poll_state(
        &self,
        id: &InstanceId,
        state: &LifecycleState,
    ) -> Result<(), ServiceError> {
        // An unrepresentable deadline means the wait is unbounded.
        let deadline = Instant::now().checked_add(self.settings.poll.timeout);
        while deadline.is_none_or(|limit| Instant::now() <= limit) {
            let record = self.get(id).await?;
            if record.lifecycle_state == *state {
                return Ok(());
            }
            debug!(
                instance = %id,
                current = %record.lifecycle_state,
                desired = %state,
                "waiting for lifecycle state"
            );
            sleep(self.settings.poll.interval).await;
        }

        Err(ServiceError::Timeout {
            instance_id: id.to_string(),
            state: state.to_string(),
        })
    }
}

impl<R: CommandRunner> DatabaseService for OciCliService<R> {
    fn list_candidates(&self) -> ServiceFuture<'_, Vec<InstanceId>> {
        Box::pin(self.search())
    }

    fn fetch_instance<'a>(&'a self, id: &'a InstanceId) -> ServiceFuture<'a, InstanceRecord> {
        Box::pin(self.get(id))
    }

    fn start_instance<'a>(&'a self, id: &'a InstanceId) -> ServiceFuture<'a, ()> {
        Box::pin(self.start(id))
    }

    fn update_instance<'a>(
        &'a self,
        id: &'a InstanceId,
        update: &'a InstanceUpdate,
    ) -> ServiceFuture<'a, ()> {
        Box::pin(self.update(id, update))
    }

    fn wait_for_state<'a>(
        &'a self,
        id: &'a InstanceId,
        state: &'a LifecycleState,
    ) -> ServiceFuture<'a, ()> {
        Box::pin(self.poll_state(id, state))
    }
}

fn database_args(action: &str, id: &InstanceId) -> Vec<OsString> {
    vec![
        OsString::from("db"),
        OsString::from("autonomous-database"),
        OsString::from(action),
        OsString::from("--autonomous-database-id"),
        OsString::from(id.as_str()),
    ]
}

fn update_args(update: &InstanceUpdate) -> Result<Vec<OsString>, ServiceError> {
    let pairs: Vec<(&str, String)> = match update {
        InstanceUpdate::ComputeModel {
            compute_model,
            backup_retention_days,
        } => vec![
            ("--compute-model", compute_model.to_string()),
            (
                "--backup-retention-period-in-days",
                backup_retention_days.to_string(),
            ),
        ],
        InstanceUpdate::Storage {
            data_storage_size_gb,
            storage_auto_scaling,
            compute_count,
            compute_auto_scaling,
        } => vec![
            ("--data-storage-size-in-gbs", data_storage_size_gb.to_string()),
            (
                "--is-auto-scaling-for-storage-enabled",
                storage_auto_scaling.to_string(),
            ),
            ("--compute-count", compute_count.to_string()),
            ("--is-auto-scaling-enabled", compute_auto_scaling.to_string()),
        ],
        InstanceUpdate::License {
            license_model,
            database_edition,
        } => vec![
            ("--license-model", license_model.to_string()),
            ("--database-edition", database_edition.clone()),
        ],
        InstanceUpdate::DefinedTags(tags) => {
            let rendered = serde_json::to_string(tags).map_err(|err| ServiceError::Parse {
                resource: String::from("defined tags"),
                message: err.to_string(),
            })?;
            vec![("--defined-tags", rendered)]
        }
    };
    Ok(pairs
        .into_iter()
        .flat_map(|(flag, value)| [OsString::from(flag), OsString::from(value)])
        .collect())
}

fn parse<T: DeserializeOwned>(stdout: &str, resource: &str) -> Result<T, ServiceError> {
    serde_json::from_str(stdout).map_err(|err| ServiceError::Parse {
        resource: resource.to_owned(),
        message: err.to_string(),
    })
}

fn render_command(program: &str, args: &[OsString]) -> String {
    let mut rendered = String::from(program);
    for arg in args {
        rendered.push(' ');
        rendered.push_str(&escape(arg.to_string_lossy()));
    }
    rendered
}

//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeMap, VecDeque};
use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use camino::Utf8PathBuf;

use crate::instance::{
    ComputeModel, DefinedTags, InstanceId, InstanceRecord, LicenseModel, LifecycleState, Role,
};
use crate::report::{RemediationReport, ReportError, ReportWriter};
use crate::runner::{CommandOutput, CommandRunner, RunnerError, RunnerFuture};
use crate::schedule::{ANY_DAY_KEY, DEFAULT_SCHEDULE, SCHEDULE_NAMESPACE};
use crate::service::{DatabaseService, InstanceUpdate, ServiceError, ServiceFuture, UpdateKind};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Returns an instance that already satisfies every remediation step.
#[must_use]
pub fn compliant_instance(id: &str) -> InstanceRecord {
    InstanceRecord {
        id: InstanceId::from(id),
        display_name: format!("{id}-name"),
        compute_model: ComputeModel::Ecpu,
        compute_count: 2.0,
        data_storage_size_tb: None,
        used_storage_size_tb: None,
        allocated_storage_size_tb: 0.02,
        license_model: LicenseModel::BringYourOwnLicense,
        database_edition: String::from("STANDARD_EDITION"),
        lifecycle_state: LifecycleState::Available,
        is_dedicated: false,
        is_free_tier: false,
        role: Role::Primary,
        defined_tags: default_schedule_tags(),
    }
}

/// Returns a stopped instance that needs every remediation step.
///
/// Half a terabyte is allocated, so the storage step targets 1024 GB.
#[must_use]
pub fn noncompliant_instance(id: &str) -> InstanceRecord {
    InstanceRecord {
        compute_model: ComputeModel::Ocpu,
        compute_count: 1.0,
        data_storage_size_tb: Some(1.0),
        used_storage_size_tb: Some(0.1),
        allocated_storage_size_tb: 0.5,
        license_model: LicenseModel::LicenseIncluded,
        database_edition: String::from("ENTERPRISE_EDITION"),
        lifecycle_state: LifecycleState::Stopped,
        defined_tags: DefinedTags::new(),
        ..compliant_instance(id)
    }
}

/// Defined tags carrying the default schedule.
#[must_use]
pub fn default_schedule_tags() -> DefinedTags {
    BTreeMap::from([(
        SCHEDULE_NAMESPACE.to_owned(),
        BTreeMap::from([(ANY_DAY_KEY.to_owned(), DEFAULT_SCHEDULE.to_owned())]),
    )])
}

/// A call observed by [`FakeDatabaseService`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ServiceCall {
    /// Candidate enumeration.
    List,
    /// Snapshot read.
    Fetch(InstanceId),
    /// Start command.
    Start(InstanceId),
    /// Partial update of the given kind.
    Update(InstanceId, UpdateKind),
    /// Availability poll.
    Wait(InstanceId),
}

impl ServiceCall {
    /// Returns `true` for calls that change remote state.
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        matches!(self, Self::Start(_) | Self::Update(..))
    }

    /// Returns the instance the call targets, if any.
    #[must_use]
    pub const fn instance(&self) -> Option<&InstanceId> {
        match self {
            Self::List => None,
            Self::Fetch(id) | Self::Start(id) | Self::Update(id, _) | Self::Wait(id) => Some(id),
        }
    }
}

#[derive(Debug, Default)]
struct FakeState {
    instances: BTreeMap<InstanceId, InstanceRecord>,
    candidates: Vec<InstanceId>,
    calls: Vec<ServiceCall>,
    updates: Vec<(InstanceId, InstanceUpdate)>,
    list_failure: Option<String>,
    fetch_failures: BTreeMap<InstanceId, String>,
    update_failures: BTreeMap<(InstanceId, UpdateKind), String>,
    latency: BTreeMap<InstanceId, Duration>,
    in_flight: usize,
    max_in_flight: usize,
}

/// In-memory control plane that applies updates to stored records.
///
/// Starting an instance makes it `AVAILABLE`; waiting for a state the record
/// is not in fails with [`ServiceError::Timeout`], which stands in for poll
/// exhaustion.
#[derive(Clone, Debug, Default)]
pub struct FakeDatabaseService {
    state: Arc<Mutex<FakeState>>,
}

impl FakeDatabaseService {
    /// Creates an empty fleet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fleet whose candidates are `records`, in order.
    #[must_use]
    pub fn with_instances(records: impl IntoIterator<Item = InstanceRecord>) -> Self {
        let service = Self::new();
        for record in records {
            service.insert(record);
        }
        service
    }

    /// Adds or replaces an instance and lists it as a candidate.
    pub fn insert(&self, record: InstanceRecord) {
        let mut state = lock(&self.state);
        if !state.candidates.contains(&record.id) {
            state.candidates.push(record.id.clone());
        }
        state.instances.insert(record.id.clone(), record);
    }

    /// Lists `id` as a candidate without any backing record.
    pub fn add_phantom_candidate(&self, id: &str) {
        lock(&self.state).candidates.push(InstanceId::from(id));
    }

    /// Makes candidate enumeration fail.
    pub fn fail_listing(&self, message: &str) {
        lock(&self.state).list_failure = Some(message.to_owned());
    }

    /// Makes every read of `id` fail.
    pub fn fail_fetch(&self, id: &str, message: &str) {
        lock(&self.state)
            .fetch_failures
            .insert(InstanceId::from(id), message.to_owned());
    }

    /// Makes updates of `kind` to `id` fail.
    pub fn fail_update(&self, id: &str, kind: UpdateKind, message: &str) {
        lock(&self.state)
            .update_failures
            .insert((InstanceId::from(id), kind), message.to_owned());
    }

    /// Delays every read of `id` by `delay`.
    pub fn set_latency(&self, id: &str, delay: Duration) {
        lock(&self.state)
            .latency
            .insert(InstanceId::from(id), delay);
    }

    /// Returns the stored record for `id`.
    #[must_use]
    pub fn instance(&self, id: &str) -> Option<InstanceRecord> {
        lock(&self.state)
            .instances
            .get(&InstanceId::from(id))
            .cloned()
    }

    /// Returns every call observed so far.
    #[must_use]
    pub fn calls(&self) -> Vec<ServiceCall> {
        lock(&self.state).calls.clone()
    }

    /// Returns calls targeting `id`.
    #[must_use]
    pub fn calls_for(&self, id: &str) -> Vec<ServiceCall> {
        let target = InstanceId::from(id);
        self.calls()
            .into_iter()
            .filter(|call| call.instance() == Some(&target))
            .collect()
    }

    /// Returns every successful update, in call order.
    #[must_use]
    pub fn updates(&self) -> Vec<(InstanceId, InstanceUpdate)> {
        lock(&self.state).updates.clone()
    }

    /// Forgets recorded calls and updates.
    pub fn clear_calls(&self) {
        let mut state = lock(&self.state);
        state.calls.clear();
        state.updates.clear();
    }

    /// Number of start commands issued.
    #[must_use]
    pub fn start_count(&self) -> usize {
        self.count(|call| matches!(call, ServiceCall::Start(_)))
    }

    /// Number of update commands issued.
    #[must_use]
    pub fn update_count(&self) -> usize {
        self.count(|call| matches!(call, ServiceCall::Update(..)))
    }

    /// Number of availability polls issued.
    #[must_use]
    pub fn wait_count(&self) -> usize {
        self.count(|call| matches!(call, ServiceCall::Wait(_)))
    }

    /// Highest number of reads observed in flight at once.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        lock(&self.state).max_in_flight
    }

    fn count(&self, predicate: impl Fn(&ServiceCall) -> bool) -> usize {
        lock(&self.state)
            .calls
            .iter()
            .filter(|call| predicate(call))
            .count()
    }

    fn record_call(&self, call: ServiceCall) {
        lock(&self.state).calls.push(call);
    }

    fn lookup(&self, id: &InstanceId) -> Result<InstanceRecord, ServiceError> {
        lock(&self.state)
            .instances
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    async fn fetch(&self, id: &InstanceId) -> Result<InstanceRecord, ServiceError> {
        self.record_call(ServiceCall::Fetch(id.clone()));
        let delay = {
            let mut state = lock(&self.state);
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state.latency.get(id).copied()
        };
        if let Some(pause) = delay {
            tokio::time::sleep(pause).await;
        }
        let failure = {
            let mut state = lock(&self.state);
            state.in_flight = state.in_flight.saturating_sub(1);
            state.fetch_failures.get(id).cloned()
        };
        if let Some(message) = failure {
            return Err(ServiceError::Remote { message });
        }
        self.lookup(id)
    }

    fn apply(&self, id: &InstanceId, update: &InstanceUpdate) -> Result<(), ServiceError> {
        let kind = update.kind();
        self.record_call(ServiceCall::Update(id.clone(), kind));
        let mut state = lock(&self.state);
        if let Some(message) = state.update_failures.get(&(id.clone(), kind)).cloned() {
            return Err(ServiceError::Remote { message });
        }
        let record = state.instances.get_mut(id).ok_or_else(|| not_found(id))?;
        match update {
            InstanceUpdate::ComputeModel { compute_model, .. } => {
                record.compute_model = compute_model.clone();
            }
            InstanceUpdate::Storage { compute_count, .. } => {
                record.data_storage_size_tb = None;
                record.compute_count = *compute_count;
            }
            InstanceUpdate::License {
                license_model,
                database_edition,
            } => {
                record.license_model = license_model.clone();
                record.database_edition.clone_from(database_edition);
            }
            InstanceUpdate::DefinedTags(tags) => {
                record.defined_tags.clone_from(tags);
            }
        }
        state.updates.push((id.clone(), update.clone()));
        Ok(())
    }
}

fn not_found(id: &InstanceId) -> ServiceError {
    ServiceError::Remote {
        message: format!("NotAuthorizedOrNotFound: {id}"),
    }
}

impl DatabaseService for FakeDatabaseService {
    fn list_candidates(&self) -> ServiceFuture<'_, Vec<InstanceId>> {
        Box::pin(async move {
            self.record_call(ServiceCall::List);
            let state = lock(&self.state);
            if let Some(message) = state.list_failure.clone() {
                return Err(ServiceError::Remote { message });
            }
            Ok(state.candidates.clone())
        })
    }

    fn fetch_instance<'a>(&'a self, id: &'a InstanceId) -> ServiceFuture<'a, InstanceRecord> {
        Box::pin(self.fetch(id))
    }

    fn start_instance<'a>(&'a self, id: &'a InstanceId) -> ServiceFuture<'a, ()> {
        Box::pin(async move {
            self.record_call(ServiceCall::Start(id.clone()));
            let mut state = lock(&self.state);
            let record = state.instances.get_mut(id).ok_or_else(|| not_found(id))?;
            record.lifecycle_state = LifecycleState::Available;
            Ok(())
        })
    }

    fn update_instance<'a>(
        &'a self,
        id: &'a InstanceId,
        update: &'a InstanceUpdate,
    ) -> ServiceFuture<'a, ()> {
        Box::pin(async move { self.apply(id, update) })
    }

    fn wait_for_state<'a>(
        &'a self,
        id: &'a InstanceId,
        state: &'a LifecycleState,
    ) -> ServiceFuture<'a, ()> {
        Box::pin(async move {
            self.record_call(ServiceCall::Wait(id.clone()));
            let record = self.lookup(id)?;
            if record.lifecycle_state == *state {
                Ok(())
            } else {
                Err(ServiceError::Timeout {
                    instance_id: id.to_string(),
                    state: state.to_string(),
                })
            }
        })
    }
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }

    /// Returns the value following `flag`, if present.
    #[must_use]
    pub fn flag_value(&self, flag: &str) -> Option<String> {
        self.args
            .iter()
            .skip_while(|arg| arg.to_string_lossy() != flag)
            .nth(1)
            .map(|arg| arg.to_string_lossy().into_owned())
    }
}

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Arc<Mutex<VecDeque<CommandOutput>>>,
    invocations: Arc<Mutex<Vec<CommandInvocation>>>,
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        lock(&self.invocations).clone()
    }

    /// Pushes a successful exit with empty output.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a successful exit printing `stdout`.
    pub fn push_json(&self, stdout: impl Into<String>) {
        self.push_output(Some(0), stdout, "");
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        lock(&self.responses).push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run<'a>(&'a self, program: &'a str, args: &'a [OsString]) -> RunnerFuture<'a> {
        Box::pin(async move {
            lock(&self.invocations).push(CommandInvocation {
                program: program.to_owned(),
                args: args.to_vec(),
            });
            lock(&self.responses)
                .pop_front()
                .ok_or_else(|| RunnerError::Spawn {
                    program: program.to_owned(),
                    message: String::from("no scripted response available"),
                })
        })
    }
}

/// Report writer that keeps reports in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryReportWriter {
    reports: Arc<Mutex<Vec<RemediationReport>>>,
    failure: Option<String>,
}

impl MemoryReportWriter {
    /// Creates a writer that accepts every report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a writer that rejects every report with `message`.
    #[must_use]
    pub fn failing(message: &str) -> Self {
        Self {
            reports: Arc::default(),
            failure: Some(message.to_owned()),
        }
    }

    /// Returns the reports written so far.
    #[must_use]
    pub fn reports(&self) -> Vec<RemediationReport> {
        lock(&self.reports).clone()
    }
}

impl ReportWriter for MemoryReportWriter {
    fn write(&self, report: &RemediationReport) -> Result<Utf8PathBuf, ReportError> {
        let location = Utf8PathBuf::from("memory://report.json");
        if let Some(message) = &self.failure {
            return Err(ReportError::Io {
                path: location,
                message: message.clone(),
            });
        }
        lock(&self.reports).push(report.clone());
        Ok(location)
    }
}

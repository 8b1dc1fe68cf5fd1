//! BDD step definitions for remediation runs.

use std::num::NonZeroUsize;
use std::time::Duration;

use atp_remediate::test_support::{
    MemoryReportWriter, compliant_instance, noncompliant_instance,
};
use atp_remediate::{
    AppliedStep, ComputeModel, LicenseModel, RunError, SkipReason, UpdateKind,
};
use rstest_bdd_macros::{given, then, when};

use super::test_helpers::{RemediationContext, parse_steps, step_name};

#[given("a stopped OCPU database \"{id}\" on terabyte storage with an included licence")]
fn noncompliant_database(remediation_context: &RemediationContext, id: String) {
    remediation_context.service.insert(noncompliant_instance(&id));
}

#[given("a compliant database \"{id}\"")]
fn compliant_database(remediation_context: &RemediationContext, id: String) {
    remediation_context.service.insert(compliant_instance(&id));
}

#[given("a \"{kind}\" database \"{id}\"")]
fn excluded_database(remediation_context: &RemediationContext, kind: String, id: String) {
    let mut record = noncompliant_instance(&id);
    match kind.as_str() {
        "dedicated" => record.is_dedicated = true,
        "standby" => record.role = atp_remediate::Role::Standby,
        "free tier" => record.is_free_tier = true,
        "unavailable" => record.lifecycle_state = atp_remediate::LifecycleState::Unavailable,
        other => panic!("unknown exclusion {other}"),
    }
    remediation_context.service.insert(record);
}

#[given("compliant databases \"{ids}\" that answer slowest first")]
fn slow_first_databases(remediation_context: &RemediationContext, ids: String) {
    let names: Vec<&str> = ids.split(',').map(str::trim).collect();
    let mut delay = 10 * u64::try_from(names.len()).unwrap_or(1);
    for name in names {
        remediation_context.service.insert(compliant_instance(name));
        remediation_context
            .service
            .set_latency(name, Duration::from_millis(delay));
        delay = delay.saturating_sub(10);
    }
}

#[given("a pool of \"{size}\" workers")]
fn pool_of_workers(remediation_context: &RemediationContext, size: usize) {
    let pool = NonZeroUsize::new(size).unwrap_or_else(|| panic!("pool size must be non-zero"));
    remediation_context.pool_size.set(pool);
}

#[given("dry run is enabled")]
fn dry_run_enabled(remediation_context: &RemediationContext) {
    remediation_context.dry_run.set(true);
}

#[given("\"{kind}\" updates fail for \"{id}\"")]
fn updates_fail(remediation_context: &RemediationContext, kind: String, id: String) {
    let update_kind = match kind.as_str() {
        "compute" => UpdateKind::ComputeModel,
        "storage" => UpdateKind::Storage,
        "license" => UpdateKind::License,
        "tags" => UpdateKind::DefinedTags,
        other => panic!("unknown update kind {other}"),
    };
    remediation_context
        .service
        .fail_update(&id, update_kind, "InternalServerError: scripted failure");
}

#[given("enumeration fails")]
fn enumeration_fails(remediation_context: &RemediationContext) {
    remediation_context
        .service
        .fail_listing("NotAuthenticated: scripted failure");
}

#[given("the report store is unavailable")]
fn report_store_unavailable(remediation_context: &RemediationContext) {
    remediation_context
        .writer
        .replace(MemoryReportWriter::failing("read-only file system"));
}

#[when("the remediation pass runs")]
fn remediation_pass_runs(remediation_context: &RemediationContext) {
    remediation_context.execute();
}

#[then("the outcome for \"{id}\" lists the steps \"{steps}\"")]
fn outcome_lists_steps(remediation_context: &RemediationContext, id: String, steps: String) {
    let outcome = remediation_context.outcome(&id);
    let applied: Vec<&str> = outcome.steps_applied.iter().map(step_name).collect();
    assert_eq!(applied, parse_steps(&steps), "outcome: {outcome:?}");
}

#[then("the outcome for \"{id}\" applied no steps")]
fn outcome_applied_nothing(remediation_context: &RemediationContext, id: String) {
    let outcome = remediation_context.outcome(&id);
    assert!(outcome.steps_applied.is_empty(), "outcome: {outcome:?}");
    assert_eq!(outcome.skip_reason, None);
    assert_eq!(outcome.error, None);
}

#[then("the outcome for \"{id}\" is skipped as \"{reason}\"")]
fn outcome_skipped(remediation_context: &RemediationContext, id: String, reason: String) {
    let outcome = remediation_context.outcome(&id);
    let expected = match reason.as_str() {
        "dedicated" => SkipReason::Dedicated,
        "standby" => SkipReason::Standby,
        "free tier" => SkipReason::FreeTier,
        "unavailable" => SkipReason::Unavailable,
        other => panic!("unknown skip reason {other}"),
    };
    assert_eq!(outcome.skip_reason, Some(expected));
    assert!(outcome.steps_applied.is_empty());
}

#[then("the outcome for \"{id}\" carries an error")]
fn outcome_has_error(remediation_context: &RemediationContext, id: String) {
    let outcome = remediation_context.outcome(&id);
    assert!(
        outcome
            .error
            .as_deref()
            .is_some_and(|message| message.contains("scripted failure")),
        "outcome: {outcome:?}"
    );
}

#[then("database \"{id}\" now runs ECPU on BYOL Standard Edition")]
fn database_normalised(remediation_context: &RemediationContext, id: String) {
    let record = remediation_context
        .service
        .instance(&id)
        .unwrap_or_else(|| panic!("database {id} should exist"));
    assert_eq!(record.compute_model, ComputeModel::Ecpu);
    assert_eq!(record.license_model, LicenseModel::BringYourOwnLicense);
    assert_eq!(record.database_edition, "STANDARD_EDITION");
}

#[then("database \"{id}\" was resized to \"{target}\" GB")]
fn database_resized(remediation_context: &RemediationContext, id: String, target: u32) {
    let outcome = remediation_context.outcome(&id);
    assert!(
        outcome.applied(&AppliedStep::StorageScaled { target_gb: target }),
        "outcome: {outcome:?}"
    );
}

#[then("no database was mutated")]
fn nothing_mutated(remediation_context: &RemediationContext) {
    let mutations: Vec<_> = remediation_context
        .service
        .calls()
        .into_iter()
        .filter(|call| call.is_mutation())
        .collect();
    assert!(mutations.is_empty(), "unexpected mutations: {mutations:?}");
}

#[then("no database was read")]
fn nothing_read(remediation_context: &RemediationContext) {
    let calls = remediation_context.service.calls();
    assert!(
        calls.iter().all(|call| call.instance().is_none()),
        "unexpected calls: {calls:?}"
    );
}

#[then("the report is marked as a dry run")]
fn report_marked_dry_run(remediation_context: &RemediationContext) {
    assert!(remediation_context.receipt().report.dry_run);
}

#[then("the outcomes are ordered \"{ids}\"")]
fn outcomes_ordered(remediation_context: &RemediationContext, ids: String) {
    let receipt = remediation_context.receipt();
    let returned: Vec<&str> = receipt
        .report
        .outcomes
        .iter()
        .map(|outcome| outcome.detail.id.as_str())
        .collect();
    let expected: Vec<&str> = ids.split(',').map(str::trim).collect();
    assert_eq!(returned, expected);
}

#[then("the summary counts \"{remediated}\" remediated and \"{failed}\" failed")]
fn summary_counts(remediation_context: &RemediationContext, remediated: usize, failed: usize) {
    let summary = remediation_context.receipt().summary();
    assert_eq!(summary.remediated, remediated);
    assert_eq!(summary.failed, failed);
}

#[then("the run fails with an enumeration error")]
fn run_fails_enumerating(remediation_context: &RemediationContext) {
    remediation_context.with_failure(|err| {
        assert!(matches!(err, RunError::Enumeration(_)), "got {err:?}");
    });
}

#[then("the run fails with a report error covering \"{total}\" databases")]
fn run_fails_reporting(remediation_context: &RemediationContext, total: usize) {
    remediation_context.with_failure(|err| {
        let RunError::Report { summary, .. } = err else {
            panic!("expected a report error, got {err:?}");
        };
        assert_eq!(summary.total, total);
    });
}

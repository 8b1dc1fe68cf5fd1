//! BDD scenarios for remediation runs.

use rstest_bdd_macros::scenario;

use super::test_helpers::{RemediationContext, remediation_context};

#[scenario(
    path = "tests/features/remediation.feature",
    name = "Bring a non-compliant database into line"
)]
fn scenario_full_remediation(remediation_context: RemediationContext) {
    let _ = remediation_context;
}

#[scenario(
    path = "tests/features/remediation.feature",
    name = "Dry run reports intent without mutating"
)]
fn scenario_dry_run(remediation_context: RemediationContext) {
    let _ = remediation_context;
}

#[scenario(
    path = "tests/features/remediation.feature",
    name = "Dedicated databases are left alone"
)]
fn scenario_dedicated_skipped(remediation_context: RemediationContext) {
    let _ = remediation_context;
}

#[scenario(
    path = "tests/features/remediation.feature",
    name = "Standby databases are left alone"
)]
fn scenario_standby_skipped(remediation_context: RemediationContext) {
    let _ = remediation_context;
}

#[scenario(
    path = "tests/features/remediation.feature",
    name = "Compliant databases need nothing"
)]
fn scenario_compliant_untouched(remediation_context: RemediationContext) {
    let _ = remediation_context;
}

#[scenario(
    path = "tests/features/remediation.feature",
    name = "A failed storage resize abandons the remaining steps"
)]
fn scenario_storage_failure(remediation_context: RemediationContext) {
    let _ = remediation_context;
}

#[scenario(
    path = "tests/features/fleet.feature",
    name = "Outcomes follow enumeration order"
)]
fn scenario_ordering(remediation_context: RemediationContext) {
    let _ = remediation_context;
}

#[scenario(
    path = "tests/features/fleet.feature",
    name = "One failing database does not affect the others"
)]
fn scenario_isolation(remediation_context: RemediationContext) {
    let _ = remediation_context;
}

#[scenario(
    path = "tests/features/fleet.feature",
    name = "Enumeration failure aborts the run"
)]
fn scenario_enumeration_failure(remediation_context: RemediationContext) {
    let _ = remediation_context;
}

#[scenario(
    path = "tests/features/fleet.feature",
    name = "Report persistence failure is surfaced with the summary"
)]
fn scenario_report_failure(remediation_context: RemediationContext) {
    let _ = remediation_context;
}

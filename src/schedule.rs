//! Stop/start schedule tag compliance.
//!
//! The `Schedule.AnyDay` defined tag holds 24 comma-separated hour markers.
//! An hour marked `0` permits the scheduler to stop the instance; any other
//! marker keeps it running. An instance whose schedule never contains a stop
//! marker is treated as non-compliant.

use std::collections::BTreeMap;

use crate::instance::DefinedTags;

/// Defined-tag namespace holding schedules.
pub const SCHEDULE_NAMESPACE: &str = "Schedule";

/// Key inside [`SCHEDULE_NAMESPACE`] for the every-day schedule.
pub const ANY_DAY_KEY: &str = "AnyDay";

/// Hour marker that permits stopping.
pub const STOP_MARKER: &str = "0";

/// Canonical schedule applied to non-compliant instances.
pub const DEFAULT_SCHEDULE: &str = "0,0,0,0,0,0,0,*,*,*,*,*,*,*,*,*,*,0,0,0,0,0,0,0";

/// Compliance of an instance's schedule tags.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ScheduleStatus {
    /// The `Schedule` namespace is absent.
    MissingNamespace,
    /// The namespace exists without an `AnyDay` key; left untouched.
    MissingAnyDay,
    /// `AnyDay` never permits a stop.
    NeverStops(String),
    /// `AnyDay` contains the stop marker.
    Compliant(String),
}

impl ScheduleStatus {
    /// Returns `true` when the status calls for a tag patch.
    #[must_use]
    pub const fn needs_fix(&self) -> bool {
        matches!(self, Self::MissingNamespace | Self::NeverStops(_))
    }
}

/// Classifies the schedule carried by `tags`.
#[must_use]
pub fn schedule_status(tags: &DefinedTags) -> ScheduleStatus {
    let Some(namespace) = tags.get(SCHEDULE_NAMESPACE) else {
        return ScheduleStatus::MissingNamespace;
    };
    let Some(any_day) = namespace.get(ANY_DAY_KEY) else {
        return ScheduleStatus::MissingAnyDay;
    };
    if has_stop_hour(any_day) {
        ScheduleStatus::Compliant(any_day.clone())
    } else {
        ScheduleStatus::NeverStops(any_day.clone())
    }
}

/// Returns `true` when `schedule` contains the stop marker anywhere.
#[must_use]
pub fn has_stop_hour(schedule: &str) -> bool {
    schedule.contains(STOP_MARKER)
}

/// Computes the full defined-tag set to submit, or `None` when compliant.
///
/// The snapshot is never modified; the returned map is a copy with the
/// `Schedule` namespace replaced by the default `AnyDay` schedule. Other
/// namespaces are carried over unchanged because the control plane replaces
/// the whole defined-tag map on update.
#[must_use]
pub fn schedule_patch(tags: &DefinedTags) -> Option<DefinedTags> {
    if !schedule_status(tags).needs_fix() {
        return None;
    }
    let mut patched = tags.clone();
    patched.insert(
        SCHEDULE_NAMESPACE.to_owned(),
        BTreeMap::from([(ANY_DAY_KEY.to_owned(), DEFAULT_SCHEDULE.to_owned())]),
    );
    Some(patched)
}

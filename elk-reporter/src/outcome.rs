// Copyright (c) The elk-reporter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The closed set of final test outcomes.

use crate::events::{PhaseReport, RawOutcome};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The finalized outcome of a test, after reconciling all of its phases.
///
/// The compound variants carry the primary phase outcome together with a
/// secondary teardown failure: a test whose call phase failed and whose
/// teardown also failed finalizes as [`OutcomeKind::FailureAndError`].
///
/// `Ord` is derived so that stats snapshots and emitted summaries have a
/// deterministic key order.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum OutcomeKind {
    /// The test passed.
    #[serde(rename = "passed")]
    Passed,

    /// The test body failed.
    #[serde(rename = "failure")]
    Failure,

    /// A fixture failed outside the test body (setup or teardown).
    #[serde(rename = "error")]
    Error,

    /// The test was skipped.
    #[serde(rename = "skipped")]
    Skipped,

    /// The test failed, and the failure was expected.
    #[serde(rename = "xfailed")]
    Xfailed,

    /// The test passed, but a failure was expected.
    #[serde(rename = "xpass")]
    Xpass,

    /// The test body failed and teardown failed afterwards.
    #[serde(rename = "failure & error")]
    FailureAndError,

    /// The test was skipped and teardown failed afterwards.
    #[serde(rename = "skipped & error")]
    SkippedAndError,

    /// The test passed and teardown failed afterwards.
    #[serde(rename = "passed & error")]
    PassedAndError,

    /// Setup failed and teardown failed as well.
    #[serde(rename = "error & error")]
    ErrorAndError,

    /// The host runner itself hit an unexpected error.
    #[serde(rename = "internal-error")]
    InternalError,
}

impl OutcomeKind {
    /// Returns the outcome as its wire string.
    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeKind::Passed => "passed",
            OutcomeKind::Failure => "failure",
            OutcomeKind::Error => "error",
            OutcomeKind::Skipped => "skipped",
            OutcomeKind::Xfailed => "xfailed",
            OutcomeKind::Xpass => "xpass",
            OutcomeKind::FailureAndError => "failure & error",
            OutcomeKind::SkippedAndError => "skipped & error",
            OutcomeKind::PassedAndError => "passed & error",
            OutcomeKind::ErrorAndError => "error & error",
            OutcomeKind::InternalError => "internal-error",
        }
    }

    /// Returns true if this outcome represents a successful test.
    ///
    /// Expected failures count as success; unexpected passes and every
    /// compound outcome do not.
    pub fn is_success(self) -> bool {
        matches!(
            self,
            OutcomeKind::Passed | OutcomeKind::Skipped | OutcomeKind::Xfailed
        )
    }

    /// The compound outcome produced when teardown fails after this tentative
    /// outcome was cached.
    pub(crate) fn and_teardown_error(self) -> OutcomeKind {
        match self {
            OutcomeKind::Passed | OutcomeKind::Xpass => OutcomeKind::PassedAndError,
            OutcomeKind::Failure => OutcomeKind::FailureAndError,
            OutcomeKind::Skipped | OutcomeKind::Xfailed => OutcomeKind::SkippedAndError,
            OutcomeKind::Error => OutcomeKind::ErrorAndError,
            // Compound and internal outcomes are never cached as tentative.
            other => other,
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a call-phase report into a tentative outcome.
///
/// The expected-failure marker upgrades a pass to [`OutcomeKind::Xpass`] and a
/// skip to [`OutcomeKind::Xfailed`]. Strict expected failures are already
/// delivered as plain failures by the host runner and classify as
/// [`OutcomeKind::Failure`].
pub(crate) fn classify_call(report: &PhaseReport) -> OutcomeKind {
    match report.outcome {
        RawOutcome::Passed => {
            if report.expects_failure() {
                OutcomeKind::Xpass
            } else {
                OutcomeKind::Passed
            }
        }
        RawOutcome::Failed => OutcomeKind::Failure,
        RawOutcome::Skipped => {
            if report.expects_failure() {
                OutcomeKind::Xfailed
            } else {
                OutcomeKind::Skipped
            }
        }
        RawOutcome::Xfail => OutcomeKind::Xfailed,
        RawOutcome::Xpass => OutcomeKind::Xpass,
    }
}

/// Classifies a setup-phase report into a tentative outcome.
///
/// A setup failure is a fixture error, not a test failure. A setup skip (for
/// example a skip decided inside a fixture) finalizes as skipped once the
/// teardown trigger arrives.
pub(crate) fn classify_setup(report: &PhaseReport) -> OutcomeKind {
    match report.outcome {
        RawOutcome::Failed => OutcomeKind::Error,
        RawOutcome::Skipped => {
            if report.expects_failure() {
                OutcomeKind::Xfailed
            } else {
                OutcomeKind::Skipped
            }
        }
        RawOutcome::Xfail => OutcomeKind::Xfailed,
        RawOutcome::Passed | RawOutcome::Xpass => OutcomeKind::Passed,
    }
}

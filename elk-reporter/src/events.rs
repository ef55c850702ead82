// Copyright (c) The elk-reporter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Phase-level observations delivered by the host test runner.
//!
//! The host runner drives a [`ReporterSession`](crate::session::ReporterSession)
//! with one [`PhaseReport`] per lifecycle phase of each test. Reports for a
//! single test always arrive in setup → call → teardown order; reports for
//! different tests may interleave when the run is distributed across workers.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

/// The worker key used when a report carries no worker identity, i.e. the run
/// is not distributed.
pub const DEFAULT_WORKER: &str = "default";

/// The marker indicating a test is expected to fail.
pub const XFAIL_MARKER: &str = "xfail";

/// A stage of a single test's execution lifecycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Fixture and environment preparation, before the test body runs.
    Setup,

    /// The test body itself.
    Call,

    /// Fixture and environment cleanup, after the test body has finished.
    Teardown,
}

impl Phase {
    /// Returns the phase as a static string.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Setup => "setup",
            Phase::Call => "call",
            Phase::Teardown => "teardown",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The raw outcome of one phase, as delivered by the host runner.
///
/// For tests marked as expected failures, the host runner's strictness
/// handling is already folded in: a strict expected failure that passed
/// arrives as [`RawOutcome::Failed`], while a non-strict one arrives as
/// [`RawOutcome::Xpass`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RawOutcome {
    /// The phase completed successfully.
    Passed,

    /// The phase raised a failure.
    Failed,

    /// The phase was skipped.
    Skipped,

    /// The phase failed, and the failure was expected.
    #[serde(rename = "expected-failure")]
    Xfail,

    /// The phase passed, but a failure was expected.
    #[serde(rename = "unexpected-pass")]
    Xpass,
}

/// One observation of a test's execution phase.
///
/// This is the unit of input to the
/// [`OutcomeReconciler`](crate::reconciler::OutcomeReconciler).
#[derive(Clone, Debug)]
pub struct PhaseReport {
    /// The globally-unique test identity. Stable across phases and across
    /// worker processes.
    pub name: SmolStr,

    /// The worker this report was observed on, if the run is distributed.
    pub worker: Option<SmolStr>,

    /// The lifecycle phase this report describes.
    pub phase: Phase,

    /// The raw outcome of the phase.
    pub outcome: RawOutcome,

    /// How long the phase took, in seconds. Always non-negative.
    pub duration: f64,

    /// Structured failure text, if the phase produced any.
    pub failure_message: Option<String>,

    /// Markers attached to the test. Ordered; duplicates are allowed.
    pub markers: Vec<SmolStr>,

    /// User-attached key-value properties, carried through to the emitted
    /// record unchanged.
    pub user_properties: Vec<(String, serde_json::Value)>,

    /// A sub-test label. Only meaningful on call-phase reports; a labeled
    /// report is finalized on its own rather than cached.
    pub subtest: Option<String>,
}

impl PhaseReport {
    /// Creates a new report for the given test, phase and outcome, with all
    /// optional fields empty.
    pub fn new(name: impl Into<SmolStr>, phase: Phase, outcome: RawOutcome) -> Self {
        Self {
            name: name.into(),
            worker: None,
            phase,
            outcome,
            duration: 0.0,
            failure_message: None,
            markers: Vec::new(),
            user_properties: Vec::new(),
            subtest: None,
        }
    }

    /// Sets the worker identity.
    pub fn with_worker(mut self, worker: impl Into<SmolStr>) -> Self {
        self.worker = Some(worker.into());
        self
    }

    /// Sets the phase duration in seconds.
    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    /// Sets the failure message.
    pub fn with_failure_message(mut self, message: impl Into<String>) -> Self {
        self.failure_message = Some(message.into());
        self
    }

    /// Adds a marker.
    pub fn with_marker(mut self, marker: impl Into<SmolStr>) -> Self {
        self.markers.push(marker.into());
        self
    }

    /// Sets the sub-test label.
    pub fn with_subtest(mut self, subtest: impl Into<String>) -> Self {
        self.subtest = Some(subtest.into());
        self
    }

    /// The worker key this report is cached under: the worker identity if
    /// present, [`DEFAULT_WORKER`] otherwise.
    pub fn worker_key(&self) -> &str {
        self.worker.as_deref().unwrap_or(DEFAULT_WORKER)
    }

    /// Returns true if the given marker is attached to this test.
    pub fn has_marker(&self, marker: &str) -> bool {
        self.markers.iter().any(|m| m == marker)
    }

    /// Returns true if the test is marked as an expected failure.
    pub fn expects_failure(&self) -> bool {
        self.has_marker(XFAIL_MARKER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_key_defaults() {
        let report = PhaseReport::new("test_a", Phase::Call, RawOutcome::Passed);
        assert_eq!(report.worker_key(), DEFAULT_WORKER);

        let report = report.with_worker("gw1");
        assert_eq!(report.worker_key(), "gw1");
    }

    #[test]
    fn marker_lookup_sees_duplicates_and_order() {
        let report = PhaseReport::new("test_a", Phase::Call, RawOutcome::Skipped)
            .with_marker("slow")
            .with_marker(XFAIL_MARKER)
            .with_marker("slow");
        assert!(report.expects_failure());
        assert!(report.has_marker("slow"));
        assert!(!report.has_marker("flaky"));
        assert_eq!(report.markers.len(), 3);
    }
}

// Copyright (c) The elk-reporter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-test outcome reconciliation state machine.
//!
//! A test produces up to three phase reports (setup, call, teardown), plus
//! one report per sub-test declared during its call phase. The reconciler
//! folds that stream into exactly one [`FinalRecord`] per test (or sub-test),
//! revising the tentative call-phase outcome when teardown subsequently
//! fails or skips.

use crate::{
    events::{Phase, PhaseReport, RawOutcome},
    outcome::{OutcomeKind, classify_call, classify_setup},
    record::FinalRecord,
};
use smol_str::SmolStr;
use std::collections::HashMap;
use tracing::debug;

/// A cached observation awaiting its teardown trigger.
#[derive(Clone, Debug)]
struct CachedEntry {
    report: PhaseReport,
    tentative: OutcomeKind,
}

/// Keyed temporary store of the latest phase report and tentative outcome per
/// (test, worker) pair.
///
/// Exactly one entry per key at a time: later phases overwrite earlier ones,
/// and finalization consumes the entry.
#[derive(Debug, Default)]
pub(crate) struct EventCache {
    entries: HashMap<(SmolStr, SmolStr), CachedEntry>,
}

impl EventCache {
    fn insert(&mut self, report: PhaseReport, tentative: OutcomeKind) {
        let key = (report.name.clone(), SmolStr::new(report.worker_key()));
        self.entries.insert(key, CachedEntry { report, tentative });
    }

    fn take(&mut self, name: &SmolStr, worker: &str) -> Option<CachedEntry> {
        self.entries.remove(&(name.clone(), SmolStr::new(worker)))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Reconciles the ordered phase-event stream into finalized records.
///
/// Owns the [`EventCache`] for the lifetime of one run. The host guarantees
/// setup → call → teardown ordering per test; events for different tests may
/// interleave freely across workers.
#[derive(Debug, Default)]
pub struct OutcomeReconciler {
    cache: EventCache,

    /// Set on the coordinating process of a distributed run: teardown events
    /// still clear the cache, but nothing is emitted, since every worker
    /// reports the same tests itself.
    suppress_finalize: bool,
}

impl OutcomeReconciler {
    /// Creates a reconciler for a process that reports its own results.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a reconciler for the coordinator of a distributed run.
    pub fn for_coordinator() -> Self {
        Self {
            cache: EventCache::default(),
            suppress_finalize: true,
        }
    }

    /// Consumes one phase report, returning a finalized record if this report
    /// triggered finalization.
    ///
    /// Setup and unlabeled call reports only update the cache. Call reports
    /// carrying a sub-test label finalize immediately. Teardown reports
    /// consume the cached entry and finalize the test.
    pub fn observe(&mut self, report: PhaseReport) -> Option<FinalRecord> {
        match report.phase {
            Phase::Setup => {
                let tentative = classify_setup(&report);
                debug!(name = %report.name, worker = report.worker_key(), ?tentative, "cached setup");
                self.cache.insert(report, tentative);
                None
            }
            Phase::Call => self.observe_call(report),
            Phase::Teardown => self.observe_teardown(report),
        }
    }

    fn observe_call(&mut self, report: PhaseReport) -> Option<FinalRecord> {
        let kind = classify_call(&report);
        if report.subtest.is_some() {
            // Sub-tests are finalized on their own; the parent's cache entry
            // is left for the parent's teardown.
            if self.suppress_finalize {
                return None;
            }
            let message = report.failure_message.clone();
            return Some(FinalRecord::from_report(&report, kind, message));
        }
        debug!(name = %report.name, worker = report.worker_key(), ?kind, "cached call");
        self.cache.insert(report, kind);
        None
    }

    fn observe_teardown(&mut self, report: PhaseReport) -> Option<FinalRecord> {
        let cached = self.cache.take(&report.name, report.worker_key());
        if self.suppress_finalize {
            return None;
        }
        match report.outcome {
            // A teardown-level skip always wins; no secondary concatenation.
            // With nothing cached there is no test to finalize, so a stray
            // skip is tolerated silently like a stray pass.
            RawOutcome::Skipped | RawOutcome::Xfail => cached.map(|entry| {
                let message = report
                    .failure_message
                    .clone()
                    .or_else(|| entry.report.failure_message.clone());
                FinalRecord::from_report(&entry.report, OutcomeKind::Skipped, message)
            }),
            RawOutcome::Failed => match cached {
                Some(entry) => {
                    let kind = entry.tentative.and_teardown_error();
                    let message = concat_messages(
                        entry.report.failure_message.as_deref(),
                        report.failure_message.as_deref(),
                    );
                    Some(FinalRecord::from_report(&entry.report, kind, message))
                }
                // Nothing ran before teardown failed; a plain error is all
                // there is to report.
                None => {
                    let message = report.failure_message.clone();
                    Some(FinalRecord::from_report(&report, OutcomeKind::Error, message))
                }
            },
            RawOutcome::Passed | RawOutcome::Xpass => cached.map(|entry| {
                let message = entry.report.failure_message.clone();
                FinalRecord::from_report(&entry.report, entry.tentative, message)
            }),
        }
    }

    /// The number of (test, worker) entries still awaiting finalization.
    pub fn pending(&self) -> usize {
        self.cache.len()
    }
}

/// Concatenates a primary failure message with a secondary teardown message,
/// in phase order.
fn concat_messages(primary: Option<&str>, secondary: Option<&str>) -> Option<String> {
    match (primary, secondary) {
        (Some(primary), Some(secondary)) => Some(format!("{primary}\n\n{secondary}")),
        (Some(message), None) | (None, Some(message)) => Some(message.to_owned()),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn setup(name: &str, outcome: RawOutcome) -> PhaseReport {
        PhaseReport::new(name, Phase::Setup, outcome)
    }

    fn call(name: &str, outcome: RawOutcome) -> PhaseReport {
        PhaseReport::new(name, Phase::Call, outcome)
    }

    fn teardown(name: &str, outcome: RawOutcome) -> PhaseReport {
        PhaseReport::new(name, Phase::Teardown, outcome)
    }

    #[test]
    fn passing_test_emits_once_at_teardown() {
        let mut reconciler = OutcomeReconciler::new();
        assert!(reconciler.observe(setup("test_a", RawOutcome::Passed)).is_none());
        assert!(
            reconciler
                .observe(call("test_a", RawOutcome::Passed).with_duration(2.5))
                .is_none()
        );
        let record = reconciler
            .observe(teardown("test_a", RawOutcome::Passed))
            .unwrap();
        assert_eq!(record.outcome, Some(OutcomeKind::Passed));
        assert_eq!(record.duration, Some(2.5));
        assert_eq!(reconciler.pending(), 0);
    }

    #[test]
    fn call_and_teardown_failures_compound() {
        let mut reconciler = OutcomeReconciler::new();
        reconciler.observe(setup("test_a", RawOutcome::Passed));
        reconciler.observe(
            call("test_a", RawOutcome::Failed).with_failure_message("assert 1 == 2"),
        );
        let record = reconciler
            .observe(
                teardown("test_a", RawOutcome::Failed)
                    .with_failure_message("fixture cleanup raised"),
            )
            .unwrap();
        assert_eq!(record.outcome, Some(OutcomeKind::FailureAndError));
        assert_eq!(
            record.failure_message.as_deref(),
            Some("assert 1 == 2\n\nfixture cleanup raised")
        );
    }

    #[test]
    fn teardown_skip_wins_over_passed_call() {
        let mut reconciler = OutcomeReconciler::new();
        reconciler.observe(setup("test_a", RawOutcome::Passed));
        reconciler.observe(call("test_a", RawOutcome::Passed));
        let record = reconciler
            .observe(teardown("test_a", RawOutcome::Skipped))
            .unwrap();
        assert_eq!(record.outcome, Some(OutcomeKind::Skipped));
    }

    #[test]
    fn setup_failure_finalizes_as_error() {
        let mut reconciler = OutcomeReconciler::new();
        reconciler.observe(
            setup("test_a", RawOutcome::Failed).with_failure_message("fixture exploded"),
        );
        // No call phase runs; teardown still fires and passes.
        let record = reconciler
            .observe(teardown("test_a", RawOutcome::Passed))
            .unwrap();
        assert_eq!(record.outcome, Some(OutcomeKind::Error));
        assert_eq!(record.failure_message.as_deref(), Some("fixture exploded"));
    }

    #[test]
    fn setup_and_teardown_failures_compound_to_error_and_error() {
        let mut reconciler = OutcomeReconciler::new();
        reconciler.observe(setup("test_a", RawOutcome::Failed));
        let record = reconciler
            .observe(teardown("test_a", RawOutcome::Failed))
            .unwrap();
        assert_eq!(record.outcome, Some(OutcomeKind::ErrorAndError));
    }

    #[test]
    fn teardown_failure_with_no_cached_entry_is_plain_error() {
        let mut reconciler = OutcomeReconciler::new();
        let record = reconciler
            .observe(teardown("test_a", RawOutcome::Failed))
            .unwrap();
        assert_eq!(record.outcome, Some(OutcomeKind::Error));
    }

    #[test]
    fn stray_teardown_pass_is_silent() {
        let mut reconciler = OutcomeReconciler::new();
        assert!(
            reconciler
                .observe(teardown("test_a", RawOutcome::Passed))
                .is_none()
        );
    }

    #[test]
    fn stray_teardown_skip_is_silent() {
        let mut reconciler = OutcomeReconciler::new();
        assert!(
            reconciler
                .observe(teardown("test_a", RawOutcome::Skipped))
                .is_none()
        );
        assert_eq!(reconciler.pending(), 0);
    }

    #[test]
    fn subtests_finalize_independently() {
        let mut reconciler = OutcomeReconciler::new();
        reconciler.observe(setup("test_a", RawOutcome::Passed));

        let sub = reconciler
            .observe(
                call("test_a", RawOutcome::Failed)
                    .with_subtest("case-1")
                    .with_failure_message("sub-case failed"),
            )
            .unwrap();
        assert_eq!(sub.name.as_deref(), Some("test_a"));
        assert_eq!(sub.subtest.as_deref(), Some("case-1"));
        assert_eq!(sub.outcome, Some(OutcomeKind::Failure));

        reconciler.observe(call("test_a", RawOutcome::Passed));
        let parent = reconciler
            .observe(teardown("test_a", RawOutcome::Passed))
            .unwrap();
        assert_eq!(parent.subtest, None);
        assert_eq!(parent.outcome, Some(OutcomeKind::Passed));
    }

    #[test]
    fn workers_are_keyed_independently() {
        let mut reconciler = OutcomeReconciler::new();
        reconciler.observe(call("test_a", RawOutcome::Passed).with_worker("gw0"));
        reconciler.observe(call("test_a", RawOutcome::Failed).with_worker("gw1"));

        let gw1 = reconciler
            .observe(teardown("test_a", RawOutcome::Passed).with_worker("gw1"))
            .unwrap();
        assert_eq!(gw1.outcome, Some(OutcomeKind::Failure));

        let gw0 = reconciler
            .observe(teardown("test_a", RawOutcome::Passed).with_worker("gw0"))
            .unwrap();
        assert_eq!(gw0.outcome, Some(OutcomeKind::Passed));
    }

    #[test]
    fn coordinator_consumes_without_emitting() {
        let mut reconciler = OutcomeReconciler::for_coordinator();
        reconciler.observe(setup("test_a", RawOutcome::Passed));
        reconciler.observe(call("test_a", RawOutcome::Passed));
        assert!(
            reconciler
                .observe(teardown("test_a", RawOutcome::Passed))
                .is_none()
        );
        assert_eq!(reconciler.pending(), 0);
    }

    #[test]
    fn later_phases_overwrite_cached_entries() {
        let mut reconciler = OutcomeReconciler::new();
        reconciler.observe(setup("test_a", RawOutcome::Passed));
        assert_eq!(reconciler.pending(), 1);
        reconciler.observe(call("test_a", RawOutcome::Failed));
        assert_eq!(reconciler.pending(), 1);
    }
}

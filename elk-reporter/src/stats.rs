// Copyright (c) The elk-reporter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aggregate statistics for a test run.

use crate::outcome::OutcomeKind;
use std::collections::BTreeMap;

/// A process-wide tally of finalized outcomes.
///
/// Counts are monotone: they are only ever incremented, and reset only when a
/// new run constructs a fresh `RunStats`. The tally is flushed into the
/// summary record at session end.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RunStats {
    counts: BTreeMap<OutcomeKind, u64>,
}

impl RunStats {
    /// Creates an empty tally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one finalized outcome.
    pub fn increment(&mut self, kind: OutcomeKind) {
        *self.counts.entry(kind).or_insert(0) += 1;
    }

    /// The count recorded for a single outcome kind.
    pub fn count(&self, kind: OutcomeKind) -> u64 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    /// The total number of finalized outcomes.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Returns a copy of the current tally, ordered by outcome kind.
    ///
    /// Calling this twice without an intervening [`increment`](Self::increment)
    /// returns identical mappings.
    pub fn snapshot(&self) -> BTreeMap<OutcomeKind, u64> {
        self.counts.clone()
    }

    /// Returns true if every recorded outcome counts as a success.
    pub fn is_success(&self) -> bool {
        self.counts
            .iter()
            .all(|(kind, count)| *count == 0 || kind.is_success())
    }
}

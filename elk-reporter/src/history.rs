// Copyright (c) The elk-reporter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Concurrent retrieval of historical per-test durations.

use crate::sink::{DURATION_PERCENTS, ElasticSink};
use smol_str::SmolStr;
use std::thread;
use tracing::{debug, warn};

/// A per-test duration estimate, resolved from the backend's percentile
/// aggregation or the configured default.
#[derive(Clone, Debug, PartialEq)]
pub struct DurationSample {
    /// The test identity.
    pub name: SmolStr,

    /// The estimated duration in seconds.
    pub duration: f64,
}

/// Fetches percentile duration statistics for a batch of tests.
///
/// Queries run on up to `max_parallel` worker threads, each owning its own
/// connection pool. A single query failing or timing out never fails the
/// batch: that test falls back to the default duration. No query is retried,
/// and there is no overall deadline beyond the per-query timeout bounded by
/// the worker count; callers wanting a hard ceiling must impose it
/// externally.
#[derive(Debug)]
pub struct DurationFetcher<'a> {
    sink: &'a ElasticSink,
}

impl<'a> DurationFetcher<'a> {
    /// Creates a fetcher backed by the given sink.
    pub fn new(sink: &'a ElasticSink) -> Self {
        Self { sink }
    }

    /// Resolves a duration estimate for every identity.
    ///
    /// The result covers each input exactly once and is stably sorted
    /// ascending by duration, with ties keeping their original relative
    /// order. That ordering is what the slice packer expects.
    pub fn fetch(
        &self,
        identities: &[SmolStr],
        default_seconds: f64,
        max_parallel: usize,
    ) -> Vec<DurationSample> {
        let mut durations: Vec<Option<f64>> = vec![None; identities.len()];

        if self.sink.is_enabled() && !identities.is_empty() {
            let workers = max_parallel.max(1).min(identities.len());
            let (task_tx, task_rx) = crossbeam_channel::unbounded::<(usize, SmolStr)>();
            for (index, name) in identities.iter().enumerate() {
                // The channel cannot be disconnected here; receivers outlive
                // this loop.
                let _ = task_tx.send((index, name.clone()));
            }
            drop(task_tx);

            let (done_tx, done_rx) = crossbeam_channel::unbounded::<(usize, Option<f64>)>();
            thread::scope(|scope| {
                for _ in 0..workers {
                    let task_rx = task_rx.clone();
                    let done_tx = done_tx.clone();
                    scope.spawn(move || {
                        let agent = self.sink.agent();
                        for (index, name) in task_rx {
                            let duration =
                                self.sink
                                    .query_percentile_with(&agent, &name, &DURATION_PERCENTS);
                            let _ = done_tx.send((index, duration));
                        }
                    });
                }
            });
            drop(done_tx);

            for (index, duration) in done_rx {
                durations[index] = duration;
            }
        }

        let mut samples: Vec<DurationSample> = identities
            .iter()
            .zip(durations)
            .map(|(name, duration)| {
                // Only worth a warning when a backend was actually asked; a
                // disabled sink means defaults are the intended behavior.
                if duration.is_none() {
                    if self.sink.is_enabled() {
                        warn!(name = %name, default_seconds, "no duration history, using default");
                    } else {
                        debug!(name = %name, default_seconds, "sink disabled, using default duration");
                    }
                }
                DurationSample {
                    name: name.clone(),
                    duration: duration.unwrap_or(default_seconds),
                }
            })
            .collect();
        samples.sort_by(|a, b| a.duration.total_cmp(&b.duration));
        samples
    }
}

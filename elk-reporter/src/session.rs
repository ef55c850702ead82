// Copyright (c) The elk-reporter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The session driver wiring reconciliation to stats and the sink.

use crate::{
    config::ReporterConfig,
    events::PhaseReport,
    reconciler::OutcomeReconciler,
    record::{FinalRecord, SessionMetadata},
    sink::ElasticSink,
    stats::RunStats,
};
use indexmap::IndexMap;
use serde_json::Value;
use smol_str::SmolStr;
use std::collections::HashMap;
use tracing::debug;

/// Drives one test run's worth of reporting.
///
/// The host runner hands every phase report to [`report`](Self::report) and
/// calls [`finish`](Self::finish) once at session end. Each finalized record
/// is enriched with the session metadata bag, counted in [`RunStats`], and
/// published to the sink. One session per run process; construct a fresh one
/// for the next run.
#[derive(Debug)]
pub struct ReporterSession {
    config: ReporterConfig,
    metadata: SessionMetadata,
    reconciler: OutcomeReconciler,
    stats: RunStats,
    sink: ElasticSink,
    appended: HashMap<SmolStr, IndexMap<String, Value>>,
    summary_emitted: bool,
}

impl ReporterSession {
    /// Creates a session, collecting the default metadata (username,
    /// hostname, CI environment) as configured.
    pub fn new(config: ReporterConfig) -> Self {
        let mut metadata = SessionMetadata::collect(&config.env_filters);
        if let Some(worker) = &config.worker {
            metadata.append("worker", Value::String(worker.to_string()));
        }
        let sink = ElasticSink::new(&config);
        let reconciler = if config.coordinator {
            OutcomeReconciler::for_coordinator()
        } else {
            OutcomeReconciler::new()
        };
        Self {
            config,
            metadata,
            reconciler,
            stats: RunStats::new(),
            sink,
            appended: HashMap::new(),
            summary_emitted: false,
        }
    }

    /// The session metadata bag.
    pub fn metadata(&self) -> &SessionMetadata {
        &self.metadata
    }

    /// Appends a key-value pair to the session metadata bag. Applies to all
    /// records emitted afterwards.
    pub fn append_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.metadata.append(key, value);
    }

    /// Attaches extra key-value data to one test's finalized records.
    ///
    /// `data` must be a JSON object; its keys are merged into every record
    /// later emitted for `name`, including sub-test records. Non-object
    /// values are ignored.
    pub fn append_test_data(&mut self, name: impl Into<SmolStr>, data: Value) {
        let Value::Object(fields) = data else {
            debug!("ignoring non-object test data");
            return;
        };
        let entry = self.appended.entry(name.into()).or_default();
        for (key, value) in fields {
            entry.insert(key, value);
        }
    }

    /// The current run statistics.
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// The sink this session publishes to.
    pub fn sink(&self) -> &ElasticSink {
        &self.sink
    }

    /// Observes one phase report.
    ///
    /// If the report triggered finalization, the emitted record is returned
    /// after being counted and published.
    pub fn report(&mut self, report: PhaseReport) -> Option<FinalRecord> {
        let record = self.reconciler.observe(report)?;
        Some(self.emit(record))
    }

    /// Emits a record for an unexpected error in the host runner itself.
    ///
    /// Best-effort like any other record; never blocks process exit.
    pub fn report_internal_error(&mut self, message: impl Into<String>) -> FinalRecord {
        self.emit(FinalRecord::internal_error(message))
    }

    /// Emits the session summary record carrying the final stats snapshot.
    ///
    /// Returns `None` on a collection-only run, and on any call after the
    /// summary has already been emitted. The summary itself is not counted
    /// in the stats.
    pub fn finish(&mut self) -> Option<FinalRecord> {
        if self.config.collect_only || self.summary_emitted {
            return None;
        }
        self.summary_emitted = true;
        let mut record = FinalRecord::summary(self.stats.snapshot());
        record.merge_extra(self.metadata.iter());
        self.sink.publish(&record);
        Some(record)
    }

    fn emit(&mut self, mut record: FinalRecord) -> FinalRecord {
        // Per-test data wins over session metadata; user properties set on
        // the report itself win over both.
        let appended = record
            .name
            .as_ref()
            .and_then(|name| self.appended.get(name).cloned());
        if let Some(appended) = &appended {
            record.merge_extra(appended.iter());
        }
        record.merge_extra(self.metadata.iter());
        if let Some(outcome) = record.outcome {
            self.stats.increment(outcome);
        }
        self.sink.publish(&record);
        record
    }
}

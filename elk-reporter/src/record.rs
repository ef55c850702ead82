// Copyright (c) The elk-reporter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Finalized records and the session-wide metadata bag.

use crate::{
    config::EnvFilter,
    events::PhaseReport,
    outcome::OutcomeKind,
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use smol_str::SmolStr;
use std::collections::BTreeMap;

/// The session-wide metadata bag.
///
/// Holds string-keyed values merged into every emitted record: the user and
/// host the run executes on, CI environment variables matched by the
/// configured filters, and anything the caller appends. The bag is
/// append-only; nothing is ever removed from it.
#[derive(Clone, Debug, Default)]
pub struct SessionMetadata {
    values: IndexMap<String, Value>,
}

impl SessionMetadata {
    /// Creates an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects the default session metadata: username, hostname, and every
    /// environment variable matched by one of `filters`.
    ///
    /// Matched variables are inserted in sorted key order so the bag is
    /// deterministic regardless of environment iteration order.
    pub fn collect(filters: &[EnvFilter]) -> Self {
        let mut metadata = Self::new();
        if let Ok(username) = whoami::username() {
            metadata.append("username", Value::String(username));
        }
        if let Ok(hostname) = whoami::hostname() {
            metadata.append("hostname", Value::String(hostname));
        }

        let mut matched: Vec<(String, String)> = std::env::vars()
            .filter_map(|(key, value)| {
                let filter = filters.iter().find(|f| f.matches(&key))?;
                Some((filter.rename(&key), value))
            })
            .collect();
        matched.sort();
        for (key, value) in matched {
            metadata.append(key, Value::String(value));
        }
        metadata
    }

    /// Appends a value to the bag.
    ///
    /// Re-appending an existing key overwrites its value in place; keys are
    /// never removed.
    pub fn append(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Looks up a value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Iterates over the bag in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// The number of entries in the bag.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the bag is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// The canonical record emitted for one finalized test, sub-test, or session
/// summary.
///
/// Serializes to a flat JSON object: phase-report fields, the outcome, the
/// emission timestamp, and every metadata and user-property key all at top
/// level, which is the shape the backend indexes.
#[derive(Clone, Debug, Serialize)]
pub struct FinalRecord {
    /// The test identity. Absent on the summary record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<SmolStr>,

    /// The sub-test label, when this record finalizes a sub-test rather than
    /// the parent test.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtest: Option<String>,

    /// The reconciled outcome. Absent on the summary record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<OutcomeKind>,

    /// The duration of the primary phase, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    /// Markers attached to the test.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub markers: Vec<SmolStr>,

    /// The failure text. For compound outcomes this is the primary phase's
    /// message followed by the teardown message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,

    /// When this record was emitted (UTC).
    pub timestamp: DateTime<Utc>,

    /// True on the reserved summary record emitted once at session end.
    #[serde(skip_serializing_if = "is_false")]
    pub summary: bool,

    /// The run-stats tally. Only present on the summary record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<BTreeMap<OutcomeKind, u64>>,

    /// Session metadata, user properties and per-test appended data,
    /// flattened to the top level of the serialized record.
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl FinalRecord {
    /// Builds a test record from a phase report and its reconciled outcome.
    pub(crate) fn from_report(
        report: &PhaseReport,
        outcome: OutcomeKind,
        failure_message: Option<String>,
    ) -> Self {
        let extra = report
            .user_properties
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Self {
            name: Some(report.name.clone()),
            subtest: report.subtest.clone(),
            outcome: Some(outcome),
            duration: Some(report.duration),
            markers: report.markers.clone(),
            failure_message,
            timestamp: Utc::now(),
            summary: false,
            stats: None,
            extra,
        }
    }

    /// Builds the reserved session summary record.
    pub(crate) fn summary(stats: BTreeMap<OutcomeKind, u64>) -> Self {
        Self {
            name: None,
            subtest: None,
            outcome: None,
            duration: None,
            markers: Vec::new(),
            failure_message: None,
            timestamp: Utc::now(),
            summary: true,
            stats: Some(stats),
            extra: IndexMap::new(),
        }
    }

    /// Builds a record for an error in the host runner itself.
    pub(crate) fn internal_error(message: impl Into<String>) -> Self {
        Self {
            name: None,
            subtest: None,
            outcome: Some(OutcomeKind::InternalError),
            duration: None,
            markers: Vec::new(),
            failure_message: Some(message.into()),
            timestamp: Utc::now(),
            summary: false,
            stats: None,
            extra: IndexMap::new(),
        }
    }

    /// Returns true if this is the session summary record.
    pub fn is_summary(&self) -> bool {
        self.summary
    }

    /// Merges extra key-value entries into the record.
    ///
    /// Existing keys are left untouched, so user properties win over session
    /// metadata with the same name.
    pub(crate) fn merge_extra<'a>(
        &mut self,
        entries: impl IntoIterator<Item = (&'a String, &'a Value)>,
    ) {
        for (key, value) in entries {
            if !self.extra.contains_key(key) {
                self.extra.insert(key.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Phase, RawOutcome};
    use maplit::btreemap;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_record_serializes_flat() {
        let report = PhaseReport::new("test_a", Phase::Call, RawOutcome::Passed)
            .with_duration(1.5)
            .with_marker("slow");
        let mut record = FinalRecord::from_report(&report, OutcomeKind::Passed, None);
        let jenkins_url = "JENKINS_URL".to_owned();
        let value = Value::String("http://ci.example.com".to_owned());
        record.merge_extra([(&jenkins_url, &value)]);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["name"], "test_a");
        assert_eq!(json["outcome"], "passed");
        assert_eq!(json["duration"], 1.5);
        assert_eq!(json["markers"], serde_json::json!(["slow"]));
        assert_eq!(json["JENKINS_URL"], "http://ci.example.com");
        // Absent optional fields are omitted entirely.
        assert!(json.get("subtest").is_none());
        assert!(json.get("summary").is_none());
        assert!(json.get("failure_message").is_none());
    }

    #[test]
    fn summary_record_carries_stats() {
        let record = FinalRecord::summary(btreemap! {
            OutcomeKind::Passed => 3,
            OutcomeKind::FailureAndError => 1,
        });
        assert!(record.is_summary());

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["summary"], true);
        assert_eq!(json["stats"]["passed"], 3);
        assert_eq!(json["stats"]["failure & error"], 1);
        assert!(json.get("name").is_none());
        assert!(json.get("outcome").is_none());
    }

    #[test]
    fn merge_extra_does_not_clobber_user_properties() {
        let mut report = PhaseReport::new("test_a", Phase::Call, RawOutcome::Passed);
        report
            .user_properties
            .push(("build".to_owned(), Value::String("local".to_owned())));
        let mut record = FinalRecord::from_report(&report, OutcomeKind::Passed, None);

        let key = "build".to_owned();
        let session_value = Value::String("ci".to_owned());
        record.merge_extra([(&key, &session_value)]);
        assert_eq!(record.extra["build"], Value::String("local".to_owned()));
    }

    #[test]
    fn metadata_bag_is_append_only_and_ordered() {
        let mut bag = SessionMetadata::new();
        bag.append("first", Value::from(1));
        bag.append("second", Value::from(2));
        bag.append("first", Value::from(3));

        let keys: Vec<_> = bag.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["first", "second"]);
        assert_eq!(bag.get("first"), Some(&Value::from(3)));
        assert_eq!(bag.len(), 2);
    }
}

// Copyright (c) The elk-reporter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reporter configuration.

use crate::sink::SinkAuth;
use serde::Deserialize;
use smol_str::SmolStr;
use std::time::Duration;

/// Configuration for a reporter session.
///
/// Construction is the embedding layer's job (CLI or ini parsing lives
/// there); this struct only captures the resolved values. It derives
/// `Deserialize` so embedders can read it straight out of their own config
/// files.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    /// The backend address, e.g. `"http://127.0.0.1:9200"`. A bare
    /// `host:port` is accepted and normalized to `http://`. `None` disables
    /// reporting entirely: publishing becomes a no-op and duration queries
    /// return no history.
    pub address: Option<String>,

    /// The index documents are appended to.
    pub index: String,

    /// Username for basic auth.
    pub username: Option<String>,

    /// Password for basic auth.
    pub password: Option<String>,

    /// API key for the `ApiKey` auth scheme. Takes precedence over basic
    /// auth when both are configured.
    pub api_key: Option<String>,

    /// Per-request timeout for both publishing and duration queries.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// True when this is a collection-only dry run; suppresses the summary
    /// record.
    pub collect_only: bool,

    /// The identity of this worker process in a distributed run.
    pub worker: Option<SmolStr>,

    /// True when this process coordinates a distributed run rather than
    /// executing tests itself. The coordinator observes the same teardown
    /// events as its workers, so finalization is suppressed on it to avoid
    /// double-reporting.
    pub coordinator: bool,

    /// Filters selecting which environment variables are folded into the
    /// session metadata bag.
    pub env_filters: Vec<EnvFilter>,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            address: None,
            index: "test_data".to_owned(),
            username: None,
            password: None,
            api_key: None,
            timeout: Duration::from_secs(10),
            collect_only: false,
            worker: None,
            coordinator: false,
            env_filters: EnvFilter::defaults(),
        }
    }
}

impl ReporterConfig {
    /// A config pointed at the given backend address, with everything else
    /// defaulted.
    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            ..Self::default()
        }
    }

    /// Resolves the configured credentials into an auth scheme.
    ///
    /// The API key wins when both it and basic credentials are present.
    pub fn auth(&self) -> SinkAuth {
        if let Some(api_key) = &self.api_key {
            return SinkAuth::ApiKey(api_key.clone());
        }
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => SinkAuth::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            _ => SinkAuth::None,
        }
    }
}

/// Selects environment variables for inclusion in session metadata.
///
/// One filter per CI provider (or per naming convention) replaces hand-written
/// per-provider collection: every variable starting with `prefix` is captured,
/// optionally with its key lowercased.
#[derive(Clone, Debug, Deserialize)]
pub struct EnvFilter {
    /// The variable-name prefix to match.
    pub prefix: String,

    /// Whether captured keys are lowercased in the metadata bag.
    #[serde(default)]
    pub lowercase: bool,
}

impl EnvFilter {
    /// Creates a filter for the given prefix.
    pub fn new(prefix: impl Into<String>, lowercase: bool) -> Self {
        Self {
            prefix: prefix.into(),
            lowercase,
        }
    }

    /// The default filter set, covering the common CI providers.
    pub fn defaults() -> Vec<EnvFilter> {
        vec![
            EnvFilter::new("JENKINS_", true),
            EnvFilter::new("TRAVIS_", true),
            EnvFilter::new("CIRCLE", true),
            EnvFilter::new("GITHUB_", true),
            EnvFilter::new("BUILD_", true),
        ]
    }

    /// Returns true if this filter captures the given variable name.
    pub fn matches(&self, key: &str) -> bool {
        key.starts_with(&self.prefix)
    }

    /// The metadata key a captured variable is stored under.
    pub fn rename(&self, key: &str) -> String {
        if self.lowercase {
            key.to_lowercase()
        } else {
            key.to_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_wins_over_basic_auth() {
        let config = ReporterConfig {
            username: Some("elastic".to_owned()),
            password: Some("changeme".to_owned()),
            api_key: Some("key-123".to_owned()),
            ..ReporterConfig::default()
        };
        assert!(matches!(config.auth(), SinkAuth::ApiKey(key) if key == "key-123"));
    }

    #[test]
    fn basic_auth_requires_both_parts() {
        let config = ReporterConfig {
            username: Some("elastic".to_owned()),
            ..ReporterConfig::default()
        };
        assert!(matches!(config.auth(), SinkAuth::None));
    }

    #[test]
    fn env_filters_match_and_rename() {
        let filter = EnvFilter::new("JENKINS_", true);
        assert!(filter.matches("JENKINS_URL"));
        assert!(!filter.matches("GITLAB_URL"));
        assert_eq!(filter.rename("JENKINS_URL"), "jenkins_url");

        let verbatim = EnvFilter::new("BUILD_", false);
        assert_eq!(verbatim.rename("BUILD_NUMBER"), "BUILD_NUMBER");
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: ReporterConfig = serde_json::from_str(
            r#"{"address": "127.0.0.1:9200", "timeout": "30s", "collect_only": true}"#,
        )
        .unwrap();
        assert_eq!(config.address.as_deref(), Some("127.0.0.1:9200"));
        assert_eq!(config.index, "test_data");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.collect_only);
        assert!(!config.env_filters.is_empty());
    }
}

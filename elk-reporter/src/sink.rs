// Copyright (c) The elk-reporter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Best-effort publishing and querying against the backend.

use crate::{config::ReporterConfig, record::FinalRecord};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};
use ureq::Agent;

/// The percentiles requested from the duration aggregation.
pub const DURATION_PERCENTS: [f64; 3] = [90.0, 95.0, 99.0];

/// The percentile used as the duration estimate.
pub const SELECTED_PERCENT: f64 = 95.0;

/// The auth scheme used for backend requests.
#[derive(Clone, Debug, Default)]
pub enum SinkAuth {
    /// No authentication.
    #[default]
    None,

    /// HTTP basic auth.
    Basic {
        /// The username.
        username: String,
        /// The password.
        password: String,
    },

    /// The `ApiKey` authorization scheme.
    ApiKey(String),
}

impl SinkAuth {
    /// The `Authorization` header value for this scheme, if any.
    pub(crate) fn header_value(&self) -> Option<String> {
        match self {
            SinkAuth::None => None,
            SinkAuth::Basic { username, password } => {
                let credentials = STANDARD.encode(format!("{username}:{password}"));
                Some(format!("Basic {credentials}"))
            }
            SinkAuth::ApiKey(key) => Some(format!("ApiKey {key}")),
        }
    }
}

/// A durable-attempt, best-effort publisher of records to the backend.
///
/// [`publish`](Self::publish) never fails the caller: transport errors and
/// non-2xx responses are logged at warning level and swallowed. The consuming
/// test run's exit code is entirely independent of the backend being
/// reachable. With no address configured the sink is disabled and publishing
/// is a no-op.
#[derive(Clone, Debug)]
pub struct ElasticSink {
    address: Option<String>,
    index: String,
    auth: SinkAuth,
    timeout: Duration,
}

impl ElasticSink {
    /// Creates a sink from the reporter configuration.
    pub fn new(config: &ReporterConfig) -> Self {
        Self {
            address: config.address.as_deref().map(normalize_address),
            index: config.index.clone(),
            auth: config.auth(),
            timeout: config.timeout,
        }
    }

    /// Returns true if a backend address is configured.
    pub fn is_enabled(&self) -> bool {
        self.address.is_some()
    }

    /// Builds a fresh agent with this sink's timeout applied.
    ///
    /// Each fetcher worker calls this to own its own connection pool.
    pub(crate) fn agent(&self) -> Agent {
        let config = Agent::config_builder()
            .timeout_global(Some(self.timeout))
            .http_status_as_error(false)
            .build();
        config.into()
    }

    /// Appends one record to the backend index.
    ///
    /// Never raises to the caller; failures are logged and the run continues.
    pub fn publish(&self, record: &FinalRecord) {
        let Some(address) = &self.address else {
            return;
        };
        let url = format!("{address}/{}/_doc", self.index);
        let agent = self.agent();
        let mut request = agent.post(url.as_str());
        if let Some(value) = self.auth.header_value() {
            request = request.header("Authorization", value.as_str());
        }
        match request.send_json(record) {
            Ok(response) if response.status().is_success() => {
                debug!(%url, "published record");
            }
            Ok(response) => {
                warn!(%url, status = %response.status(), "failed to publish record");
            }
            Err(error) => {
                warn!(%url, %error, "failed to publish record");
            }
        }
    }

    /// Queries the historical duration percentiles for one test identity,
    /// returning the value at [`SELECTED_PERCENT`].
    ///
    /// Matches prior records with `name == identity` and `outcome == passed`.
    /// Any transport failure, non-2xx status, or malformed aggregation
    /// response yields `None`: absent history is never an error.
    pub fn query_percentile(&self, identity: &str, percents: &[f64]) -> Option<f64> {
        self.query_percentile_with(&self.agent(), identity, percents)
    }

    pub(crate) fn query_percentile_with(
        &self,
        agent: &Agent,
        identity: &str,
        percents: &[f64],
    ) -> Option<f64> {
        let address = self.address.as_ref()?;
        let url = format!("{address}/{}/_search?size=0", self.index);
        let body = percentile_query_body(identity, percents);
        let mut request = agent.post(url.as_str());
        if let Some(value) = self.auth.header_value() {
            request = request.header("Authorization", value.as_str());
        }
        match request.send_json(&body) {
            Ok(mut response) if response.status().is_success() => {
                match response.body_mut().read_json::<Value>() {
                    Ok(value) => {
                        let percentile = extract_percentile(&value, SELECTED_PERCENT);
                        if percentile.is_none() {
                            debug!(identity, "no duration history found");
                        }
                        percentile
                    }
                    Err(error) => {
                        warn!(identity, %error, "malformed percentile response");
                        None
                    }
                }
            }
            Ok(response) => {
                warn!(identity, status = %response.status(), "percentile query failed");
                None
            }
            Err(error) => {
                warn!(identity, %error, "percentile query failed");
                None
            }
        }
    }
}

/// Prepends `http://` to addresses given as bare `host:port`, and strips any
/// trailing slash.
fn normalize_address(address: &str) -> String {
    let trimmed = address.trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_owned()
    } else {
        format!("http://{trimmed}")
    }
}

/// The `_search` body requesting a duration-percentile aggregation over prior
/// passed runs of `identity`.
fn percentile_query_body(identity: &str, percents: &[f64]) -> Value {
    json!({
        "query": {
            "query_string": {
                "query": format!("(name:\"{identity}\") AND (outcome: passed)"),
            }
        },
        "aggs": {
            "percentiles_duration": {
                "percentiles": {
                    "field": "duration",
                    "percents": percents,
                }
            }
        }
    })
}

/// Pulls a single percentile value out of an aggregation response.
///
/// The backend keys percentile values by their stringified percent
/// (`"95.0"`); a missing or null value means no history.
fn extract_percentile(response: &Value, percent: f64) -> Option<f64> {
    let key = format!("{percent:.1}");
    response
        .pointer("/aggregations/percentiles_duration/values")?
        .get(key.as_str())?
        .as_f64()
}

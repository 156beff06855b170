//! Test case file model -- YAML loading and the per-case record.
//!
//! A case file is a YAML sequence of one-entry mappings, each mapping a case
//! name to its body:
//!
//! ```yaml
//! - baseline-no-impairment:
//!     client-cli: "-f jsonbrief 172.20.0.2"
//!     server-cli: ""
//!     metrics:
//!       delivered: "within_range(results['Summary']['DeliveredPercent'], 95, 100)"
//! - upstream-delay:
//!     netem:
//!       upstream:
//!         delay:
//!           params: [100ms, 10ms]
//!     client-cli: "-u -f jsonbrief 172.20.0.2"
//!     server-cli: ""
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_yaml::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaseError {
    #[error("case entry must be a single-entry mapping of name to body")]
    NotSingleEntry,

    #[error("case name must be a string")]
    NameNotString,

    #[error("case '{case}' has an invalid body: {source}")]
    InvalidBody {
        case: String,
        source: serde_yaml::Error,
    },

    #[error("case '{case}' declares a non-string metric entry")]
    MetricNotString { case: String },

    #[error("case '{case}' could not be re-expressed for metric evaluation: {source}")]
    NotExpressible {
        case: String,
        source: serde_json::Error,
    },
}

/// Typed view of a case body. The raw body is kept alongside so metric
/// expressions can reference any field under `test_case`, declared or not.
#[derive(Debug, Clone, Deserialize)]
struct CaseBody {
    #[serde(default)]
    #[allow(dead_code)] // accessed through the raw body, kept for schema enforcement
    netem: Option<Value>,

    #[serde(rename = "client-cli")]
    client_cli: String,

    #[serde(rename = "server-cli")]
    server_cli: String,

    #[serde(default)]
    metrics: Option<serde_yaml::Mapping>,
}

/// One named test case, immutable for the duration of a run.
#[derive(Debug, Clone)]
pub struct TestCase {
    name: String,
    body: Value,
    parsed: CaseBody,
    /// The body re-expressed as JSON, the value domain the evaluator binds
    /// as `test_case`.
    json: serde_json::Value,
}

impl TestCase {
    /// Construct from a case name and its YAML body.
    pub fn from_entry(name: impl Into<String>, body: Value) -> Result<Self, CaseError> {
        let name = name.into();
        let parsed: CaseBody =
            serde_yaml::from_value(body.clone()).map_err(|source| CaseError::InvalidBody {
                case: name.clone(),
                source,
            })?;
        if let Some(metrics) = &parsed.metrics {
            if metrics.iter().any(|(k, v)| !k.is_string() || !v.is_string()) {
                return Err(CaseError::MetricNotString { case: name });
            }
        }
        let json =
            serde_json::to_value(&body).map_err(|source| CaseError::NotExpressible {
                case: name.clone(),
                source,
            })?;
        Ok(Self { name, body, parsed, json })
    }

    /// Unwrap a raw one-entry `name -> body` mapping as read from the file.
    pub fn from_wrapper(entry: Value) -> Result<Self, CaseError> {
        let Value::Mapping(map) = entry else {
            return Err(CaseError::NotSingleEntry);
        };
        if map.len() != 1 {
            return Err(CaseError::NotSingleEntry);
        }
        let Some((key, body)) = map.into_iter().next() else {
            return Err(CaseError::NotSingleEntry);
        };
        let Value::String(name) = key else {
            return Err(CaseError::NameNotString);
        };
        Self::from_entry(name, body)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw `netem` impairment spec, if one was declared.
    pub fn netem(&self) -> Option<&Value> {
        self.body.get("netem")
    }

    pub fn client_cli(&self) -> &str {
        &self.parsed.client_cli
    }

    pub fn server_cli(&self) -> &str {
        &self.parsed.server_cli
    }

    /// Declared metrics as (name, expression) pairs in declaration order.
    pub fn metrics(&self) -> Vec<(&str, &str)> {
        match &self.parsed.metrics {
            Some(map) => map
                .iter()
                .filter_map(|(k, v)| Some((k.as_str()?, v.as_str()?)))
                .collect(),
            None => Vec::new(),
        }
    }

    /// The full case body as a JSON value, bound as `test_case` during
    /// metric evaluation.
    pub fn as_json(&self) -> &serde_json::Value {
        &self.json
    }
}

/// Load every case from a YAML case file, preserving file order.
pub fn load_cases(path: &Path) -> Result<Vec<TestCase>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading case file {}", path.display()))?;
    parse_cases(&text).with_context(|| format!("parsing case file {}", path.display()))
}

/// Parse a case file from its YAML text.
pub fn parse_cases(text: &str) -> Result<Vec<TestCase>> {
    let entries: Vec<Value> = serde_yaml::from_str(text).context("case file must be a YAML sequence")?;
    entries
        .into_iter()
        .enumerate()
        .map(|(idx, entry)| {
            TestCase::from_wrapper(entry).with_context(|| format!("case entry #{}", idx + 1))
        })
        .collect()
}

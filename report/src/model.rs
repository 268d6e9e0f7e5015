//! Report document model: provider, executions, interactions, and results.
//!
//! The serialized field names (`metaData`, `execution`, `stackTrace`, ...)
//! are part of the on-disk format keyed by [`REPORT_FORMAT`]; downstream
//! tooling reads them, so renaming a field is a format change.
//!
//! Keys this crate does not model are kept in each node's `extra` map and
//! written back unchanged, so merging into a report produced by another
//! writer does not lose anything from its earlier executions.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Version of the report document layout. Independent of the crate version.
pub const REPORT_FORMAT: &str = "0.0.0";

/// Version string recorded as the generating tool.
pub const VERIFIER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// `state` recorded on an execution whose pact could not be loaded.
pub const LOAD_FAILURE_STATE: &str = "Pact Load Failure";

/// Generation metadata. Replaced wholesale by the latest run on merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    /// RFC 3339 generation timestamp.
    pub date: String,
    /// Version of the tool that produced the report.
    #[serde(default)]
    pub verifier_version: String,
    /// Layout version of the report document.
    pub report_format: String,
}

impl ReportMetadata {
    /// Metadata stamped with the current time.
    #[must_use]
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    /// Metadata stamped with the given time.
    #[must_use]
    pub fn at(date: DateTime<Utc>) -> Self {
        Self {
            date: date.to_rfc3339_opts(SecondsFormat::Millis, true),
            verifier_version: VERIFIER_VERSION.to_owned(),
            report_format: REPORT_FORMAT.to_owned(),
        }
    }
}

/// The provider under verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSummary {
    /// Provider name; also the report file stem.
    pub name: String,
    /// Unmodelled keys, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Where a consumer's pact was loaded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PactSource {
    /// Fetched over HTTP, e.g. from a broker.
    #[serde(rename = "url")]
    Remote(String),
    /// A local file path, or a description of a non-file source.
    #[serde(rename = "file")]
    Local(String),
}

/// The consumer whose pact is being verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerSummary {
    /// Consumer name.
    pub name: String,
    /// Pact location, once reported by the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PactSource>,
    /// Unmodelled keys, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Marker recorded on an execution whose pact failed to load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadFailure {
    /// Always [`LOAD_FAILURE_STATE`] for reports written by this crate.
    pub state: String,
    /// Reason reported by the engine.
    pub message: String,
    /// Unmodelled keys, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LoadFailure {
    /// A pact load failure with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            state: LOAD_FAILURE_STATE.to_owned(),
            message: message.into(),
            extra: Map::new(),
        }
    }
}

/// One consumer's verification within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEntry {
    /// The consumer and its pact source.
    pub consumer: ConsumerSummary,
    /// Present only when the pact could not be loaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<LoadFailure>,
    /// Verified interactions, in verification order.
    #[serde(default)]
    pub interactions: Vec<InteractionEntry>,
    /// Unmodelled keys, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExecutionEntry {
    /// An execution for `consumer` with no source and no interactions.
    #[must_use]
    pub fn new(consumer: impl Into<String>) -> Self {
        Self {
            consumer: ConsumerSummary {
                name: consumer.into(),
                source: None,
                extra: Map::new(),
            },
            result: None,
            interactions: Vec::new(),
            extra: Map::new(),
        }
    }

    /// The pact source, if one was reported.
    #[must_use]
    pub fn source(&self) -> Option<&PactSource> {
        self.consumer.source.as_ref()
    }

    /// The load failure marker, if the pact failed to load.
    #[must_use]
    pub fn load_failure(&self) -> Option<&LoadFailure> {
        self.result.as_ref()
    }
}

/// Serialized form of the interaction under test.
///
/// The content is opaque to the report: it is embedded verbatim. A pact
/// version tag may be attached so readers know which pact layout it follows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InteractionSnapshot(Value);

impl InteractionSnapshot {
    /// Key holding the optional pact specification version tag.
    pub const SPEC_VERSION_KEY: &'static str = "pactSpecVersion";

    /// Wraps an already-serialized interaction.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Tags the snapshot with a pact specification version.
    ///
    /// Non-object snapshots have nowhere to carry the tag and are returned unchanged.
    #[must_use]
    pub fn with_spec_version(mut self, version: &str) -> Self {
        if let Value::Object(map) = &mut self.0 {
            map.insert(
                Self::SPEC_VERSION_KEY.to_owned(),
                Value::String(version.to_owned()),
            );
        }
        self
    }

    /// The pact specification version tag, if present.
    #[must_use]
    pub fn spec_version(&self) -> Option<&str> {
        self.0.get(Self::SPEC_VERSION_KEY).and_then(Value::as_str)
    }

    /// The interaction description, if the snapshot carries one.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.0.get("description").and_then(Value::as_str)
    }

    /// The raw snapshot.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// Overall outcome of an interaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationStatus {
    /// No failure recorded.
    #[default]
    #[serde(rename = "OK")]
    Ok,
    /// At least one failure recorded. Never reverts to `Ok`.
    #[serde(rename = "failed")]
    Failed,
}

/// An exception thrown while verifying an interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionDetail {
    /// Exception message, if any.
    #[serde(default)]
    pub message: Option<String>,
    /// Stack frames, outermost first.
    #[serde(rename = "stackTrace", default)]
    pub stack_trace: Vec<String>,
    /// Unmodelled keys, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExceptionDetail {
    /// An exception with a message and stack frames.
    #[must_use]
    pub fn new(message: impl Into<String>, stack_trace: Vec<String>) -> Self {
        Self {
            message: Some(message.into()),
            stack_trace,
            extra: Map::new(),
        }
    }
}

/// Why verification could not run at all (e.g. no handler for the interaction).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CauseDetail {
    /// Human-readable cause.
    pub message: String,
    /// Unmodelled keys, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Verification result for one interaction, with per-dimension failure detail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// `OK` until a failure is recorded.
    pub result: VerificationStatus,
    /// Interaction message attached to request failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Status mismatch: the message lines, or `{"detail", "lines"}` when
    /// the engine supplied structured detail as well.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
    /// Header mismatches keyed by header name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<BTreeMap<String, Value>>,
    /// Body mismatch detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Message metadata mismatches keyed by metadata key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, Value>>,
    /// Exception thrown during verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionDetail>,
    /// Reason verification could not run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<CauseDetail>,
    /// Unmodelled keys, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VerificationResult {
    /// Returns true once any failure has been recorded.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.result == VerificationStatus::Failed
    }
}

/// One verified interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEntry {
    /// The interaction as recorded in the pact.
    pub interaction: InteractionSnapshot,
    /// Outcome of replaying it against the provider.
    pub verification: VerificationResult,
    /// Unmodelled keys, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InteractionEntry {
    /// A fresh entry whose result is `OK`.
    #[must_use]
    pub fn new(interaction: InteractionSnapshot) -> Self {
        Self {
            interaction,
            verification: VerificationResult::default(),
            extra: Map::new(),
        }
    }
}

/// Root of a provider's verification report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDocument {
    /// Generation metadata.
    #[serde(rename = "metaData")]
    pub metadata: ReportMetadata,
    /// The verified provider.
    pub provider: ProviderSummary,
    /// One entry per consumer verified, across all merged runs.
    #[serde(rename = "execution", default)]
    pub executions: Vec<ExecutionEntry>,
    /// Unmodelled keys, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ReportDocument {
    /// An empty report for `provider`.
    #[must_use]
    pub fn new(provider: impl Into<String>, metadata: ReportMetadata) -> Self {
        Self {
            metadata,
            provider: ProviderSummary {
                name: provider.into(),
                extra: Map::new(),
            },
            executions: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Parses a report from JSON text.
    ///
    /// # Errors
    ///
    /// Returns the parse error if `text` is not a report document.
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Serializes the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if a snapshot or detail value cannot be serialized.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Number of interactions across all executions.
    #[must_use]
    pub fn interaction_count(&self) -> usize {
        self.executions.iter().map(|e| e.interactions.len()).sum()
    }

    /// Failed interactions plus executions whose pact failed to load.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.executions
            .iter()
            .map(|e| {
                let failed = e
                    .interactions
                    .iter()
                    .filter(|i| i.verification.is_failed())
                    .count();
                failed + usize::from(e.result.is_some())
            })
            .sum()
    }

    /// Returns true if nothing failed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failure_count() == 0
    }
}

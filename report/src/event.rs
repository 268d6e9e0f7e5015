//! Serializable lifecycle events and event-log replay.
//!
//! A captured verification run is a JSON Lines file with one [`ReportEvent`]
//! per line, e.g.
//!
//! ```text
//! {"event":"initialize","provider":"PricingService"}
//! {"event":"openConsumer","consumer":"WebApp"}
//! {"event":"setConsumerSource","source":{"url":"http://broker/pact/1"}}
//! {"event":"openInteraction","interaction":{"description":"get price"}}
//! {"event":"recordComparisonOutcome","dimension":"status"}
//! {"event":"finalize"}
//! ```
//!
//! An outcome event without a `failure` object records a success.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::aggregator::{
    violation, AggregatorState, Dimension, FailureDetail, Outcome, ReportAggregator,
};
use crate::error::{ReportError, Result};
use crate::model::{ExceptionDetail, InteractionSnapshot, PactSource, ReportDocument};

/// Dimension name as it appears in an event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionKind {
    /// Response status.
    Status,
    /// A header; the event carries the header name in `key`.
    Header,
    /// Body.
    Body,
    /// A metadata entry; the event carries the key in `key`.
    Metadata,
    /// Exception during verification.
    Exception,
    /// Verification could not run.
    Cause,
}

/// Failure payload as it appears in an event log.
///
/// Mismatch dimensions read `detail` and `lines`; exceptions read `message`
/// and `stackTrace`; causes read `message`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Structured mismatch detail.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub detail: Value,
    /// Human-readable mismatch lines.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lines: Vec<String>,
    /// Exception or cause message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Exception stack frames.
    #[serde(rename = "stackTrace", default, skip_serializing_if = "Vec::is_empty")]
    pub stack_trace: Vec<String>,
}

/// One lifecycle event emitted by the verification engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ReportEvent {
    /// Start of the run.
    Initialize {
        /// Provider under verification.
        provider: String,
    },
    /// Start of one consumer's verification.
    OpenConsumer {
        /// Consumer name.
        consumer: String,
    },
    /// Where the current consumer's pact came from.
    SetConsumerSource {
        /// Pact location.
        source: PactSource,
    },
    /// The current consumer's pact could not be loaded.
    RecordLoadFailure {
        /// Reason.
        message: String,
    },
    /// Start of one interaction's verification.
    OpenInteraction {
        /// Serialized interaction.
        interaction: InteractionSnapshot,
    },
    /// Outcome of one comparison on the current interaction.
    RecordComparisonOutcome {
        /// Compared dimension.
        dimension: DimensionKind,
        /// Header name or metadata key.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
        /// Absent for a success.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        failure: Option<FailureRecord>,
    },
    /// The request for the current interaction could not be made.
    RecordRequestFailure {
        /// Interaction message.
        message: String,
        /// The exception raised.
        exception: ExceptionDetail,
    },
    /// End of the run.
    Finalize,
}

impl ReportEvent {
    /// Protocol name of the event.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Initialize { .. } => "initialize",
            Self::OpenConsumer { .. } => "openConsumer",
            Self::SetConsumerSource { .. } => "setConsumerSource",
            Self::RecordLoadFailure { .. } => "recordLoadFailure",
            Self::OpenInteraction { .. } => "openInteraction",
            Self::RecordComparisonOutcome { .. } => "recordComparisonOutcome",
            Self::RecordRequestFailure { .. } => "recordRequestFailure",
            Self::Finalize => "finalize",
        }
    }
}

const OUTCOME_EVENT: &str = "recordComparisonOutcome";

fn to_dimension(
    state: AggregatorState,
    kind: DimensionKind,
    key: Option<String>,
) -> Result<Dimension> {
    let keyed = |key: Option<String>, what: &str| {
        key.ok_or_else(|| {
            violation(state, OUTCOME_EVENT, format!("{what} outcome is missing its `key`"))
        })
    };
    Ok(match kind {
        DimensionKind::Status => Dimension::Status,
        DimensionKind::Header => Dimension::Header(keyed(key, "header")?),
        DimensionKind::Body => Dimension::Body,
        DimensionKind::Metadata => Dimension::Metadata(keyed(key, "metadata")?),
        DimensionKind::Exception => Dimension::Exception,
        DimensionKind::Cause => Dimension::Cause,
    })
}

fn to_outcome(
    state: AggregatorState,
    kind: DimensionKind,
    failure: Option<FailureRecord>,
) -> Result<Outcome> {
    let Some(record) = failure else {
        return Ok(Outcome::Success);
    };
    let detail = match kind {
        DimensionKind::Exception => FailureDetail::Exception(ExceptionDetail {
            message: record.message,
            stack_trace: record.stack_trace,
            extra: Map::new(),
        }),
        DimensionKind::Cause => match record.message {
            Some(message) if !message.trim().is_empty() => FailureDetail::Cause(message),
            _ => {
                return Err(violation(
                    state,
                    OUTCOME_EVENT,
                    "cause failure is missing its `message`",
                ))
            }
        },
        _ => FailureDetail::Mismatch {
            detail: record.detail,
            lines: record.lines,
        },
    };
    Ok(Outcome::Failure(detail))
}

impl ReportAggregator {
    /// Applies one event. Returns the finished document for [`ReportEvent::Finalize`].
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::ProtocolViolation`] if the event is out of order
    /// or malformed.
    pub fn apply(&mut self, event: ReportEvent) -> Result<Option<ReportDocument>> {
        match event {
            ReportEvent::Initialize { provider } => self.initialize(&provider)?,
            ReportEvent::OpenConsumer { consumer } => self.open_consumer(&consumer)?,
            ReportEvent::SetConsumerSource { source } => self.set_consumer_source(source)?,
            ReportEvent::RecordLoadFailure { message } => self.record_load_failure(&message)?,
            ReportEvent::OpenInteraction { interaction } => self.open_interaction(interaction)?,
            ReportEvent::RecordComparisonOutcome {
                dimension,
                key,
                failure,
            } => {
                let state = self.state();
                let outcome = to_outcome(state, dimension, failure)?;
                self.record_comparison_outcome(to_dimension(state, dimension, key)?, outcome)?;
            }
            ReportEvent::RecordRequestFailure { message, exception } => {
                self.record_request_failure(&message, exception)?;
            }
            ReportEvent::Finalize => return self.finalize().map(Some),
        }
        Ok(None)
    }
}

/// Parses a JSON Lines event log. Blank lines are skipped.
///
/// # Errors
///
/// Returns [`ReportError::MalformedEvent`] naming the first unparsable line (1-based).
pub fn parse_event_log(text: &str) -> Result<Vec<ReportEvent>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|source| ReportError::MalformedEvent {
                line: index + 1,
                source,
            })
        })
        .collect()
}

/// Replays events through a fresh aggregator and returns the finished document.
///
/// # Errors
///
/// Returns [`ReportError::ProtocolViolation`] if an event is out of order,
/// if events follow `finalize`, or if the log ends without `finalize`.
pub fn replay<I>(events: I) -> Result<ReportDocument>
where
    I: IntoIterator<Item = ReportEvent>,
{
    let mut aggregator = ReportAggregator::new();
    let mut finished = None;
    for event in events {
        if finished.is_some() {
            return Err(violation(
                aggregator.state(),
                event.name(),
                "event received after finalize",
            ));
        }
        finished = aggregator.apply(event)?;
    }
    finished.ok_or_else(|| {
        violation(
            aggregator.state(),
            "finalize",
            "event log ended without finalize",
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VerificationStatus;
    use serde_json::json;

    const LOG: &str = r#"
{"event":"initialize","provider":"PricingService"}
{"event":"openConsumer","consumer":"WebApp"}
{"event":"setConsumerSource","source":{"file":"pacts/webapp.json"}}
{"event":"openInteraction","interaction":{"description":"get price"}}
{"event":"recordComparisonOutcome","dimension":"header","key":"Content-Type","failure":{"detail":{"expected":"application/json"}}}
{"event":"recordComparisonOutcome","dimension":"exception","failure":{"message":"boom","stackTrace":["at a","at b"]}}

{"event":"openInteraction","interaction":{"description":"list prices"}}
{"event":"recordComparisonOutcome","dimension":"cause","failure":{"message":"No Annotated Methods Found For Interaction"}}
{"event":"finalize"}
"#;

    #[test]
    fn replays_a_captured_log() -> Result<()> {
        let doc = replay(parse_event_log(LOG)?)?;
        assert_eq!(doc.provider.name, "PricingService");
        let execution = &doc.executions[0];
        assert_eq!(
            execution.source(),
            Some(&PactSource::Local("pacts/webapp.json".into()))
        );
        let first = &execution.interactions[0].verification;
        assert_eq!(first.result, VerificationStatus::Failed);
        assert_eq!(
            first.header.as_ref().and_then(|h| h.get("Content-Type")),
            Some(&json!({"expected": "application/json"}))
        );
        assert_eq!(
            first.exception.as_ref().map(|e| e.stack_trace.len()),
            Some(2)
        );
        let second = &execution.interactions[1].verification;
        assert_eq!(
            second.cause.as_ref().map(|c| c.message.as_str()),
            Some("No Annotated Methods Found For Interaction")
        );
        Ok(())
    }

    #[test]
    fn malformed_line_is_reported_with_its_number() {
        let err = parse_event_log("{\"event\":\"finalize\"}\n\n{not json}\n").err();
        assert!(matches!(err, Some(ReportError::MalformedEvent { line: 3, .. })));
    }

    #[test]
    fn header_without_key_is_a_violation() -> Result<()> {
        let events = parse_event_log(
            r#"{"event":"initialize","provider":"P"}
{"event":"openConsumer","consumer":"C"}
{"event":"openInteraction","interaction":{}}
{"event":"recordComparisonOutcome","dimension":"header","failure":{"detail":"x"}}"#,
        )?;
        let err = replay(events).err();
        assert!(err.is_some_and(|e| e.is_protocol_violation()));
        Ok(())
    }

    #[test]
    fn log_without_finalize_produces_nothing() -> Result<()> {
        let events = parse_event_log(r#"{"event":"initialize","provider":"P"}"#)?;
        let err = replay(events).err();
        assert!(err.is_some_and(|e| e.is_protocol_violation()));
        Ok(())
    }

    #[test]
    fn events_after_finalize_are_rejected() {
        let events = vec![
            ReportEvent::Initialize {
                provider: "P".into(),
            },
            ReportEvent::Finalize,
            ReportEvent::OpenConsumer {
                consumer: "C".into(),
            },
        ];
        assert!(replay(events).is_err());
    }

    #[test]
    fn event_names_use_protocol_spelling() -> Result<()> {
        let value = serde_json::to_value(ReportEvent::RecordLoadFailure {
            message: "gone".into(),
        })?;
        assert_eq!(value, json!({"event": "recordLoadFailure", "message": "gone"}));
        Ok(())
    }

    #[test]
    fn cause_without_message_is_a_violation() -> Result<()> {
        let events = parse_event_log(
            r#"{"event":"initialize","provider":"P"}
{"event":"openConsumer","consumer":"C"}
{"event":"openInteraction","interaction":{}}
{"event":"recordComparisonOutcome","dimension":"cause","failure":{}}
{"event":"finalize"}"#,
        )?;
        let err = replay(events).err();
        assert!(err.is_some_and(|e| e.is_protocol_violation()));
        Ok(())
    }

    #[test]
    fn mismatch_lines_from_the_log_are_recorded() -> Result<()> {
        let events = parse_event_log(
            r#"{"event":"initialize","provider":"P"}
{"event":"openConsumer","consumer":"C"}
{"event":"openInteraction","interaction":{}}
{"event":"recordComparisonOutcome","dimension":"body","failure":{"detail":{"$.a":"x"},"lines":["expected 1 but got 2"]}}
{"event":"finalize"}"#,
        )?;
        let doc = replay(events)?;
        assert_eq!(
            doc.executions[0].interactions[0].verification.body,
            Some(json!({"detail": {"$.a": "x"}, "lines": ["expected 1 but got 2"]}))
        );
        Ok(())
    }
}

//! Report aggregator: folds verification lifecycle events into a [`ReportDocument`].
//!
//! The engine emits events in a fixed nesting order (provider, then consumer,
//! then interaction). The aggregator keeps an explicit cursor for the current
//! execution and the current interaction and validates it on every event.
//! An event whose target node does not exist is rejected with
//! [`ReportError::ProtocolViolation`] and leaves the document untouched.
//!
//! ```
//! use pactverify_report::{Dimension, FailureDetail, InteractionSnapshot, Outcome, ReportAggregator};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), pactverify_report::ReportError> {
//! let mut aggregator = ReportAggregator::new();
//! aggregator.initialize("PricingService")?;
//! aggregator.open_consumer("WebApp")?;
//! aggregator.open_interaction(InteractionSnapshot::new(json!({"description": "get price"})))?;
//! aggregator.record_comparison_outcome(
//!     Dimension::Body,
//!     Outcome::Failure(FailureDetail::mismatch(json!({"$.price": "expected 10"}))),
//! )?;
//! let document = aggregator.finalize()?;
//! assert_eq!(document.failure_count(), 1);
//! # Ok(())
//! # }
//! ```

use std::fmt;

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::error::{ReportError, Result};
use crate::model::{
    CauseDetail, ExceptionDetail, ExecutionEntry, InteractionEntry, InteractionSnapshot,
    LoadFailure, PactSource, ReportDocument, ReportMetadata, VerificationResult,
    VerificationStatus,
};

/// Cause recorded when no handler exists for an interaction.
pub const NO_HANDLER_CAUSE: &str = "No Annotated Methods Found For Interaction";

/// Position of the aggregator in the event protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorState {
    /// No provider bound yet.
    Uninitialized,
    /// Provider bound, no consumer opened.
    Initialized,
    /// A consumer is open and has no open interaction.
    ConsumerOpen,
    /// An interaction of the current consumer is open.
    InteractionOpen,
    /// The document has been handed off; no further events are accepted.
    Finalized,
}

impl fmt::Display for AggregatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::ConsumerOpen => "consumer open",
            Self::InteractionOpen => "interaction open",
            Self::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

/// Comparison dimension an outcome belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dimension {
    /// Response status.
    Status,
    /// A single header, by name.
    Header(String),
    /// Response or message body.
    Body,
    /// A single message metadata entry, by key.
    Metadata(String),
    /// An exception thrown during verification.
    Exception,
    /// Verification could not run (e.g. missing handler).
    Cause,
}

impl Dimension {
    /// Field name of this dimension in the verification result.
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Header(_) => "header",
            Self::Body => "body",
            Self::Metadata(_) => "metadata",
            Self::Exception => "exception",
            Self::Cause => "cause",
        }
    }
}

/// Failure payload for a comparison dimension.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureDetail {
    /// Structured mismatch detail with optional human-readable lines.
    /// Valid for status, header, body and metadata.
    Mismatch {
        /// Free-form structured detail.
        detail: Value,
        /// Human-readable lines.
        lines: Vec<String>,
    },
    /// Valid for [`Dimension::Exception`].
    Exception(ExceptionDetail),
    /// Valid for [`Dimension::Cause`].
    Cause(String),
}

impl FailureDetail {
    /// Structured mismatch detail without text lines.
    #[must_use]
    pub fn mismatch(detail: Value) -> Self {
        Self::Mismatch {
            detail,
            lines: Vec::new(),
        }
    }

    /// A mismatch described by a message. Status failures record it one
    /// entry per line.
    #[must_use]
    pub fn message(text: &str) -> Self {
        Self::mismatch(Value::String(text.to_owned()))
    }
}

/// Outcome of a single comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The comparison matched. Never clears an earlier failure.
    Success,
    /// The comparison failed with the given detail.
    Failure(FailureDetail),
}

/// Stateful consumer of lifecycle events for one verification run.
#[derive(Debug)]
pub struct ReportAggregator {
    state: AggregatorState,
    document: Option<ReportDocument>,
    current_execution: Option<usize>,
    current_interaction: Option<usize>,
}

impl Default for ReportAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportAggregator {
    /// An aggregator awaiting [`initialize`](Self::initialize).
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: AggregatorState::Uninitialized,
            document: None,
            current_execution: None,
            current_interaction: None,
        }
    }

    /// Current protocol state.
    #[must_use]
    pub fn state(&self) -> AggregatorState {
        self.state
    }

    /// The document under construction, until it is finalized.
    #[must_use]
    pub fn document(&self) -> Option<&ReportDocument> {
        self.document.as_ref()
    }

    /// Starts the run for `provider`, stamping metadata with the current time.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::ProtocolViolation`] unless the aggregator is uninitialized.
    pub fn initialize(&mut self, provider: &str) -> Result<()> {
        self.initialize_with_metadata(provider, ReportMetadata::now())
    }

    /// Starts the run for `provider` with explicit metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::ProtocolViolation`] unless the aggregator is uninitialized.
    pub fn initialize_with_metadata(
        &mut self,
        provider: &str,
        metadata: ReportMetadata,
    ) -> Result<()> {
        const EVENT: &str = "initialize";
        self.require(EVENT, &[AggregatorState::Uninitialized])?;
        self.document = Some(ReportDocument::new(provider, metadata));
        self.state = AggregatorState::Initialized;
        debug!(provider, "report initialized");
        Ok(())
    }

    /// Appends an execution for `consumer` and makes it current.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::ProtocolViolation`] before initialization or after finalization.
    pub fn open_consumer(&mut self, consumer: &str) -> Result<()> {
        const EVENT: &str = "openConsumer";
        self.require(
            EVENT,
            &[
                AggregatorState::Initialized,
                AggregatorState::ConsumerOpen,
                AggregatorState::InteractionOpen,
            ],
        )?;
        let document = self.document_mut(EVENT)?;
        document.executions.push(ExecutionEntry::new(consumer));
        let index = document.executions.len() - 1;
        self.current_execution = Some(index);
        self.current_interaction = None;
        self.state = AggregatorState::ConsumerOpen;
        debug!(consumer, execution = index, "consumer opened");
        Ok(())
    }

    /// Records where the current consumer's pact came from. A second call overwrites.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::ProtocolViolation`] if no consumer is open.
    pub fn set_consumer_source(&mut self, source: PactSource) -> Result<()> {
        const EVENT: &str = "setConsumerSource";
        self.require(
            EVENT,
            &[
                AggregatorState::ConsumerOpen,
                AggregatorState::InteractionOpen,
            ],
        )?;
        let execution = self.execution_mut(EVENT)?;
        debug!(consumer = %execution.consumer.name, ?source, "consumer source set");
        execution.consumer.source = Some(source);
        Ok(())
    }

    /// Marks the current consumer's pact as failed to load.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::ProtocolViolation`] unless a consumer is open with
    /// no interaction opened.
    pub fn record_load_failure(&mut self, message: &str) -> Result<()> {
        const EVENT: &str = "recordLoadFailure";
        self.require(EVENT, &[AggregatorState::ConsumerOpen])?;
        let execution = self.execution_mut(EVENT)?;
        debug!(consumer = %execution.consumer.name, message, "pact load failure");
        execution.result = Some(LoadFailure::new(message));
        Ok(())
    }

    /// Appends an `OK` interaction entry to the current consumer and makes it current.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::ProtocolViolation`] if no consumer is open, or if
    /// the current consumer's pact failed to load.
    pub fn open_interaction(&mut self, snapshot: InteractionSnapshot) -> Result<()> {
        const EVENT: &str = "openInteraction";
        self.require(
            EVENT,
            &[
                AggregatorState::ConsumerOpen,
                AggregatorState::InteractionOpen,
            ],
        )?;
        let execution = self.execution_mut(EVENT)?;
        if execution.result.is_some() {
            let consumer = execution.consumer.name.clone();
            return Err(violation(
                self.state,
                EVENT,
                format!("pact for consumer `{consumer}` failed to load; it has no interactions"),
            ));
        }
        debug!(
            consumer = %execution.consumer.name,
            description = snapshot.description().unwrap_or("<none>"),
            "interaction opened"
        );
        execution.interactions.push(InteractionEntry::new(snapshot));
        let index = execution.interactions.len() - 1;
        self.current_interaction = Some(index);
        self.state = AggregatorState::InteractionOpen;
        Ok(())
    }

    /// Records the outcome of one comparison on the current interaction.
    ///
    /// A failure sets the result to `failed` and attaches its detail under the
    /// dimension's field; header and metadata detail is merged by key. A
    /// success changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::ProtocolViolation`] if no interaction is open, or
    /// if the failure detail kind does not fit the dimension.
    pub fn record_comparison_outcome(
        &mut self,
        dimension: Dimension,
        outcome: Outcome,
    ) -> Result<()> {
        const EVENT: &str = "recordComparisonOutcome";
        self.require(EVENT, &[AggregatorState::InteractionOpen])?;
        let failure = match outcome {
            Outcome::Success => {
                self.interaction_mut(EVENT)?;
                debug!(dimension = dimension.field(), "comparison ok");
                return Ok(());
            }
            Outcome::Failure(failure) => failure,
        };
        if !fits(&dimension, &failure) {
            return Err(violation(
                self.state,
                EVENT,
                format!(
                    "failure detail does not apply to the `{}` dimension",
                    dimension.field()
                ),
            ));
        }
        let entry = self.interaction_mut(EVENT)?;
        debug!(dimension = dimension.field(), "comparison failed");
        attach_failure(&mut entry.verification, dimension, failure);
        Ok(())
    }

    /// Records a request that could not be made: the interaction message and the exception.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::ProtocolViolation`] if no interaction is open.
    pub fn record_request_failure(
        &mut self,
        message: &str,
        exception: ExceptionDetail,
    ) -> Result<()> {
        const EVENT: &str = "recordRequestFailure";
        self.require(EVENT, &[AggregatorState::InteractionOpen])?;
        let entry = self.interaction_mut(EVENT)?;
        entry.verification.message = Some(message.to_owned());
        attach_failure(
            &mut entry.verification,
            Dimension::Exception,
            FailureDetail::Exception(exception),
        );
        Ok(())
    }

    /// Ends the run and hands over the completed document.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::ProtocolViolation`] before initialization or if
    /// already finalized.
    pub fn finalize(&mut self) -> Result<ReportDocument> {
        const EVENT: &str = "finalize";
        self.require(
            EVENT,
            &[
                AggregatorState::Initialized,
                AggregatorState::ConsumerOpen,
                AggregatorState::InteractionOpen,
            ],
        )?;
        let state = self.state;
        let document = self
            .document
            .take()
            .ok_or_else(|| violation(state, EVENT, "no document to finalize"))?;
        self.current_execution = None;
        self.current_interaction = None;
        self.state = AggregatorState::Finalized;
        debug!(
            provider = %document.provider.name,
            executions = document.executions.len(),
            "report finalized"
        );
        Ok(document)
    }

    fn require(&self, event: &'static str, allowed: &[AggregatorState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(violation(
                self.state,
                event,
                format!("not accepted while {}", self.state),
            ))
        }
    }

    fn document_mut(&mut self, event: &'static str) -> Result<&mut ReportDocument> {
        let state = self.state;
        self.document
            .as_mut()
            .ok_or_else(|| violation(state, event, "no report document"))
    }

    fn execution_mut(&mut self, event: &'static str) -> Result<&mut ExecutionEntry> {
        let state = self.state;
        let index = self
            .current_execution
            .ok_or_else(|| violation(state, event, "no consumer has been opened"))?;
        self.document
            .as_mut()
            .and_then(|d| d.executions.get_mut(index))
            .ok_or_else(|| {
                violation(state, event, "current consumer is missing from the document")
            })
    }

    fn interaction_mut(&mut self, event: &'static str) -> Result<&mut InteractionEntry> {
        let state = self.state;
        let index = self
            .current_interaction
            .ok_or_else(|| violation(state, event, "no interaction has been opened"))?;
        self.execution_mut(event)?
            .interactions
            .get_mut(index)
            .ok_or_else(|| {
                violation(state, event, "current interaction is missing from the document")
            })
    }
}

/// Logs and builds a protocol violation for `event` received in `state`.
pub(crate) fn violation(
    state: AggregatorState,
    event: &'static str,
    reason: impl Into<String>,
) -> ReportError {
    let reason = reason.into();
    warn!(event, %state, %reason, "report protocol violation");
    ReportError::protocol(event, reason)
}

fn fits(dimension: &Dimension, failure: &FailureDetail) -> bool {
    match failure {
        FailureDetail::Mismatch { .. } => matches!(
            dimension,
            Dimension::Status | Dimension::Header(_) | Dimension::Body | Dimension::Metadata(_)
        ),
        FailureDetail::Exception(_) => *dimension == Dimension::Exception,
        FailureDetail::Cause(_) => *dimension == Dimension::Cause,
    }
}

/// Detail and lines as stored in the result. When both are present neither
/// is dropped: they are kept side by side as `{"detail", "lines"}`.
fn mismatch_value(detail: Value, lines: Vec<String>) -> Value {
    match (detail.is_null(), lines.is_empty()) {
        (true, true) => Value::Null,
        (true, false) => Value::from(lines),
        (false, true) => detail,
        (false, false) => json!({ "detail": detail, "lines": lines }),
    }
}

/// Status detail given only as text is recorded one entry per line.
fn status_value(detail: Value, lines: Vec<String>) -> Value {
    if !lines.is_empty() {
        return mismatch_value(detail, lines);
    }
    let text = match detail {
        Value::String(s) => s,
        Value::Null => return Value::Array(Vec::new()),
        other => return other,
    };
    Value::from(text.split('\n').map(str::to_owned).collect::<Vec<_>>())
}

// Callers check `fits` first; a mismatched pair is ignored here.
fn attach_failure(result: &mut VerificationResult, dimension: Dimension, failure: FailureDetail) {
    result.result = VerificationStatus::Failed;
    match (dimension, failure) {
        (Dimension::Status, FailureDetail::Mismatch { detail, lines }) => {
            result.status = Some(status_value(detail, lines));
        }
        (Dimension::Header(name), FailureDetail::Mismatch { detail, lines }) => {
            result
                .header
                .get_or_insert_with(Default::default)
                .insert(name, mismatch_value(detail, lines));
        }
        (Dimension::Body, FailureDetail::Mismatch { detail, lines }) => {
            result.body = Some(mismatch_value(detail, lines));
        }
        (Dimension::Metadata(key), FailureDetail::Mismatch { detail, lines }) => {
            result
                .metadata
                .get_or_insert_with(Default::default)
                .insert(key, mismatch_value(detail, lines));
        }
        (Dimension::Exception, FailureDetail::Exception(exception)) => {
            result.exception = Some(exception);
        }
        (Dimension::Cause, FailureDetail::Cause(message)) => {
            result.cause = Some(CauseDetail {
                message,
                extra: Map::new(),
            });
        }
        _ => {}
    }
}

//! Provider verification report aggregator.
//!
//! A verification engine replays consumer pacts against a provider and emits
//! lifecycle events as it goes. This crate folds those events into one JSON
//! report per provider and merges each run into any report already on disk.
//!
//! # Components
//!
//! | Module | Role |
//! |--------|------|
//! | [`model`] | Report document: metadata, provider, executions, interactions |
//! | [`aggregator`] | Event protocol state machine building the document |
//! | [`event`] | Serializable events and JSON Lines replay |
//! | [`reporter`] | Engine callback trait and the JSON report writer |
//! | [`persist`] | Merge-on-write and atomic file replacement |
//! | [`config`] | Report directory and file extension |
//!
//! # Entry Point
//!
//! ```no_run
//! use pactverify_report::{JsonReporter, ReporterConfig, VerifierReporter};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), pactverify_report::ReportError> {
//! let mut reporter = JsonReporter::new(ReporterConfig::new("target/pact/reports"));
//! reporter.initialise("PricingService")?;
//! reporter.report_verification_for_consumer("WebApp", "PricingService", None)?;
//! reporter.verify_consumer_from_url("http://broker/pact/1", "WebApp")?;
//! reporter.interaction_description(&pactverify_report::InteractionSnapshot::new(
//!     json!({"description": "get price"}),
//! ))?;
//! reporter.status_comparison_ok(200)?;
//! reporter.finalise_report()?;
//! # Ok(())
//! # }
//! ```

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

pub mod aggregator;
pub mod config;
pub mod error;
pub mod event;
pub mod model;
pub mod persist;
pub mod reporter;

pub use aggregator::{AggregatorState, Dimension, FailureDetail, Outcome, ReportAggregator};
pub use config::ReporterConfig;
pub use error::ReportError;
pub use event::{parse_event_log, replay, ReportEvent};
pub use model::{
    ExceptionDetail, ExecutionEntry, InteractionEntry, InteractionSnapshot, PactSource,
    ReportDocument, ReportMetadata, VerificationResult, VerificationStatus,
};
pub use persist::{merge_reports, persist, MergeOutcome};
pub use reporter::{JsonReporter, VerifierReporter};

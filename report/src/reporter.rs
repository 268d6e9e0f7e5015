//! Verification engine callbacks and the JSON report writer behind them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::aggregator::{
    violation, Dimension, FailureDetail, Outcome, ReportAggregator, NO_HANDLER_CAUSE,
};
use crate::config::ReporterConfig;
use crate::error::Result;
use crate::model::{ExceptionDetail, InteractionSnapshot, PactSource};
use crate::persist::{persist, MergeOutcome};

/// Callbacks a verification engine makes while verifying a provider.
///
/// Hooks that only inform (state changes, warnings, failure summaries) have
/// no-op defaults. Hooks that carry report data return an error when they
/// arrive out of order.
pub trait VerifierReporter {
    /// Start of verification for `provider`.
    ///
    /// # Errors
    ///
    /// Fails if the reporter was already initialised.
    fn initialise(&mut self, provider: &str) -> Result<()>;

    /// Start of verification of one consumer's pact.
    ///
    /// # Errors
    ///
    /// Fails if the reporter is not initialised.
    fn report_verification_for_consumer(
        &mut self,
        consumer: &str,
        provider: &str,
        tag: Option<&str>,
    ) -> Result<()>;

    /// The current consumer's pact was fetched from `pact_url`.
    ///
    /// # Errors
    ///
    /// Fails if no consumer is being verified.
    fn verify_consumer_from_url(&mut self, pact_url: &str, consumer: &str) -> Result<()>;

    /// The current consumer's pact was read from a file or other local source.
    ///
    /// # Errors
    ///
    /// Fails if no consumer is being verified.
    fn verify_consumer_from_file(&mut self, pact_file: &str, consumer: &str) -> Result<()>;

    /// The current consumer's pact could not be loaded.
    ///
    /// # Errors
    ///
    /// Fails if no consumer is being verified.
    fn pact_load_failure_for_consumer(&mut self, consumer: &str, message: &str) -> Result<()>;

    /// Start of verification of one interaction.
    ///
    /// # Errors
    ///
    /// Fails if no consumer is being verified.
    fn interaction_description(&mut self, interaction: &InteractionSnapshot) -> Result<()>;

    /// The response status matched.
    ///
    /// # Errors
    ///
    /// Fails if no interaction is being verified.
    fn status_comparison_ok(&mut self, status: u16) -> Result<()>;

    /// The response status did not match; `comparison` is the mismatch message.
    ///
    /// # Errors
    ///
    /// Fails if no interaction is being verified.
    fn status_comparison_failed(&mut self, status: u16, comparison: &str) -> Result<()>;

    /// A header matched.
    ///
    /// # Errors
    ///
    /// Fails if no interaction is being verified.
    fn header_comparison_ok(&mut self, key: &str, value: &[String]) -> Result<()>;

    /// A header did not match.
    ///
    /// # Errors
    ///
    /// Fails if no interaction is being verified.
    fn header_comparison_failed(
        &mut self,
        key: &str,
        value: &[String],
        comparison: Value,
    ) -> Result<()>;

    /// The body matched.
    ///
    /// # Errors
    ///
    /// Fails if no interaction is being verified.
    fn body_comparison_ok(&mut self) -> Result<()>;

    /// The body did not match.
    ///
    /// # Errors
    ///
    /// Fails if no interaction is being verified.
    fn body_comparison_failed(&mut self, comparison: Value) -> Result<()>;

    /// A message metadata entry matched.
    ///
    /// # Errors
    ///
    /// Fails if no interaction is being verified.
    fn metadata_comparison_ok(&mut self, key: &str, value: Option<&Value>) -> Result<()>;

    /// A message metadata entry did not match.
    ///
    /// # Errors
    ///
    /// Fails if no interaction is being verified.
    fn metadata_comparison_failed(
        &mut self,
        key: &str,
        value: Option<&Value>,
        comparison: Value,
    ) -> Result<()>;

    /// The request to the provider could not be made.
    ///
    /// # Errors
    ///
    /// Fails if no interaction is being verified.
    fn request_failed(&mut self, interaction_message: &str, exception: ExceptionDetail)
        -> Result<()>;

    /// No handler exists for the current interaction.
    ///
    /// # Errors
    ///
    /// Fails if no interaction is being verified.
    fn error_has_no_annotated_methods_found_for_interaction(&mut self) -> Result<()>;

    /// Verification of the current interaction threw.
    ///
    /// # Errors
    ///
    /// Fails if no interaction is being verified.
    fn verification_failed(&mut self, exception: ExceptionDetail) -> Result<()>;

    /// End of verification; the report is written.
    ///
    /// # Errors
    ///
    /// Fails if the reporter was never initialised or the report cannot be written.
    fn finalise_report(&mut self) -> Result<()>;

    /// The provider has no consumers to verify.
    fn warn_provider_has_no_consumers(&mut self, _provider: &str) {}

    /// A pact contained no interactions.
    fn warn_pact_file_has_no_interactions(&mut self, _consumer: &str) {}

    /// A provider state is being set up or torn down.
    fn state_for_interaction(&mut self, _state: &str, _is_setup: bool) {}

    /// A provider state change was skipped.
    fn warn_state_change_ignored(&mut self, _state: &str) {}

    /// A provider state change request returned an error status.
    fn state_change_request_failed(&mut self, _state: &str, _is_setup: bool, _http_status: &str) {}

    /// Summary of all failures, keyed by interaction description.
    fn display_failures(&mut self, _failures: &BTreeMap<String, Value>) {}
}

/// Writes verification results as a JSON report, one file per provider.
#[derive(Debug)]
pub struct JsonReporter {
    config: ReporterConfig,
    aggregator: ReportAggregator,
    report_file: Option<PathBuf>,
    outcome: Option<MergeOutcome>,
}

impl JsonReporter {
    /// A reporter writing according to `config`.
    #[must_use]
    pub fn new(config: ReporterConfig) -> Self {
        Self {
            config,
            aggregator: ReportAggregator::new(),
            report_file: None,
            outcome: None,
        }
    }

    /// The report file, known once the provider has been initialised.
    #[must_use]
    pub fn report_file(&self) -> Option<&Path> {
        self.report_file.as_deref()
    }

    /// What the final write did, once the report has been written.
    #[must_use]
    pub fn outcome(&self) -> Option<&MergeOutcome> {
        self.outcome.as_ref()
    }

    /// The underlying aggregator.
    #[must_use]
    pub fn aggregator(&self) -> &ReportAggregator {
        &self.aggregator
    }

    fn failure(&mut self, dimension: Dimension, detail: FailureDetail) -> Result<()> {
        self.aggregator
            .record_comparison_outcome(dimension, Outcome::Failure(detail))
    }

    fn success(&mut self, dimension: Dimension) -> Result<()> {
        self.aggregator
            .record_comparison_outcome(dimension, Outcome::Success)
    }
}

impl VerifierReporter for JsonReporter {
    fn initialise(&mut self, provider: &str) -> Result<()> {
        self.aggregator.initialize(provider)?;
        self.report_file = Some(self.config.report_path(provider));
        Ok(())
    }

    fn report_verification_for_consumer(
        &mut self,
        consumer: &str,
        provider: &str,
        tag: Option<&str>,
    ) -> Result<()> {
        debug!(consumer, provider, ?tag, "verifying consumer");
        self.aggregator.open_consumer(consumer)
    }

    fn verify_consumer_from_url(&mut self, pact_url: &str, _consumer: &str) -> Result<()> {
        self.aggregator
            .set_consumer_source(PactSource::Remote(pact_url.to_owned()))
    }

    fn verify_consumer_from_file(&mut self, pact_file: &str, _consumer: &str) -> Result<()> {
        self.aggregator
            .set_consumer_source(PactSource::Local(pact_file.to_owned()))
    }

    fn pact_load_failure_for_consumer(&mut self, _consumer: &str, message: &str) -> Result<()> {
        self.aggregator.record_load_failure(message)
    }

    fn interaction_description(&mut self, interaction: &InteractionSnapshot) -> Result<()> {
        self.aggregator.open_interaction(interaction.clone())
    }

    fn status_comparison_ok(&mut self, _status: u16) -> Result<()> {
        self.success(Dimension::Status)
    }

    fn status_comparison_failed(&mut self, _status: u16, comparison: &str) -> Result<()> {
        self.failure(Dimension::Status, FailureDetail::message(comparison))
    }

    fn header_comparison_ok(&mut self, key: &str, _value: &[String]) -> Result<()> {
        self.success(Dimension::Header(key.to_owned()))
    }

    fn header_comparison_failed(
        &mut self,
        key: &str,
        _value: &[String],
        comparison: Value,
    ) -> Result<()> {
        self.failure(
            Dimension::Header(key.to_owned()),
            FailureDetail::mismatch(comparison),
        )
    }

    fn body_comparison_ok(&mut self) -> Result<()> {
        self.success(Dimension::Body)
    }

    fn body_comparison_failed(&mut self, comparison: Value) -> Result<()> {
        self.failure(Dimension::Body, FailureDetail::mismatch(comparison))
    }

    fn metadata_comparison_ok(&mut self, key: &str, _value: Option<&Value>) -> Result<()> {
        self.success(Dimension::Metadata(key.to_owned()))
    }

    fn metadata_comparison_failed(
        &mut self,
        key: &str,
        _value: Option<&Value>,
        comparison: Value,
    ) -> Result<()> {
        self.failure(
            Dimension::Metadata(key.to_owned()),
            FailureDetail::mismatch(comparison),
        )
    }

    fn request_failed(
        &mut self,
        interaction_message: &str,
        exception: ExceptionDetail,
    ) -> Result<()> {
        self.aggregator
            .record_request_failure(interaction_message, exception)
    }

    fn error_has_no_annotated_methods_found_for_interaction(&mut self) -> Result<()> {
        self.failure(
            Dimension::Cause,
            FailureDetail::Cause(NO_HANDLER_CAUSE.to_owned()),
        )
    }

    fn verification_failed(&mut self, exception: ExceptionDetail) -> Result<()> {
        self.failure(Dimension::Exception, FailureDetail::Exception(exception))
    }

    fn finalise_report(&mut self) -> Result<()> {
        let document = self.aggregator.finalize()?;
        let path = self.report_file.clone().ok_or_else(|| {
            violation(
                self.aggregator.state(),
                "finalize",
                "report file was never resolved",
            )
        })?;
        self.outcome = Some(persist(&document, &path)?);
        Ok(())
    }
}

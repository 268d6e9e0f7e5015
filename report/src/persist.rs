//! Report persistence with merge-on-write.
//!
//! A report file accumulates runs for one provider: a new document for the
//! same provider replaces the metadata and appends its executions after the
//! existing ones. A file written for a different provider is replaced.
//! Writes go through a temporary file in the destination directory and are
//! renamed into place, so readers never see a partial report.

use std::borrow::Cow;
use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::{info, warn};

use crate::error::{ReportError, Result};
use crate::model::ReportDocument;

/// What [`persist`] did with the file at the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No prior report (or an empty file); the document was written as is.
    Created,
    /// A prior report for the same provider was extended.
    Merged {
        /// Executions already in the file before this run.
        prior_executions: usize,
    },
    /// A prior report for another provider was overwritten.
    Replaced {
        /// Provider of the discarded report.
        previous_provider: String,
    },
}

/// Combines a prior report with the latest run's document.
///
/// Same provider: the latest metadata wins and the latest executions are
/// appended. Different provider: the latest document replaces the prior one.
#[must_use]
pub fn merge_reports(
    mut existing: ReportDocument,
    latest: &ReportDocument,
) -> (ReportDocument, MergeOutcome) {
    if existing.provider.name == latest.provider.name {
        let prior_executions = existing.executions.len();
        existing.metadata = latest.metadata.clone();
        existing.executions.extend(latest.executions.iter().cloned());
        (existing, MergeOutcome::Merged { prior_executions })
    } else {
        let previous_provider = existing.provider.name;
        (latest.clone(), MergeOutcome::Replaced { previous_provider })
    }
}

/// Writes `document` to `destination`, merging with any report already there.
///
/// The destination directory is created if needed.
///
/// # Errors
///
/// Returns [`ReportError::CorruptExistingReport`] if a non-empty file at the
/// destination is not a report; the file is left untouched. Returns
/// [`ReportError::Persistence`] if the directory or file cannot be written.
pub fn persist(document: &ReportDocument, destination: &Path) -> Result<MergeOutcome> {
    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| ReportError::persistence(dir, e))?;

    let (merged, outcome) = match read_existing(destination)? {
        None => (Cow::Borrowed(document), MergeOutcome::Created),
        Some(existing) => {
            let (merged, outcome) = merge_reports(existing, document);
            (Cow::Owned(merged), outcome)
        }
    };
    if let MergeOutcome::Replaced { previous_provider } = &outcome {
        warn!(
            path = %destination.display(),
            previous_provider = %previous_provider,
            provider = %document.provider.name,
            "replacing report written for another provider"
        );
    }

    let bytes = serde_json::to_vec_pretty(&*merged)?;
    write_atomic(dir, destination, &bytes)?;
    info!(
        path = %destination.display(),
        provider = %document.provider.name,
        executions = merged.executions.len(),
        ?outcome,
        "verification report written"
    );
    Ok(outcome)
}

fn read_existing(path: &Path) -> Result<Option<ReportDocument>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ReportError::persistence(path, e)),
    };
    if bytes.is_empty() {
        return Ok(None);
    }
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| ReportError::CorruptExistingReport {
            path: path.to_path_buf(),
            source,
        })
}

fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let temp =
        tempfile::NamedTempFile::new_in(dir).map_err(|e| ReportError::persistence(dir, e))?;
    let mut file = temp.as_file();
    file.write_all(bytes)
        .map_err(|e| ReportError::persistence(temp.path(), e))?;
    file.sync_all()
        .map_err(|e| ReportError::persistence(temp.path(), e))?;
    temp.persist(path)
        .map_err(|e| ReportError::persistence(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExecutionEntry, ReportMetadata};

    fn doc(provider: &str, consumers: &[&str], date: &str) -> ReportDocument {
        let mut metadata = ReportMetadata::now();
        metadata.date = date.to_owned();
        let mut doc = ReportDocument::new(provider, metadata);
        doc.executions = consumers.iter().map(|c| ExecutionEntry::new(*c)).collect();
        doc
    }

    #[test]
    fn same_provider_appends_and_takes_latest_metadata() {
        let existing = doc("P", &["A", "B"], "2026-01-01T00:00:00.000Z");
        let latest = doc("P", &["C"], "2026-02-01T00:00:00.000Z");
        let (merged, outcome) = merge_reports(existing, &latest);
        assert_eq!(outcome, MergeOutcome::Merged { prior_executions: 2 });
        assert_eq!(merged.metadata.date, "2026-02-01T00:00:00.000Z");
        let names: Vec<_> = merged
            .executions
            .iter()
            .map(|e| e.consumer.name.as_str())
            .collect();
        assert_eq!(names, ["A", "B", "C"]);
    }

    #[test]
    fn other_provider_is_replaced() {
        let existing = doc("P", &["A"], "2026-01-01T00:00:00.000Z");
        let latest = doc("Q", &["B"], "2026-02-01T00:00:00.000Z");
        let (merged, outcome) = merge_reports(existing, &latest);
        assert_eq!(
            outcome,
            MergeOutcome::Replaced {
                previous_provider: "P".into()
            }
        );
        assert_eq!(merged, latest);
    }
}

//! Merge-on-write behaviour of report persistence against real files.

use std::fs;
use std::path::Path;

use pactverify_report::{
    persist, Dimension, ExecutionEntry, FailureDetail, InteractionSnapshot, MergeOutcome,
    Outcome, PactSource, ReportAggregator, ReportDocument, ReportError, ReportMetadata,
};
use serde_json::json;
use tempfile::tempdir;

fn document(provider: &str, consumers: &[&str]) -> ReportDocument {
    let mut doc = ReportDocument::new(provider, ReportMetadata::now());
    doc.executions = consumers.iter().map(|c| ExecutionEntry::new(*c)).collect();
    doc
}

fn read(path: &Path) -> ReportDocument {
    let text = fs::read_to_string(path).expect("report readable");
    ReportDocument::from_json_str(&text).expect("report parses")
}

#[test]
fn writes_new_report_and_creates_directories() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("nested/reports/P.json");
    let doc = document("P", &["A"]);

    let outcome = persist(&doc, &path).expect("persist");

    assert_eq!(outcome, MergeOutcome::Created);
    assert_eq!(read(&path), doc);
}

#[test]
fn zero_length_file_is_overwritten() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("P.json");
    fs::write(&path, "").expect("write empty");

    let outcome = persist(&document("P", &["A"]), &path).expect("persist");

    assert_eq!(outcome, MergeOutcome::Created);
    assert_eq!(read(&path).executions.len(), 1);
}

#[test]
fn same_provider_accumulates_executions() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("P.json");
    let first = document("P", &["A", "B", "C"]);
    persist(&first, &path).expect("first persist");

    let mut second = document("P", &["D", "E"]);
    second.metadata.date = "2030-01-01T00:00:00.000Z".to_owned();
    let outcome = persist(&second, &path).expect("second persist");

    assert_eq!(outcome, MergeOutcome::Merged { prior_executions: 3 });
    let merged = read(&path);
    assert_eq!(merged.executions.len(), 5);
    assert_eq!(merged.executions[..3], first.executions[..]);
    assert_eq!(merged.executions[3..], second.executions[..]);
    assert_eq!(merged.metadata, second.metadata);
}

#[test]
fn other_provider_replaces_file() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("shared.json");
    persist(&document("P", &["A", "B"]), &path).expect("first persist");

    let other = document("Q", &["C"]);
    let outcome = persist(&other, &path).expect("second persist");

    assert_eq!(
        outcome,
        MergeOutcome::Replaced {
            previous_provider: "P".to_owned()
        }
    );
    assert_eq!(read(&path), other);
}

#[test]
fn corrupt_existing_report_is_left_alone() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("P.json");
    fs::write(&path, "{ this is not a report").expect("write corrupt");

    let err = persist(&document("P", &["A"]), &path).expect_err("must not overwrite");

    assert!(matches!(err, ReportError::CorruptExistingReport { .. }));
    assert_eq!(
        fs::read_to_string(&path).expect("still readable"),
        "{ this is not a report"
    );
}

#[test]
fn json_without_report_shape_is_corrupt() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("P.json");
    fs::write(&path, r#"{"provider": "P"}"#).expect("write");

    let err = persist(&document("P", &[]), &path).expect_err("shape mismatch");

    assert!(matches!(err, ReportError::CorruptExistingReport { .. }));
}

#[test]
fn no_temporary_files_are_left_behind() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("P.json");
    persist(&document("P", &["A"]), &path).expect("first");
    persist(&document("P", &["B"]), &path).expect("second");

    let entries: Vec<_> = fs::read_dir(dir.path())
        .expect("read dir")
        .filter_map(Result::ok)
        .map(|e| e.file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("P.json")]);
}

#[test]
fn unwritable_directory_is_a_persistence_error() {
    let dir = tempdir().expect("tempdir");
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "file, not a directory").expect("write");

    let err = persist(&document("P", &[]), &blocker.join("P.json")).expect_err("cannot mkdir");

    assert!(matches!(err, ReportError::Persistence { .. }));
}

#[test]
fn prior_report_from_older_writer_merges() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("P.json");
    let prior = json!({
        "metaData": {
            "date": "2019-05-01T10:00:00.000+10:00[Australia/Melbourne]",
            "pactJvmVersion": "4.0.0",
            "reportFormat": "0.0.0"
        },
        "provider": { "name": "P" },
        "execution": [
            {
                "consumer": { "name": "Old", "source": { "file": "pacts/old.json" } },
                "interactions": [
                    {
                        "interaction": { "description": "legacy" },
                        "verification": { "result": "failed", "body": { "$.a": "mismatch" } }
                    }
                ]
            }
        ]
    });
    fs::write(&path, prior.to_string()).expect("write prior");

    let outcome = persist(&document("P", &["New"]), &path).expect("persist");

    assert_eq!(outcome, MergeOutcome::Merged { prior_executions: 1 });
    let merged = read(&path);
    assert_eq!(
        merged.executions[0].source(),
        Some(&PactSource::Local("pacts/old.json".to_owned()))
    );
    assert!(merged.executions[0].interactions[0].verification.is_failed());
    assert_eq!(merged.executions[1].consumer.name, "New");
}

#[test]
fn round_trip_preserves_document() {
    let mut aggregator = ReportAggregator::new();
    aggregator.initialize("P").expect("init");
    aggregator.open_consumer("A").expect("consumer");
    aggregator
        .set_consumer_source(PactSource::Remote("http://broker/pacts/A".to_owned()))
        .expect("source");
    aggregator
        .open_interaction(
            InteractionSnapshot::new(json!({
                "description": "get thing",
                "request": { "method": "GET", "path": "/thing" },
                "response": { "status": 200 }
            }))
            .with_spec_version("3.0.0"),
        )
        .expect("interaction");
    aggregator
        .record_comparison_outcome(
            Dimension::Metadata("contentType".to_owned()),
            Outcome::Failure(FailureDetail::mismatch(json!({"expected": "application/json"}))),
        )
        .expect("outcome");
    aggregator.open_consumer("B").expect("consumer");
    aggregator.record_load_failure("Pact file not found").expect("load failure");
    let doc = aggregator.finalize().expect("finalize");

    let text = doc.to_json_pretty().expect("serialize");
    let parsed = ReportDocument::from_json_str(&text).expect("parse");

    assert_eq!(parsed, doc);
}

#[test]
fn prior_executions_keep_fields_this_writer_does_not_model() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("P.json");
    let prior_execution = json!({
        "consumer": { "name": "Old", "tag": "prod" },
        "interactions": [
            {
                "interaction": {},
                "verification": { "result": "failed", "notes": "x" }
            }
        ],
        "pactVersion": "1.2.3"
    });
    let prior = json!({
        "metaData": { "date": "2026-01-01T00:00:00.000Z", "reportFormat": "0.0.0" },
        "provider": { "name": "P", "team": "pricing" },
        "execution": [prior_execution.clone()],
        "generator": "other-tool"
    });
    fs::write(&path, prior.to_string()).expect("write prior");

    let outcome = persist(&document("P", &["New"]), &path).expect("persist");

    assert_eq!(outcome, MergeOutcome::Merged { prior_executions: 1 });
    let text = fs::read_to_string(&path).expect("report readable");
    let written: serde_json::Value = serde_json::from_str(&text).expect("json");
    assert_eq!(written["execution"][0], prior_execution);
    assert_eq!(written["execution"][1]["consumer"]["name"], json!("New"));
    assert_eq!(written["provider"]["team"], json!("pricing"));
    assert_eq!(written["generator"], json!("other-tool"));
}

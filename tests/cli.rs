//! Exit-status tests for the `pdf2md` binary.
//!
//! Run with:
//!   cargo test --test cli

mod common;

use common::brochure;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

fn pdf2md(input: &Path, output: &Path, extra: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pdf2md"))
        .arg("--input-dir")
        .arg(input)
        .arg("--output-dir")
        .arg(output)
        .args(["--no-progress", "--quiet"])
        .args(extra)
        .output()
        .expect("run pdf2md")
}

#[test]
fn empty_input_directory_exits_with_status_1() {
    let root = tempdir().unwrap();
    let input = root.path().join("resources");
    std::fs::create_dir(&input).unwrap();

    let out = pdf2md(&input, &root.path().join("out"), &[]);

    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("No PDF files found"), "stderr: {stderr}");
    assert!(!root.path().join("out").exists());
}

#[test]
fn corrupt_document_does_not_fail_the_run() {
    let root = tempdir().unwrap();
    let input = root.path().join("resources");
    let output = root.path().join("out");
    std::fs::create_dir(&input).unwrap();
    std::fs::write(input.join("a_broken.pdf"), b"%PDF-1.4\nthis is not a PDF body").unwrap();
    std::fs::write(input.join("brochure.pdf"), brochure()).unwrap();

    let out = pdf2md(&input, &output, &[]);

    assert_eq!(
        out.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert!(output.join("brochure/brochure.md").is_file());
    assert!(output.join("brochure/images/page1_img1.png").is_file());
    assert!(!output.join("a_broken/a_broken.md").exists());
}

#[test]
fn json_summary_lists_converted_and_failed_documents() {
    let root = tempdir().unwrap();
    let input = root.path().join("resources");
    let output = root.path().join("out");
    std::fs::create_dir(&input).unwrap();
    std::fs::write(input.join("a_broken.pdf"), b"%PDF-1.4\nthis is not a PDF body").unwrap();
    std::fs::write(input.join("brochure.pdf"), brochure()).unwrap();

    let out = pdf2md(&input, &output, &["--json"]);

    assert_eq!(out.status.code(), Some(0));
    let summary: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(summary["converted"].as_array().unwrap().len(), 1);
    assert_eq!(summary["converted"][0]["name"], "brochure");
    assert_eq!(summary["failed"].as_array().unwrap().len(), 1);
}

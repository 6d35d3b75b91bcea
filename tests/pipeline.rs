//! End-to-end tests chaining sources, filters, processes and sinks.

use pipelines_rs::{Flow, StageError, cat, echo, ls, transform_fn};
use regex::bytes::Regex;
use std::fs;
use std::path::{Path, PathBuf};

fn testdata(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("testdata")
        .join(name)
}

#[test]
fn test_cat_grep_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out").join("matches.txt");

    cat([testdata("a.txt"), testdata("b.txt")])
        .grep(Regex::new("^b+$").unwrap())
        .to_file(&out)
        .unwrap();

    assert_eq!(fs::read_to_string(&out).unwrap(), "bb\n");
}

#[test]
fn test_ls_then_wc() {
    let wc = ls([testdata("")]).wc();
    assert_eq!(wc.lines, 2);
    assert!(wc.errors().is_empty());
}

#[test]
fn test_errors_reported_in_stage_order() {
    let err = cat([testdata("missing.txt")])
        .modify(transform_fn("fail", |record: Option<&[u8]>| match record {
            Some(_) => Ok(Flow::Skip),
            None => Err("flush failed".into()),
        }))
        .to_string()
        .unwrap_err();

    let errors = err.error.errors();
    assert_eq!(errors.len(), 2);
    assert!(matches!(errors[0], StageError::Open { .. }));
    assert_eq!(errors[1].to_string(), "fail: flush failed");
    assert!(err.to_string().starts_with("2 errors occurred:"));
}

#[test]
fn test_filters_compose() {
    let out = echo("c\na\nb\na\nc\nc")
        .sort(true)
        .uniq(true)
        .head(-2)
        .to_string()
        .unwrap();
    assert_eq!(out, "1\tb\n2\ta\n");
}

#[test]
fn test_stage_names_follow_chain() {
    let pipe = echo("x").head(1).sort(false);
    assert_eq!(pipe.stage_names(), ["echo", "head(1)", "sort(reverse=false)"]);
    pipe.close().unwrap();
}

#[cfg(unix)]
#[test]
fn test_process_in_the_middle() {
    let out = echo("one\ntwo\nthree")
        .exec("tr", ["a-z", "A-Z"])
        .grep(Regex::new("^T").unwrap())
        .to_string()
        .unwrap();
    assert_eq!(out, "TWO\nTHREE\n");
}

#[cfg(unix)]
#[test]
fn test_process_failure_keeps_output() {
    let err = echo("hello")
        .exec("sh", ["-c", "cat; exit 4"])
        .to_string()
        .unwrap_err();
    assert_eq!(err.output, "hello\n");
    assert!(matches!(err.error.errors()[0], StageError::Exit { .. }));
}

#[cfg(unix)]
#[test]
fn test_transform_error_behind_exited_process_is_reported() {
    use std::thread;
    use std::time::Duration;

    let err = echo("a")
        .modify(transform_fn("fail", |_: Option<&[u8]>| {
            thread::sleep(Duration::from_millis(300));
            Err("late failure".into())
        }))
        .exec("true", [] as [&str; 0])
        .to_string()
        .unwrap_err();
    assert_eq!(err.output, "");
    let messages: Vec<String> = err.error.errors().iter().map(|e| e.to_string()).collect();
    assert_eq!(messages, vec!["fail: late failure"]);
}

//! # pipelines-rs
//!
//! Lazy, line-oriented stream pipelines in the style of a Unix shell.
//!
//! A [`Pipeline`] is a chain of stages. Each stage reads the output of the
//! one before it, so nothing runs until a sink pulls bytes from the tail.
//! Stages can be in-process filters (grep, head, uniq, cut, sort), readers
//! (files, stdin, in-memory text) or OS subprocesses.
//!
//! Errors do not stop the chain. Each stage records what went wrong and the
//! sink reports every error, in stage order, after closing the pipeline.
//!
//! ## Overview
//!
//! - **Sources** start a pipeline: [`echo`], [`cat`], [`stdin`], [`ls`],
//!   [`exec`], [`from_reader`], [`from_writer_fn`]
//! - **Filters** transform records: [`Pipeline::grep`], [`Pipeline::head`],
//!   [`Pipeline::uniq`], [`Pipeline::cut`], [`Pipeline::sort`], or any
//!   [`Transform`] via [`Pipeline::modify`]
//! - **Processes** run external programs: [`Pipeline::exec`]
//! - **Sinks** drain and close: [`Pipeline::to_string`],
//!   [`Pipeline::to_file`], [`Pipeline::to_stdout`], [`Pipeline::wc`]
//!
//! ## Example
//!
//! ```
//! use pipelines_rs::echo;
//! use regex::bytes::Regex;
//!
//! let out = echo("banana\napple\ncherry\napple")
//!     .grep(Regex::new("an|pp").unwrap())
//!     .sort(false)
//!     .uniq(true)
//!     .to_string()
//!     .unwrap();
//!
//! assert_eq!(out, "2\tapple\n1\tbanana\n");
//! ```

pub mod error;
pub mod filters;
pub mod lines;
pub mod pipeline;
pub mod process;
pub mod sink;
pub mod source;
pub mod stage;
pub mod transform;
pub mod wc;

pub use error::{BoxError, Partial, PipelineError, StageError};
pub use filters::{Cut, Grep, Head, Sort, Tail, Uniq};
pub use lines::LineReader;
pub use pipeline::Pipeline;
pub use process::{BoxWriter, exec, exec_with_stderr};
pub use source::{cat, echo, from_reader, from_writer_fn, ls, stdin};
pub use stage::{BoxReader, ErrorLog, Stage};
pub use transform::{FnTransform, Flow, Transform, TransformReader, transform_fn};
pub use wc::WordCount;

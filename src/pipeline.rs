//! Pipeline: a backward-linked chain of stages.
//!
//! Each append consumes the current pipeline and keeps it as the new node's
//! predecessor, so the chain can only grow at the tail and never forms a
//! cycle. Reading a pipeline reads its last stage; closing it walks every
//! stage once.

use std::fmt;
use std::io::{self, Read};

use tracing::debug;

use crate::error::PipelineError;
use crate::stage::{BoxReader, Stage};

/// A chain of stages, read from its tail.
///
/// Output is pulled lazily: nothing runs until the pipeline is read (sources
/// may open files or spawn processes when built). A pipeline must be closed
/// exactly once, either by a sink or by calling [`Pipeline::close`].
pub struct Pipeline {
    current: Stage,
    predecessor: Option<Box<Pipeline>>,
}

impl Pipeline {
    /// Start a pipeline from a head stage.
    pub fn new(head: Stage) -> Self {
        debug!(stage = %head.name(), "new pipeline");
        Self {
            current: head,
            predecessor: None,
        }
    }

    /// Append a stage built from this pipeline's output.
    ///
    /// `build` receives the current stage's byte source and returns the new
    /// stage. A builder that cannot produce a usable source should return a
    /// [`Stage::failed`] so that the failure is reported on close.
    pub fn pipe_to<F>(mut self, build: F) -> Pipeline
    where
        F: FnOnce(BoxReader) -> Stage,
    {
        let upstream = self
            .current
            .take_source()
            .unwrap_or_else(|| Box::new(io::empty()));
        let stage = build(upstream);
        debug!(stage = %stage.name(), upstream = %self.current.name(), "append stage");
        Pipeline {
            current: stage,
            predecessor: Some(Box::new(self)),
        }
    }

    /// Name of the last stage.
    pub fn name(&self) -> &str {
        self.current.name()
    }

    /// Stage names from head to tail.
    pub fn stage_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        let mut node = Some(self);
        while let Some(pipe) = node {
            names.push(pipe.current.name());
            node = pipe.predecessor.as_deref();
        }
        names.reverse();
        names
    }

    /// Number of stages in the chain, at least one.
    pub fn len(&self) -> usize {
        let mut len = 0;
        let mut node = Some(self);
        while let Some(pipe) = node {
            len += 1;
            node = pipe.predecessor.as_deref();
        }
        len
    }

    /// Always `false`: a chain starts from a head stage and only grows.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Release every stage and return all errors recorded along the chain.
    ///
    /// The tail's source is dropped first, which closes any pipe a
    /// subprocess may still be writing to. Every release action then runs,
    /// head to tail. Errors are collected only after all releases have run,
    /// again head to tail: each stage's recorded errors, then its release
    /// error.
    ///
    /// Closing without draining cancels the pipeline, but still waits for
    /// every subprocess to exit.
    pub fn close(mut self) -> Result<(), PipelineError> {
        drop(self.current.take_source());

        let mut stages = Vec::new();
        let mut node = Some(self);
        while let Some(Pipeline {
            current,
            predecessor,
        }) = node
        {
            stages.push(current);
            node = predecessor.map(|pipe| *pipe);
        }
        stages.reverse();

        debug!(stages = stages.len(), "closing pipeline");
        // Releases join helper threads that may still record into any
        // upstream stage's log, so no log is read until all have run.
        let released: Vec<_> = stages.iter_mut().map(Stage::release).collect();
        let mut errors = Vec::new();
        for (stage, release_err) in stages.into_iter().zip(released) {
            errors.extend(stage.into_errors(release_err));
        }
        match PipelineError::from_errors(errors) {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }
}

impl Read for Pipeline {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.current.source_mut() {
            Some(source) => source.read(buf),
            None => Ok(0),
        }
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StageError;
    use std::sync::{Arc, Mutex};

    fn other(stage: &str, message: &str) -> StageError {
        StageError::Other {
            stage: stage.to_string(),
            message: message.to_string(),
        }
    }

    fn passthrough(name: &'static str) -> impl FnOnce(BoxReader) -> Stage {
        move |upstream| Stage::new(name, upstream)
    }

    #[test]
    fn test_read_from_tail() {
        let mut pipe = Pipeline::new(Stage::new("head", &b"hello\n"[..]))
            .pipe_to(passthrough("one"))
            .pipe_to(passthrough("two"));
        let mut out = String::new();
        pipe.read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello\n");
        assert_eq!(pipe.stage_names(), vec!["head", "one", "two"]);
        assert_eq!(pipe.len(), 3);
        pipe.close().unwrap();
    }

    #[test]
    fn test_failed_head_reads_empty() {
        let mut pipe =
            Pipeline::new(Stage::failed("cat", other("cat", "missing"))).pipe_to(passthrough("x"));
        let mut out = Vec::new();
        pipe.read_to_end(&mut out).unwrap();
        assert!(out.is_empty());
        let err = pipe.close().unwrap_err();
        assert_eq!(err.len(), 1);
    }

    #[test]
    fn test_errors_in_stage_order() {
        let pipe = Pipeline::new(Stage::failed("first", other("first", "a")))
            .pipe_to(passthrough("second"))
            .pipe_to(|upstream| Stage::new("third", upstream).with_error(other("third", "c")));
        let err = pipe.close().unwrap_err();
        let stages: Vec<&str> = err.errors().iter().map(|e| e.stage()).collect();
        assert_eq!(stages, vec!["first", "third"]);
    }

    #[test]
    fn test_every_release_runs_once_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut pipe = Pipeline::new(Stage::new("s0", io::empty()));
        for i in 1..=3 {
            let order = Arc::clone(&order);
            pipe = pipe.pipe_to(move |upstream| {
                Stage::new(format!("s{i}"), upstream).with_release(move || {
                    order.lock().unwrap().push(i);
                    Ok(())
                })
            });
        }
        pipe.close().unwrap();
        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_release_errors_follow_recorded_errors() {
        let pipe = Pipeline::new(
            Stage::new("a", io::empty())
                .with_error(other("a", "recorded"))
                .with_release(|| Err(other("a", "released"))),
        )
        .pipe_to(|upstream| {
            Stage::new("b", upstream).with_release(|| Err(other("b", "released")))
        });
        let err = pipe.close().unwrap_err();
        let messages: Vec<String> = err.errors().iter().map(|e| e.to_string()).collect();
        assert_eq!(messages, vec!["a: recorded", "a: released", "b: released"]);
    }

    #[test]
    fn test_upstream_error_recorded_during_downstream_release() {
        let head = Stage::new("a", io::empty());
        let upstream_log = head.error_log().clone();
        let pipe = Pipeline::new(head).pipe_to(move |upstream| {
            Stage::new("b", upstream).with_release(move || {
                upstream_log.push(other("a", "late"));
                Ok(())
            })
        });
        let err = pipe.close().unwrap_err();
        let messages: Vec<String> = err.errors().iter().map(|e| e.to_string()).collect();
        assert_eq!(messages, vec!["a: late"]);
    }

    #[test]
    fn test_tail_source_dropped_before_release() {
        struct Flag(Arc<Mutex<bool>>);
        impl Read for Flag {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Ok(0)
            }
        }
        impl Drop for Flag {
            fn drop(&mut self) {
                *self.0.lock().unwrap() = true;
            }
        }

        let dropped = Arc::new(Mutex::new(false));
        let seen = Arc::clone(&dropped);
        let pipe = Pipeline::new(Stage::new("src", Flag(Arc::clone(&dropped))).with_release(
            move || {
                assert!(*seen.lock().unwrap(), "source still open during release");
                Ok(())
            },
        ))
        .pipe_to(passthrough("tail"));
        pipe.close().unwrap();
    }

    #[test]
    fn test_long_chain_closes() {
        let mut pipe = Pipeline::new(Stage::new("head", &b"x\n"[..]));
        for _ in 0..1000 {
            pipe = pipe.pipe_to(passthrough("link"));
        }
        assert_eq!(pipe.len(), 1001);
        pipe.close().unwrap();
    }
}

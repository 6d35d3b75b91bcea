//! Record transformers and the reader adapter that drives them.
//!
//! A [`Transform`] sees one record at a time, without its line terminator,
//! and decides what bytes (if any) to emit. After the last record it is
//! called once more with `None` so it can flush buffered state.
//! [`TransformReader`] owns the byte plumbing: it splits the upstream into
//! records and hands out the transformer's output across as many `read`
//! calls as the caller's buffer requires.

use std::io::{self, Read};

use tracing::trace;

use crate::error::{BoxError, StageError};
use crate::lines::LineReader;
use crate::pipeline::Pipeline;
use crate::stage::{BoxReader, ErrorLog, Stage};

/// What a transformer wants done after seeing a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    /// Write these bytes and keep reading. A line needs its own `\n`.
    Emit(Vec<u8>),
    /// Write nothing for this record.
    Skip,
    /// Write the optional bytes, then end the stream without error.
    End(Option<Vec<u8>>),
}

impl Flow {
    /// Emit `record` as a line, appending the terminator.
    pub fn line(record: &[u8]) -> Self {
        let mut out = Vec::with_capacity(record.len() + 1);
        out.extend_from_slice(record);
        out.push(b'\n');
        Flow::Emit(out)
    }
}

/// A stateful, per-record transformation.
pub trait Transform: Send {
    /// Handle one record, or `None` once the input is exhausted.
    ///
    /// `None` is delivered exactly once, and only if the transformer did not
    /// end the stream earlier. Returning an error stops the stage; the error
    /// is reported when the pipeline closes.
    fn transform(&mut self, record: Option<&[u8]>) -> Result<Flow, BoxError>;

    /// Label used in error messages.
    fn name(&self) -> String;
}

impl<T: Transform + ?Sized> Transform for Box<T> {
    fn transform(&mut self, record: Option<&[u8]>) -> Result<Flow, BoxError> {
        (**self).transform(record)
    }

    fn name(&self) -> String {
        (**self).name()
    }
}

/// A transformer built from a closure.
pub struct FnTransform<F> {
    name: String,
    f: F,
}

/// Wrap a closure as a named [`Transform`].
pub fn transform_fn<F>(name: impl Into<String>, f: F) -> FnTransform<F>
where
    F: FnMut(Option<&[u8]>) -> Result<Flow, BoxError> + Send,
{
    FnTransform {
        name: name.into(),
        f,
    }
}

impl<F> Transform for FnTransform<F>
where
    F: FnMut(Option<&[u8]>) -> Result<Flow, BoxError> + Send,
{
    fn transform(&mut self, record: Option<&[u8]>) -> Result<Flow, BoxError> {
        (self.f)(record)
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

/// Byte reader applying a [`Transform`] to every line of its upstream.
pub struct TransformReader<T> {
    stage: String,
    lines: LineReader<BoxReader>,
    transform: T,
    errors: ErrorLog,
    pending: Vec<u8>,
    pos: usize,
    done: bool,
}

impl<T: Transform> TransformReader<T> {
    /// Read errors and transformer errors are pushed into `errors`.
    pub fn new(upstream: BoxReader, transform: T, errors: ErrorLog) -> Self {
        Self {
            stage: transform.name(),
            lines: LineReader::new(upstream),
            transform,
            errors,
            pending: Vec::new(),
            pos: 0,
            done: false,
        }
    }

    fn drain_pending(&mut self, out: &mut [u8]) -> usize {
        let rest = &self.pending[self.pos..];
        let n = rest.len().min(out.len());
        out[..n].copy_from_slice(&rest[..n]);
        self.pos += n;
        if self.pos == self.pending.len() {
            self.pending.clear();
            self.pos = 0;
        }
        n
    }

    /// Pull one record through the transformer, filling `pending`.
    fn advance(&mut self) {
        let record = match self.lines.next_record() {
            Ok(record) => record,
            Err(source) => {
                self.done = true;
                self.errors.push(StageError::Read {
                    stage: self.stage.clone(),
                    source,
                });
                return;
            }
        };
        if record.is_none() {
            trace!(stage = %self.stage, "flushing transformer");
            self.done = true;
        }

        match self.transform.transform(record.as_deref()) {
            Ok(Flow::Emit(bytes)) => self.pending = bytes,
            Ok(Flow::Skip) => {}
            Ok(Flow::End(bytes)) => {
                trace!(stage = %self.stage, "transformer ended stream");
                self.done = true;
                self.pending = bytes.unwrap_or_default();
            }
            Err(source) => {
                self.done = true;
                self.pending.clear();
                self.errors.push(StageError::Callback {
                    stage: self.stage.clone(),
                    source,
                });
            }
        }
    }
}

impl<T: Transform> Read for TransformReader<T> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        loop {
            if self.pos < self.pending.len() {
                return Ok(self.drain_pending(out));
            }
            if self.done {
                return Ok(0);
            }
            self.advance();
        }
    }
}

impl Pipeline {
    /// Apply `transform` to every line of this pipeline's output.
    pub fn modify<T>(self, transform: T) -> Pipeline
    where
        T: Transform + 'static,
    {
        self.pipe_to(|upstream| {
            let name = transform.name();
            let errors = ErrorLog::new();
            let reader = TransformReader::new(upstream, transform, errors.clone());
            Stage::new(name, reader).with_error_log(errors)
        })
    }
}

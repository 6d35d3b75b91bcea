//! The stage: one link of a pipeline.
//!
//! A stage owns a byte source, an optional release action run when the
//! pipeline closes, and the list of errors it recorded while being built or
//! read.

use std::fmt;
use std::io::{self, Read};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;

use crate::error::StageError;

/// Byte source owned by a stage.
pub type BoxReader = Box<dyn Read + Send + 'static>;

/// Cleanup bound to a stage, invoked exactly once when the pipeline closes.
pub type ReleaseFn = Box<dyn FnOnce() -> Result<(), StageError> + Send + 'static>;

/// Append-only error list shared between a stage and the reader it owns.
///
/// Readers that fail mid-stream (for example a transformer returning an
/// error) push into the log instead of failing the consumer's read, so the
/// failure surfaces when the pipeline is closed.
#[derive(Clone, Default)]
pub struct ErrorLog {
    inner: Arc<Mutex<Vec<StageError>>>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<StageError>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, err: StageError) {
        warn!(error = %err, "stage recorded error");
        self.lock().push(err);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove and return every recorded error, oldest first.
    pub fn take(&self) -> Vec<StageError> {
        std::mem::take(&mut *self.lock())
    }
}

impl fmt::Debug for ErrorLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.lock().iter()).finish()
    }
}

/// A named unit of a pipeline.
///
/// The source is fixed at construction. Once another stage is appended, the
/// source moves into that stage's reader and this stage keeps only its name,
/// release action and error log.
pub struct Stage {
    name: String,
    source: Option<BoxReader>,
    release: Option<ReleaseFn>,
    errors: ErrorLog,
}

impl Stage {
    pub fn new(name: impl Into<String>, source: impl Read + Send + 'static) -> Self {
        Self {
            name: name.into(),
            source: Some(Box::new(source)),
            release: None,
            errors: ErrorLog::new(),
        }
    }

    /// A stage that produced no usable source. It reads as empty and reports
    /// `err` when the pipeline is closed.
    pub fn failed(name: impl Into<String>, err: StageError) -> Self {
        Self::new(name, io::empty()).with_error(err)
    }

    pub fn with_release<F>(mut self, release: F) -> Self
    where
        F: FnOnce() -> Result<(), StageError> + Send + 'static,
    {
        self.release = Some(Box::new(release));
        self
    }

    pub fn with_error(self, err: StageError) -> Self {
        self.errors.push(err);
        self
    }

    /// Share an error log created before the stage, typically one already
    /// handed to the stage's reader. Errors recorded so far are kept.
    pub fn with_error_log(mut self, log: ErrorLog) -> Self {
        let earlier = self.errors.take();
        {
            let mut recorded = log.lock();
            let later = std::mem::replace(&mut *recorded, earlier);
            recorded.extend(later);
        }
        self.errors = log;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn error_log(&self) -> &ErrorLog {
        &self.errors
    }

    pub(crate) fn source_mut(&mut self) -> Option<&mut BoxReader> {
        self.source.as_mut()
    }

    pub(crate) fn take_source(&mut self) -> Option<BoxReader> {
        self.source.take()
    }

    /// Drop the source and run the release action. Later calls do nothing.
    pub(crate) fn release(&mut self) -> Option<StageError> {
        drop(self.source.take());
        let release = self.release.take()?;
        let err = release().err()?;
        warn!(stage = %self.name, error = %err, "release failed");
        Some(err)
    }

    /// Recorded errors first, then the error returned by [`Stage::release`].
    ///
    /// Helper threads may still record into the log until every stage of the
    /// chain has been released, so call this only after that.
    pub(crate) fn into_errors(self, released: Option<StageError>) -> Vec<StageError> {
        let mut errors = self.errors.take();
        errors.extend(released);
        errors
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("has_source", &self.source.is_some())
            .field("has_release", &self.release.is_some())
            .field("errors", &self.errors)
            .finish()
    }
}

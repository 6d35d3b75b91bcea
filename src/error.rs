//! Error types for pipeline stages and the aggregate returned by sinks.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Boxed error returned by transformers and writer functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A failure recorded by a single stage.
///
/// Every variant carries the name of the stage it belongs to, so a rendered
/// aggregate reads like `cat: open missing.txt: No such file or directory`.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("{stage}: open {}: {source}", .path.display())]
    Open {
        stage: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{stage}: read: {source}")]
    Read {
        stage: String,
        #[source]
        source: io::Error,
    },

    #[error("{stage}: {context}: {source}")]
    Io {
        stage: String,
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("{stage}: start process: {source}")]
    Spawn {
        stage: String,
        #[source]
        source: io::Error,
    },

    #[error("{stage}: {status}")]
    Exit { stage: String, status: ExitStatus },

    /// Error returned by caller-supplied code: a transformer or a writer
    /// function.
    #[error("{stage}: {source}")]
    Callback {
        stage: String,
        #[source]
        source: BoxError,
    },

    #[error("{stage}: copy to writer: {source}")]
    Write {
        stage: String,
        #[source]
        source: io::Error,
    },

    #[error("{stage}: {message}")]
    Other { stage: String, message: String },
}

impl StageError {
    /// Name of the stage that recorded this error.
    pub fn stage(&self) -> &str {
        match self {
            StageError::Open { stage, .. }
            | StageError::Read { stage, .. }
            | StageError::Io { stage, .. }
            | StageError::Spawn { stage, .. }
            | StageError::Exit { stage, .. }
            | StageError::Callback { stage, .. }
            | StageError::Write { stage, .. }
            | StageError::Other { stage, .. } => stage,
        }
    }

    pub(crate) fn io(stage: &str, context: impl Into<String>, source: io::Error) -> Self {
        StageError::Io {
            stage: stage.to_string(),
            context: context.into(),
            source,
        }
    }
}

/// Every error collected while draining and closing a pipeline, in
/// stage order.
#[derive(Debug, Error)]
pub struct PipelineError {
    errors: Vec<StageError>,
}

impl PipelineError {
    /// Wrap a list of errors, returning `None` when the list is empty.
    pub fn from_errors(errors: Vec<StageError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self { errors })
        }
    }

    pub fn errors(&self) -> &[StageError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<StageError> {
        self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let [only] = self.errors.as_slice() {
            return write!(f, "1 error occurred: {only}");
        }
        write!(f, "{} errors occurred:", self.errors.len())?;
        for err in &self.errors {
            write!(f, "\n\t* {err}")?;
        }
        Ok(())
    }
}

/// Output collected by a sink before the pipeline reported an error.
///
/// Sinks that produce a value return it even on failure, so callers can use
/// partial output.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct Partial<T: fmt::Debug> {
    pub output: T,
    #[source]
    pub error: PipelineError,
}

impl<T: fmt::Debug> Partial<T> {
    pub(crate) fn result(output: T, error: Option<PipelineError>) -> Result<T, Partial<T>> {
        match error {
            None => Ok(output),
            Some(error) => Err(Partial { output, error }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn other(stage: &str, message: &str) -> StageError {
        StageError::Other {
            stage: stage.to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_empty_list_is_no_error() {
        assert!(PipelineError::from_errors(vec![]).is_none());
    }

    #[test]
    fn test_single_error_display() {
        let err = PipelineError::from_errors(vec![other("cat", "boom")]).unwrap();
        assert_eq!(err.to_string(), "1 error occurred: cat: boom");
    }

    #[test]
    fn test_multiple_errors_keep_order() {
        let err =
            PipelineError::from_errors(vec![other("first", "a"), other("second", "b")]).unwrap();
        assert_eq!(err.len(), 2);
        assert_eq!(err.errors()[0].stage(), "first");
        assert_eq!(err.errors()[1].stage(), "second");
        assert_eq!(
            err.to_string(),
            "2 errors occurred:\n\t* first: a\n\t* second: b"
        );
    }

    #[test]
    fn test_open_error_mentions_path() {
        let err = StageError::Open {
            stage: "cat".to_string(),
            path: PathBuf::from("missing.txt"),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(err.to_string(), "cat: open missing.txt: not found");
    }

    #[test]
    fn test_partial_result() {
        let ok: Result<String, Partial<String>> = Partial::result("out".to_string(), None);
        assert_eq!(ok.unwrap(), "out");

        let err = Partial::result(
            "so far".to_string(),
            PipelineError::from_errors(vec![other("x", "y")]),
        )
        .unwrap_err();
        assert_eq!(err.output, "so far");
        assert_eq!(err.error.len(), 1);
    }
}

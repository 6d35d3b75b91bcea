//! Sinks: drain a pipeline into a target, then close it.
//!
//! Every sink closes the pipeline even when draining failed, and reports the
//! drain error ahead of the errors collected by close.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Partial, PipelineError, StageError};
use crate::pipeline::Pipeline;

impl Pipeline {
    /// Copy all output into `w`, then close.
    pub fn to_writer<W: Write + ?Sized>(self, w: &mut W) -> Result<(), PipelineError> {
        into_result(self.drain_into(w))
    }

    /// Collect output as a string (invalid UTF-8 is replaced).
    pub fn to_string(self) -> Result<String, Partial<String>> {
        let mut out = Vec::new();
        let errors = self.drain_into(&mut out);
        let text = match String::from_utf8(out) {
            Ok(text) => text,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        };
        Partial::result(text, PipelineError::from_errors(errors))
    }

    /// Collect output into an in-memory buffer.
    pub fn to_bytes(self) -> Result<Vec<u8>, Partial<Vec<u8>>> {
        let mut out = Vec::new();
        let errors = self.drain_into(&mut out);
        Partial::result(out, PipelineError::from_errors(errors))
    }

    /// Write output to the host process's standard output.
    pub fn to_stdout(self) -> Result<(), PipelineError> {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        self.to_writer(&mut lock)
    }

    /// Run the pipeline for its side effects, dropping the output.
    pub fn discard(self) -> Result<(), PipelineError> {
        self.to_writer(&mut io::sink())
    }

    /// Write output to `path`, replacing its contents. Missing parent
    /// directories are created.
    pub fn to_file(self, path: impl AsRef<Path>) -> Result<(), PipelineError> {
        let path = path.as_ref();
        let opened = make_parent_dir(path).and_then(|()| File::create(path));
        self.write_file("to_file", path, opened)
    }

    /// Append output to `path`, creating it (and its parent directories) if
    /// it does not exist.
    pub fn append_file(self, path: impl AsRef<Path>) -> Result<(), PipelineError> {
        let path = path.as_ref();
        if !path.exists() {
            return self.to_file(path);
        }
        let opened = OpenOptions::new().append(true).open(path);
        self.write_file("append_file", path, opened)
    }

    /// Write output to a new temporary file that outlives the pipeline and
    /// return its path.
    pub fn to_temp_file(self) -> Result<PathBuf, Partial<PathBuf>> {
        let created = tempfile::Builder::new()
            .prefix("pipelines-")
            .tempfile()
            .and_then(|file| file.keep().map_err(|err| err.error));
        match created {
            Ok((mut file, path)) => {
                debug!(path = %path.display(), "writing temp file");
                let errors = self.drain_into(&mut file);
                Partial::result(path, PipelineError::from_errors(errors))
            }
            Err(source) => {
                let mut errors = vec![StageError::io("to_temp_file", "create temp file", source)];
                errors.extend(close_errors(self));
                Partial::result(PathBuf::new(), PipelineError::from_errors(errors))
            }
        }
    }

    fn write_file(
        self,
        sink: &str,
        path: &Path,
        opened: io::Result<File>,
    ) -> Result<(), PipelineError> {
        match opened {
            Ok(mut file) => {
                debug!(sink = %sink, path = %path.display(), "writing file");
                into_result(self.drain_into(&mut file))
            }
            Err(source) => {
                let mut errors = vec![StageError::Open {
                    stage: sink.to_string(),
                    path: path.to_path_buf(),
                    source,
                }];
                errors.extend(close_errors(self));
                into_result(errors)
            }
        }
    }

    /// Copy everything into `w` and close, returning every error in order.
    fn drain_into<W: Write + ?Sized>(mut self, w: &mut W) -> Vec<StageError> {
        let stage = self.name().to_string();
        let mut input = ReadSide {
            inner: &mut self,
            failed: false,
        };
        let copied = io::copy(&mut input, w).and_then(|_| w.flush());
        let read_failed = input.failed;

        let mut errors = Vec::new();
        match copied {
            Ok(()) => {}
            Err(source) if read_failed => errors.push(StageError::Read { stage, source }),
            Err(source) => errors.push(StageError::Write { stage, source }),
        }
        errors.extend(close_errors(self));
        errors
    }
}

/// Remembers whether a failed copy failed on the read side.
struct ReadSide<'a, R> {
    inner: &'a mut R,
    failed: bool,
}

impl<R: Read> Read for ReadSide<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf);
        if let Err(err) = &read
            && err.kind() != io::ErrorKind::Interrupted
        {
            self.failed = true;
        }
        read
    }
}

fn close_errors(pipe: Pipeline) -> Vec<StageError> {
    match pipe.close() {
        Ok(()) => Vec::new(),
        Err(err) => err.into_errors(),
    }
}

fn into_result(errors: Vec<StageError>) -> Result<(), PipelineError> {
    match PipelineError::from_errors(errors) {
        None => Ok(()),
        Some(err) => Err(err),
    }
}

fn make_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

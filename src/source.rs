//! Sources: stages that start a pipeline.

use std::fs::{self, File};
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{BoxError, StageError};
use crate::pipeline::Pipeline;
use crate::stage::{BoxReader, Stage};

/// Output `text` followed by a newline.
///
/// Shell command: `echo <text>`.
pub fn echo(text: &str) -> Pipeline {
    let mut bytes = Vec::with_capacity(text.len() + 1);
    bytes.extend_from_slice(text.as_bytes());
    bytes.push(b'\n');
    Pipeline::new(Stage::new("echo", Cursor::new(bytes)))
}

/// Output the contents of files, in order.
///
/// Files that cannot be opened are recorded as errors; the others are still
/// read.
///
/// Shell command: `cat <path>...`.
pub fn cat<I, P>(paths: I) -> Pipeline
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut errors = Vec::new();
    let mut reader: BoxReader = Box::new(io::empty());
    for path in paths {
        let path = path.as_ref();
        match File::open(path) {
            Ok(file) => reader = Box::new(reader.chain(file)),
            Err(source) => errors.push(StageError::Open {
                stage: "cat".to_string(),
                path: path.to_path_buf(),
                source,
            }),
        }
    }
    let stage = errors
        .into_iter()
        .fold(Stage::new("cat", reader), Stage::with_error);
    Pipeline::new(stage)
}

/// Read the host process's standard input.
///
/// Call once per pipeline; every call hands out a new handle to the same
/// underlying stream.
pub fn stdin() -> Pipeline {
    Pipeline::new(Stage::new("stdin", io::stdin()))
}

/// Wrap any reader as a named source.
pub fn from_reader<R>(name: impl Into<String>, reader: R) -> Pipeline
where
    R: Read + Send + 'static,
{
    Pipeline::new(Stage::new(name, reader))
}

/// Output whatever `write` writes. An error returned by `write` is recorded;
/// bytes written before it are still output.
pub fn from_writer_fn<F>(name: impl Into<String>, write: F) -> Pipeline
where
    F: FnOnce(&mut dyn Write) -> Result<(), BoxError>,
{
    let name = name.into();
    let mut out = Vec::new();
    let result = write(&mut out);
    let stage = Stage::new(name.clone(), Cursor::new(out));
    let stage = match result {
        Ok(()) => stage,
        Err(source) => stage.with_error(StageError::Callback {
            stage: name,
            source,
        }),
    };
    Pipeline::new(stage)
}

/// List files, one path per line. Directories are walked recursively with
/// entries in name order; only files are listed.
///
/// Shell command: `ls <path>...`.
pub fn ls<I, P>(paths: I) -> Pipeline
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut listing = Vec::new();
    let mut errors = Vec::new();
    for path in paths {
        walk(path.as_ref(), &mut listing, &mut errors);
    }

    let mut out = Vec::new();
    for path in listing {
        out.extend_from_slice(path.to_string_lossy().as_bytes());
        out.push(b'\n');
    }
    let stage = errors
        .into_iter()
        .fold(Stage::new("ls", Cursor::new(out)), Stage::with_error);
    Pipeline::new(stage)
}

fn walk(path: &Path, listing: &mut Vec<PathBuf>, errors: &mut Vec<StageError>) {
    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(source) => {
            errors.push(StageError::Open {
                stage: "ls".to_string(),
                path: path.to_path_buf(),
                source,
            });
            return;
        }
    };
    if !meta.is_dir() {
        listing.push(path.to_path_buf());
        return;
    }

    let entries = fs::read_dir(path).and_then(|dir| {
        dir.map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<Vec<_>>>()
    });
    match entries {
        Ok(mut children) => {
            children.sort();
            for child in children {
                walk(&child, listing, errors);
            }
        }
        Err(source) => errors.push(StageError::io(
            "ls",
            format!("read dir {}", path.display()),
            source,
        )),
    }
}

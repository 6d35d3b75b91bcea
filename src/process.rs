//! Process adapter: runs an OS subprocess as a pipeline stage.
//!
//! The child's standard output becomes the stage's source. When the stage
//! has a predecessor, a feeder thread copies the predecessor's output into
//! the child's standard input. Standard error is discarded unless a writer
//! is supplied. The release action waits for the child to exit.

use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::error::StageError;
use crate::pipeline::Pipeline;
use crate::stage::{BoxReader, ErrorLog, Stage};

/// Writer receiving a subprocess's standard error.
pub type BoxWriter = Box<dyn Write + Send + 'static>;

/// Run `program` with `args` as the head of a new pipeline.
///
/// The child gets no standard input; use `stdin().exec(..)` to feed it the
/// host process's input.
pub fn exec<I, S>(program: &str, args: I) -> Pipeline
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Pipeline::new(spawn_stage(program, collect_args(args), None, None))
}

/// Like [`exec`], forwarding the child's standard error to `stderr`.
pub fn exec_with_stderr<W, I, S>(stderr: W, program: &str, args: I) -> Pipeline
where
    W: Write + Send + 'static,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Pipeline::new(spawn_stage(
        program,
        collect_args(args),
        None,
        Some(Box::new(stderr)),
    ))
}

impl Pipeline {
    /// Run `program` with this pipeline's output as its standard input.
    pub fn exec<I, S>(self, program: &str, args: I) -> Pipeline
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args = collect_args(args);
        self.pipe_to(|upstream| spawn_stage(program, args, Some(upstream), None))
    }

    /// Like [`Pipeline::exec`], forwarding the child's standard error to
    /// `stderr`.
    pub fn exec_with_stderr<W, I, S>(self, stderr: W, program: &str, args: I) -> Pipeline
    where
        W: Write + Send + 'static,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args = collect_args(args);
        self.pipe_to(|upstream| {
            spawn_stage(program, args, Some(upstream), Some(Box::new(stderr)))
        })
    }
}

fn collect_args<I, S>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter().map(|arg| arg.as_ref().to_string()).collect()
}

/// Spawn the child and wrap it in a stage. A spawn failure yields a failed
/// stage instead of an error.
fn spawn_stage(
    program: &str,
    args: Vec<String>,
    stdin: Option<BoxReader>,
    stderr: Option<BoxWriter>,
) -> Stage {
    let name = format!("exec({program}, {args:?})");

    let mut command = Command::new(program);
    command
        .args(&args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(if stderr.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(source) => {
            let err = StageError::Spawn {
                stage: name.clone(),
                source,
            };
            return Stage::failed(name, err);
        }
    };
    debug!(stage = %name, pid = child.id(), "spawned process");

    let feeder = match (stdin, child.stdin.take()) {
        (Some(mut input), Some(mut pipe)) => Some(thread::spawn(move || {
            let copied = io::copy(&mut input, &mut pipe);
            // Dropping the pipe delivers EOF to the child.
            drop(pipe);
            copied.map(|_| ())
        })),
        _ => None,
    };

    let forwarder = match (stderr, child.stderr.take()) {
        (Some(mut writer), Some(mut pipe)) => Some(thread::spawn(move || {
            io::copy(&mut pipe, &mut writer)?;
            writer.flush()
        })),
        _ => None,
    };

    let source: BoxReader = match child.stdout.take() {
        Some(stdout) => Box::new(stdout),
        None => Box::new(io::empty()),
    };

    let errors = ErrorLog::new();
    let recorded = errors.clone();
    let stage = name.clone();
    Stage::new(name, source)
        .with_error_log(errors)
        .with_release(move || {
            let status = child.wait();
            if let Some(err) = join_helper(&stage, "write stdin", feeder) {
                recorded.push(err);
            }
            if let Some(err) = join_helper(&stage, "forward stderr", forwarder) {
                recorded.push(err);
            }
            match status {
                Ok(status) if status.success() => {
                    debug!(stage = %stage, "process exited");
                    Ok(())
                }
                Ok(status) => Err(StageError::Exit { stage, status }),
                Err(source) => Err(StageError::io(&stage, "wait", source)),
            }
        })
}

/// Join a plumbing thread. A broken pipe only means the other side stopped
/// reading, which is not an error of its own.
fn join_helper(
    stage: &str,
    context: &str,
    handle: Option<JoinHandle<io::Result<()>>>,
) -> Option<StageError> {
    match handle?.join() {
        Ok(Ok(())) => None,
        Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => None,
        Ok(Err(e)) => Some(StageError::io(stage, context, e)),
        Err(_) => Some(StageError::Other {
            stage: stage.to_string(),
            message: format!("{context}: thread panicked"),
        }),
    }
}

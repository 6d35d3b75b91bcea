//! CLI tool to run a line pipeline over files or standard input.
//!
//! Stages run in a fixed order: grep, cut, sort, uniq, head/tail, wc.
//!
//! Usage:
//!   pipe-run [FILES]... --grep ERROR --sort --uniq --count
//!   pipe-run access.log --cut 1,7 --delimiter ' ' -o out/fields.txt
//!
//! If no output file is specified, writes to stdout.

use clap::Parser;
use pipelines_rs::{Cut, Pipeline, PipelineError, cat, stdin};
use regex::bytes::Regex;
use std::path::PathBuf;
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Filter, reorder and count lines of text.
#[derive(Parser)]
#[command(name = "pipe-run")]
struct Cli {
    /// Input files, read in order (default: stdin)
    files: Vec<PathBuf>,

    /// Keep lines matching this regular expression
    #[arg(long, value_name = "REGEX")]
    grep: Option<String>,

    /// Keep lines NOT matching --grep instead
    #[arg(long, requires = "grep")]
    invert: bool,

    /// Keep these 1-based fields, comma separated (e.g. 1,3)
    #[arg(long, value_name = "FIELDS", value_delimiter = ',')]
    cut: Option<Vec<usize>>,

    /// Field delimiter for --cut (default: tab)
    #[arg(long, requires = "cut")]
    delimiter: Option<String>,

    /// Sort lines
    #[arg(long)]
    sort: bool,

    /// Sort in descending order
    #[arg(long, requires = "sort")]
    reverse: bool,

    /// Collapse runs of repeated lines
    #[arg(long)]
    uniq: bool,

    /// Prefix each line kept by --uniq with its run length
    #[arg(long, requires = "uniq")]
    count: bool,

    /// Keep the first N lines; a negative N keeps the last -N lines
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    head: Option<isize>,

    /// Keep the last N lines
    #[arg(long, value_name = "N", conflicts_with = "head")]
    tail: Option<usize>,

    /// Print line, word and character counts instead of the lines
    #[arg(long)]
    wc: bool,

    /// Write output to file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Append to --output instead of replacing it
    #[arg(long, requires = "output")]
    append: bool,

    /// Log stage activity on stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let pipe = match build(&cli) {
        Ok(pipe) => pipe,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(2);
        }
    };
    debug!(stages = ?pipe.stage_names(), "built pipeline");

    let result = match &cli.output {
        Some(path) if cli.append => pipe.append_file(path),
        Some(path) => pipe.to_file(path),
        None => pipe.to_stdout(),
    };
    if let Err(e) = result {
        report(&e);
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build(cli: &Cli) -> Result<Pipeline, regex::Error> {
    let mut pipe = if cli.files.is_empty() {
        stdin()
    } else {
        cat(&cli.files)
    };

    if let Some(pattern) = &cli.grep {
        let re = Regex::new(pattern)?;
        pipe = if cli.invert {
            pipe.grep_inverted(re)
        } else {
            pipe.grep(re)
        };
    }
    if let Some(fields) = &cli.cut {
        pipe = match &cli.delimiter {
            Some(delim) => pipe.modify(Cut::with_delimiter(delim.as_bytes(), fields)),
            None => pipe.cut(fields),
        };
    }
    if cli.sort {
        pipe = pipe.sort(cli.reverse);
    }
    if cli.uniq {
        pipe = pipe.uniq(cli.count);
    }
    if let Some(n) = cli.head {
        pipe = pipe.head(n);
    }
    if let Some(n) = cli.tail {
        pipe = pipe.tail(n);
    }
    if cli.wc {
        pipe = pipe.wc().into_pipeline();
    }
    Ok(pipe)
}

fn report(err: &PipelineError) {
    for e in err.errors() {
        eprintln!("Pipeline error: {e}");
    }
}

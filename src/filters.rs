//! Line filters built on the [`Transform`] contract.
//!
//! Each filter is a small state struct: `transform` sees one record at a
//! time and returns what to emit, and the final `None` call lets buffering
//! filters (TAIL, UNIQ, SORT) write what they held back.

use std::collections::VecDeque;

use regex::bytes::Regex;

use crate::error::BoxError;
use crate::pipeline::Pipeline;
use crate::transform::{Flow, Transform};

// ---------------------------------------------------------------------------
// Filter implementations
// ---------------------------------------------------------------------------

/// GREP - keeps lines matching a regular expression, or the lines that do
/// not match when inverted.
///
/// Shell command: `grep [-v] <re>`.
pub struct Grep {
    re: Regex,
    invert: bool,
}

impl Grep {
    pub fn new(re: Regex) -> Self {
        Self { re, invert: false }
    }

    pub fn inverted(re: Regex) -> Self {
        Self { re, invert: true }
    }
}

impl Transform for Grep {
    fn transform(&mut self, record: Option<&[u8]>) -> Result<Flow, BoxError> {
        match record {
            Some(line) if self.re.is_match(line) != self.invert => Ok(Flow::line(line)),
            _ => Ok(Flow::Skip),
        }
    }

    fn name(&self) -> String {
        format!("grep({}, invert={})", self.re, self.invert)
    }
}

/// HEAD n - keeps the first n lines and stops reading upstream after them.
///
/// Shell command: `head -n <n>`.
pub struct Head {
    n: usize,
    remaining: usize,
}

impl Head {
    pub fn new(n: usize) -> Self {
        Self { n, remaining: n }
    }
}

impl Transform for Head {
    fn transform(&mut self, record: Option<&[u8]>) -> Result<Flow, BoxError> {
        match record {
            _ if self.remaining == 0 => Ok(Flow::End(None)),
            None => Ok(Flow::Skip),
            Some(line) => {
                self.remaining -= 1;
                if self.remaining == 0 {
                    Ok(Flow::End(Some(line_bytes(line))))
                } else {
                    Ok(Flow::line(line))
                }
            }
        }
    }

    fn name(&self) -> String {
        format!("head({})", self.n)
    }
}

/// TAIL n - keeps the last n lines, emitted once the input ends.
///
/// Shell command: `tail -n <n>`.
pub struct Tail {
    n: usize,
    window: VecDeque<Vec<u8>>,
}

impl Tail {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            window: VecDeque::with_capacity(n),
        }
    }
}

impl Transform for Tail {
    fn transform(&mut self, record: Option<&[u8]>) -> Result<Flow, BoxError> {
        match record {
            Some(_) if self.n == 0 => Ok(Flow::Skip),
            Some(line) => {
                if self.window.len() == self.n {
                    self.window.pop_front();
                }
                self.window.push_back(line.to_vec());
                Ok(Flow::Skip)
            }
            None => Ok(Flow::Emit(join_lines(self.window.drain(..)))),
        }
    }

    fn name(&self) -> String {
        format!("tail({})", self.n)
    }
}

/// UNIQ - collapses runs of repeated lines, optionally prefixing each with
/// its run length and a tab.
///
/// Shell command: `uniq [-c]`.
pub struct Uniq {
    count_prefix: bool,
    last: Option<Vec<u8>>,
    count: usize,
}

impl Uniq {
    pub fn new(count_prefix: bool) -> Self {
        Self {
            count_prefix,
            last: None,
            count: 0,
        }
    }

    fn take_run(&mut self) -> Flow {
        let Some(last) = self.last.take() else {
            return Flow::Skip;
        };
        let mut out = Vec::with_capacity(last.len() + 8);
        if self.count_prefix {
            out.extend_from_slice(format!("{}\t", self.count).as_bytes());
        }
        out.extend_from_slice(&last);
        out.push(b'\n');
        Flow::Emit(out)
    }
}

impl Transform for Uniq {
    fn transform(&mut self, record: Option<&[u8]>) -> Result<Flow, BoxError> {
        if let Some(line) = record
            && self.last.as_deref() == Some(line)
        {
            self.count += 1;
            return Ok(Flow::Skip);
        }

        let out = self.take_run();
        self.last = record.map(<[u8]>::to_vec);
        self.count = 1;
        Ok(out)
    }

    fn name(&self) -> String {
        format!("uniq(count={})", self.count_prefix)
    }
}

/// CUT - keeps selected fields of each line. Fields are 1-based and split by
/// a delimiter (tab by default); fields past the end of a line are skipped.
///
/// Shell command: `cut -d <delim> -f <fields>`.
pub struct Cut {
    delimiter: Vec<u8>,
    fields: Vec<usize>,
}

impl Cut {
    pub fn new(fields: &[usize]) -> Self {
        Self::with_delimiter(b"\t", fields)
    }

    pub fn with_delimiter(delimiter: &[u8], fields: &[usize]) -> Self {
        Self {
            delimiter: delimiter.to_vec(),
            fields: fields.to_vec(),
        }
    }
}

impl Transform for Cut {
    fn transform(&mut self, record: Option<&[u8]>) -> Result<Flow, BoxError> {
        let Some(line) = record else {
            return Ok(Flow::Skip);
        };
        let parts = split_bytes(line, &self.delimiter);

        let mut out = Vec::with_capacity(line.len() + 1);
        let mut first = true;
        for &field in &self.fields {
            let Some(part) = field.checked_sub(1).and_then(|i| parts.get(i)) else {
                continue;
            };
            if !first {
                out.extend_from_slice(&self.delimiter);
            }
            out.extend_from_slice(part);
            first = false;
        }
        out.push(b'\n');
        Ok(Flow::Emit(out))
    }

    fn name(&self) -> String {
        format!(
            "cut({:?}, {:?})",
            String::from_utf8_lossy(&self.delimiter),
            self.fields
        )
    }
}

/// SORT - orders lines by byte value, emitting them once the input ends.
///
/// Shell command: `sort [-r]`.
pub struct Sort {
    reverse: bool,
    lines: Vec<Vec<u8>>,
}

impl Sort {
    pub fn new(reverse: bool) -> Self {
        Self {
            reverse,
            lines: Vec::new(),
        }
    }
}

impl Transform for Sort {
    fn transform(&mut self, record: Option<&[u8]>) -> Result<Flow, BoxError> {
        match record {
            Some(line) => {
                self.lines.push(line.to_vec());
                Ok(Flow::Skip)
            }
            None => {
                let mut lines = std::mem::take(&mut self.lines);
                if self.reverse {
                    lines.sort_unstable_by(|a, b| b.cmp(a));
                } else {
                    lines.sort_unstable();
                }
                Ok(Flow::Emit(join_lines(lines)))
            }
        }
    }

    fn name(&self) -> String {
        format!("sort(reverse={})", self.reverse)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn line_bytes(line: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(line.len() + 1);
    out.extend_from_slice(line);
    out.push(b'\n');
    out
}

fn join_lines<I: IntoIterator<Item = Vec<u8>>>(lines: I) -> Vec<u8> {
    let mut out = Vec::new();
    for line in lines {
        out.extend_from_slice(&line);
        out.push(b'\n');
    }
    out
}

fn split_bytes<'a>(line: &'a [u8], delimiter: &[u8]) -> Vec<&'a [u8]> {
    if delimiter.is_empty() {
        return vec![line];
    }
    let mut parts = Vec::new();
    let mut rest = line;
    while let Some(at) = rest
        .windows(delimiter.len())
        .position(|window| window == delimiter)
    {
        parts.push(&rest[..at]);
        rest = &rest[at + delimiter.len()..];
    }
    parts.push(rest);
    parts
}

// ---------------------------------------------------------------------------
// Pipeline combinators
// ---------------------------------------------------------------------------

impl Pipeline {
    /// Keep lines matching `re`.
    pub fn grep(self, re: Regex) -> Pipeline {
        self.modify(Grep::new(re))
    }

    /// Keep lines not matching `re`.
    pub fn grep_inverted(self, re: Regex) -> Pipeline {
        self.modify(Grep::inverted(re))
    }

    /// Keep the first `n` lines; a negative `n` keeps the last `-n` lines.
    pub fn head(self, n: isize) -> Pipeline {
        if n < 0 {
            self.modify(Tail::new(n.unsigned_abs()))
        } else {
            self.modify(Head::new(n.unsigned_abs()))
        }
    }

    /// Keep the last `n` lines.
    pub fn tail(self, n: usize) -> Pipeline {
        self.modify(Tail::new(n))
    }

    pub fn uniq(self, count_prefix: bool) -> Pipeline {
        self.modify(Uniq::new(count_prefix))
    }

    /// Keep tab-separated `fields` (1-based).
    pub fn cut(self, fields: &[usize]) -> Pipeline {
        self.modify(Cut::new(fields))
    }

    pub fn sort(self, reverse: bool) -> Pipeline {
        self.modify(Sort::new(reverse))
    }
}

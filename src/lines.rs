//! Line demultiplexer: splits a byte stream into records.

use std::io::{self, BufRead, BufReader, Read};

/// Reads one record per call from an underlying byte source.
///
/// A record is a line without its `\n` terminator (and without a `\r` right
/// before it). Lines are reassembled no matter how the source splits them
/// across reads, and a final line without terminator is still a record.
pub struct LineReader<R> {
    inner: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: Read> LineReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            inner: BufReader::new(source),
            buf: Vec::new(),
        }
    }

    /// Use an internal buffer of `capacity` bytes.
    pub fn with_capacity(capacity: usize, source: R) -> Self {
        Self {
            inner: BufReader::with_capacity(capacity, source),
            buf: Vec::new(),
        }
    }

    /// Next record, or `None` at end of input.
    pub fn next_record(&mut self) -> io::Result<Option<Vec<u8>>> {
        self.buf.clear();
        loop {
            match self.inner.read_until(b'\n', &mut self.buf) {
                Ok(0) if self.buf.is_empty() => return Ok(None),
                Ok(_) => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        }
        Ok(Some(std::mem::take(&mut self.buf)))
    }

    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

impl<R: Read> Iterator for LineReader<R> {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Returns at most `chunk` bytes per read.
    pub(crate) struct Trickle<'a> {
        data: &'a [u8],
        chunk: usize,
    }

    impl<'a> Trickle<'a> {
        pub(crate) fn new(data: &'a [u8], chunk: usize) -> Self {
            Self { data, chunk }
        }
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.chunk.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    fn records(source: impl Read) -> Vec<Vec<u8>> {
        LineReader::new(source).collect::<io::Result<_>>().unwrap()
    }

    #[test]
    fn test_splits_lines() {
        let got = records(&b"a\nbb\nccc"[..]);
        assert_eq!(got, vec![b"a".to_vec(), b"bb".to_vec(), b"ccc".to_vec()]);
    }

    #[test]
    fn test_strips_carriage_return() {
        let got = records(&b"a\r\nbb\r\n"[..]);
        assert_eq!(got, vec![b"a".to_vec(), b"bb".to_vec()]);
    }

    #[test]
    fn test_empty_lines_are_records() {
        let got = records(&b"\n\nx\n"[..]);
        assert_eq!(got, vec![b"".to_vec(), b"".to_vec(), b"x".to_vec()]);
    }

    #[test]
    fn test_empty_input_has_no_records() {
        assert!(records(io::empty()).is_empty());
    }

    #[test]
    fn test_long_line_across_small_buffer() {
        let long = "a".repeat(10_000);
        let input = format!("{long}\n{long}");
        let mut reader = LineReader::with_capacity(16, input.as_bytes());
        assert_eq!(reader.next_record().unwrap().unwrap(), long.as_bytes());
        assert_eq!(reader.next_record().unwrap().unwrap(), long.as_bytes());
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn test_chunk_boundary_independence() {
        let long = "x".repeat(10_000);
        let input = format!("first\n{long}\n\nlast");
        let whole = records(input.as_bytes());
        for chunk in [1, 2, 3, 7, 4096] {
            assert_eq!(
                records(Trickle::new(input.as_bytes(), chunk)),
                whole,
                "chunk size {chunk}"
            );
        }
    }

    #[test]
    fn test_read_error_is_returned() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("oops"))
            }
        }
        let mut reader = LineReader::new(Broken);
        let err = reader.next_record().unwrap_err();
        assert_eq!(err.to_string(), "oops");
    }
}

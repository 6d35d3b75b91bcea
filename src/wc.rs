//! Line, word and character counting.

use std::fmt;
use std::io::Cursor;

use crate::error::StageError;
use crate::lines::LineReader;
use crate::pipeline::Pipeline;
use crate::stage::Stage;

/// Result of [`Pipeline::wc`].
///
/// Characters are counted as bytes, plus one terminator per line.
pub struct WordCount {
    pub lines: usize,
    pub words: usize,
    pub chars: usize,
    errors: Vec<StageError>,
}

impl WordCount {
    /// The count as a new pipeline emitting `"<lines>\t<words>\t<chars>\n"`.
    /// Errors from the counted pipeline are reported when it closes.
    pub fn into_pipeline(self) -> Pipeline {
        let text = self.to_string();
        let stage = self
            .errors
            .into_iter()
            .fold(Stage::new("wc", Cursor::new(text)), Stage::with_error);
        Pipeline::new(stage)
    }

    /// Errors raised while counting and closing the input.
    pub fn errors(&self) -> &[StageError] {
        &self.errors
    }
}

impl fmt::Display for WordCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}\t{}\t{}", self.lines, self.words, self.chars)
    }
}

impl fmt::Debug for WordCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WordCount")
            .field("lines", &self.lines)
            .field("words", &self.words)
            .field("chars", &self.chars)
            .field("errors", &self.errors.len())
            .finish()
    }
}

impl Pipeline {
    /// Count lines, words and characters, consuming and closing the
    /// pipeline.
    ///
    /// Shell command: `wc`.
    pub fn wc(mut self) -> WordCount {
        let (mut lines, mut words, mut chars) = (0, 0, 0);
        let mut errors = Vec::new();

        let mut reader = LineReader::new(&mut self);
        loop {
            match reader.next_record() {
                Ok(Some(line)) => {
                    lines += 1;
                    chars += line.len() + 1;
                    words += count_words(&line);
                }
                Ok(None) => break,
                Err(source) => {
                    errors.push(StageError::Read {
                        stage: "wc".to_string(),
                        source,
                    });
                    break;
                }
            }
        }
        drop(reader);

        if let Err(err) = self.close() {
            errors.extend(err.into_errors());
        }
        WordCount {
            lines,
            words,
            chars,
            errors,
        }
    }
}

fn count_words(line: &[u8]) -> usize {
    line.split(u8::is_ascii_whitespace)
        .filter(|word| !word.is_empty())
        .count()
}

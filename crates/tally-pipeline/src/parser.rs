//! Streaming record parser
//!
//! Provides [`RecordReader`], a lazy iterator of [`Row`]s over comma-separated
//! text. Quoting is strict: a quoted field must be closed, quotes inside it
//! are doubled, and a quote may not appear inside an unquoted field.
//!
//! Field counts are not validated here; rows of any width are yielded.

use crate::error::{PipelineError, RecordFault};
use std::io::{BufRead, BufReader, Read};

const DELIMITER: u8 = b',';
const QUOTE: u8 = b'"';
const NEWLINE: u8 = b'\n';

/// One parsed record: ordered fields, positionally significant
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row(Vec<String>);

impl Row {
    /// Create row from fields
    #[inline]
    #[must_use]
    pub fn new(fields: Vec<String>) -> Self {
        Self(fields)
    }

    /// Get fields
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.0
    }

    /// Get field by position
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    /// Number of fields
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if row has no fields
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Take ownership of the fields
    #[inline]
    #[must_use]
    pub fn into_fields(self) -> Vec<String> {
        self.0
    }
}

impl From<Vec<String>> for Row {
    fn from(fields: Vec<String>) -> Self {
        Self(fields)
    }
}

impl<'a> FromIterator<&'a str> for Row {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(str::to_string).collect())
    }
}

/// Lazy, single-pass reader of delimited records
///
/// Empty lines are skipped and do not count as rows. After the first error
/// the iterator is fused.
#[derive(Debug)]
pub struct RecordReader<R> {
    input: R,
    /// Current physical line, CRLF normalised to LF
    buf: Vec<u8>,
    /// Physical lines consumed so far
    line: usize,
    /// Records yielded so far
    rows: usize,
    done: bool,
}

impl<R: Read> RecordReader<BufReader<R>> {
    /// Wrap an unbuffered reader
    #[inline]
    #[must_use]
    pub fn from_reader(input: R) -> Self {
        Self::new(BufReader::new(input))
    }
}

impl<R: BufRead> RecordReader<R> {
    /// Create reader over buffered input
    #[inline]
    #[must_use]
    pub fn new(input: R) -> Self {
        Self {
            input,
            buf: Vec::new(),
            line: 0,
            rows: 0,
            done: false,
        }
    }

    /// Number of records yielded so far
    #[inline]
    #[must_use]
    pub fn rows_read(&self) -> usize {
        self.rows
    }

    /// Read the next record
    ///
    /// Returns `Ok(None)` at end of input.
    ///
    /// # Errors
    /// - `PipelineError::MalformedRecord` if the record violates the quoting rules
    /// - `PipelineError::Read` if the underlying stream fails
    pub fn read_row(&mut self) -> Result<Option<Row>, PipelineError> {
        if self.done {
            return Ok(None);
        }
        match self.tokenize() {
            Ok(Some(fields)) => {
                self.rows += 1;
                Ok(Some(Row(fields)))
            }
            Ok(None) => {
                self.done = true;
                Ok(None)
            }
            Err(err) => {
                self.done = true;
                Err(err)
            }
        }
    }

    fn tokenize(&mut self) -> Result<Option<Vec<String>>, PipelineError> {
        if !self.next_record_line()? {
            return Ok(None);
        }

        let start_line = self.line;
        let mut fields = Vec::new();
        let mut pos = 0;

        'fields: loop {
            if self.buf.get(pos) == Some(&QUOTE) {
                pos += 1;
                let mut field = Vec::new();
                loop {
                    if let Some(offset) = self.buf[pos..].iter().position(|&b| b == QUOTE) {
                        field.extend_from_slice(&self.buf[pos..pos + offset]);
                        pos += offset + 1;
                        match self.buf.get(pos) {
                            Some(&QUOTE) => {
                                field.push(QUOTE);
                                pos += 1;
                            }
                            Some(&DELIMITER) => {
                                fields.push(self.decode(field)?);
                                pos += 1;
                                continue 'fields;
                            }
                            None | Some(&NEWLINE) => {
                                fields.push(self.decode(field)?);
                                break 'fields;
                            }
                            Some(_) => {
                                return Err(self.fault(self.line, RecordFault::UnexpectedAfterQuote));
                            }
                        }
                    } else {
                        field.extend_from_slice(&self.buf[pos..]);
                        if !self.fill_line()? {
                            return Err(self.fault(start_line, RecordFault::UnterminatedQuote));
                        }
                        pos = 0;
                    }
                }
            }

            let rest = &self.buf[pos..];
            let end = rest
                .iter()
                .position(|&b| b == DELIMITER || b == NEWLINE)
                .unwrap_or(rest.len());
            if rest[..end].contains(&QUOTE) {
                return Err(self.fault(self.line, RecordFault::BareQuote));
            }
            fields.push(self.decode(rest[..end].to_vec())?);
            pos += end;

            if self.buf.get(pos) == Some(&DELIMITER) {
                pos += 1;
            } else {
                break;
            }
        }

        Ok(Some(fields))
    }

    /// Advance to the next non-empty physical line
    fn next_record_line(&mut self) -> Result<bool, PipelineError> {
        loop {
            if !self.fill_line()? {
                return Ok(false);
            }
            if !(self.buf.is_empty() || self.buf == [NEWLINE]) {
                return Ok(true);
            }
        }
    }

    /// Replace the buffer with the next physical line
    fn fill_line(&mut self) -> Result<bool, PipelineError> {
        self.buf.clear();
        let read = self
            .input
            .read_until(NEWLINE, &mut self.buf)
            .map_err(|source| PipelineError::Read {
                row: self.rows + 1,
                source,
            })?;
        if read == 0 {
            return Ok(false);
        }
        self.line += 1;
        if self.buf.ends_with(b"\r\n") {
            let len = self.buf.len();
            self.buf.truncate(len - 2);
            self.buf.push(NEWLINE);
        } else if self.buf.last() == Some(&b'\r') {
            // final line without a newline
            self.buf.pop();
        }
        Ok(true)
    }

    fn decode(&self, field: Vec<u8>) -> Result<String, PipelineError> {
        String::from_utf8(field).map_err(|_| self.fault(self.line, RecordFault::InvalidUtf8))
    }

    fn fault(&self, line: usize, fault: RecordFault) -> PipelineError {
        PipelineError::malformed_record(self.rows + 1, line, fault)
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<Row, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_row().transpose()
    }
}

impl<R: BufRead> std::iter::FusedIterator for RecordReader<R> {}

/// Parse a complete in-memory document into rows
///
/// # Errors
/// Returns the first tokenization error encountered
pub fn parse_rows(input: &[u8]) -> Result<Vec<Row>, PipelineError> {
    RecordReader::new(input).collect()
}

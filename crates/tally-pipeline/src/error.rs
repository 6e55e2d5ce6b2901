//! Error types for the aggregation pipeline
//!
//! Every variant is terminal for the run that produced it:
//! - Tokenization failures (input → rows)
//! - Row shape and measure validation (rows → mapping)
//! - Sink failures (mapping → output)

use std::io;

/// Minimum number of fields a row must carry (key, unused, measure)
pub const MIN_FIELDS: usize = 3;

/// Why a record could not be tokenized
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RecordFault {
    /// Quoted field still open at end of input
    #[error("unterminated quoted field")]
    UnterminatedQuote,

    /// Quote character inside an unquoted field
    #[error("bare \" in non-quoted field")]
    BareQuote,

    /// Something other than a delimiter or line break after a closing quote
    #[error("extraneous or missing \" in quoted field")]
    UnexpectedAfterQuote,

    /// Field bytes are not valid UTF-8
    #[error("field is not valid UTF-8")]
    InvalidUtf8,
}

/// Errors raised while aggregating one input
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Record could not be tokenized under the quoting rules
    #[error("malformed record at row {row} (line {line}): {fault}")]
    MalformedRecord {
        /// 1-based record number
        row: usize,
        /// Physical line where the fault was detected
        line: usize,
        /// Quoting rule that was broken
        fault: RecordFault,
    },

    /// Input stream failed while reading
    #[error("failed to read input at row {row}: {source}")]
    Read {
        /// Record being read when the stream failed
        row: usize,
        /// Underlying I/O failure
        #[source]
        source: io::Error,
    },

    /// Row carries fewer than three fields
    #[error("row {row} is malformed: expected at least 3 fields, found {found}")]
    MalformedRow {
        /// 1-based record number
        row: usize,
        /// Fields actually present
        found: usize,
    },

    /// Measure field is not a number (outside the header row)
    #[error("invalid sales value on row {row}: {value:?}")]
    InvalidMeasure {
        /// 1-based record number
        row: usize,
        /// Raw measure text
        value: String,
    },

    /// Output sink rejected a write or flush
    #[error("failed to write output: {0}")]
    Write(#[source] io::Error),
}

impl PipelineError {
    /// Create tokenization error
    pub fn malformed_record(row: usize, line: usize, fault: RecordFault) -> Self {
        Self::MalformedRecord { row, line, fault }
    }

    /// Create invalid measure error
    pub fn invalid_measure(row: usize, value: impl Into<String>) -> Self {
        Self::InvalidMeasure {
            row,
            value: value.into(),
        }
    }

    /// Row the error refers to, if any
    #[must_use]
    pub fn row(&self) -> Option<usize> {
        match self {
            Self::MalformedRecord { row, .. }
            | Self::Read { row, .. }
            | Self::MalformedRow { row, .. }
            | Self::InvalidMeasure { row, .. } => Some(*row),
            Self::Write(_) => None,
        }
    }

    /// True when the uploaded content itself is at fault
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedRecord { .. } | Self::MalformedRow { .. } | Self::InvalidMeasure { .. }
        )
    }
}

impl From<csv::Error> for PipelineError {
    fn from(err: csv::Error) -> Self {
        Self::Write(io::Error::from(err))
    }
}

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

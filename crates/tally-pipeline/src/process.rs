//! Single-run entry point: parse → aggregate → serialize

use crate::aggregate::{AggregateMapping, Aggregator, HeaderPolicy};
use crate::error::PipelineError;
use crate::parser::RecordReader;
use crate::serialize::serialize;
use std::io::{Read, Write};

/// Options for one pipeline run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    /// First-row handling
    pub header: HeaderPolicy,
}

impl PipelineOptions {
    /// Create default options (header detection)
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With header policy
    #[inline]
    #[must_use]
    pub fn with_header(mut self, header: HeaderPolicy) -> Self {
        self.header = header;
        self
    }
}

/// What a completed run saw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Records consumed, header included
    pub rows_read: usize,
    /// Whether row 1 was discarded as a header
    pub header_skipped: bool,
    /// Distinct group keys written
    pub groups: usize,
}

/// Aggregate `input` without serializing
///
/// # Errors
/// First tokenization, shape or measure error
pub fn aggregate_reader<R: Read>(
    input: &mut R,
    options: &PipelineOptions,
) -> Result<(AggregateMapping, RunSummary), PipelineError> {
    let mut aggregator = Aggregator::new(options.header);
    for row in RecordReader::from_reader(input) {
        aggregator.push(row?)?;
    }

    let summary = RunSummary {
        rows_read: aggregator.rows_seen(),
        header_skipped: aggregator.header_skipped(),
        groups: aggregator.mapping().len(),
    };
    Ok((aggregator.finish(), summary))
}

/// Run the whole pipeline over borrowed streams
///
/// Nothing is written to `output` unless the entire input aggregates cleanly.
///
/// # Errors
/// - Any input error from [`aggregate_reader`]
/// - `PipelineError::Write` if `output` fails
pub fn process<R: Read, W: Write>(
    input: &mut R,
    output: &mut W,
    options: &PipelineOptions,
) -> Result<RunSummary, PipelineError> {
    let (mapping, summary) = aggregate_reader(input, options)?;
    serialize(&mapping, output)?;
    tracing::debug!(
        rows = summary.rows_read,
        groups = summary.groups,
        header_skipped = summary.header_skipped,
        "pipeline run complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_reports_header_and_groups() {
        let mut input = "City,Product,Sales\na,x,1\nb,x,2\na,y,3\n".as_bytes();
        let mut out = Vec::new();
        let summary = process(&mut input, &mut out, &PipelineOptions::new()).unwrap();
        assert_eq!(
            summary,
            RunSummary {
                rows_read: 4,
                header_skipped: true,
                groups: 2,
            }
        );
        assert_eq!(String::from_utf8(out).unwrap(), "a,4\nb,2\n");
    }

    #[test]
    fn failed_run_writes_nothing() {
        let mut input = "a,x,1\nb,x,oops\n".as_bytes();
        let mut out = Vec::new();
        let result = process(&mut input, &mut out, &PipelineOptions::new());
        assert!(result.is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn options_builder() {
        let options = PipelineOptions::new().with_header(HeaderPolicy::Absent);
        assert_eq!(options.header, HeaderPolicy::Absent);
    }
}

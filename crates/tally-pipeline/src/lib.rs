//! Tally Pipeline
//!
//! Streaming CSV group-and-sum: the first column is the group key, the third
//! column the measure.
//!
//! # Architecture
//!
//! ```text
//! bytes → RecordReader → Row* → Aggregator → AggregateMapping → serialize → bytes
//! ```
//!
//! # Example
//!
//! ```rust
//! use tally_pipeline::{process, PipelineOptions};
//!
//! let mut input = "City,Product,Sales\nNew York,Laptop,1200.50\nNew York,Tablet,750.00\n".as_bytes();
//! let mut output = Vec::new();
//!
//! let summary = process(&mut input, &mut output, &PipelineOptions::new())?;
//! assert!(summary.header_skipped);
//! assert_eq!(output, b"New York,1950.5\n");
//! # Ok::<(), tally_pipeline::PipelineError>(())
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
pub mod aggregate;
pub mod error;
pub mod parser;
pub mod process;
pub mod serialize;

// Re-exports
pub use aggregate::{
    aggregate, aggregate_with, AggregateMapping, Aggregator, HeaderPolicy, UnknownHeaderPolicy,
};
pub use error::{PipelineError, PipelineResult, RecordFault, MIN_FIELDS};
pub use parser::{parse_rows, RecordReader, Row};
pub use process::{aggregate_reader, process, PipelineOptions, RunSummary};
pub use serialize::{format_measure, serialize, serialize_to_vec};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn parse_aggregate_serialize() {
        let rows = RecordReader::new("k,x,1\n\"k\",y,2\n".as_bytes());
        let mapping = aggregate(rows).unwrap();
        let out = serialize_to_vec(&mapping).unwrap();
        assert_eq!(out, b"k,3\n");
    }
}

//! Group-and-sum over parsed rows
//!
//! Column 0 is the group key, column 2 the measure. Sums are accumulated in
//! input order and keys keep their first-occurrence order, so the same input
//! always produces bit-identical sums and the same output order.

use crate::error::{PipelineError, MIN_FIELDS};
use crate::parser::Row;
use indexmap::IndexMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

const KEY_FIELD: usize = 0;
const MEASURE_FIELD: usize = 2;

/// How the first row is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HeaderPolicy {
    /// Row 1 is a header exactly when its measure does not parse
    #[default]
    Detect,
    /// Row 1 is always a header
    Present,
    /// Row 1 is always data
    Absent,
}

impl HeaderPolicy {
    /// Stable lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Detect => "detect",
            Self::Present => "present",
            Self::Absent => "absent",
        }
    }
}

impl Display for HeaderPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HeaderPolicy {
    type Err = UnknownHeaderPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "detect" | "auto" => Ok(Self::Detect),
            "present" | "yes" | "true" => Ok(Self::Present),
            "absent" | "no" | "false" => Ok(Self::Absent),
            _ => Err(UnknownHeaderPolicy(s.to_string())),
        }
    }
}

/// Unrecognised header policy name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown header policy '{0}' (expected detect, present or absent)")]
pub struct UnknownHeaderPolicy(pub String);

/// Group key → summed measure
///
/// Iteration follows first-occurrence order of keys. Equality ignores order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateMapping(IndexMap<String, f64>);

impl AggregateMapping {
    /// Create empty mapping
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Sum for a key
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }

    /// Number of groups
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if no group was seen
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(key, sum)` pairs in first-occurrence order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Iterate keys in first-occurrence order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Sum over all groups
    #[must_use]
    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    /// Unwrap into the underlying map
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> IndexMap<String, f64> {
        self.0
    }

    fn add(&mut self, key: String, measure: f64) {
        *self.0.entry(key).or_insert(0.0) += measure;
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for AggregateMapping {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        let mut mapping = Self::new();
        for (key, measure) in iter {
            mapping.add(key.into(), measure);
        }
        mapping
    }
}

/// Incremental aggregator for a single run
///
/// Feed rows in input order with [`Aggregator::push`]; the first error ends
/// the run and no mapping is produced.
#[derive(Debug, Default)]
pub struct Aggregator {
    policy: HeaderPolicy,
    mapping: AggregateMapping,
    rows_seen: usize,
    header_skipped: bool,
}

impl Aggregator {
    /// Create aggregator with header policy
    #[inline]
    #[must_use]
    pub fn new(policy: HeaderPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Consume the next row
    ///
    /// # Errors
    /// - `PipelineError::MalformedRow` if the row has fewer than three fields
    /// - `PipelineError::InvalidMeasure` if the measure is not numeric outside the header row
    pub fn push(&mut self, row: Row) -> Result<(), PipelineError> {
        let row_number = self.rows_seen + 1;
        if row.len() < MIN_FIELDS {
            return Err(PipelineError::MalformedRow {
                row: row_number,
                found: row.len(),
            });
        }
        self.rows_seen = row_number;

        let mut fields = row.into_fields();
        let raw = &fields[MEASURE_FIELD];

        if row_number == 1 && self.policy == HeaderPolicy::Present {
            self.skip_header(raw);
            return Ok(());
        }

        match raw.parse::<f64>() {
            Ok(measure) => {
                let key = fields.swap_remove(KEY_FIELD);
                self.mapping.add(key, measure);
                Ok(())
            }
            Err(_) if row_number == 1 && self.policy == HeaderPolicy::Detect => {
                self.skip_header(raw);
                Ok(())
            }
            Err(_) => Err(PipelineError::invalid_measure(
                row_number,
                fields.swap_remove(MEASURE_FIELD),
            )),
        }
    }

    fn skip_header(&mut self, raw: &str) {
        tracing::debug!(measure_header = raw, "skipping header row");
        self.header_skipped = true;
    }

    /// Rows accepted so far (including a skipped header)
    #[inline]
    #[must_use]
    pub fn rows_seen(&self) -> usize {
        self.rows_seen
    }

    /// Whether row 1 was discarded as a header
    #[inline]
    #[must_use]
    pub fn header_skipped(&self) -> bool {
        self.header_skipped
    }

    /// Borrow the mapping built so far
    #[inline]
    #[must_use]
    pub fn mapping(&self) -> &AggregateMapping {
        &self.mapping
    }

    /// Finish the run and hand the mapping off
    #[inline]
    #[must_use]
    pub fn finish(self) -> AggregateMapping {
        self.mapping
    }
}

/// Aggregate a row sequence with header detection
///
/// # Errors
/// Returns the first parse, shape or measure error; no partial mapping
pub fn aggregate<I>(rows: I) -> Result<AggregateMapping, PipelineError>
where
    I: IntoIterator<Item = Result<Row, PipelineError>>,
{
    aggregate_with(rows, HeaderPolicy::Detect)
}

/// Aggregate a row sequence with an explicit header policy
///
/// # Errors
/// Returns the first parse, shape or measure error; no partial mapping
pub fn aggregate_with<I>(rows: I, policy: HeaderPolicy) -> Result<AggregateMapping, PipelineError>
where
    I: IntoIterator<Item = Result<Row, PipelineError>>,
{
    let mut aggregator = Aggregator::new(policy);
    for row in rows {
        aggregator.push(row?)?;
    }
    Ok(aggregator.finish())
}

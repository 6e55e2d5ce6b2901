//! Aggregate → CSV egress
//!
//! One `key,sum` record per group, no header, LF-terminated. Quoting is
//! applied only where a key needs it.

use crate::aggregate::AggregateMapping;
use crate::error::PipelineError;
use std::io::Write;

/// Render a sum as the shortest decimal that round-trips, never in exponent form
///
/// `800.0` renders as `800`, `1950.5` as `1950.5`.
#[inline]
#[must_use]
pub fn format_measure(value: f64) -> String {
    value.to_string()
}

/// Write the mapping to `sink`
///
/// The sink is borrowed and flushed but not closed.
///
/// # Errors
/// - `PipelineError::Write` if the sink rejects a write or the final flush
pub fn serialize<W: Write>(mapping: &AggregateMapping, sink: &mut W) -> Result<(), PipelineError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(sink);

    for (key, sum) in mapping.iter() {
        writer.write_record([key, format_measure(sum).as_str()])?;
    }
    writer.flush().map_err(PipelineError::Write)?;
    Ok(())
}

/// Serialize into an owned buffer
///
/// # Errors
/// Propagates [`serialize`] failures
pub fn serialize_to_vec(mapping: &AggregateMapping) -> Result<Vec<u8>, PipelineError> {
    let mut out = Vec::new();
    serialize(mapping, &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "no space left on device"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn format_drops_trailing_zeros() {
        assert_eq!(format_measure(800.0), "800");
        assert_eq!(format_measure(1950.5), "1950.5");
        assert_eq!(format_measure(-0.25), "-0.25");
        assert_eq!(format_measure(0.1 + 0.2), "0.30000000000000004");
    }

    #[test]
    fn format_never_uses_exponent() {
        assert_eq!(format_measure(1e21), "1000000000000000000000");
        assert_eq!(format_measure(1e-7), "0.0000001");
    }

    #[test]
    fn empty_mapping_writes_nothing() {
        let out = serialize_to_vec(&AggregateMapping::new()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn one_record_per_group() {
        let mapping: AggregateMapping = vec![("New York", 1950.5), ("Los Angeles", 800.0)]
            .into_iter()
            .collect();
        let out = String::from_utf8(serialize_to_vec(&mapping).unwrap()).unwrap();
        assert_eq!(out, "New York,1950.5\nLos Angeles,800\n");
    }

    #[test]
    fn keys_needing_quotes_are_quoted() {
        let mapping: AggregateMapping = vec![("Portland, OR", 1.0), ("The \"Big\" Apple", 2.0)]
            .into_iter()
            .collect();
        let out = String::from_utf8(serialize_to_vec(&mapping).unwrap()).unwrap();
        assert_eq!(out, "\"Portland, OR\",1\n\"The \"\"Big\"\" Apple\",2\n");
    }

    #[test]
    fn sink_failure_is_write_error() {
        let mapping: AggregateMapping = vec![("a", 1.0)].into_iter().collect();
        let result = serialize(&mapping, &mut FullDisk);
        assert!(matches!(result, Err(PipelineError::Write(_))));
    }
}

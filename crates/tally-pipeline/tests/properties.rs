//! Property tests for the aggregation pipeline
//!
//! Inputs are produced with the `csv` crate's writer so every generated
//! document is one a common CSV producer could emit.

use proptest::prelude::*;
use tally_pipeline::{
    aggregate, aggregate_with, parse_rows, serialize_to_vec, AggregateMapping, HeaderPolicy,
    RecordReader, Row,
};

/// Keys include delimiters and quotes so quoting is exercised
fn key_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z ,\"]{1,8}"
}

/// Measures in cents so the text form is exact to two places
fn cents_strategy() -> impl Strategy<Value = i64> {
    -10_000_000i64..10_000_000
}

fn rows_strategy() -> impl Strategy<Value = Vec<(String, i64)>> {
    prop::collection::vec((key_strategy(), cents_strategy()), 0..40)
}

fn to_csv(rows: &[(String, i64)], header: bool) -> Vec<u8> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    if header {
        writer.write_record(["City", "Product", "Sales"]).unwrap();
    }
    for (key, cents) in rows {
        let measure = format!("{:.2}", *cents as f64 / 100.0);
        writer.write_record([key.as_str(), "item", measure.as_str()]).unwrap();
    }
    writer.into_inner().unwrap()
}

/// Reference sums, accumulated in input order
fn reference(rows: &[(String, i64)]) -> AggregateMapping {
    rows.iter()
        .map(|(key, cents)| (key.clone(), *cents as f64 / 100.0))
        .collect()
}

/// Original rows paired with the same rows in a random order
fn reordered_rows_strategy() -> impl Strategy<Value = (Vec<(String, i64)>, Vec<(String, i64)>)> {
    rows_strategy().prop_flat_map(|rows| (Just(rows.clone()), Just(rows).prop_shuffle()))
}

/// Sum of absolute measures per key, bounds the rounding error of any order
fn magnitude(rows: &[(String, i64)], key: &str) -> f64 {
    rows.iter()
        .filter(|(k, _)| k == key)
        .map(|(_, cents)| (*cents as f64 / 100.0).abs())
        .sum()
}

proptest! {
    #[test]
    fn accumulation_order_does_not_change_sums((rows, shuffled) in reordered_rows_strategy()) {
        let in_order = aggregate(RecordReader::new(to_csv(&rows, false).as_slice())).unwrap();
        let reordered = aggregate(RecordReader::new(to_csv(&shuffled, false).as_slice())).unwrap();

        prop_assert_eq!(in_order.len(), reordered.len());
        for (key, total) in in_order.iter() {
            let other = reordered.get(key);
            prop_assert!(other.is_some(), "key {:?} missing after reorder", key);
            let other = other.unwrap_or_default();
            let tolerance = 1e-12 * magnitude(&rows, key).max(1.0) * rows.len().max(1) as f64;
            prop_assert!(
                (total - other).abs() <= tolerance,
                "key {:?}: {} vs {} (tolerance {})", key, total, other, tolerance
            );
        }
    }

    #[test]
    fn sums_match_reference(rows in rows_strategy(), header in any::<bool>()) {
        let input = to_csv(&rows, header);
        let mapping = aggregate(RecordReader::new(input.as_slice())).unwrap();
        prop_assert_eq!(mapping, reference(&rows));
    }

    #[test]
    fn serialized_output_reaggregates_to_same_mapping(rows in rows_strategy()) {
        let mapping = reference(&rows);
        let out = serialize_to_vec(&mapping).unwrap();

        let widened = parse_rows(&out)
            .unwrap()
            .into_iter()
            .map(|row| {
                let fields = row.into_fields();
                Ok(Row::new(vec![fields[0].clone(), "placeholder".to_string(), fields[1].clone()]))
            });
        let again = aggregate_with(widened, HeaderPolicy::Absent).unwrap();
        prop_assert_eq!(again, mapping);
    }

    #[test]
    fn identical_input_gives_identical_output(rows in rows_strategy()) {
        let input = to_csv(&rows, false);
        let first = aggregate(RecordReader::new(input.as_slice())).unwrap();
        let second = aggregate(RecordReader::new(input.as_slice())).unwrap();
        prop_assert_eq!(serialize_to_vec(&first).unwrap(), serialize_to_vec(&second).unwrap());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn reader_accepts_what_csv_writer_produces(rows in rows_strategy()) {
        let input = to_csv(&rows, false);
        let parsed = parse_rows(&input).unwrap();
        prop_assert_eq!(parsed.len(), rows.len());
        for (row, (key, _)) in parsed.iter().zip(&rows) {
            prop_assert_eq!(row.get(0), Some(key.as_str()));
            prop_assert_eq!(row.len(), 3);
        }
    }
}

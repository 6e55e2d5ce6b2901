//! End-to-end pipeline scenarios
//!
//! Each test feeds a complete document through the reader, aggregator and
//! serializer, matching the behaviour the upload endpoint relies on.

use pretty_assertions::assert_eq;
use tally_pipeline::{
    aggregate, aggregate_reader, process, serialize_to_vec, AggregateMapping, HeaderPolicy,
    PipelineError, PipelineOptions, RecordFault, RecordReader,
};
use tally_test_utils::{sorted_lines, HEADER_ONLY, SCENARIO_A, SCENARIO_B, SCENARIO_C, WITH_HEADER};

fn run(input: &str) -> Result<AggregateMapping, PipelineError> {
    aggregate(RecordReader::new(input.as_bytes()))
}

fn expected_a() -> AggregateMapping {
    vec![("New York", 1950.5), ("Los Angeles", 800.0)]
        .into_iter()
        .collect()
}

#[test]
fn scenario_a_sums_by_city() {
    let mapping = run(SCENARIO_A).unwrap();
    assert_eq!(mapping, expected_a());
    assert_eq!(mapping.get("New York"), Some(1950.5));
    assert_eq!(mapping.get("Los Angeles"), Some(800.0));
}

#[test]
fn trailing_carriage_return_at_end_of_input() {
    let mapping = run("a,x,1\r\nb,x,2\r").unwrap();
    assert_eq!(mapping.get("a"), Some(1.0));
    assert_eq!(mapping.get("b"), Some(2.0));
}

#[test]
fn header_row_is_detected_and_skipped() {
    assert_eq!(run(WITH_HEADER).unwrap(), expected_a());
}

#[test]
fn scenario_b_invalid_measure_after_header() {
    match run(SCENARIO_B) {
        Err(PipelineError::InvalidMeasure { row, value }) => {
            assert_eq!(row, 2);
            assert_eq!(value, "abc");
        }
        other => panic!("expected invalid measure, got {other:?}"),
    }
}

#[test]
fn scenario_c_short_header_is_malformed() {
    assert!(matches!(
        run(SCENARIO_C),
        Err(PipelineError::MalformedRow { row: 1, found: 2 })
    ));
}

#[test]
fn empty_input_is_empty_mapping() {
    let mapping = run("").unwrap();
    assert!(mapping.is_empty());
}

#[test]
fn header_only_is_empty_mapping() {
    assert!(run(HEADER_ONLY).unwrap().is_empty());
    assert!(run("City,Product,Sales\n").unwrap().is_empty());
}

#[test]
fn scenario_d_serializes_one_record_per_group() {
    let out = String::from_utf8(serialize_to_vec(&expected_a()).unwrap()).unwrap();
    assert_eq!(sorted_lines(&out), vec!["Los Angeles,800", "New York,1950.5"]);
    assert_eq!(out.lines().count(), 2);
}

#[test]
fn measures_are_summed_numerically() {
    let mapping = run("a,x,800.00\na,y,0800\na,z,8e2\n").unwrap();
    assert_eq!(mapping.get("a"), Some(2400.0));
}

#[test]
fn tokenization_error_stops_the_run() {
    let input = "a,x,1\nb,\"unterminated,2\nc,x,3\n";
    match run(input) {
        Err(PipelineError::MalformedRecord { row, fault, .. }) => {
            assert_eq!(row, 2);
            assert_eq!(fault, RecordFault::UnterminatedQuote);
        }
        other => panic!("expected malformed record, got {other:?}"),
    }
}

#[test]
fn quoted_keys_group_with_unquoted_keys() {
    let mapping = run("\"New York\",a,1\nNew York,b,2\n\"Portland, OR\",c,3\n").unwrap();
    assert_eq!(mapping.get("New York"), Some(3.0));
    assert_eq!(mapping.get("Portland, OR"), Some(3.0));
}

#[test]
fn explicit_header_policies() {
    let present = PipelineOptions::new().with_header(HeaderPolicy::Present);
    let (mapping, summary) = aggregate_reader(&mut "1,2,3\na,b,4\n".as_bytes(), &present).unwrap();
    assert!(summary.header_skipped);
    assert_eq!(mapping.len(), 1);

    let absent = PipelineOptions::new().with_header(HeaderPolicy::Absent);
    let result = aggregate_reader(&mut HEADER_ONLY.as_bytes(), &absent);
    assert!(matches!(result, Err(PipelineError::InvalidMeasure { row: 1, .. })));
}

#[test]
fn process_writes_full_output() {
    let mut input = WITH_HEADER.as_bytes();
    let mut out = Vec::new();
    let summary = process(&mut input, &mut out, &PipelineOptions::new()).unwrap();

    assert_eq!(summary.rows_read, 4);
    assert_eq!(summary.groups, 2);
    assert_eq!(
        sorted_lines(&String::from_utf8(out).unwrap()),
        vec!["Los Angeles,800", "New York,1950.5"]
    );
}

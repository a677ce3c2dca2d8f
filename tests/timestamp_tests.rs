// Timestamp normalization tests
// Backend timestamps arrive in heterogeneous formats; normalization must be
// pure and idempotent so it can run on every ingest path.

mod common;
use common::setup_logging;

use careline::timestamp::{normalize_timestamp, parse_timestamp};

#[test]
fn offsetless_space_separated_form_is_normalized() {
    setup_logging();
    assert_eq!(
        normalize_timestamp("2024-01-01 10:00:00"),
        "2024-01-01T10:00:00Z"
    );
}

#[test]
fn explicit_offset_is_a_no_op() {
    setup_logging();
    assert_eq!(
        normalize_timestamp("2024-01-01T10:00:00+05:30"),
        "2024-01-01T10:00:00+05:30"
    );
}

#[test]
fn normalization_is_idempotent_on_every_form() {
    setup_logging();
    for raw in [
        "2024-01-01 10:00:00",
        "2024-01-01T10:00:00Z",
        "2024-01-01T10:00:00+05:30",
        "2024-01-01T10:00:00-03:00",
    ] {
        let once = normalize_timestamp(raw);
        assert_eq!(normalize_timestamp(&once), once, "not idempotent for {}", raw);
    }
}

#[test]
fn normalized_forms_parse_to_the_same_instant() {
    setup_logging();

    let from_space = parse_timestamp("2024-01-01 10:00:00").unwrap();
    let from_rfc = parse_timestamp("2024-01-01T10:00:00Z").unwrap();
    assert_eq!(from_space, from_rfc);

    // Offsets are honored, not stripped
    let offset = parse_timestamp("2024-01-01T10:00:00+05:30").unwrap();
    assert_eq!(offset.to_rfc3339(), "2024-01-01T04:30:00+00:00");
}

#[test]
fn malformed_input_is_an_error() {
    setup_logging();
    assert!(parse_timestamp("").is_err());
    assert!(parse_timestamp("yesterday").is_err());
}

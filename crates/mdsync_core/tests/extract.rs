use mdsync_core::{extract_records, Expr, RecordExtractor, TransformError};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn bare_arrays_pass_through() {
    let records = extract_records(&json!([{"id": "a"}]), None, None).unwrap();
    assert_eq!(records, vec![json!({"id": "a"})]);
}

#[test]
fn expression_and_array_path_unwrap_envelopes() {
    let payload = json!({"data": {"collection": {"items": [1, 2, 3]}}, "total": 3});
    let expr = Expr::parse("data").unwrap();
    let records = extract_records(&payload, Some(&expr), Some("collection.items")).unwrap();
    assert_eq!(records, vec![json!(1), json!(2), json!(3)]);

    let extractor = RecordExtractor::new(Some(Expr::parse("data.collection.items").unwrap()), None);
    assert_eq!(extractor.extract(&payload).unwrap().len(), 3);
}

#[test]
fn missing_segments_fail_fast() {
    let payload = json!({"data": {"items": []}});
    let err = extract_records(&payload, None, Some("data.entries")).unwrap_err();
    assert!(matches!(err, TransformError::MissingSegment { ref segment, .. } if segment == "entries"));
}

#[test]
fn non_arrays_are_rejected() {
    let payload = json!({"data": {"items": {"not": "an array"}}});
    let err = extract_records(&payload, None, Some("data.items")).unwrap_err();
    assert!(matches!(err, TransformError::NotAnArray { .. }));

    let err = extract_records(&json!({"items": []}), None, None).unwrap_err();
    assert!(matches!(err, TransformError::NotAnArray { .. }));
}

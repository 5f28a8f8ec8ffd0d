use lis_telemetry::{
    FailureStage, TelemetryMetrics, metrics, new_request_ids, record_pipeline_failure,
};

#[test]
fn request_ids_non_empty() {
    let ids = new_request_ids();
    assert!(!ids.request_id.is_empty());
    assert!(!ids.trace_id.is_empty());
    assert_ne!(ids.request_id, ids.trace_id);
}

#[test]
fn pipeline_failures_are_counted_per_stage() {
    let before = metrics().snapshot();
    record_pipeline_failure(FailureStage::Decode);
    record_pipeline_failure(FailureStage::Decode);
    record_pipeline_failure(FailureStage::Process);
    let after = metrics().snapshot();

    assert!(after.decode_failures >= before.decode_failures + 2);
    assert!(after.process_failures > before.process_failures);
}

#[test]
fn fresh_metrics_start_at_zero() {
    let snapshot = TelemetryMetrics::new().snapshot();
    assert_eq!(snapshot.messages_received, 0);
    assert_eq!(snapshot.health_failures, 0);
}

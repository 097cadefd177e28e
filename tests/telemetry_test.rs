//! Integration tests for telemetry initialization and span helpers.

use workherd::model::{Status, WorkId};
use workherd::telemetry::{TelemetryConfig, init_telemetry, work};

#[test]
fn telemetry_initializes_without_endpoint() {
    // A tracing subscriber can only be set once per process, so a second
    // init in the same binary is allowed to fail.
    let guard = init_telemetry(TelemetryConfig {
        endpoint: None,
        service_name: "workherd-test".to_string(),
        log_level: "debug".to_string(),
    });
    if let Ok(guard) = guard {
        assert!(!guard.is_exporting());
        guard.force_flush();
    }
}

#[test]
fn work_span_records_status_and_transition() {
    let id = WorkId::new();
    let span = work::start_work_span(&id, 2, 0);
    work::record_attempt_status(&span, Status::Retry);
    work::record_state_transition(&span, Status::Retry, "retry");
}

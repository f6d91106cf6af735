//! Tests for pool error types.

use super::*;

#[test]
fn pool_error_codes_are_stable() {
    assert_eq!(
        PoolError::HandlerNotFound {
            job_type: "webhook".into()
        }
        .code(),
        "handler_not_found"
    );
    assert_eq!(PoolError::QueueFull { capacity: 10 }.code(), "queue_full");
    assert_eq!(PoolError::ShuttingDown.code(), "shutting_down");
    assert_eq!(PoolError::NotStarted.code(), "not_started");
}

#[test]
fn queue_full_reports_capacity() {
    let err = PoolError::QueueFull { capacity: 1000 };
    assert!(err.to_string().contains("1000"));
}

#[test]
fn job_error_helpers_carry_context() {
    let timeout = JobError::timeout(Duration::from_secs(30));
    assert!(timeout.message.contains("timed out"));

    let panic = JobError::panicked("index out of bounds");
    assert!(panic.message.contains("index out of bounds"));
}

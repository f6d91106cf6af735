//! Tests for execution record types and filters.

use super::*;
use chrono::Duration as ChronoDuration;

fn sample_record(plugin: &str, status: ExecutionStatus) -> ExecutionRecord {
    let request = ExecutionRequest::new(plugin, "POST");
    let mut record = ExecutionRecord::begin(&request);
    record.status = status;
    if status.is_terminal() {
        let end = record.start_time + ChronoDuration::milliseconds(25);
        record.end_time = Some(end);
        record.duration_ns = (end - record.start_time).num_nanoseconds();
    }
    record
}

// ============================================================================
// Record construction
// ============================================================================

#[test]
fn begin_opens_running_record_with_single_attempt() {
    let request = ExecutionRequest::new("echo", "GET").with_trace_id("trace-1");

    let record = ExecutionRecord::begin(&request);

    assert_eq!(record.status, ExecutionStatus::Running);
    assert_eq!(record.plugin_name, "echo");
    assert_eq!(record.http_method, "GET");
    assert!(record.end_time.is_none());
    assert_eq!(record.attempts, 1);
    assert_eq!(record.retry_count, 0);
    assert_eq!(record.trace_id.as_deref(), Some("trace-1"));
}

#[test]
fn begin_preserves_retry_count_invariant() {
    let request = ExecutionRequest::new("echo", "POST").with_attempt(3);

    let record = ExecutionRecord::begin(&request);

    assert_eq!(record.attempts, 3);
    assert_eq!(record.retry_count, 2);
}

#[test]
fn attempt_is_floored_at_one() {
    let request = ExecutionRequest::new("echo", "POST").with_attempt(0);
    assert_eq!(request.attempt, 1);
}

#[test]
fn duration_converts_nanoseconds() {
    let record = sample_record("echo", ExecutionStatus::Completed);
    let duration = record.duration().expect("terminal record has duration");
    assert_eq!(duration.as_millis(), 25);
}

// ============================================================================
// Status
// ============================================================================

#[test]
fn terminal_statuses() {
    assert!(ExecutionStatus::Completed.is_terminal());
    assert!(ExecutionStatus::Failed.is_terminal());
    assert!(ExecutionStatus::Timeout.is_terminal());
    assert!(ExecutionStatus::Canceled.is_terminal());
    assert!(!ExecutionStatus::Running.is_terminal());
    assert!(!ExecutionStatus::Pending.is_terminal());
}

#[test]
fn status_round_trips_through_string_tag() {
    for status in [
        ExecutionStatus::Pending,
        ExecutionStatus::Running,
        ExecutionStatus::Completed,
        ExecutionStatus::Failed,
        ExecutionStatus::Timeout,
        ExecutionStatus::Canceled,
    ] {
        let parsed: ExecutionStatus = status.as_str().parse().expect("tag should parse");
        assert_eq!(parsed, status);
    }
}

// ============================================================================
// Filters
// ============================================================================

#[test]
fn filter_matches_plugin_and_status() {
    let record = sample_record("echo", ExecutionStatus::Completed);

    let mut filter = ExecutionFilter::for_plugin("echo");
    filter.status = Some(ExecutionStatus::Completed);
    assert!(filter.matches(&record));

    filter.status = Some(ExecutionStatus::Failed);
    assert!(!filter.matches(&record));

    let other = ExecutionFilter::for_plugin("transform");
    assert!(!other.matches(&record));
}

#[test]
fn filter_matches_time_range() {
    let record = sample_record("echo", ExecutionStatus::Completed);

    let mut filter = ExecutionFilter::default();
    filter.started_after = Some(record.start_time - ChronoDuration::seconds(1));
    filter.started_before = Some(record.start_time + ChronoDuration::seconds(1));
    assert!(filter.matches(&record));

    filter.started_after = Some(record.start_time + ChronoDuration::seconds(1));
    assert!(!filter.matches(&record));
}

#[test]
fn filter_requires_every_tag() {
    let mut record = sample_record("echo", ExecutionStatus::Completed);
    record.tags.insert("env".into(), "prod".into());

    let mut filter = ExecutionFilter::default();
    filter.tags.insert("env".into(), "prod".into());
    assert!(filter.matches(&record));

    filter.tags.insert("region".into(), "eu".into());
    assert!(!filter.matches(&record));
}

// ============================================================================
// Stats
// ============================================================================

#[test]
fn stats_aggregate_counts_and_durations() {
    let records = vec![
        sample_record("echo", ExecutionStatus::Completed),
        sample_record("echo", ExecutionStatus::Completed),
        sample_record("echo", ExecutionStatus::Failed),
        sample_record("echo", ExecutionStatus::Timeout),
    ];

    let stats = ExecutionStats::from_records(records.iter());

    assert_eq!(stats.total, 4);
    assert_eq!(stats.by_status.completed, 2);
    assert_eq!(stats.by_status.failed, 1);
    assert_eq!(stats.by_status.timeout, 1);
    assert!((stats.success_rate - 0.5).abs() < f64::EPSILON);
    assert!((stats.avg_duration_ms - 25.0).abs() < 0.01);
    assert!((stats.min_duration_ms - 25.0).abs() < 0.01);
    assert!((stats.max_duration_ms - 25.0).abs() < 0.01);
}

#[test]
fn stats_over_empty_set_are_zeroed() {
    let stats = ExecutionStats::from_records(std::iter::empty());
    assert_eq!(stats.total, 0);
    assert_eq!(stats.success_rate, 0.0);
    assert_eq!(stats.avg_duration_ms, 0.0);
}

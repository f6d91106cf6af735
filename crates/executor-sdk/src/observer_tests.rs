//! Tests for the in-memory observer sinks.

use super::*;

#[test]
fn memory_log_sink_appends_in_order() {
    let sink = MemoryLogSink::new();

    sink.append(LogEntry {
        level: LogLevel::Info,
        plugin: "echo".into(),
        method: "GET".into(),
        request_id: "req-1".into(),
        message: "executing plugin".into(),
    });
    sink.append(LogEntry {
        level: LogLevel::Error,
        plugin: "echo".into(),
        method: "GET".into(),
        request_id: "req-1".into(),
        message: "plugin execution failed".into(),
    });

    let entries = sink.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].level, LogLevel::Info);
    assert_eq!(entries[1].level, LogLevel::Error);
    assert_eq!(entries[0].request_id, entries[1].request_id);
}

#[test]
fn memory_stats_sink_records_executions_and_errors() {
    let sink = MemoryStatsSink::new();

    sink.record_execution("echo", "POST", Duration::from_millis(12), true);
    sink.record_error("echo", "POST", "plugin returned status 500");

    let executions = sink.executions();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].plugin, "echo");
    assert!(executions[0].success);

    let errors = sink.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("500"));
}

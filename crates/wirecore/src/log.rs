use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Severity of an execution log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Immutable record of one execution event.
///
/// Entries are append-only for the duration of one flow run; node-attributed
/// entries carry the originating node's id and display name, and entries that
/// close out a unit of work carry its duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl LogEntry {
    fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            level,
            message: message.into(),
            data: None,
            node_id: None,
            node_name: None,
            duration_ms: None,
        }
    }
}

/// Observer callback invoked synchronously for every entry as it is produced.
pub type LogObserver = Arc<dyn Fn(&LogEntry) + Send + Sync>;

/// Run-scoped execution log: an append-only buffer plus an optional live
/// observer. Each flow run constructs its own; logs are never shared across
/// concurrent runs.
#[derive(Default)]
pub struct RunLog {
    entries: Mutex<Vec<LogEntry>>,
    observer: Option<LogObserver>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observer(observer: LogObserver) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            observer: Some(observer),
        }
    }

    /// Append an entry, then forward it to the observer.
    pub fn push(&self, entry: LogEntry) {
        {
            let mut entries = self.entries.lock().expect("log buffer poisoned");
            entries.push(entry.clone());
        }
        if let Some(observer) = &self.observer {
            observer(&entry);
        }
    }

    /// Snapshot of the full history, available during or after a run.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().expect("log buffer poisoned").clone()
    }

    pub fn clear(&self) {
        self.entries.lock().expect("log buffer poisoned").clear();
    }

    /// Run-level entry with no node attribution.
    pub fn emit(&self, level: LogLevel, message: impl Into<String>) {
        self.push(LogEntry::new(level, message));
    }

    pub fn emit_with_duration(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        duration_ms: u64,
    ) {
        let mut entry = LogEntry::new(level, message);
        entry.duration_ms = Some(duration_ms);
        self.push(entry);
    }

    /// Create a logger scoped to one node invocation.
    pub fn for_node(
        self: &Arc<Self>,
        node_id: impl Into<String>,
        node_name: impl Into<String>,
    ) -> NodeLogger {
        NodeLogger {
            log: Arc::clone(self),
            node_id: node_id.into(),
            node_name: node_name.into(),
        }
    }
}

/// Per-node logging handle passed to behaviors via the execution context.
#[derive(Clone)]
pub struct NodeLogger {
    log: Arc<RunLog>,
    node_id: String,
    node_name: String,
}

impl NodeLogger {
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    fn push(&self, mut entry: LogEntry) {
        entry.node_id = Some(self.node_id.clone());
        entry.node_name = Some(self.node_name.clone());
        entry.message = format!("{}: {}", self.node_name, entry.message);
        self.log.push(entry);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(LogEntry::new(LogLevel::Info, message));
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.push(LogEntry::new(LogLevel::Warning, message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(LogEntry::new(LogLevel::Error, message));
    }

    pub fn error_with_data(&self, message: impl Into<String>, data: serde_json::Value) {
        let mut entry = LogEntry::new(LogLevel::Error, message);
        entry.data = Some(data);
        self.push(entry);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.push(LogEntry::new(LogLevel::Success, message));
    }

    pub fn entry(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
        duration_ms: Option<u64>,
    ) {
        let mut entry = LogEntry::new(level, message);
        entry.data = data;
        entry.duration_ms = duration_ms;
        self.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn observer_sees_every_entry_in_order() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let log = Arc::new(RunLog::with_observer(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })));

        log.emit(LogLevel::Info, "starting");
        let node = log.for_node("n1", "First");
        node.info("working");
        node.success("done");

        assert_eq!(seen.load(Ordering::SeqCst), 3);
        let entries = log.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].node_id, None);
        assert_eq!(entries[1].node_id.as_deref(), Some("n1"));
        assert!(entries[1].message.starts_with("First:"));
        assert_eq!(entries[2].level, LogLevel::Success);
    }

    #[test]
    fn clear_resets_between_runs() {
        let log = RunLog::new();
        log.emit(LogLevel::Info, "old run");
        log.clear();
        assert!(log.entries().is_empty());
    }
}

//! Diagnostic sink used by the crawling components
//!
//! Every failure inside a crawler cycle or the partition manager is reported
//! through a [`Monitor`] instead of being returned. [`TracingMonitor`] is the
//! production sink; [`MemoryMonitor`] keeps entries in memory so that callers
//! can inspect what was reported.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Mutex;

use tracing::{debug, error, info};

use crate::constants::LOG_TARGET;

/// Sink for diagnostic messages. Implementations must never fail.
pub trait Monitor: Send + Sync + fmt::Debug {
    /// Low-level diagnostic detail
    fn debug(&self, message: &str) {
        let _ = message;
    }

    /// Informational message
    fn info(&self, message: &str);

    /// Failure that was handled locally, with its cause if one exists
    fn severe(&self, message: &str, cause: Option<&(dyn StdError + 'static)>);
}

/// Monitor that forwards to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMonitor;

impl Monitor for TracingMonitor {
    fn debug(&self, message: &str) {
        debug!(target: LOG_TARGET, "{}", message);
    }

    fn info(&self, message: &str) {
        info!(target: LOG_TARGET, "{}", message);
    }

    fn severe(&self, message: &str, cause: Option<&(dyn StdError + 'static)>) {
        match cause {
            Some(cause) => error!(target: LOG_TARGET, cause = %cause, "{}", message),
            None => error!(target: LOG_TARGET, "{}", message),
        }
    }
}

/// Severity of a recorded monitor entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Info,
    Severe,
}

/// One recorded monitor entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorEntry {
    pub severity: Severity,
    pub message: String,
    /// Rendered cause, if one was supplied
    pub cause: Option<String>,
}

/// Monitor that records every entry in memory
#[derive(Debug, Default)]
pub struct MemoryMonitor {
    entries: Mutex<Vec<MonitorEntry>>,
}

impl MemoryMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded entries, oldest first
    pub fn entries(&self) -> Vec<MonitorEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Recorded severe entries
    pub fn severe_entries(&self) -> Vec<MonitorEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.severity == Severity::Severe)
            .collect()
    }

    /// Number of severe entries recorded
    pub fn severe_count(&self) -> usize {
        self.severe_entries().len()
    }

    fn record(&self, severity: Severity, message: &str, cause: Option<String>) {
        // A poisoned lock only means another recorder panicked mid-push; keep recording.
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.push(MonitorEntry {
            severity,
            message: message.to_string(),
            cause,
        });
    }
}

impl Monitor for MemoryMonitor {
    fn debug(&self, message: &str) {
        self.record(Severity::Debug, message, None);
    }

    fn info(&self, message: &str) {
        self.record(Severity::Info, message, None);
    }

    fn severe(&self, message: &str, cause: Option<&(dyn StdError + 'static)>) {
        self.record(Severity::Severe, message, cause.map(|c| c.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AdapterError;

    #[test]
    fn test_memory_monitor_records_entries() {
        let monitor = MemoryMonitor::new();
        monitor.info("update-response received");
        monitor.debug("polling");

        let cause = AdapterError::UnsupportedUrl {
            url: "ftp://x".to_string(),
        };
        monitor.severe("adapter failed", Some(&cause));

        let entries = monitor.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].severity, Severity::Info);
        assert_eq!(monitor.severe_count(), 1);
        assert_eq!(
            monitor.severe_entries()[0].cause.as_deref(),
            Some("Unsupported catalog URL: ftp://x")
        );
    }

    #[test]
    fn test_tracing_monitor_never_panics() {
        let monitor = TracingMonitor;
        monitor.info("info");
        monitor.debug("debug");
        monitor.severe("severe", None);
    }
}

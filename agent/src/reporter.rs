//! Event reporter
//!
//! Turns handler observations into sink writes, gated by the category
//! filter. Nothing here can fail back into a handler.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hookwatch_shared::{Caller, Category, EventFields, EventRecord};
use serde::Serialize;

use crate::filter::CategoryFilter;
use crate::host::{EventSink, Severity};

/// Counters kept by the reporter
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReporterStats {
    pub emitted: u64,
    pub filtered: u64,
    pub warnings: u64,
}

pub struct Reporter {
    filter: CategoryFilter,
    sink: Arc<dyn EventSink>,
    emitted: AtomicU64,
    filtered: AtomicU64,
    warnings: AtomicU64,
}

impl Reporter {
    pub fn new(filter: CategoryFilter, sink: Arc<dyn EventSink>) -> Self {
        Self {
            filter,
            sink,
            emitted: AtomicU64::new(0),
            filtered: AtomicU64::new(0),
            warnings: AtomicU64::new(0),
        }
    }

    pub fn filter(&self) -> &CategoryFilter {
        &self.filter
    }

    pub fn is_enabled(&self, category: Category) -> bool {
        self.filter.is_enabled(category)
    }

    /// Emit an event if `category` is enabled. The payload is only built
    /// when it will be written.
    pub fn report<'a>(
        &self,
        category: Category,
        operation: &'static str,
        caller: &'a Caller,
        fields: impl FnOnce() -> EventFields<'a>,
    ) -> bool {
        if !self.filter.is_enabled(category) {
            self.filtered.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        self.emit_unfiltered(&EventRecord::new(category, operation, caller, fields()));
        true
    }

    /// Emit `record` if its category is enabled
    pub fn emit(&self, record: &EventRecord<'_>) -> bool {
        if !self.filter.is_enabled(record.category) {
            self.filtered.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        self.emit_unfiltered(record);
        true
    }

    /// Emit `record` regardless of the mask
    pub fn emit_unfiltered(&self, record: &EventRecord<'_>) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
        self.sink.write_record(record);
    }

    pub fn info(&self, message: &str) {
        self.sink.write(Severity::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.warnings.fetch_add(1, Ordering::Relaxed);
        self.sink.write(Severity::Warning, message);
    }

    pub fn stats(&self) -> ReporterStats {
        ReporterStats {
            emitted: self.emitted.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::sink::MemorySink;
    use hookwatch_shared::CategoryMask;

    #[test]
    fn test_report_respects_filter() {
        let sink = Arc::new(MemorySink::new());
        let reporter = Reporter::new(
            CategoryFilter::new(CategoryMask::EMPTY.with(Category::FsRead)),
            sink.clone(),
        );
        let caller = Caller::new(9, "sh");

        assert!(reporter.report(Category::FsRead, "sys_close", &caller, || {
            EventFields::Close { fd: 1 }
        }));
        assert!(!reporter.report(Category::Network, "inet_accept", &caller, || {
            EventFields::Accept
        }));

        let lines = sink.messages(Severity::Info);
        assert_eq!(lines, vec!["sys_close[PID: 9 (sh)]: fd:1".to_string()]);
        assert_eq!(
            reporter.stats(),
            ReporterStats {
                emitted: 1,
                filtered: 1,
                warnings: 0
            }
        );
    }

    #[test]
    fn test_payload_not_built_when_filtered() {
        let reporter = Reporter::new(
            CategoryFilter::new(CategoryMask::EMPTY),
            Arc::new(MemorySink::new()),
        );
        let caller = Caller::new(1, "init");
        reporter.report(Category::Exec, "do_exit", &caller, || {
            panic!("payload built for a filtered event")
        });
    }

    #[test]
    fn test_warn_counts() {
        let sink = Arc::new(MemorySink::new());
        let reporter = Reporter::new(CategoryFilter::new(CategoryMask::EMPTY), sink.clone());
        reporter.warn("capget failed");
        assert_eq!(reporter.stats().warnings, 1);
        assert_eq!(sink.messages(Severity::Warning).len(), 1);
    }
}

//! Bounded, newest-first event log

use std::collections::VecDeque;

use super::types::{now_ms, LogEntry, LogKind};

/// Default number of retained entries
pub const DEFAULT_LOG_CAPACITY: usize = 200;

#[derive(Debug, Clone)]
pub struct EventLog {
    /// Front is newest
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert a timestamped entry at the front, evicting the oldest when full
    pub fn append(&mut self, kind: LogKind, msg: impl Into<String>) {
        self.entries.push_front(LogEntry {
            ts: now_ms(),
            kind,
            msg: msg.into(),
        });
        self.entries.truncate(self.capacity);
    }

    /// Entries newest first
    pub fn list(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_append_is_listed_first() {
        let mut log = EventLog::default();
        log.append(LogKind::Info, "first");
        log.append(LogKind::Error, "second");

        let entries = log.list();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].msg, "second");
        assert_eq!(entries[0].kind, LogKind::Error);
        assert_eq!(entries[1].msg, "first");
    }

    #[test]
    fn test_201st_append_evicts_oldest() {
        let mut log = EventLog::default();
        for i in 0..=DEFAULT_LOG_CAPACITY {
            log.append(LogKind::Info, format!("entry {}", i));
        }

        let entries = log.list();
        assert_eq!(entries.len(), DEFAULT_LOG_CAPACITY);
        assert_eq!(entries[0].msg, "entry 200");
        assert_eq!(entries[DEFAULT_LOG_CAPACITY - 1].msg, "entry 1");
        assert!(entries.iter().all(|e| e.msg != "entry 0"));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut log = EventLog::new(5);
        log.clear();
        assert!(log.is_empty());

        log.append(LogKind::Ok, "ready");
        log.clear();
        log.clear();
        assert!(log.is_empty());
        assert!(log.list().is_empty());
    }

    #[test]
    fn test_list_is_restartable() {
        let mut log = EventLog::new(5);
        log.append(LogKind::Info, "a");
        assert_eq!(log.list(), log.list());
    }

    proptest! {
        #[test]
        fn prop_length_never_exceeds_capacity(capacity in 1usize..50, appends in 0usize..200) {
            let mut log = EventLog::new(capacity);
            for i in 0..appends {
                log.append(LogKind::Info, i.to_string());
                prop_assert!(log.len() <= capacity);
                prop_assert_eq!(log.list()[0].msg.clone(), i.to_string());
            }
            prop_assert_eq!(log.len(), appends.min(capacity));
        }
    }
}

//! The stale-document set.
//!
//! Every insert pushes one entry; only the write-back scheduler takes them
//! out. Entries name a document rather than carrying its data - the
//! scheduler re-resolves each entry against the live collection map at
//! write time, so a durable write always reflects the most recently staged
//! version, and an entry whose document has since been deleted simply
//! resolves to nothing.

use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StaleEntry {
    pub collection: String,
    pub uid: String,
}

/// Concurrency-safe multiset with non-blocking take. Producers (callers
/// inserting documents) and the single scheduler consumer share it; the
/// lock is held only for a push or a pop.
pub(crate) struct StaleSet {
    entries: Mutex<Vec<StaleEntry>>,
}

impl StaleSet {
    pub fn new() -> Self {
        Self { entries: Mutex::new(Vec::new()) }
    }

    pub fn push(&self, entry: StaleEntry) {
        self.entries.lock().push(entry);
    }

    /// Take one entry, if any. Never blocks on an empty set.
    pub fn take(&self) -> Option<StaleEntry> {
        self.entries.lock().pop()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

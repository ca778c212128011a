// src/store/memory.rs
use super::{LogEntry, LogStore, StoreError};

/// In-process log with the same semantics as the file store.
#[derive(Debug, Clone, Default)]
pub struct MemoryLogStore {
    entries: Vec<LogEntry>,
}

impl LogStore for MemoryLogStore {
    fn append(&mut self, entry: LogEntry) -> Result<(), StoreError> {
        self.entries.push(entry);
        Ok(())
    }

    fn load(&self) -> Result<Vec<LogEntry>, StoreError> {
        Ok(self.entries.clone())
    }
}

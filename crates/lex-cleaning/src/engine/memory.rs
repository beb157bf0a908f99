use std::collections::VecDeque;

use chrono::Local;
use serde::Serialize;

use crate::types::{MemoryEntry, OperationMetadata};

/// Bounded history of operation invocations.
///
/// Holds at most `capacity` entries; the oldest entry is evicted first.
#[derive(Debug, Clone, Serialize)]
pub struct AgentMemory {
    entries: VecDeque<MemoryEntry>,
    capacity: usize,
}

impl AgentMemory {
    /// A zero capacity is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(
        &mut self,
        iteration: usize,
        operation: impl Into<String>,
        success: bool,
        message: impl Into<String>,
        metadata: OperationMetadata,
    ) {
        self.push(MemoryEntry {
            iteration,
            operation: operation.into(),
            success,
            message: message.into(),
            metadata,
            timestamp: Local::now().to_rfc3339(),
        });
    }

    pub fn push(&mut self, entry: MemoryEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
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

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &MemoryEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&MemoryEntry> {
        self.entries.back()
    }

    pub fn into_vec(self) -> Vec<MemoryEntry> {
        self.entries.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest_first() {
        let mut memory = AgentMemory::new(3);
        for i in 0..5 {
            memory.record(i, "inspect_data", true, format!("step {i}"), OperationMetadata::new());
        }
        assert_eq!(memory.len(), 3);
        let iterations: Vec<usize> = memory.iter().map(|e| e.iteration).collect();
        assert_eq!(iterations, vec![2, 3, 4]);
        assert_eq!(memory.last().unwrap().message, "step 4");
    }

    #[test]
    fn test_zero_capacity_keeps_one() {
        let mut memory = AgentMemory::new(0);
        memory.record(1, "a", true, "x", OperationMetadata::new());
        memory.record(2, "b", false, "y", OperationMetadata::new());
        assert_eq!(memory.capacity(), 1);
        assert_eq!(memory.into_vec()[0].operation, "b");
    }
}

use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryEntry {
    pub timestamp: f64,
    pub cpu_percent: f64,
}

/// Bounded CPU history, oldest entries evicted first.
#[derive(Debug, Clone)]
pub struct CpuHistory {
    capacity: usize,
    entries: VecDeque<HistoryEntry>,
}

impl CpuHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn append(&mut self, timestamp: f64, cpu_percent: f64) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryEntry {
            timestamp,
            cpu_percent,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.cpu_percent).collect()
    }
}

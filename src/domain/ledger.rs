use std::collections::VecDeque;

use super::detection::DetectionRecord;

/// Ordered history of detections. Insertion order is chronological order.
///
/// With a capacity set the oldest records are evicted first; without one the
/// ledger grows until it is cleared.
#[derive(Debug, Default)]
pub struct DetectionLedger {
    records: VecDeque<DetectionRecord>,
    capacity: Option<usize>,
}

impl DetectionLedger {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            records: VecDeque::new(),
            capacity: capacity.filter(|c| *c > 0),
        }
    }

    pub fn extend<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = DetectionRecord>,
    {
        self.records.extend(records);
        if let Some(cap) = self.capacity {
            while self.records.len() > cap {
                self.records.pop_front();
            }
        }
    }

    /// Empties the ledger and returns how many records were dropped.
    pub fn clear(&mut self) -> usize {
        let n = self.records.len();
        self.records.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_vec(&self) -> Vec<DetectionRecord> {
        self.records.iter().cloned().collect()
    }
}

use parking_lot::Mutex;

use crate::domain::{detection::DetectionRecord, ledger::DetectionLedger};

/// Thread-safe handle to the detection history shared by the processor and
/// the export endpoints. Every method takes the lock once, so an append of N
/// records is never observed half-done.
#[derive(Debug)]
pub struct ResultLedger {
    inner: Mutex<DetectionLedger>,
}

impl ResultLedger {
    pub fn new(capacity: Option<usize>) -> Self {
        Self { inner: Mutex::new(DetectionLedger::new(capacity)) }
    }

    pub fn append(&self, records: Vec<DetectionRecord>) {
        if records.is_empty() {
            return;
        }
        self.inner.lock().extend(records);
    }

    pub fn snapshot(&self) -> Vec<DetectionRecord> {
        self.inner.lock().to_vec()
    }

    pub fn clear(&self) -> usize {
        self.inner.lock().clear()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

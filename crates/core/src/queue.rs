//! Unbounded FIFO of pending change records
//!
//! Written by the classifier thread of a watch session and drained by one
//! or more consumers. There is no capacity bound: if nobody drains the
//! queue it keeps growing.

use crate::record::ChangeRecord;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Thread-safe change queue
#[derive(Default)]
pub struct ChangeQueue {
    records: Mutex<VecDeque<ChangeRecord>>,
    available: Condvar,
}

impl ChangeQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record without any dedup check
    pub fn push(&self, record: ChangeRecord) {
        self.records.lock().push_back(record);
        self.available.notify_one();
    }

    /// Append a record unless one with the same path is already pending
    ///
    /// The scan and the append happen under one lock, so two producers
    /// racing on the same path cannot both get in. Returns `true` when the
    /// record was enqueued.
    pub fn push_unique(&self, record: ChangeRecord) -> bool {
        let mut records = self.records.lock();
        if records.iter().any(|pending| pending.path() == record.path()) {
            return false;
        }
        records.push_back(record);
        drop(records);

        self.available.notify_one();
        true
    }

    /// Pop the oldest pending record
    pub fn pop(&self) -> Option<ChangeRecord> {
        self.records.lock().pop_front()
    }

    /// Pop the oldest record as a `(found, record)` pair
    ///
    /// The record is `ChangeRecord::empty()` when nothing was pending.
    pub fn pop_or_empty(&self) -> (bool, ChangeRecord) {
        match self.pop() {
            Some(record) => (true, record),
            None => (false, ChangeRecord::empty()),
        }
    }

    /// Pop the oldest record, waiting up to `timeout` for one to arrive
    pub fn pop_timeout(&self, timeout: Duration) -> Option<ChangeRecord> {
        let deadline = Instant::now() + timeout;
        let mut records = self.records.lock();

        loop {
            if let Some(record) = records.pop_front() {
                return Some(record);
            }
            if self.available.wait_until(&mut records, deadline).timed_out() {
                return records.pop_front();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Drop every pending record, returning how many were discarded
    pub fn clear(&self) -> usize {
        let mut records = self.records.lock();
        let count = records.len();
        records.clear();
        count
    }

    /// Copy of the pending records, oldest first
    pub fn snapshot(&self) -> Vec<ChangeRecord> {
        self.records.lock().iter().cloned().collect()
    }
}

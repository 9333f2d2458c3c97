//! Per-stream reading history with FIFO eviction.
//!
//! A fixed-capacity `HeapRb` guarded by a mutex:
//! - appends overwrite the oldest reading once the ring is full
//! - snapshots copy the ring under the same lock, so they are never torn
//!
//! Readings stay in arrival order. Arrivals whose embedded timestamp is older
//! than the previous one are counted but not re-sorted.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use contracts::{Reading, StreamKind};
use ringbuf::{traits::*, HeapRb};

/// Counters and occupancy of one buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    pub len: usize,
    pub capacity: usize,
    pub appended: u64,
    pub evicted: u64,
    pub out_of_order: u64,
}

struct BufferState {
    ring: HeapRb<Reading>,
    appended_count: u64,
    evicted_count: u64,
    out_of_order_count: u64,
    last_epoch: Option<f64>,
}

/// Bounded, thread-safe history for one stream
///
/// Every operation holds the lock for a bounded amount of work (at most
/// `capacity` clones for a snapshot), so writers never wait on readers for long.
pub struct ChannelBuffer {
    stream: StreamKind,
    capacity: usize,
    state: Mutex<BufferState>,
}

impl fmt::Debug for ChannelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("ChannelBuffer")
            .field("stream", &self.stream)
            .field("len", &stats.len)
            .field("capacity", &self.capacity)
            .field("evicted", &stats.evicted)
            .finish()
    }
}

impl ChannelBuffer {
    /// Create an empty buffer; a capacity of zero is raised to one
    pub fn new(stream: StreamKind, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            stream,
            capacity,
            state: Mutex::new(BufferState {
                ring: HeapRb::new(capacity),
                appended_count: 0,
                evicted_count: 0,
                out_of_order_count: 0,
                last_epoch: None,
            }),
        }
    }

    /// Append a reading, evicting the oldest one when full
    ///
    /// Returns `true` if a reading was evicted.
    pub fn append(&self, reading: Reading) -> bool {
        let epoch = reading.epoch_secs();
        let mut state = self.lock();

        if let Some(last) = state.last_epoch {
            if epoch < last {
                state.out_of_order_count += 1;
            }
        }
        state.last_epoch = Some(epoch);

        let evicted = state.ring.push_overwrite(reading).is_some();
        state.appended_count += 1;
        if evicted {
            state.evicted_count += 1;
        }
        evicted
    }

    /// Copy of the buffered readings, oldest first
    ///
    /// With `max_count`, only the newest `max_count` readings are returned.
    pub fn snapshot(&self, max_count: Option<usize>) -> Vec<Reading> {
        let state = self.lock();
        let len = state.ring.occupied_len();
        let take = max_count.map_or(len, |max| max.min(len));

        state.ring.iter().skip(len - take).cloned().collect()
    }

    /// Most recently appended reading, `None` if nothing was ever appended
    pub fn latest(&self) -> Option<Reading> {
        self.lock().ring.iter().last().cloned()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.lock().ring.occupied_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lock().ring.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn stream(&self) -> StreamKind {
        self.stream
    }

    pub fn stats(&self) -> BufferStats {
        let state = self.lock();
        BufferStats {
            len: state.ring.occupied_len(),
            capacity: self.capacity,
            appended: state.appended_count,
            evicted: state.evicted_count,
            out_of_order: state.out_of_order_count,
        }
    }

    // A panic while the lock is held cannot leave a half-written ring:
    // `push_overwrite` either stored the reading or did not.
    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

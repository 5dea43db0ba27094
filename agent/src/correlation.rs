//! Entry/exit correlation store
//!
//! Carries a small per-caller value (the descriptor passed to `bind`) from an
//! entry probe to the exit probe of the same call. Each slot packs the caller
//! pid and the value into one `AtomicU64`, so inserts and lookups never take a
//! lock. The store is bounded: when every slot is taken, the slot with the
//! oldest insertion stamp is reused and that pending call loses its
//! correlation.

use std::sync::atomic::{AtomicU64, Ordering};

use hookwatch_shared::Pid;

const EMPTY: u64 = u64::MAX;

fn pack(pid: Pid, value: i32) -> u64 {
    ((pid as u32 as u64) << 32) | value as u32 as u64
}

fn unpack(slot: u64) -> (Pid, i32) {
    ((slot >> 32) as u32 as Pid, slot as u32 as i32)
}

/// Bounded, lock-free map from caller pid to a cached entry value
#[derive(Debug)]
pub struct CorrelationStore {
    slots: Box<[AtomicU64]>,
    stamps: Box<[AtomicU64]>,
    clock: AtomicU64,
    evictions: AtomicU64,
}

impl CorrelationStore {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let slots = (0..capacity)
            .map(|_| AtomicU64::new(EMPTY))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let stamps = (0..capacity)
            .map(|_| AtomicU64::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            slots,
            stamps,
            clock: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of pending entries
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.load(Ordering::Relaxed) != EMPTY)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries dropped to make room for newer ones
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Cache `value` for `pid`, replacing any pending value of the same pid.
    ///
    /// Negative pids are not tracked.
    pub fn insert(&self, pid: Pid, value: i32) {
        if pid < 0 {
            return;
        }
        let packed = pack(pid, value);
        let stamp = self.clock.fetch_add(1, Ordering::Relaxed) + 1;

        for (index, slot) in self.slots.iter().enumerate() {
            let current = slot.load(Ordering::Acquire);
            if current != EMPTY
                && unpack(current).0 == pid
                && slot
                    .compare_exchange(current, packed, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
            {
                self.stamps[index].store(stamp, Ordering::Release);
                return;
            }
        }

        for (index, slot) in self.slots.iter().enumerate() {
            if slot
                .compare_exchange(EMPTY, packed, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                self.stamps[index].store(stamp, Ordering::Release);
                return;
            }
        }

        let index = self.oldest();
        self.stamps[index].store(stamp, Ordering::Release);
        if self.slots[index].swap(packed, Ordering::AcqRel) != EMPTY {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Index of the slot with the smallest insertion stamp
    fn oldest(&self) -> usize {
        self.stamps
            .iter()
            .enumerate()
            .min_by_key(|(_, stamp)| stamp.load(Ordering::Acquire))
            .map_or(0, |(index, _)| index)
    }

    /// Remove and return the value cached for `pid`
    pub fn take(&self, pid: Pid) -> Option<i32> {
        for slot in self.slots.iter() {
            let current = slot.load(Ordering::Acquire);
            if current == EMPTY {
                continue;
            }
            let (owner, value) = unpack(current);
            if owner == pid
                && slot
                    .compare_exchange(current, EMPTY, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
            {
                return Some(value);
            }
        }
        None
    }

    /// Value cached for `pid`, left in place
    pub fn peek(&self, pid: Pid) -> Option<i32> {
        self.slots.iter().find_map(|slot| {
            let current = slot.load(Ordering::Acquire);
            let (owner, value) = unpack(current);
            (current != EMPTY && owner == pid).then_some(value)
        })
    }

    pub fn clear(&self) {
        for slot in self.slots.iter() {
            slot.store(EMPTY, Ordering::Release);
        }
    }
}

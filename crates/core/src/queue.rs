// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded in-memory priority queue, ordered by `(-urgency,
//! arrival_sequence)`. Urgency is negated exactly once at construction;
//! `update_priority` re-derives the key from the new urgency rather than
//! re-negating an already-negated value, which avoids a double-negation
//! bug that's easy to introduce in a naive min-heap-over-negated-key
//! implementation.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use parking_lot::Mutex;

use crate::ticket::Ticket;

/// Entry held in the heap. `key` is `-urgency`; ties break on
/// `arrival_sequence` ascending (oldest first), so `BinaryHeap`'s
/// max-heap pop order needs the `Ord` impl below to invert both fields.
#[derive(Debug, Clone)]
struct HeapEntry {
    key: ordered_float::NotNan,
    arrival_sequence: u64,
    ticket_id: String,
}

/// Thin wrapper around `f64` that is comparable, since the queue never
/// stores `NaN` urgencies (rejected at `Ticket::validate`). Kept local
/// rather than pulling in the `ordered-float` crate for one comparator.
mod ordered_float {
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct NotNan(f64);

    impl NotNan {
        pub fn new(v: f64) -> Self {
            debug_assert!(!v.is_nan());
            Self(v)
        }
    }

    impl Eq for NotNan {}

    impl PartialOrd for NotNan {
        fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
            Some(self.cmp(other))
        }
    }

    impl Ord for NotNan {
        fn cmp(&self, other: &Self) -> std::cmp::Ordering {
            self.0.partial_cmp(&other.0).unwrap_or(std::cmp::Ordering::Equal)
        }
    }
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.arrival_sequence == other.arrival_sequence
    }
}
impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; we want the smallest (key, arrival_sequence)
        // tuple to pop first, so invert the natural comparison.
        other
            .key
            .cmp(&self.key)
            .then_with(|| other.arrival_sequence.cmp(&self.arrival_sequence))
    }
}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Inner {
    heap: BinaryHeap<HeapEntry>,
    index: HashMap<String, Ticket>,
    next_arrival_sequence: u64,
}

/// Bounded in-memory store of pending tickets, ordered by urgency then
/// arrival. All operations are atomic under a single internal mutex.
pub struct PriorityQueue {
    inner: Mutex<Inner>,
}

impl Default for PriorityQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                index: HashMap::new(),
                next_arrival_sequence: 0,
            }),
        }
    }

    pub fn enqueue(&self, ticket: Ticket) {
        let mut inner = self.inner.lock();
        let arrival_sequence = inner.next_arrival_sequence;
        inner.next_arrival_sequence += 1;
        let entry = HeapEntry {
            key: ordered_float::NotNan::new(-ticket.urgency),
            arrival_sequence,
            ticket_id: ticket.id.clone(),
        };
        inner.index.insert(ticket.id.clone(), ticket);
        inner.heap.push(entry);
    }

    /// Pop the highest-urgency ticket, oldest on ties. Lazily discards
    /// stale heap entries left behind by `update_priority` rebuilds.
    pub fn dequeue(&self) -> Option<Ticket> {
        let mut inner = self.inner.lock();
        loop {
            let entry = inner.heap.pop()?;
            if let Some(ticket) = inner.index.remove(&entry.ticket_id) {
                return Some(ticket);
            }
            // Stale tombstone from a priority update; keep popping.
        }
    }

    /// Non-destructive read of the head. Discards stale tombstones (left by
    /// `update_priority`) permanently, then restores the live head entry.
    pub fn peek(&self) -> Option<Ticket> {
        let mut inner = self.inner.lock();
        loop {
            let Some(entry) = inner.heap.pop() else {
                return None;
            };
            if inner.index.contains_key(&entry.ticket_id) {
                let ticket = inner.index.get(&entry.ticket_id).cloned();
                inner.heap.push(entry);
                return ticket;
            }
            // Stale tombstone from a priority update; discard and keep looking.
        }
    }

    pub fn get_by_id(&self, id: &str) -> Option<Ticket> {
        self.inner.lock().index.get(id).cloned()
    }

    /// Rebuild the entry's key in place. The old heap entry becomes a
    /// tombstone, lazily dropped on the next `dequeue`/`peek`.
    pub fn update_priority(&self, id: &str, new_urgency: f64) -> bool {
        let mut inner = self.inner.lock();
        let Some(ticket) = inner.index.get_mut(id) else {
            return false;
        };
        ticket.urgency = new_urgency;
        let ticket_clone = ticket.clone();
        let arrival_sequence = inner.next_arrival_sequence;
        inner.next_arrival_sequence += 1;
        inner.heap.push(HeapEntry {
            key: ordered_float::NotNan::new(-new_urgency),
            arrival_sequence,
            ticket_id: ticket_clone.id,
        });
        true
    }

    pub fn size(&self) -> usize {
        self.inner.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.heap.clear();
        inner.index.clear();
    }

    pub fn get_all(&self) -> Vec<Ticket> {
        self.inner.lock().index.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(id: &str, urgency: f64) -> Ticket {
        let mut ticket = Ticket::new(id, "subject", "description", "cust");
        ticket.urgency = urgency;
        ticket
    }

    #[test]
    fn dequeues_highest_urgency_first() {
        let q = PriorityQueue::new();
        q.enqueue(t("a", 0.2));
        q.enqueue(t("b", 0.9));
        q.enqueue(t("c", 0.5));

        assert_eq!(q.dequeue().unwrap().id, "b");
        assert_eq!(q.dequeue().unwrap().id, "c");
        assert_eq!(q.dequeue().unwrap().id, "a");
        assert!(q.dequeue().is_none());
    }

    #[test]
    fn ties_break_by_arrival_order() {
        let q = PriorityQueue::new();
        q.enqueue(t("first", 0.5));
        q.enqueue(t("second", 0.5));

        assert_eq!(q.dequeue().unwrap().id, "first");
        assert_eq!(q.dequeue().unwrap().id, "second");
    }

    #[test]
    fn update_priority_reorders_by_new_urgency_old_arrival() {
        let q = PriorityQueue::new();
        q.enqueue(t("a", 0.1));
        q.enqueue(t("b", 0.2));

        assert!(q.update_priority("a", 0.9));
        assert_eq!(q.dequeue().unwrap().id, "a");
        assert_eq!(q.dequeue().unwrap().id, "b");
    }

    #[test]
    fn update_priority_missing_id_returns_false() {
        let q = PriorityQueue::new();
        assert!(!q.update_priority("nope", 0.5));
    }

    #[test]
    fn size_tracks_index_and_clear_empties_both() {
        let q = PriorityQueue::new();
        q.enqueue(t("a", 0.1));
        q.enqueue(t("b", 0.2));
        assert_eq!(q.size(), 2);
        q.clear();
        assert_eq!(q.size(), 0);
        assert!(q.is_empty());
        assert!(q.get_all().is_empty());
    }

    #[test]
    fn get_by_id_and_get_all() {
        let q = PriorityQueue::new();
        q.enqueue(t("a", 0.3));
        assert_eq!(q.get_by_id("a").unwrap().urgency, 0.3);
        assert!(q.get_by_id("missing").is_none());
        assert_eq!(q.get_all().len(), 1);
    }
}

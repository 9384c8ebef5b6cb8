//! Identity-addressable event log
//!
//! Append-only between resets. Only the coordinator's delivery thread
//! appends; readers get cloned snapshots and never observe a partial append.

use crate::capture::{Event, EventId, IdentifiedEvent};
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug)]
struct LogInner {
    epoch: u32,
    next_sequence: u64,
    events: Vec<IdentifiedEvent>,
    retain: bool,
}

/// Ordered log of identified events.
#[derive(Debug)]
pub struct EventLog {
    inner: RwLock<LogInner>,
}

impl EventLog {
    /// `retain = false` still assigns identities but keeps nothing.
    pub fn new(retain: bool) -> Self {
        Self {
            inner: RwLock::new(LogInner {
                epoch: 0,
                next_sequence: 0,
                events: Vec::new(),
                retain,
            }),
        }
    }

    /// Assign the next identity and append.
    pub(crate) fn append(&self, event: Arc<Event>) -> IdentifiedEvent {
        let mut inner = self.inner.write();
        let id = EventId {
            epoch: inner.epoch,
            sequence: inner.next_sequence,
        };
        inner.next_sequence += 1;

        let identified = IdentifiedEvent::new(id, event);
        if inner.retain {
            inner.events.push(identified.clone());
        }
        identified
    }

    /// Drop every event and invalidate every identity issued so far.
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        inner.epoch = inner.epoch.wrapping_add(1);
        inner.next_sequence = 0;
        inner.events.clear();
    }

    /// Snapshot of the whole log in append order
    pub fn events(&self) -> Vec<IdentifiedEvent> {
        self.inner.read().events.clone()
    }

    pub fn get(&self, id: EventId) -> Option<IdentifiedEvent> {
        let inner = self.inner.read();
        if id.epoch != inner.epoch {
            return None;
        }
        inner
            .events
            .binary_search_by_key(&id.sequence, |event| event.id.sequence)
            .ok()
            .map(|index| inner.events[index].clone())
    }

    /// Events appended after `id`, or the whole log if `id` is from an
    /// earlier epoch.
    pub fn events_after(&self, id: EventId) -> Vec<IdentifiedEvent> {
        let inner = self.inner.read();
        if id.epoch != inner.epoch {
            return inner.events.clone();
        }
        let start = inner
            .events
            .partition_point(|event| event.id.sequence <= id.sequence);
        inner.events[start..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.inner.read().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().events.is_empty()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(true)
    }
}

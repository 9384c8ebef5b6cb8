//! Lock-Free Delivery Ring Buffer
//!
//! SPSC (Single Producer, Single Consumer) hand-off between the capture
//! thread and the coordinator's delivery thread.
//!
//! - Producer (capture callback): never blocks; a full buffer refuses the
//!   event and counts a drop
//! - Consumer (delivery thread): drains in arrival order and appends to the log
//!
//! The core ring buffer is `rtrb`; this module adds ordering sequence numbers
//! and shared statistics.

use super::event::Event;
use rtrb::{Consumer, Producer, RingBuffer};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Default ring buffer capacity
pub const DEFAULT_CAPACITY: usize = 8192;

/// One decoded event in flight between the capture and delivery threads
#[derive(Debug)]
pub struct EventSlot {
    pub event: Arc<Event>,
    /// Arrival order within the ring buffer
    pub sequence: u64,
}

/// Ring buffer for decoded events
pub struct EventRingBuffer {
    producer: Producer<EventSlot>,
    consumer: Consumer<EventSlot>,
    stats: Arc<RingBufferStats>,
    capacity: usize,
}

/// Ring buffer statistics for monitoring
#[derive(Debug, Default)]
pub struct RingBufferStats {
    /// Total events pushed
    pub events_pushed: AtomicU64,
    /// Events dropped due to full buffer
    pub events_dropped: AtomicU64,
    /// Events successfully consumed
    pub events_consumed: AtomicU64,
    /// Peak buffer occupancy
    pub peak_occupancy: AtomicU64,
}

impl RingBufferStats {
    pub fn snapshot(&self) -> DeliveryStats {
        DeliveryStats {
            pushed: self.events_pushed.load(Ordering::Relaxed),
            dropped: self.events_dropped.load(Ordering::Relaxed),
            consumed: self.events_consumed.load(Ordering::Relaxed),
            peak_occupancy: self.peak_occupancy.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`RingBufferStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryStats {
    pub pushed: u64,
    pub dropped: u64,
    pub consumed: u64,
    pub peak_occupancy: u64,
}

impl EventRingBuffer {
    /// Create a new ring buffer with default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new ring buffer holding up to `capacity` events
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (producer, consumer) = RingBuffer::new(capacity);

        Self {
            producer,
            consumer,
            stats: Arc::new(RingBufferStats::default()),
            capacity,
        }
    }

    /// Split the ring buffer into producer and consumer halves
    pub fn split(self) -> (EventProducer, EventConsumer) {
        (
            EventProducer {
                inner: self.producer,
                sequence: 0,
                stats: Arc::clone(&self.stats),
                capacity: self.capacity,
            },
            EventConsumer {
                inner: self.consumer,
                stats: self.stats,
            },
        )
    }

    /// Get statistics
    pub fn stats(&self) -> Arc<RingBufferStats> {
        Arc::clone(&self.stats)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventRingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer half of the ring buffer (capture thread)
pub struct EventProducer {
    inner: Producer<EventSlot>,
    sequence: u64,
    stats: Arc<RingBufferStats>,
    capacity: usize,
}

impl EventProducer {
    /// Push an event into the ring buffer.
    ///
    /// Lock-free and never blocks. If the buffer is full the event is
    /// dropped and the drop counter is incremented.
    ///
    /// Returns true if the event was pushed, false if dropped.
    #[inline]
    pub fn push(&mut self, event: Arc<Event>) -> bool {
        let slot = EventSlot {
            event,
            sequence: self.sequence,
        };

        match self.inner.push(slot) {
            Ok(()) => {
                self.sequence += 1;
                self.stats.events_pushed.fetch_add(1, Ordering::Relaxed);

                let occupied = (self.capacity - self.inner.slots()) as u64;
                self.stats
                    .peak_occupancy
                    .fetch_max(occupied, Ordering::Relaxed);
                true
            }
            Err(_) => {
                self.stats.events_dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }
}

/// Consumer half of the ring buffer (delivery thread)
pub struct EventConsumer {
    inner: Consumer<EventSlot>,
    stats: Arc<RingBufferStats>,
}

impl EventConsumer {
    /// Pop the oldest event, if any
    #[inline]
    pub fn pop(&mut self) -> Option<EventSlot> {
        match self.inner.pop() {
            Ok(slot) => {
                self.stats.events_consumed.fetch_add(1, Ordering::Relaxed);
                Some(slot)
            }
            Err(_) => None,
        }
    }
}

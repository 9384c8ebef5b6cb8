//! Trailing-edge throttling
//!
//! Limits how often decoded events leave the capture thread. With a zero
//! interval every event passes straight through. Otherwise the first event
//! after an idle period opens a window of length `interval`; every event
//! received inside the window replaces the pending one, and only the last one
//! is released when the window closes.
//!
//! The throttler is owned by the capture thread and needs no locking. The
//! caller supplies the clock so behaviour is deterministic under test.

use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct Throttler<T> {
    interval: Duration,
    window_end: Option<Instant>,
    pending: Option<T>,
}

impl<T> Throttler<T> {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            window_end: None,
            pending: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Hand in one item received at `now`.
    ///
    /// Returns an item to forward immediately: the item itself when
    /// throttling is off, or the previous window's pending item when that
    /// window expired without being polled.
    pub fn offer(&mut self, item: T, now: Instant) -> Option<T> {
        if self.interval.is_zero() {
            return Some(item);
        }

        match self.window_end {
            Some(end) if now < end => {
                self.pending = Some(item);
                None
            }
            Some(_) => {
                let released = self.pending.take();
                self.open_window(item, now);
                released
            }
            None => {
                self.open_window(item, now);
                None
            }
        }
    }

    /// Release the pending item if its window has closed by `now`.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match self.window_end {
            Some(end) if now >= end => {
                self.window_end = None;
                self.pending.take()
            }
            _ => None,
        }
    }

    /// Close the current window early and release its pending item.
    pub fn flush(&mut self) -> Option<T> {
        self.window_end = None;
        self.pending.take()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the open window closes, if one is open
    pub fn deadline(&self) -> Option<Instant> {
        self.window_end
    }

    fn open_window(&mut self, item: T, now: Instant) {
        self.window_end = Some(now + self.interval);
        self.pending = Some(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_zero_interval_passes_everything_through() {
        let mut throttler = Throttler::new(Duration::ZERO);
        let t0 = Instant::now();

        let forwarded: Vec<_> = (0..5).filter_map(|i| throttler.offer(i, t0)).collect();
        assert_eq!(forwarded, vec![0, 1, 2, 3, 4]);
        assert!(!throttler.has_pending());
        assert!(throttler.poll(t0 + ms(1000)).is_none());
    }

    #[test]
    fn test_burst_releases_last_item_only() {
        let mut throttler = Throttler::new(ms(200));
        let t0 = Instant::now();

        for i in 0..5u64 {
            assert!(throttler.offer(i, t0 + ms(i * 20)).is_none());
        }
        assert!(throttler.poll(t0 + ms(199)).is_none());
        assert_eq!(throttler.poll(t0 + ms(200)), Some(4));
        assert!(throttler.poll(t0 + ms(400)).is_none());
    }

    #[test]
    fn test_never_leading_edge() {
        let mut throttler = Throttler::new(ms(100));
        let t0 = Instant::now();

        assert!(throttler.offer("first", t0).is_none());
        assert!(throttler.offer("last", t0 + ms(50)).is_none());
        assert_eq!(throttler.poll(t0 + ms(100)), Some("last"));
    }

    #[test]
    fn test_expired_window_released_on_next_offer() {
        let mut throttler = Throttler::new(ms(100));
        let t0 = Instant::now();

        throttler.offer(1, t0);
        throttler.offer(2, t0 + ms(10));
        // No poll happened; the next offer closes the old window
        assert_eq!(throttler.offer(3, t0 + ms(150)), Some(2));
        assert_eq!(throttler.deadline(), Some(t0 + ms(250)));
        assert_eq!(throttler.poll(t0 + ms(250)), Some(3));
    }

    #[test]
    fn test_empty_window_forwards_nothing() {
        let mut throttler: Throttler<u32> = Throttler::new(ms(100));
        let t0 = Instant::now();
        assert!(throttler.poll(t0).is_none());
        assert!(throttler.poll(t0 + ms(500)).is_none());
        assert!(throttler.flush().is_none());
    }

    #[test]
    fn test_at_most_one_per_window() {
        let mut throttler = Throttler::new(ms(50));
        let t0 = Instant::now();
        let mut released = Vec::new();

        // One event per millisecond for 300ms, polled every millisecond
        for i in 0..300u64 {
            let now = t0 + ms(i);
            released.extend(throttler.poll(now));
            released.extend(throttler.offer(i, now));
        }
        released.extend(throttler.flush());

        assert_eq!(released, vec![49, 99, 149, 199, 249, 299]);
    }

    #[test]
    fn test_flush_releases_pending() {
        let mut throttler = Throttler::new(ms(500));
        let t0 = Instant::now();
        throttler.offer('a', t0);
        throttler.offer('b', t0 + ms(1));

        assert_eq!(throttler.flush(), Some('b'));
        assert!(throttler.deadline().is_none());
        assert!(throttler.flush().is_none());
    }
}

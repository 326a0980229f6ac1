//! Monotonic clock and repeating wake-up scheduler.
//!
//! Engines never own OS timers. They register repeating wake-ups here, keyed by
//! entity id, and a driver (or a test) advances the clock and drains whatever
//! is due. The handle table is the single source of truth for which keys are
//! live: cancelling a key invalidates every heap entry queued for it.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Source of monotonic time for engines.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Real monotonic clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn advance_secs(&self, secs: u64) {
        self.advance(Duration::from_secs(secs));
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Clone, Copy)]
struct Handle {
    generation: u64,
    period: Duration,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct WakeUp<K: Ord> {
    deadline: Instant,
    seq: u64,
    key: K,
    generation: u64,
}

/// Min-heap of repeating wake-ups with at most one live stream per key.
pub struct Scheduler<K: Ord + Clone + Hash + Eq> {
    heap: BinaryHeap<Reverse<WakeUp<K>>>,
    handles: HashMap<K, Handle>,
    next_generation: u64,
    next_seq: u64,
}

impl<K: Ord + Clone + Hash + Eq> Scheduler<K> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            handles: HashMap::new(),
            next_generation: 0,
            next_seq: 0,
        }
    }

    /// Arm a repeating wake-up for `key`, first firing at `now + period`.
    ///
    /// Any stream already registered for the key is invalidated, so calling
    /// this twice never produces two interleaved streams.
    pub fn schedule_repeating(&mut self, key: K, now: Instant, period: Duration) {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.handles
            .insert(key.clone(), Handle { generation, period });
        self.push(key, now + period, generation);
    }

    /// Drop the live stream for `key`. Returns whether one existed.
    pub fn cancel(&mut self, key: &K) -> bool {
        self.handles.remove(key).is_some()
    }

    pub fn is_scheduled(&self, key: &K) -> bool {
        self.handles.contains_key(key)
    }

    /// Number of live streams.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Earliest live deadline, if any.
    pub fn next_deadline(&mut self) -> Option<Instant> {
        self.discard_stale();
        self.heap.peek().map(|Reverse(w)| w.deadline)
    }

    /// Pop the earliest live wake-up due at or before `now` and re-arm it one
    /// period after its own deadline.
    pub fn pop_due(&mut self, now: Instant) -> Option<K> {
        self.discard_stale();

        let due = matches!(self.heap.peek(), Some(Reverse(w)) if w.deadline <= now);
        if !due {
            return None;
        }

        let Reverse(wake) = self.heap.pop()?;
        let handle = *self.handles.get(&wake.key)?;
        self.push(wake.key.clone(), wake.deadline + handle.period, wake.generation);
        Some(wake.key)
    }

    fn push(&mut self, key: K, deadline: Instant, generation: u64) {
        self.next_seq += 1;
        self.heap.push(Reverse(WakeUp {
            deadline,
            seq: self.next_seq,
            key,
            generation,
        }));
    }

    fn discard_stale(&mut self) {
        while let Some(Reverse(top)) = self.heap.peek() {
            let live = self
                .handles
                .get(&top.key)
                .is_some_and(|h| h.generation == top.generation);
            if live {
                break;
            }
            self.heap.pop();
        }
    }
}

impl<K: Ord + Clone + Hash + Eq> Default for Scheduler<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone + Hash + Eq + fmt::Debug> fmt::Debug for Scheduler<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("live", &self.handles.keys().collect::<Vec<_>>())
            .field("queued", &self.heap.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    fn drain(s: &mut Scheduler<&'static str>, now: Instant) -> Vec<&'static str> {
        let mut fired = Vec::new();
        while let Some(k) = s.pop_due(now) {
            fired.push(k);
        }
        fired
    }

    #[test]
    fn test_nothing_due_before_first_period() {
        let clock = ManualClock::new();
        let mut s = Scheduler::new();
        s.schedule_repeating("a", clock.now(), SECOND);

        clock.advance(Duration::from_millis(999));
        assert!(s.pop_due(clock.now()).is_none());

        clock.advance(Duration::from_millis(1));
        assert_eq!(s.pop_due(clock.now()), Some("a"));
    }

    #[test]
    fn test_repeating_fires_once_per_period() {
        let clock = ManualClock::new();
        let mut s = Scheduler::new();
        s.schedule_repeating("a", clock.now(), SECOND);

        clock.advance_secs(5);
        assert_eq!(drain(&mut s, clock.now()).len(), 5);
        assert!(s.pop_due(clock.now()).is_none());
    }

    #[test]
    fn test_reschedule_replaces_stream() {
        let clock = ManualClock::new();
        let mut s = Scheduler::new();
        s.schedule_repeating("a", clock.now(), SECOND);
        s.schedule_repeating("a", clock.now(), SECOND);

        clock.advance_secs(1);
        assert_eq!(drain(&mut s, clock.now()), vec!["a"]);
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_cancel_stops_wakeups() {
        let clock = ManualClock::new();
        let mut s = Scheduler::new();
        s.schedule_repeating("a", clock.now(), SECOND);

        assert!(s.cancel(&"a"));
        assert!(!s.cancel(&"a"));
        clock.advance_secs(3);
        assert!(drain(&mut s, clock.now()).is_empty());
        assert!(s.next_deadline().is_none());
    }

    #[test]
    fn test_interleaves_keys_by_deadline() {
        let clock = ManualClock::new();
        let mut s = Scheduler::new();
        s.schedule_repeating("a", clock.now(), SECOND);
        clock.advance(Duration::from_millis(500));
        s.schedule_repeating("b", clock.now(), SECOND);

        clock.advance(Duration::from_millis(1600));
        assert_eq!(drain(&mut s, clock.now()), vec!["a", "b", "a"]);
    }

    #[test]
    fn test_next_deadline() {
        let clock = ManualClock::new();
        let start = clock.now();
        let mut s = Scheduler::new();
        s.schedule_repeating("a", start, Duration::from_secs(2));
        assert_eq!(s.next_deadline(), Some(start + Duration::from_secs(2)));
    }
}

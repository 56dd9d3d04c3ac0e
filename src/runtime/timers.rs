/// Per-hub timer queue
///
/// Stands in for main-loop timeouts: a component schedules a token, and the
/// hub calls `on_timer` with it once the deadline passes.
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

struct TimerEntry {
    component: String,
    token: u64,
}

#[derive(Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Reverse<(Instant, TimerId)>>,
    entries: HashMap<TimerId, TimerEntry>,
    next_id: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, component: &str, after: Duration, token: u64) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.heap.push(Reverse((Instant::now() + after, id)));
        self.entries.insert(
            id,
            TimerEntry {
                component: component.to_string(),
                token,
            },
        );
        id
    }

    /// Cancel a timer; cancelled entries are skipped lazily
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Drop every timer owned by a component
    pub fn cancel_for(&mut self, component: &str) {
        self.entries.retain(|_, entry| entry.component != component);
    }

    pub fn next_deadline(&mut self) -> Option<Instant> {
        while let Some(Reverse((deadline, id))) = self.heap.peek() {
            if self.entries.contains_key(id) {
                return Some(*deadline);
            }
            self.heap.pop();
        }
        None
    }

    /// Remove and return `(component, token)` for every timer due at `now`
    pub fn pop_due(&mut self, now: Instant) -> Vec<(String, u64)> {
        let mut due = Vec::new();
        while let Some(Reverse((deadline, id))) = self.heap.peek().copied() {
            if deadline > now {
                break;
            }
            self.heap.pop();
            if let Some(entry) = self.entries.remove(&id) {
                due.push((entry.component, entry.token));
            }
        }
        due
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timers_fire_in_deadline_order() {
        let mut timers = TimerQueue::new();
        timers.schedule("b", Duration::from_millis(20), 2);
        timers.schedule("a", Duration::from_millis(10), 1);

        let due = timers.pop_due(Instant::now() + Duration::from_secs(1));
        assert_eq!(due, vec![("a".to_string(), 1), ("b".to_string(), 2)]);
        assert!(timers.is_empty());
    }

    #[test]
    fn test_cancelled_timer_does_not_fire() {
        let mut timers = TimerQueue::new();
        let id = timers.schedule("a", Duration::from_millis(0), 1);
        timers.schedule("b", Duration::from_millis(50), 2);

        assert!(timers.cancel(id));
        assert!(!timers.cancel(id));
        assert!(timers.next_deadline().is_some());
        assert!(timers.pop_due(Instant::now()).is_empty());
    }

    #[test]
    fn test_cancel_for_component() {
        let mut timers = TimerQueue::new();
        timers.schedule("a", Duration::from_millis(0), 1);
        timers.schedule("a", Duration::from_millis(0), 2);
        timers.schedule("b", Duration::from_millis(0), 3);

        timers.cancel_for("a");
        assert_eq!(timers.len(), 1);
        let due = timers.pop_due(Instant::now() + Duration::from_millis(1));
        assert_eq!(due, vec![("b".to_string(), 3)]);
        assert_eq!(timers.next_deadline(), None);
    }
}

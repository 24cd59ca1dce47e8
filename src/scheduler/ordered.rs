//! Blocking priority queue shared by the dispatchers.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Condvar, Mutex};

use super::priority::{Priority, PriorityQueue};

/// [`PriorityQueue`] behind a mutex with a condvar for blocking takes.
pub struct OrderedQueue<T> {
    heap: Mutex<PriorityQueue<T>>,
    available: Condvar,
}

impl<T> OrderedQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(PriorityQueue::new()),
            available: Condvar::new(),
        }
    }

    pub fn push(&self, item: T, priority: Priority, sequence: u64) {
        self.heap.lock().push(item, priority, sequence);
        self.available.notify_one();
    }

    /// Block until an item is available or `quit` is raised.
    ///
    /// Returns `None` only when `quit` is set. Wakeups without an item and
    /// without `quit` go back to waiting.
    pub fn take(&self, quit: &AtomicBool) -> Option<T> {
        let mut heap = self.heap.lock();
        loop {
            if quit.load(Ordering::Acquire) {
                return None;
            }
            if let Some(item) = heap.pop() {
                return Some(item);
            }
            self.available.wait(&mut heap);
        }
    }

    pub fn try_take(&self) -> Option<T> {
        self.heap.lock().pop()
    }

    /// Wake every blocked taker so it re-checks its quit flag.
    pub fn interrupt(&self) {
        let _guard = self.heap.lock();
        self.available.notify_all();
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.lock().is_empty()
    }
}

impl<T> Default for OrderedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_take_returns_in_order() {
        let q = OrderedQueue::new();
        q.push("low", Priority::Low, 0);
        q.push("high", Priority::High, 1);
        let quit = AtomicBool::new(false);
        assert_eq!(q.take(&quit), Some("high"));
        assert_eq!(q.take(&quit), Some("low"));
        assert!(q.is_empty());
    }

    #[test]
    fn test_quit_wins_over_items() {
        let q = OrderedQueue::new();
        q.push(1, Priority::Normal, 0);
        let quit = AtomicBool::new(true);
        assert_eq!(q.take(&quit), None);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_blocked_take_wakes_on_push() {
        let q = Arc::new(OrderedQueue::new());
        let quit = Arc::new(AtomicBool::new(false));
        let (q2, quit2) = (q.clone(), quit.clone());
        let taker = thread::spawn(move || q2.take(&quit2));
        thread::sleep(Duration::from_millis(20));
        q.push(42, Priority::Normal, 0);
        assert_eq!(taker.join().unwrap(), Some(42));
    }

    #[test]
    fn test_interrupt_without_quit_keeps_waiting() {
        let q = Arc::new(OrderedQueue::<u32>::new());
        let quit = Arc::new(AtomicBool::new(false));
        let (q2, quit2) = (q.clone(), quit.clone());
        let taker = thread::spawn(move || q2.take(&quit2));

        thread::sleep(Duration::from_millis(20));
        q.interrupt();
        thread::sleep(Duration::from_millis(20));
        assert!(!taker.is_finished());

        quit.store(true, Ordering::Release);
        q.interrupt();
        assert_eq!(taker.join().unwrap(), None);
    }
}

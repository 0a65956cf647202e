//! Double-buffered queue between the network receive task and the tick.
//!
//! # Overview
//!
//! - [`Pusher`] - write end, cloneable, held by the receive task
//! - [`SwitchQueue`] - read end, owned by the single consumer (the session)
//!
//! The producer appends to a shared *back* buffer under a short mutex.  The
//! consumer drains a private *front* buffer without any lock, and only takes
//! the mutex once per batch in [`SwitchQueue::switch`] to exchange the two
//! buffers.  The exchange is a `mem::swap` of two `VecDeque` headers, so the
//! critical section is O(1) no matter how many items were pushed.
//!
//! # Ordering
//!
//! Items come out in push order as long as the consumer drains the front
//! before switching.  `switch` on a non-empty front is a no-op, so calling it
//! early can neither reorder nor drop anything.
//!
//! ```
//! use kcp_session::switch_queue;
//!
//! let (pusher, mut queue) = switch_queue::channel::<u32>(16);
//! pusher.push(1);
//! pusher.push(2);
//!
//! queue.switch();
//! assert_eq!(queue.pop(), Some(1));
//! assert_eq!(queue.pop(), Some(2));
//! assert!(queue.is_empty());
//! ```

use std::collections::VecDeque;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Create a connected `(Pusher, SwitchQueue)` pair.
///
/// `capacity` pre-sizes both buffers; they still grow on demand.
pub fn channel<T>(capacity: usize) -> (Pusher<T>, SwitchQueue<T>) {
    let back = Arc::new(Mutex::new(VecDeque::with_capacity(capacity)));
    let pusher = Pusher { back: Arc::clone(&back) };
    let queue = SwitchQueue { front: VecDeque::with_capacity(capacity), back };
    (pusher, queue)
}

/// Lock the back buffer.
///
/// A panic while holding the lock can only happen inside `VecDeque` itself,
/// which leaves the deque consistent, so a poisoned lock is simply reused.
fn lock<T>(back: &Mutex<VecDeque<T>>) -> MutexGuard<'_, VecDeque<T>> {
    back.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Write end of a switch queue.
pub struct Pusher<T> {
    back: Arc<Mutex<VecDeque<T>>>,
}

impl<T> Clone for Pusher<T> {
    fn clone(&self) -> Self {
        Self { back: Arc::clone(&self.back) }
    }
}

impl<T> Pusher<T> {
    /// Append `item` to the back buffer.
    ///
    /// Never waits on the consumer beyond the append itself.
    pub fn push(&self, item: T) {
        lock(&self.back).push_back(item);
    }
}

/// Read end of a switch queue.
pub struct SwitchQueue<T> {
    front: VecDeque<T>,
    back: Arc<Mutex<VecDeque<T>>>,
}

impl<T> SwitchQueue<T> {
    /// Make everything pushed so far visible to [`pop`](Self::pop).
    ///
    /// No-op while the front buffer still holds items, and when nothing has
    /// been pushed since the last switch.
    pub fn switch(&mut self) {
        if !self.front.is_empty() {
            return;
        }
        let mut back = lock(&self.back);
        if back.is_empty() {
            return;
        }
        mem::swap(&mut self.front, &mut *back);
    }

    /// Take the oldest item from the front buffer.
    pub fn pop(&mut self) -> Option<T> {
        self.front.pop_front()
    }

    /// Whether the front buffer is drained.
    ///
    /// Items pushed since the last switch are not counted.
    pub fn is_empty(&self) -> bool {
        self.front.is_empty()
    }

    /// Number of items waiting in the front buffer.
    pub fn len(&self) -> usize {
        self.front.len()
    }

    /// Drop everything in both buffers.
    pub fn clear(&mut self) {
        self.front.clear();
        lock(&self.back).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn items_invisible_until_switch() {
        let (pusher, mut queue) = channel::<u8>(4);
        pusher.push(7);
        assert!(queue.is_empty());
        assert_eq!(queue.pop(), None);

        queue.switch();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop(), Some(7));
    }

    #[test]
    fn pops_in_push_order() {
        let (pusher, mut queue) = channel(4);
        for i in 0..10 {
            pusher.push(i);
        }
        queue.switch();
        let drained: Vec<i32> = std::iter::from_fn(|| queue.pop()).collect();
        assert_eq!(drained, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn switch_with_undrained_front_is_noop() {
        let (pusher, mut queue) = channel(4);
        pusher.push("a");
        pusher.push("b");
        queue.switch();
        assert_eq!(queue.pop(), Some("a"));

        pusher.push("c");
        queue.switch();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop(), Some("b"));

        queue.switch();
        assert_eq!(queue.pop(), Some("c"));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn switch_on_empty_back_keeps_front_empty() {
        let (_pusher, mut queue) = channel::<u8>(4);
        queue.switch();
        assert!(queue.is_empty());
    }

    #[test]
    fn clear_empties_both_buffers() {
        let (pusher, mut queue) = channel(4);
        pusher.push(1);
        queue.switch();
        pusher.push(2);

        queue.clear();
        assert!(queue.is_empty());
        queue.switch();
        assert!(queue.is_empty());
    }

    #[test]
    fn concurrent_producer_preserves_order() {
        const N: u32 = 10_000;
        let (pusher, mut queue) = channel(128);

        let producer = thread::spawn(move || {
            for i in 0..N {
                pusher.push(i);
            }
        });

        let mut received = Vec::with_capacity(N as usize);
        while received.len() < N as usize {
            queue.switch();
            while let Some(v) = queue.pop() {
                received.push(v);
            }
            thread::yield_now();
        }
        producer.join().unwrap();

        assert_eq!(received, (0..N).collect::<Vec<_>>());
    }
}

//! Fixed-capacity blocking FIFO, used to hand ready client descriptors from
//! the dispatcher to the worker pool.
//!
//! Modeled on `bounded_buffer.c` in the reference implementation: a
//! `VecDeque` behind one mutex and two condvars (`not_full`, `not_empty`).
//! `push` blocks while the queue is at capacity; `pop` blocks while it is
//! empty.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

pub struct BoundedQueue<T> {
    capacity: usize,
    items: Mutex<VecDeque<T>>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "bounded queue capacity must be nonzero");
        BoundedQueue {
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    pub fn push(&self, value: T) {
        let mut items = self.items.lock().unwrap();
        while items.len() == self.capacity {
            items = self.not_full.wait(items).unwrap();
        }
        items.push_back(value);
        if items.len() == 1 {
            self.not_empty.notify_all();
        }
    }

    pub fn pop(&self) -> T {
        let mut items = self.items.lock().unwrap();
        while items.is_empty() {
            items = self.not_empty.wait(items).unwrap();
        }
        let was_full = items.len() == self.capacity;
        let value = items.pop_front().expect("checked nonempty above");
        if was_full {
            self.not_full.notify_all();
        }
        value
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn fifo_order() {
        let q = BoundedQueue::new(4);
        q.push(1);
        q.push(2);
        q.push(3);
        assert_eq!(q.pop(), 1);
        assert_eq!(q.pop(), 2);
        assert_eq!(q.pop(), 3);
    }

    #[test]
    fn blocks_on_full_until_consumer_drains() {
        let q = Arc::new(BoundedQueue::new(2));
        q.push(1);
        q.push(2);

        let q2 = q.clone();
        let pushed_third = Arc::new(AtomicBool::new(false));
        let pushed_third2 = pushed_third.clone();
        let producer = thread::spawn(move || {
            q2.push(3);
            pushed_third2.store(true, Ordering::SeqCst);
        });

        thread::sleep(Duration::from_millis(50));
        assert!(!pushed_third.load(Ordering::SeqCst));

        assert_eq!(q.pop(), 1);
        producer.join().unwrap();
        assert!(pushed_third.load(Ordering::SeqCst));
        assert_eq!(q.pop(), 2);
        assert_eq!(q.pop(), 3);
    }

    #[test]
    fn blocks_on_empty_until_producer_pushes() {
        let q = Arc::new(BoundedQueue::new(4));
        let q2 = q.clone();
        let handle = thread::spawn(move || q2.pop());
        thread::sleep(Duration::from_millis(30));
        q.push(42);
        assert_eq!(handle.join().unwrap(), 42);
    }
}

//! Writer-preferring reader/writer lock.
//!
//! Built directly from a mutex and a condvar rather than on top of
//! `std::sync::RwLock`, because the fairness guarantee required here — a
//! waiting writer blocks new readers — is not something the standard
//! library's lock promises. The struct layout (`readers` count, `writer`
//! flag, one shared condvar) mirrors `rw_lock_t` in the reference
//! implementation almost field for field.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex};

struct State {
    readers: usize,
    writer: bool,
}

pub struct RwLock<T> {
    state: Mutex<State>,
    cond: Condvar,
    data: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for RwLock<T> {}
unsafe impl<T: Send> Sync for RwLock<T> {}

impl<T> RwLock<T> {
    pub fn new(value: T) -> Self {
        RwLock {
            state: Mutex::new(State {
                readers: 0,
                writer: false,
            }),
            cond: Condvar::new(),
            data: UnsafeCell::new(value),
        }
    }

    /// Acquires the lock for reading. Blocks while a writer holds, or is
    /// waiting to hold, the lock.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        let mut state = self.state.lock().unwrap();
        while state.writer {
            state = self.cond.wait(state).unwrap();
        }
        state.readers += 1;
        RwLockReadGuard { lock: self }
    }

    /// Acquires the lock for writing. Claims priority over new readers the
    /// instant it starts waiting, then drains any readers already in
    /// progress before proceeding — this ordering is what gives writer
    /// preference.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        let mut state = self.state.lock().unwrap();
        while state.writer {
            state = self.cond.wait(state).unwrap();
        }
        state.writer = true;
        while state.readers > 0 {
            state = self.cond.wait(state).unwrap();
        }
        RwLockWriteGuard { lock: self }
    }

    fn unlock_read(&self) {
        let mut state = self.state.lock().unwrap();
        state.readers -= 1;
        if state.readers == 0 {
            self.cond.notify_all();
        }
    }

    fn unlock_write(&self) {
        let mut state = self.state.lock().unwrap();
        state.writer = false;
        self.cond.notify_all();
    }
}

pub struct RwLockReadGuard<'a, T> {
    lock: &'a RwLock<T>,
}

impl<'a, T> Deref for RwLockReadGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T> Drop for RwLockReadGuard<'a, T> {
    fn drop(&mut self) {
        self.lock.unlock_read();
    }
}

pub struct RwLockWriteGuard<'a, T> {
    lock: &'a RwLock<T>,
}

impl<'a, T> Deref for RwLockWriteGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T> DerefMut for RwLockWriteGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<'a, T> Drop for RwLockWriteGuard<'a, T> {
    fn drop(&mut self) {
        self.lock.unlock_write();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn concurrent_readers() {
        let lock = Arc::new(RwLock::new(0usize));
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let lock = lock.clone();
            let active = active.clone();
            let max_seen = max_seen.clone();
            handles.push(thread::spawn(move || {
                let _g = lock.read();
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(30));
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert!(max_seen.load(Ordering::SeqCst) > 1);
    }

    #[test]
    fn writer_excludes_everyone() {
        let lock = Arc::new(RwLock::new(0usize));
        {
            let mut w = lock.write();
            *w = 42;
        }
        assert_eq!(*lock.read(), 42);
    }

    #[test]
    fn writer_blocks_new_readers() {
        let lock = Arc::new(RwLock::new(0usize));
        let order = Arc::new(Mutex::new(Vec::new()));

        let g = lock.read();
        let lock2 = lock.clone();
        let order2 = order.clone();
        let writer = thread::spawn(move || {
            let mut w = lock2.write();
            order2.lock().unwrap().push("write");
            *w = 1;
        });
        thread::sleep(Duration::from_millis(30));

        let lock3 = lock.clone();
        let order3 = order.clone();
        let reader = thread::spawn(move || {
            let _r = lock3.read();
            order3.lock().unwrap().push("read");
        });

        thread::sleep(Duration::from_millis(30));
        order.lock().unwrap().push("drop-first-reader");
        drop(g);

        writer.join().unwrap();
        reader.join().unwrap();

        let seq = order.lock().unwrap().clone();
        let write_pos = seq.iter().position(|s| *s == "write").unwrap();
        let read_pos = seq.iter().position(|s| *s == "read").unwrap();
        assert!(write_pos < read_pos, "waiting writer should run before the new reader: {:?}", seq);
    }
}

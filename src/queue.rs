//! Bounded FIFO used to hand accepted sockets from the listener to the workers.
//!
//! The accept thread blocks in [`BoundedQueue::enqueue`] while the queue is full, which is how
//! backpressure reaches the listening socket: nothing more is accepted until a worker frees a
//! slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// Circular store plus the bookkeeping guarded by the queue's lock.
#[derive(Debug)]
struct Ring<T> {
    slots: Vec<Option<T>>,
    head: usize,
    tail: usize,
    count: usize,
}

impl<T> Ring<T> {
    fn is_full(&self) -> bool {
        self.count == self.slots.len()
    }

    fn push(&mut self, item: T) {
        debug_assert!(self.slots[self.tail].is_none());
        self.slots[self.tail] = Some(item);
        self.tail = (self.tail + 1) % self.slots.len();
        self.count += 1;
    }

    fn pop(&mut self) -> Option<T> {
        let item = self.slots[self.head].take()?;
        self.head = (self.head + 1) % self.slots.len();
        self.count -= 1;
        Some(item)
    }
}

/// A fixed-capacity, blocking, multi-consumer FIFO.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    ring: Mutex<Ring<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> BoundedQueue<T> {
    /// Create an empty queue holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "queue capacity must be at least 1");
        Self {
            ring: Mutex::new(Ring {
                slots: (0..capacity).map(|_| None).collect(),
                head: 0,
                tail: 0,
                count: 0,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Append `item` at the tail, waiting for a free slot if the queue is full.
    pub fn enqueue(&self, item: T) {
        let mut ring = self.lock();
        while ring.is_full() {
            ring = self.not_full.wait(ring).expect("dispatch queue lock poisoned");
        }
        ring.push(item);
        drop(ring);
        self.not_empty.notify_one();
    }

    /// Like [`enqueue`](Self::enqueue), but stop waiting once `running` clears.
    ///
    /// The flag is checked every `tick` while the queue stays full. An item that never found a
    /// slot is handed back.
    pub fn enqueue_while(&self, item: T, running: &AtomicBool, tick: Duration) -> Result<(), T> {
        let mut ring = self.lock();
        while ring.is_full() {
            if !running.load(Ordering::Relaxed) {
                return Err(item);
            }
            ring = self
                .not_full
                .wait_timeout(ring, tick)
                .expect("dispatch queue lock poisoned")
                .0;
        }
        ring.push(item);
        drop(ring);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Remove the item at the head, waiting for one to arrive if the queue is empty.
    pub fn dequeue(&self) -> T {
        let mut ring = self.lock();
        let item = loop {
            // Re-checked after every wake-up, spurious or not.
            match ring.pop() {
                Some(item) => break item,
                None => ring = self.not_empty.wait(ring).expect("dispatch queue lock poisoned"),
            }
        };
        drop(ring);
        self.not_full.notify_one();
        item
    }

    pub fn capacity(&self) -> usize {
        self.lock().slots.len()
    }

    /// Number of items currently queued.
    pub fn len(&self) -> usize {
        self.lock().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Ring<T>> {
        self.ring.lock().expect("dispatch queue lock poisoned")
    }
}

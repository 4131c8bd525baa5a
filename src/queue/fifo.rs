//! Bounded blocking FIFO
//!
//! A fixed-capacity queue whose producers block while it is full and whose
//! consumers block while it is empty. Blocking can be switched off at any
//! time; doing so wakes every waiter, which then fails with
//! [`Error::WouldBlock`]. This is how processor instances are unblocked
//! before teardown.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};

/// Element duplication used by [`Fifo::push`]
pub type DupFn<T> = fn(&T) -> Result<T>;

struct FifoState<T> {
    items: VecDeque<T>,
    blocking: bool,
}

/// Bounded multi-producer multi-consumer queue
pub struct Fifo<T> {
    state: Mutex<FifoState<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
    dup: DupFn<T>,
}

impl<T> Fifo<T> {
    /// Create a blocking queue holding at most `capacity` elements
    ///
    /// `dup` is used by [`Fifo::push`] to copy borrowed elements in.
    pub fn new(capacity: usize, dup: DupFn<T>) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::invalid("fifo capacity must be non-zero"));
        }
        Ok(Self {
            state: Mutex::new(FifoState {
                items: VecDeque::with_capacity(capacity),
                blocking: true,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
            dup,
        })
    }

    /// Push a duplicate of `elem`
    pub fn push(&self, elem: &T) -> Result<()> {
        let copy = (self.dup)(elem)?;
        self.push_owned(copy)
    }

    /// Push `elem`, transferring ownership to the queue
    ///
    /// Waits for room in blocking mode; fails with `WouldBlock` otherwise.
    /// On failure the element is dropped.
    pub fn push_owned(&self, elem: T) -> Result<()> {
        let mut state = self.state.lock();
        while state.items.len() >= self.capacity {
            if !state.blocking {
                return Err(Error::WouldBlock);
            }
            self.not_full.wait(&mut state);
        }
        state.items.push_back(elem);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Pop the oldest element
    ///
    /// Waits for data in blocking mode; fails with `WouldBlock` otherwise.
    pub fn pop(&self) -> Result<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(elem) = state.items.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return Ok(elem);
            }
            if !state.blocking {
                return Err(Error::WouldBlock);
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Pop the oldest element, waiting at most `timeout`
    pub fn pop_timeout(&self, timeout: Duration) -> Result<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let Some(elem) = state.items.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return Ok(elem);
            }
            if !state.blocking {
                return Err(Error::WouldBlock);
            }
            if self
                .not_empty
                .wait_until(&mut state, deadline)
                .timed_out()
                && state.items.is_empty()
            {
                return Err(Error::TimedOut);
            }
        }
    }

    /// Switch blocking mode
    ///
    /// Turning blocking off wakes all producers and consumers.
    pub fn set_blocking(&self, blocking: bool) {
        let mut state = self.state.lock();
        state.blocking = blocking;
        drop(state);
        if !blocking {
            self.not_empty.notify_all();
            self.not_full.notify_all();
        }
    }

    /// Whether push/pop currently wait
    pub fn is_blocking(&self) -> bool {
        self.state.lock().blocking
    }

    /// Number of queued elements
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of queued elements
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every queued element
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.items.clear();
        drop(state);
        self.not_full.notify_all();
    }
}

impl<T> std::fmt::Debug for Fifo<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Fifo")
            .field("len", &state.items.len())
            .field("capacity", &self.capacity)
            .field("blocking", &state.blocking)
            .finish()
    }
}

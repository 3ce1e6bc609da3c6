//! Actor mailbox
//!
//! Blocking MPSC queue: a bounded ring for steady-state low latency plus an
//! unbounded overflow buffer that absorbs bursts, guarded by one mutex and
//! one condition variable. Many producers, one consumer.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use troupe_core::constants::MAILBOX_RING_CAPACITY_DEFAULT;

/// Error returned when pushing into a closed mailbox.
///
/// Carries the rejected value back so the caller decides whether to drop it.
pub struct MailboxClosed<T>(pub T);

impl<T> fmt::Debug for MailboxClosed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MailboxClosed(..)")
    }
}

impl<T> fmt::Display for MailboxClosed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("mailbox closed")
    }
}

impl<T> std::error::Error for MailboxClosed<T> {}

struct State<T> {
    /// Bounded fast path; holds at most `capacity` elements
    ring: VecDeque<T>,
    /// Unbounded spill area, drained back into the ring on pop
    overflow: VecDeque<T>,
    closed: bool,
}

/// Blocking MPSC mailbox with a bounded ring and unbounded overflow
pub struct Mailbox<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    capacity: usize,
    /// Total messages enqueued (for monitoring)
    enqueued: AtomicU64,
    /// Total messages popped (for monitoring)
    popped: AtomicU64,
}

impl<T: Send> Mailbox<T> {
    /// Create a mailbox with the default ring capacity
    pub fn new() -> Self {
        Self::with_capacity(MAILBOX_RING_CAPACITY_DEFAULT)
    }

    /// Create a mailbox with the given ring capacity
    pub fn with_capacity(capacity: usize) -> Self {
        debug_assert!(capacity > 0, "ring capacity must be positive");

        Self {
            state: Mutex::new(State {
                ring: VecDeque::with_capacity(capacity),
                overflow: VecDeque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
            capacity,
            enqueued: AtomicU64::new(0),
            popped: AtomicU64::new(0),
        }
    }

    /// Enqueue a value.
    ///
    /// Appends to the ring while it has space, otherwise to the overflow
    /// buffer; never blocks beyond the critical section. Fails only after
    /// [`close`](Self::close).
    pub fn push(&self, value: T) -> Result<(), MailboxClosed<T>> {
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(MailboxClosed(value));
            }
            if state.ring.len() < self.capacity {
                state.ring.push_back(value);
            } else {
                state.overflow.push_back(value);
            }
        }
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Dequeue the next value, blocking until one is available.
    ///
    /// The returned flag is `true` iff the queue is empty immediately after
    /// this pop. Returns `None` once the mailbox is closed and fully
    /// drained.
    pub fn pop(&self) -> Option<(T, bool)> {
        let mut state = self.state.lock();
        loop {
            if let Some(value) = state.ring.pop_front() {
                return Some(self.finish_pop(&mut state, value));
            }
            debug_assert!(state.overflow.is_empty(), "overflow holds data while ring is empty");
            if state.closed {
                return None;
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Bounded-wait variant of [`pop`](Self::pop).
    ///
    /// Returns `None` on timeout or once the mailbox is closed and drained.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<(T, bool)> {
        let deadline = std::time::Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let Some(value) = state.ring.pop_front() {
                return Some(self.finish_pop(&mut state, value));
            }
            if state.closed {
                return None;
            }
            if self.not_empty.wait_until(&mut state, deadline).timed_out() {
                return match state.ring.pop_front() {
                    Some(value) => Some(self.finish_pop(&mut state, value)),
                    None => None,
                };
            }
        }
    }

    fn finish_pop(&self, state: &mut State<T>, value: T) -> (T, bool) {
        while state.ring.len() < self.capacity {
            match state.overflow.pop_front() {
                Some(spilled) => state.ring.push_back(spilled),
                None => break,
            }
        }
        self.popped.fetch_add(1, Ordering::Relaxed);
        let last = state.ring.is_empty() && state.overflow.is_empty();
        (value, last)
    }

    /// Inspect the head of the queue without removing it
    pub fn peek_with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let state = self.state.lock();
        state.ring.front().map(f)
    }

    /// `true` when both the ring and the overflow buffer are empty
    pub fn is_empty(&self) -> bool {
        let state = self.state.lock();
        state.ring.is_empty() && state.overflow.is_empty()
    }

    /// Number of queued values across ring and overflow
    pub fn len(&self) -> usize {
        let state = self.state.lock();
        state.ring.len() + state.overflow.len()
    }

    /// Ring capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Reject future pushes and wake the consumer.
    ///
    /// Already queued values remain poppable; the consumer sees `None` only
    /// after the drain.
    pub fn close(&self) {
        {
            let mut state = self.state.lock();
            state.closed = true;
        }
        self.not_empty.notify_all();
    }

    /// `true` once [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Total values enqueued over the mailbox lifetime
    pub fn enqueued_count(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Total values popped over the mailbox lifetime
    pub fn popped_count(&self) -> u64 {
        self.popped.load(Ordering::Relaxed)
    }
}

impl<T: Send> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

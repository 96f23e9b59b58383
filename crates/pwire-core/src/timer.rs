#![forbid(unsafe_code)]

//! Virtual-clock timer queue.
//!
//! Timers never fire on their own: the host advances the clock through
//! [`Window::advance`](crate::window::Window::advance), which pops due
//! timers one at a time in `(deadline, id)` order. Popping one at a time
//! lets a firing timer schedule or cancel others and still be ordered
//! correctly.

use std::fmt;
use std::time::Duration;

/// Handle returned by `set_timeout`, used for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Deferred task.
pub type TimerTask = Box<dyn FnOnce()>;

struct Scheduled {
    deadline: Duration,
    id: TimerId,
    task: TimerTask,
}

/// Pending timers plus the current virtual time.
#[derive(Default)]
pub struct TimerQueue {
    now: Duration,
    next_id: u64,
    scheduled: Vec<Scheduled>,
}

impl fmt::Debug for TimerQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerQueue")
            .field("now", &self.now)
            .field("pending", &self.scheduled.len())
            .finish()
    }
}

impl TimerQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time since the queue was created.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Schedule `task` to run `delay` after the current time.
    pub fn schedule(&mut self, delay: Duration, task: TimerTask) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.scheduled.push(Scheduled {
            deadline: self.now + delay,
            id,
            task,
        });
        id
    }

    /// Cancel a pending timer. Returns whether it was still pending.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.scheduled.len();
        self.scheduled.retain(|s| s.id != id);
        self.scheduled.len() != before
    }

    #[must_use]
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.scheduled.iter().any(|s| s.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.scheduled.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scheduled.is_empty()
    }

    /// Earliest pending deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.scheduled.iter().map(|s| s.deadline).min()
    }

    /// Remove the earliest timer due at or before `until`, moving the clock
    /// to its deadline.
    pub fn pop_due(&mut self, until: Duration) -> Option<(TimerId, TimerTask)> {
        let index = self
            .scheduled
            .iter()
            .enumerate()
            .filter(|(_, s)| s.deadline <= until)
            .min_by_key(|(_, s)| (s.deadline, s.id))
            .map(|(i, _)| i)?;
        let due = self.scheduled.swap_remove(index);
        self.now = self.now.max(due.deadline);
        Some((due.id, due.task))
    }

    /// Move the clock forward without running anything.
    pub fn set_now(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }
}

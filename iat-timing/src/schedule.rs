//! Cancellable deadlines for a single-threaded, polled event loop.
//!
//! Nothing here sleeps or spawns. The owner arms a deadline, polls
//! [`Scheduler::pop_due`] with the current clock reading and reacts to the
//! events that came due. Cancelled deadlines never fire.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

#[derive(Debug)]
struct Deadline<E> {
    id: u64,
    due_ns: u64,
    event: E,
}

#[derive(Debug)]
pub struct Scheduler<E> {
    next_id: u64,
    pending: Vec<Deadline<E>>,
}

impl<E> Scheduler<E> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            pending: Vec::new(),
        }
    }

    pub fn schedule(&mut self, due_ns: u64, event: E) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.push(Deadline { id, due_ns, event });
        TimerHandle(id)
    }

    /// Returns whether the deadline was still pending.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|d| d.id != handle.0);
        self.pending.len() != before
    }

    pub fn next_due(&self) -> Option<u64> {
        self.pending.iter().map(|d| d.due_ns).min()
    }

    /// Removes and returns every event due at `now_ns`, earliest first.
    pub fn pop_due(&mut self, now_ns: u64) -> Vec<E> {
        let mut due = Vec::new();
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].due_ns <= now_ns {
                due.push(self.pending.swap_remove(i));
            } else {
                i += 1;
            }
        }
        due.sort_by_key(|d| (d.due_ns, d.id));
        due.into_iter().map(|d| d.event).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

//! Single-task deadline scheduler.
//!
//! Items are kept in a min-heap keyed by deadline. One background task sleeps
//! until the earliest deadline and hands due items to a callback; the
//! callback must not block (spawn if the work is slow).

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

enum Command<T> {
    Schedule(Instant, T),
    Shutdown,
}

struct Entry<T> {
    deadline: Instant,
    seq: u64,
    item: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Equal deadlines fire in scheduling order
        (self.deadline, self.seq).cmp(&(other.deadline, other.seq))
    }
}

/// Fires each scheduled item once its deadline has passed
pub struct ExpiryScheduler<T> {
    control_tx: mpsc::UnboundedSender<Command<T>>,
}

impl<T> std::fmt::Debug for ExpiryScheduler<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiryScheduler")
            .field("running", &!self.control_tx.is_closed())
            .finish()
    }
}

impl<T: Send + 'static> ExpiryScheduler<T> {
    /// Start the scheduler task on the current runtime
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn spawn<F>(on_fire: F) -> Self
    where
        F: Fn(T) + Send + 'static,
    {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        tokio::spawn(Self::run(control_rx, on_fire));
        Self { control_tx }
    }

    /// Fire `item` after `delay`
    ///
    /// Returns `false` if the scheduler has stopped.
    pub fn schedule(&self, delay: Duration, item: T) -> bool {
        let deadline = Instant::now()
            .checked_add(delay)
            .unwrap_or_else(far_future);
        self.control_tx
            .send(Command::Schedule(deadline, item))
            .is_ok()
    }

    /// Stop the scheduler; pending items never fire
    pub fn shutdown(&self) {
        let _ = self.control_tx.send(Command::Shutdown);
    }

    pub fn is_running(&self) -> bool {
        !self.control_tx.is_closed()
    }

    async fn run<F>(mut control_rx: mpsc::UnboundedReceiver<Command<T>>, on_fire: F)
    where
        F: Fn(T),
    {
        let mut heap: BinaryHeap<Reverse<Entry<T>>> = BinaryHeap::new();
        let mut seq: u64 = 0;

        loop {
            let next = heap.peek().map(|Reverse(entry)| entry.deadline);

            tokio::select! {
                cmd = control_rx.recv() => match cmd {
                    Some(Command::Schedule(deadline, item)) => {
                        seq += 1;
                        heap.push(Reverse(Entry { deadline, seq, item }));
                    }
                    Some(Command::Shutdown) | None => break,
                },

                () = tokio::time::sleep_until(next.unwrap_or_else(far_future)), if next.is_some() => {
                    let now = Instant::now();
                    while heap.peek().is_some_and(|Reverse(entry)| entry.deadline <= now) {
                        if let Some(Reverse(entry)) = heap.pop() {
                            on_fire(entry.item);
                        }
                    }
                }
            }
        }

        tracing::debug!(pending = heap.len(), "Expiry scheduler stopped");
    }
}

fn far_future() -> Instant {
    // Roughly 30 years out
    Instant::now() + Duration::from_secs(86_400 * 365 * 30)
}

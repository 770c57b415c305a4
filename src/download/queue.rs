//! Piece job queue
//!
//! Multi-consumer queue of piece indices shared by all workers. Jobs handed
//! out are tracked until the worker reports them finished or puts them back,
//! so idle workers keep waiting while a failing peer may still requeue work.

use std::collections::VecDeque;

use tokio::sync::{Mutex, Notify};
use tracing::trace;

#[derive(Debug, Default)]
struct QueueState {
    jobs: VecDeque<u32>,
    in_flight: usize,
    closed: bool,
}

/// Shared queue of piece indices
#[derive(Debug, Default)]
pub struct JobQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a piece index
    pub async fn push(&self, index: u32) {
        self.state.lock().await.jobs.push_back(index);
        self.notify.notify_waiters();
    }

    /// No more indices will be pushed
    pub async fn close(&self) {
        self.state.lock().await.closed = true;
        self.notify.notify_waiters();
    }

    /// Hand an in-flight job back so another worker can take it
    pub async fn requeue(&self, index: u32) {
        {
            let mut state = self.state.lock().await;
            state.in_flight = state.in_flight.saturating_sub(1);
            state.jobs.push_front(index);
        }
        trace!("Requeued piece {}", index);
        self.notify.notify_waiters();
    }

    /// Mark an in-flight job as done, whatever its outcome
    pub async fn finish(&self) {
        {
            let mut state = self.state.lock().await;
            state.in_flight = state.in_flight.saturating_sub(1);
        }
        self.notify.notify_waiters();
    }

    /// Next piece index to work on
    ///
    /// Waits while the queue is empty but may still grow. Returns `None` once
    /// it is closed, drained, and no job remains in flight.
    pub async fn next(&self) -> Option<u32> {
        loop {
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock().await;
                if let Some(index) = state.jobs.pop_front() {
                    state.in_flight += 1;
                    return Some(index);
                }
                if state.closed && state.in_flight == 0 {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Number of indices waiting to be handed out
    pub async fn pending(&self) -> usize {
        self.state.lock().await.jobs.len()
    }
}

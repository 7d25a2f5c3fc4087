//! Caller contexts: where completions run.
//!
//! The controller does its work on a private worker thread and hands every
//! completion to the [`CallerContext`] it was built with. A UI-style caller
//! owns a [`MainQueue`] and drains it from its own thread.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub trait CallerContext: Send + Sync + 'static {
    fn dispatch(&self, task: Task);
}

/// Runs completions immediately on whichever thread resolves them.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineContext;

impl CallerContext for InlineContext {
    fn dispatch(&self, task: Task) {
        task()
    }
}

/// A run-loop style queue. Completions execute on the thread that drains it.
#[derive(Clone)]
pub struct MainQueue {
    sender: Sender<Task>,
    receiver: Receiver<Task>,
}

impl MainQueue {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self { sender, receiver }
    }

    /// Run every task queued so far. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.receiver.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Wait up to `timeout` for one task and run it.
    pub fn run_one(&self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Ok(task) => {
                task();
                true
            }
            Err(_) => false,
        }
    }

    /// Run tasks as they arrive until `done` holds or `timeout` elapses.
    pub fn run_until<F>(&self, mut done: F, timeout: Duration) -> bool
    where
        F: FnMut() -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            if done() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            match self.receiver.recv_timeout(deadline - now) {
                Ok(task) => task(),
                Err(RecvTimeoutError::Timeout) => return done(),
                Err(RecvTimeoutError::Disconnected) => return done(),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl Default for MainQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CallerContext for MainQueue {
    fn dispatch(&self, task: Task) {
        // Both ends live in `self`, so the channel cannot be disconnected here.
        let _ = self.sender.send(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_main_queue_defers_until_drained() {
        let queue = MainQueue::new();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let hits = hits.clone();
            queue.dispatch(Box::new(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.run_pending(), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_main_queue_runs_on_draining_thread() {
        let queue = MainQueue::new();
        let seen = Arc::new(std::sync::Mutex::new(None));
        let producer = queue.clone();
        let seen_clone = seen.clone();
        std::thread::spawn(move || {
            producer.dispatch(Box::new(move || {
                *seen_clone.lock().unwrap() = Some(std::thread::current().id());
            }));
        })
        .join()
        .unwrap();

        assert!(queue.run_one(Duration::from_secs(1)));
        assert_eq!(*seen.lock().unwrap(), Some(std::thread::current().id()));
    }

    #[test]
    fn test_run_until_times_out() {
        let queue = MainQueue::new();
        assert!(!queue.run_until(|| false, Duration::from_millis(20)));
        assert!(queue.run_until(|| true, Duration::from_millis(20)));
    }

    #[test]
    fn test_inline_context_runs_immediately() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        InlineContext.dispatch(Box::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}

//! FIFO mutual exclusion between the components that write to the ledger.
//!
//! Each writer role queues at most once. `wait` blocks until the role is at
//! the front; the returned [`WriteGuard`] hands the front to the next role
//! when released or dropped. `process` and `try_lock` enqueue without
//! blocking, which lets a writer with optional work (cementing) keep going
//! while another role holds the ledger.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

/// Distinct areas that take the write role. Order is irrelevant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Writer {
    BlockProcessing,
    ConfirmationHeight,
    Wallet,
    /// Used in tests to emulate a competing writer.
    Testing,
}

type ReleaseCallback = Arc<dyn Fn() + Send + Sync>;

/// Ownership of the front of the queue.
pub struct WriteGuard {
    on_release: Option<ReleaseCallback>,
}

impl WriteGuard {
    fn new(on_release: ReleaseCallback) -> Self {
        Self {
            on_release: Some(on_release),
        }
    }

    /// A guard that owns nothing, for queues built without ordering.
    pub fn null() -> Self {
        Self { on_release: None }
    }

    pub fn release(&mut self) {
        if let Some(callback) = self.on_release.take() {
            callback();
        }
    }

    pub fn is_owned(&self) -> bool {
        self.on_release.is_some()
    }
}

impl Drop for WriteGuard {
    fn drop(&mut self) {
        self.release();
    }
}

struct QueueState {
    queue: Mutex<VecDeque<Writer>>,
    condition: Condvar,
    use_noops: bool,
}

pub struct WriteDatabaseQueue {
    state: Arc<QueueState>,
    on_release: ReleaseCallback,
}

impl WriteDatabaseQueue {
    /// With `use_noops` every call succeeds immediately and guards own nothing.
    pub fn new(use_noops: bool) -> Self {
        let state = Arc::new(QueueState {
            queue: Mutex::new(VecDeque::new()),
            condition: Condvar::new(),
            use_noops,
        });
        let released = Arc::clone(&state);
        Self {
            state,
            on_release: Arc::new(move || {
                if !released.use_noops {
                    released
                        .queue
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .pop_front();
                }
                released.condition.notify_all();
            }),
        }
    }

    /// Block until `writer` is at the front of the queue.
    pub fn wait(&self, writer: Writer) -> WriteGuard {
        if self.state.use_noops {
            return WriteGuard::null();
        }

        let mut queue = self
            .state
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !queue.contains(&writer) {
            queue.push_back(writer);
        }
        let _front = self
            .state
            .condition
            .wait_while(queue, |q| q.front() != Some(&writer))
            .unwrap_or_else(PoisonError::into_inner);

        self.guard()
    }

    /// Enqueue `writer` if absent; returns whether it is now at the front.
    pub fn process(&self, writer: Writer) -> bool {
        if self.state.use_noops {
            return true;
        }

        let mut queue = self
            .state
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !queue.contains(&writer) {
            queue.push_back(writer);
        }
        queue.front() == Some(&writer)
    }

    /// A guard if `writer` is at the front, otherwise `None` with the writer
    /// left queued.
    pub fn try_lock(&self, writer: Writer) -> Option<WriteGuard> {
        self.process(writer).then(|| self.pop())
    }

    pub fn contains(&self, writer: Writer) -> bool {
        self.state
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&writer)
    }

    /// Guard for the current front; the front is popped when it is released.
    pub fn pop(&self) -> WriteGuard {
        self.guard()
    }

    fn guard(&self) -> WriteGuard {
        WriteGuard::new(Arc::clone(&self.on_release))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn second_writer_waits_for_release() {
        let queue = Arc::new(WriteDatabaseQueue::new(false));
        let mut guard = queue.wait(Writer::BlockProcessing);
        assert!(!queue.process(Writer::ConfirmationHeight));
        assert!(queue.contains(Writer::ConfirmationHeight));

        let acquired = Arc::new(AtomicBool::new(false));
        let handle = {
            let queue = Arc::clone(&queue);
            let acquired = Arc::clone(&acquired);
            std::thread::spawn(move || {
                let _guard = queue.wait(Writer::ConfirmationHeight);
                acquired.store(true, Ordering::SeqCst);
            })
        };

        std::thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst));
        guard.release();
        handle.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
        assert!(!queue.contains(Writer::ConfirmationHeight));
    }

    #[test]
    fn try_lock_leaves_writer_queued() {
        let queue = WriteDatabaseQueue::new(false);
        let guard = queue.wait(Writer::Testing);
        assert!(queue.try_lock(Writer::ConfirmationHeight).is_none());
        drop(guard);
        let guard = queue.try_lock(Writer::ConfirmationHeight);
        assert!(guard.as_ref().is_some_and(WriteGuard::is_owned));
    }

    #[test]
    fn noop_queue_never_blocks() {
        let queue = WriteDatabaseQueue::new(true);
        let _a = queue.wait(Writer::Testing);
        let b = queue.wait(Writer::ConfirmationHeight);
        assert!(!b.is_owned());
        assert!(queue.process(Writer::Wallet));
    }
}

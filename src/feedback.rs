//! The backpressure contract between readers/importers and the downstream
//! sink, plus an in-process reference implementation.

use std::collections::{HashMap, VecDeque};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::event::EventGroup;

/// One queued push: the config that produced it, its shard, and the group
/// itself.
pub struct QueuedGroup {
    pub config_name: String,
    pub shard: u32,
    pub group: EventGroup,
}

/// The backpressure contract exposed to readers and the importer.
///
/// FIFO per `destination_key`; no cross-key ordering guarantee.
pub trait FeedbackQueue: Send + Sync {
    /// Non-blocking: `false` when the queue for `destination_key` is at or
    /// above its high watermark.
    fn is_valid_to_read_log(&self, destination_key: u64) -> bool;

    /// Enqueues `group`. Blocks up to `timeout` if the queue is full;
    /// returns `false` on timeout rather than losing the group.
    fn push_buffer(
        &self,
        destination_key: u64,
        config_name: &str,
        shard: u32,
        group: EventGroup,
        timeout: Duration,
    ) -> bool;
}

/// A bounded per-key queue backed by a `Mutex` + `Condvar`: `push_buffer`
/// waits on a watermark transition rather than sleeping in a loop.
pub struct InMemoryFeedbackQueue {
    high_watermark: usize,
    state: Mutex<HashMap<u64, VecDeque<QueuedGroup>>>,
    not_full: Condvar,
}

impl InMemoryFeedbackQueue {
    pub fn new(high_watermark: usize) -> Self {
        Self {
            high_watermark,
            state: Mutex::new(HashMap::new()),
            not_full: Condvar::new(),
        }
    }

    /// Removes and returns the oldest queued group for `destination_key`,
    /// waking any producer blocked in [`FeedbackQueue::push_buffer`].
    pub fn pop(&self, destination_key: u64) -> Option<QueuedGroup> {
        let mut state = self.state.lock().expect("feedback queue mutex poisoned");
        let item = state.get_mut(&destination_key).and_then(|q| q.pop_front());
        if item.is_some() {
            self.not_full.notify_all();
        }
        item
    }

    pub fn len(&self, destination_key: u64) -> usize {
        let state = self.state.lock().expect("feedback queue mutex poisoned");
        state.get(&destination_key).map_or(0, VecDeque::len)
    }
}

impl FeedbackQueue for InMemoryFeedbackQueue {
    fn is_valid_to_read_log(&self, destination_key: u64) -> bool {
        let state = self.state.lock().expect("feedback queue mutex poisoned");
        state
            .get(&destination_key)
            .map_or(true, |q| q.len() < self.high_watermark)
    }

    fn push_buffer(
        &self,
        destination_key: u64,
        config_name: &str,
        shard: u32,
        group: EventGroup,
        timeout: Duration,
    ) -> bool {
        let mut state = self.state.lock().expect("feedback queue mutex poisoned");
        let deadline = Instant::now() + timeout;
        loop {
            let queue = state.entry(destination_key).or_default();
            if queue.len() < self.high_watermark {
                queue.push_back(QueuedGroup {
                    config_name: config_name.to_string(),
                    shard,
                    group,
                });
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _timeout_result) = self
                .not_full
                .wait_timeout(state, deadline - now)
                .expect("feedback queue mutex poisoned");
            state = guard;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SourceBuffer;

    fn dummy_group() -> EventGroup {
        EventGroup::new(SourceBuffer::new())
    }

    #[test]
    fn push_then_pop_fifo() {
        let q = InMemoryFeedbackQueue::new(10);
        assert!(q.is_valid_to_read_log(1));
        q.push_buffer(1, "cfg", 0, dummy_group(), Duration::from_millis(10));
        q.push_buffer(1, "cfg", 0, dummy_group(), Duration::from_millis(10));
        assert_eq!(q.len(1), 2);
        assert!(q.pop(1).is_some());
        assert_eq!(q.len(1), 1);
    }

    #[test]
    fn high_watermark_blocks_then_times_out() {
        let q = InMemoryFeedbackQueue::new(1);
        assert!(q.push_buffer(1, "cfg", 0, dummy_group(), Duration::from_millis(10)));
        assert!(!q.is_valid_to_read_log(1));
        let ok = q.push_buffer(1, "cfg", 0, dummy_group(), Duration::from_millis(20));
        assert!(!ok);
    }

    #[test]
    fn pop_unblocks_waiting_push() {
        use std::sync::Arc;
        use std::thread;

        let q = Arc::new(InMemoryFeedbackQueue::new(1));
        q.push_buffer(1, "cfg", 0, dummy_group(), Duration::from_millis(10));

        let q2 = Arc::clone(&q);
        let handle = thread::spawn(move || {
            q2.push_buffer(1, "cfg", 0, dummy_group(), Duration::from_secs(5))
        });

        thread::sleep(Duration::from_millis(20));
        q.pop(1);
        assert!(handle.join().unwrap());
    }
}

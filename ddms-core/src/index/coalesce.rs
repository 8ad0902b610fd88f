//! Per-path debouncing of notification bursts.
//!
//! Descriptors are appended in arrival order and each carries a deadline of
//! `arrival + delay`. Because the delay is constant, deadlines are
//! monotonically non-decreasing, so popping from the head never reorders two
//! descriptors for the same path. The execution side drains at most one
//! descriptor per scheduler tick, throttling store-mutation cost against
//! the live read path.

use std::collections::VecDeque;

use tokio::time::{Duration, Instant};
use tracing::debug;

use ddms_model::{ChangeDescriptor, ChangeKind};

struct Pending {
    descriptor: ChangeDescriptor,
    not_before: Instant,
}

pub struct CoalescingBuffer {
    pending: VecDeque<Pending>,
    delay: Duration,
}

impl CoalescingBuffer {
    pub fn new(delay: Duration) -> Self {
        Self {
            pending: VecDeque::new(),
            delay,
        }
    }

    /// Absorb one normalized descriptor. Returns `false` when the
    /// descriptor was squashed instead of buffered: a `Modify` arriving
    /// while an `Add` for the same path is still pending is redundant;
    /// the add will hash the file's final content anyway.
    pub fn push(&mut self, descriptor: ChangeDescriptor) -> bool {
        if matches!(descriptor.kind, ChangeKind::Modify)
            && self.has_pending_add(&descriptor.path)
        {
            debug!(path = %descriptor.path, "squashed modify behind pending add");
            return false;
        }

        self.pending.push_back(Pending {
            not_before: Instant::now() + self.delay,
            descriptor,
        });
        true
    }

    /// Pop the head descriptor if its settle window has elapsed. At most
    /// one descriptor is returned per call.
    pub fn pop_ready(&mut self, now: Instant) -> Option<ChangeDescriptor> {
        if self.pending.front()?.not_before <= now {
            self.pending.pop_front().map(|p| p.descriptor)
        } else {
            None
        }
    }

    /// Deadline of the head descriptor, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.front().map(|p| p.not_before)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn has_pending_add(&self, path: &str) -> bool {
        self.pending
            .iter()
            .any(|p| matches!(p.descriptor.kind, ChangeKind::Add) && p.descriptor.path == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(path: &str) -> ChangeDescriptor {
        ChangeDescriptor::new(ChangeKind::Add, path.into())
    }

    fn modify(path: &str) -> ChangeDescriptor {
        ChangeDescriptor::new(ChangeKind::Modify, path.into())
    }

    fn delete(path: &str) -> ChangeDescriptor {
        ChangeDescriptor::new(ChangeKind::Delete, path.into())
    }

    #[tokio::test(start_paused = true)]
    async fn modify_behind_pending_add_is_squashed() {
        let mut buffer = CoalescingBuffer::new(Duration::from_secs(15));
        assert!(buffer.push(add("a/z.txt")));
        assert!(!buffer.push(modify("a/z.txt")));
        assert!(!buffer.push(modify("a/z.txt")));
        assert!(!buffer.push(modify("a/z.txt")));
        assert_eq!(buffer.len(), 1);

        // A modify for a different path is not affected.
        assert!(buffer.push(modify("a/other.txt")));
        assert_eq!(buffer.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_pops_before_the_settle_window() {
        let mut buffer = CoalescingBuffer::new(Duration::from_secs(15));
        buffer.push(add("a.txt"));

        assert!(buffer.pop_ready(Instant::now()).is_none());
        tokio::time::advance(Duration::from_secs(14)).await;
        assert!(buffer.pop_ready(Instant::now()).is_none());
        tokio::time::advance(Duration::from_secs(2)).await;
        let popped = buffer.pop_ready(Instant::now()).unwrap();
        assert_eq!(popped.path, "a.txt");
        assert!(buffer.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn one_descriptor_per_tick() {
        let mut buffer = CoalescingBuffer::new(Duration::from_millis(10));
        buffer.push(add("a.txt"));
        buffer.push(add("b.txt"));

        tokio::time::advance(Duration::from_secs(1)).await;
        let now = Instant::now();
        assert!(buffer.pop_ready(now).is_some());
        assert!(buffer.pop_ready(now).is_some());
        assert!(buffer.pop_ready(now).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn per_path_order_is_preserved() {
        // Edit, delete, recreate: three distinct effective actions that
        // must come out in submission order.
        let mut buffer = CoalescingBuffer::new(Duration::from_secs(15));
        buffer.push(modify("x.txt"));
        tokio::time::advance(Duration::from_secs(3)).await;
        buffer.push(delete("x.txt"));
        tokio::time::advance(Duration::from_secs(3)).await;
        buffer.push(add("x.txt"));

        tokio::time::advance(Duration::from_secs(60)).await;
        let now = Instant::now();
        let kinds: Vec<ChangeKind> = std::iter::from_fn(|| buffer.pop_ready(now))
            .map(|d| d.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![ChangeKind::Modify, ChangeKind::Delete, ChangeKind::Add]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn create_then_edits_collapse_to_one_add() {
        let mut buffer = CoalescingBuffer::new(Duration::from_secs(15));
        buffer.push(add("a/z.txt"));
        buffer.push(modify("a/z.txt"));
        buffer.push(modify("a/z.txt"));
        buffer.push(delete("other.txt"));

        tokio::time::advance(Duration::from_secs(60)).await;
        let now = Instant::now();
        let drained: Vec<ChangeDescriptor> =
            std::iter::from_fn(|| buffer.pop_ready(now)).collect();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].kind, ChangeKind::Add);
        assert_eq!(drained[0].path, "a/z.txt");
        assert_eq!(drained[1].kind, ChangeKind::Delete);
    }
}

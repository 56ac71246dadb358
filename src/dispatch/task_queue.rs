// src/dispatch/task_queue.rs
//! Concurrent task queue with drain detection for self-expanding work.
//!
//! Consumers are also producers: a worker that fetches a first page may push
//! the rest of that dimension's pages. Emptiness therefore says nothing
//! about completion. The queue counts every task ever queued and every task
//! marked done; it is drained only when the two agree, i.e. nothing is
//! pending and nothing popped is still in flight.

use super::task::Task;
use crossbeam::deque::{Injector, Steal};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Notify;

/// Tracks work queue completion state
#[derive(Debug, Default)]
struct WorkTracker {
    /// Number of tasks ever queued, requeues included
    queued_total: AtomicUsize,
    /// Number of tasks marked done
    completed_total: AtomicUsize,
}

impl WorkTracker {
    fn add_pending(&self, count: usize) {
        self.queued_total.fetch_add(count, Ordering::SeqCst);
    }

    fn mark_completed(&self, count: usize) {
        self.completed_total.fetch_add(count, Ordering::SeqCst);
    }

    /// Pending plus in-flight tasks.
    fn outstanding(&self) -> usize {
        let completed = self.completed_total.load(Ordering::SeqCst);
        let queued = self.queued_total.load(Ordering::SeqCst);
        queued.saturating_sub(completed)
    }
}

/// Thread-safe, unbounded task queue shared by the coordinator and workers.
#[derive(Debug, Default)]
pub struct TaskQueue {
    injector: Injector<Task>,
    tracker: WorkTracker,
    /// Woken on push, on drain and on close
    state_changed: Notify,
    closed: AtomicBool,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a queue pre-seeded with `tasks`.
    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let queue = Self::new();
        queue.push_all(tasks);
        queue
    }

    /// Enqueues a task. Never blocks, never fails.
    pub fn push(&self, task: Task) {
        self.tracker.add_pending(1);
        self.injector.push(task);
        self.state_changed.notify_waiters();
    }

    /// Enqueues several tasks, returning how many were added.
    pub fn push_all(&self, tasks: impl IntoIterator<Item = Task>) -> usize {
        let mut count = 0;
        for task in tasks {
            self.tracker.add_pending(1);
            self.injector.push(task);
            count += 1;
        }
        if count > 0 {
            self.state_changed.notify_waiters();
        }
        count
    }

    /// Takes a task without waiting.
    pub fn try_pop(&self) -> Option<Task> {
        loop {
            match self.injector.steal() {
                Steal::Success(task) => return Some(task),
                Steal::Empty => return None,
                Steal::Retry => continue,
            }
        }
    }

    /// Takes the next task, waiting while the queue is momentarily empty but
    /// in-flight work may still produce more.
    ///
    /// Returns `None` once the queue is drained or closed. A task returned
    /// here stays outstanding until [`TaskQueue::mark_done`] or
    /// [`TaskQueue::requeue`] is called for it.
    pub async fn pop(&self) -> Option<Task> {
        loop {
            let notified = self.state_changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_closed() {
                return None;
            }
            if let Some(task) = self.try_pop() {
                return Some(task);
            }
            if self.is_drained() {
                return None;
            }

            notified.await;
        }
    }

    /// Marks one popped task as finished.
    pub fn mark_done(&self) {
        self.tracker.mark_completed(1);
        if self.is_drained() {
            self.state_changed.notify_waiters();
        }
    }

    /// Hands an in-flight task back to the queue.
    ///
    /// The task is counted as pending before it stops counting as in flight,
    /// so the queue is never observed drained in between.
    pub fn requeue(&self, task: Task) {
        self.push(task);
        self.mark_done();
    }

    /// True iff no task is pending and no popped task is still in flight.
    pub fn is_drained(&self) -> bool {
        self.tracker.outstanding() == 0
    }

    /// Waits until [`TaskQueue::is_drained`] holds.
    pub async fn wait_drained(&self) {
        loop {
            let notified = self.state_changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_drained() {
                return;
            }

            notified.await;
        }
    }

    /// Tells idle consumers that no more work will be handed out.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.state_changed.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of tasks waiting to be popped.
    pub fn pending_len(&self) -> usize {
        self.injector.len()
    }

    /// Pending plus in-flight tasks.
    pub fn outstanding(&self) -> usize {
        self.tracker.outstanding()
    }

    /// Removes every pending task, counting each as done.
    ///
    /// Used by the coordinator once no worker is left to pick them up; the
    /// returned tasks are the abandoned ones.
    pub fn drain_pending(&self) -> Vec<Task> {
        let leftovers: Vec<Task> = std::iter::from_fn(|| self.try_pop()).collect();
        if !leftovers.is_empty() {
            self.tracker.mark_completed(leftovers.len());
            self.state_changed.notify_waiters();
        }
        leftovers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Symbol;
    use std::sync::Arc;
    use std::time::Duration;

    fn task(dimension: u32) -> Task {
        Task::first_page(Symbol::new("A").unwrap(), dimension)
    }

    #[test]
    fn test_empty_queue_is_drained() {
        let queue = TaskQueue::new();
        assert!(queue.is_drained());
        assert_eq!(queue.outstanding(), 0);
    }

    #[test]
    fn test_popped_task_keeps_queue_undrained_until_done() {
        let queue = TaskQueue::with_tasks(vec![task(1)]);
        let popped = queue.try_pop().unwrap();
        assert_eq!(popped, task(1));
        assert_eq!(queue.pending_len(), 0);
        assert!(!queue.is_drained(), "in-flight task must count");

        queue.mark_done();
        assert!(queue.is_drained());
    }

    #[test]
    fn test_discovered_tasks_extend_outstanding_work() {
        let queue = TaskQueue::with_tasks(vec![task(1)]);
        let _first = queue.try_pop().unwrap();
        assert_eq!(queue.push_all(vec![task(2), task(3)]), 2);
        queue.mark_done();

        assert!(!queue.is_drained());
        assert_eq!(queue.outstanding(), 2);
    }

    #[test]
    fn test_requeue_never_looks_drained() {
        let queue = TaskQueue::with_tasks(vec![task(1)]);
        let popped = queue.try_pop().unwrap();
        queue.requeue(popped);

        assert!(!queue.is_drained());
        assert_eq!(queue.pending_len(), 1);
        assert_eq!(queue.outstanding(), 1);
    }

    #[test]
    fn test_drain_pending_returns_leftovers() {
        let queue = TaskQueue::with_tasks(vec![task(1), task(2)]);
        let leftovers = queue.drain_pending();
        assert_eq!(leftovers.len(), 2);
        assert!(queue.is_drained());
    }

    #[tokio::test]
    async fn test_pop_returns_none_on_drained_queue() {
        let queue = TaskQueue::new();
        assert_eq!(queue.pop().await, None);
    }

    #[tokio::test]
    async fn test_pop_waits_for_work_from_in_flight_task() {
        let queue = Arc::new(TaskQueue::with_tasks(vec![task(1)]));
        let _in_flight = queue.pop().await.unwrap();

        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished(), "pop must wait while work is in flight");

        queue.push(task(2));
        queue.mark_done();

        let got = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake up")
            .unwrap();
        assert_eq!(got, Some(task(2)));
    }

    #[tokio::test]
    async fn test_waiters_wake_when_last_task_completes() {
        let queue = Arc::new(TaskQueue::with_tasks(vec![task(1)]));
        let _in_flight = queue.pop().await.unwrap();

        let popper = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await })
        };
        let drain_watch = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.wait_drained().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.mark_done();

        let popped = tokio::time::timeout(Duration::from_secs(1), popper)
            .await
            .expect("popper should wake up")
            .unwrap();
        assert_eq!(popped, None);
        tokio::time::timeout(Duration::from_secs(1), drain_watch)
            .await
            .expect("drain watcher should wake up")
            .unwrap();
    }

    #[tokio::test]
    async fn test_close_releases_idle_consumers() {
        let queue = Arc::new(TaskQueue::with_tasks(vec![task(1)]));
        let _in_flight = queue.pop().await.unwrap();

        let popper = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();

        let popped = tokio::time::timeout(Duration::from_secs(1), popper)
            .await
            .expect("close should wake the consumer")
            .unwrap();
        assert_eq!(popped, None);
    }
}

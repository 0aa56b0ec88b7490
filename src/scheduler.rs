// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Task submission for asset loads
//!
//! The asset manager only needs `submit(priority, task)` and the promise
//! that every submitted task eventually runs exactly once.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// Scheduling priority of a load task
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LoadPriority {
    Low,
    #[default]
    Normal,
    High,
}

impl LoadPriority {
    /// Highest first
    pub const DESCENDING: [LoadPriority; 3] =
        [LoadPriority::High, LoadPriority::Normal, LoadPriority::Low];

    fn slot(self) -> usize {
        match self {
            LoadPriority::High => 0,
            LoadPriority::Normal => 1,
            LoadPriority::Low => 2,
        }
    }
}

/// Identifier returned for a submitted task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Unit of work handed to a scheduler
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Executes submitted tasks on some thread, each exactly once
pub trait TaskScheduler: Send + Sync {
    fn submit(&self, priority: LoadPriority, task: Task) -> TaskId;
}

#[derive(Debug, Default)]
struct TaskIds(AtomicU64);

impl TaskIds {
    fn next(&self) -> TaskId {
        TaskId(self.0.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Runs every task on the submitting thread before `submit` returns
#[derive(Debug, Default)]
pub struct InlineScheduler {
    ids: TaskIds,
}

impl InlineScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskScheduler for InlineScheduler {
    fn submit(&self, _priority: LoadPriority, task: Task) -> TaskId {
        let id = self.ids.next();
        task();
        id
    }
}

/// Queues tasks until the owner runs them.
///
/// Useful for deterministic tests: submissions are recorded and executed on
/// demand, highest priority first, FIFO within a priority.
#[derive(Default)]
pub struct DeferredScheduler {
    queues: Mutex<[VecDeque<(TaskId, Task)>; 3]>,
    ids: TaskIds,
    submitted: AtomicU64,
}

impl DeferredScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks waiting to run
    pub fn pending_count(&self) -> usize {
        self.queues.lock().iter().map(VecDeque::len).sum()
    }

    /// Total submissions since creation
    pub fn submitted_count(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Priorities of queued tasks in execution order
    pub fn pending_priorities(&self) -> Vec<LoadPriority> {
        let queues = self.queues.lock();
        LoadPriority::DESCENDING
            .iter()
            .flat_map(|p| std::iter::repeat(*p).take(queues[p.slot()].len()))
            .collect()
    }

    fn pop_next(&self) -> Option<Task> {
        // Lock released before the task runs so it may submit more work
        let mut queues = self.queues.lock();
        queues
            .iter_mut()
            .find_map(VecDeque::pop_front)
            .map(|(_, task)| task)
    }

    /// Run the highest-priority queued task
    pub fn run_one(&self) -> bool {
        match self.pop_next() {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run until the queue is empty, including tasks submitted while running
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while self.run_one() {
            ran += 1;
        }
        ran
    }
}

impl TaskScheduler for DeferredScheduler {
    fn submit(&self, priority: LoadPriority, task: Task) -> TaskId {
        let id = self.ids.next();
        self.submitted.fetch_add(1, Ordering::Relaxed);
        self.queues.lock()[priority.slot()].push_back((id, task));
        id
    }
}

impl std::fmt::Debug for DeferredScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredScheduler")
            .field("pending", &self.pending_count())
            .field("submitted", &self.submitted_count())
            .finish()
    }
}

#[cfg(feature = "parallel")]
pub use self::parallel::RayonTaskScheduler;

#[cfg(feature = "parallel")]
mod parallel {
    use super::{LoadPriority, Task, TaskId, TaskIds, TaskScheduler};
    use crate::error::{AssetError, Result};
    use crossbeam::queue::SegQueue;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct PriorityQueues {
        queues: [SegQueue<Task>; 3],
        pending: AtomicUsize,
    }

    impl PriorityQueues {
        fn pop(&self) -> Option<Task> {
            self.queues.iter().find_map(SegQueue::pop)
        }
    }

    /// Rayon thread pool honoring [`LoadPriority`] among queued tasks.
    ///
    /// Each submission pushes onto its priority queue and spawns one pool job;
    /// the job runs whichever queued task has the highest priority, so every
    /// task runs exactly once.
    pub struct RayonTaskScheduler {
        pool: rayon::ThreadPool,
        shared: Arc<PriorityQueues>,
        ids: TaskIds,
    }

    impl RayonTaskScheduler {
        /// Pool with `threads` workers, 0 = rayon default
        pub fn new(threads: usize) -> Result<Self> {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("asset-worker-{i}"))
                .panic_handler(|_| tracing::error!("asset worker task panicked"))
                .build()
                .map_err(|e| AssetError::SchedulerError(e.to_string()))?;

            tracing::info!(threads = pool.current_num_threads(), "asset worker pool started");

            Ok(Self {
                pool,
                shared: Arc::new(PriorityQueues {
                    queues: [SegQueue::new(), SegQueue::new(), SegQueue::new()],
                    pending: AtomicUsize::new(0),
                }),
                ids: TaskIds::default(),
            })
        }

        pub fn thread_count(&self) -> usize {
            self.pool.current_num_threads()
        }

        /// Tasks submitted but not yet started
        pub fn pending_count(&self) -> usize {
            self.shared.pending.load(Ordering::Acquire)
        }
    }

    impl TaskScheduler for RayonTaskScheduler {
        fn submit(&self, priority: LoadPriority, task: Task) -> TaskId {
            let id = self.ids.next();
            self.shared.queues[priority.slot()].push(task);
            self.shared.pending.fetch_add(1, Ordering::AcqRel);

            let shared = Arc::clone(&self.shared);
            self.pool.spawn(move || {
                if let Some(task) = shared.pop() {
                    shared.pending.fetch_sub(1, Ordering::AcqRel);
                    task();
                }
            });
            id
        }
    }

    impl std::fmt::Debug for RayonTaskScheduler {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("RayonTaskScheduler")
                .field("threads", &self.thread_count())
                .field("pending", &self.pending_count())
                .finish()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_inline_runs_immediately() {
        let scheduler = InlineScheduler::new();
        let hits = Arc::new(AtomicU64::new(0));
        let h = Arc::clone(&hits);
        let a = scheduler.submit(
            LoadPriority::Normal,
            Box::new(move || {
                h.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let b = scheduler.submit(LoadPriority::Low, Box::new(|| {}));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_ne!(a, b);
    }

    #[test]
    fn test_deferred_priority_order() {
        let scheduler = DeferredScheduler::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for (priority, tag) in [
            (LoadPriority::Low, "low"),
            (LoadPriority::Normal, "normal-1"),
            (LoadPriority::High, "high"),
            (LoadPriority::Normal, "normal-2"),
        ] {
            let order = Arc::clone(&order);
            scheduler.submit(priority, Box::new(move || order.lock().push(tag)));
        }

        assert_eq!(scheduler.pending_count(), 4);
        assert_eq!(
            scheduler.pending_priorities(),
            vec![
                LoadPriority::High,
                LoadPriority::Normal,
                LoadPriority::Normal,
                LoadPriority::Low
            ]
        );
        assert_eq!(scheduler.run_pending(), 4);
        assert_eq!(*order.lock(), vec!["high", "normal-1", "normal-2", "low"]);
        assert_eq!(scheduler.submitted_count(), 4);
    }

    #[test]
    fn test_deferred_task_may_submit() {
        let scheduler = Arc::new(DeferredScheduler::new());
        let inner = Arc::clone(&scheduler);
        scheduler.submit(
            LoadPriority::Normal,
            Box::new(move || {
                inner.submit(LoadPriority::High, Box::new(|| {}));
            }),
        );
        assert_eq!(scheduler.run_pending(), 2);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_rayon_runs_each_task_once() {
        let scheduler = RayonTaskScheduler::new(2).unwrap();
        let hits = Arc::new(AtomicU64::new(0));
        let (tx, rx) = crossbeam::channel::unbounded();

        for i in 0..64u64 {
            let hits = Arc::clone(&hits);
            let tx = tx.clone();
            let priority = LoadPriority::DESCENDING[(i % 3) as usize];
            scheduler.submit(
                priority,
                Box::new(move || {
                    hits.fetch_add(1, Ordering::SeqCst);
                    let _ = tx.send(i);
                }),
            );
        }

        let mut seen: Vec<u64> = (0..64)
            .map(|_| rx.recv_timeout(std::time::Duration::from_secs(10)).unwrap())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..64).collect::<Vec<_>>());
        assert_eq!(hits.load(Ordering::SeqCst), 64);
    }
}

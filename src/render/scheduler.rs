//! Deferred work on the UI thread.
//!
//! Two interchangeable implementations:
//! - `IdleQueue` - runs tasks when the host reports an idle period, or once
//!   their timeout has elapsed on a busy host
//! - `FixedDelayScheduler` - runs tasks after a short fixed delay on the
//!   current tokio `LocalSet`, for hosts without idle notifications

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::trace;

/// Fallback delay when no idle callback is available.
pub const FALLBACK_DELAY: Duration = Duration::from_millis(16);

pub type IdleTask = Box<dyn FnOnce()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

pub trait IdleScheduler {
    /// Queues `task`. `timeout` bounds how long it may be deferred.
    fn schedule(&self, timeout: Duration, task: IdleTask) -> TaskId;

    /// Drops a task that has not run yet. Unknown ids are ignored.
    fn cancel(&self, id: TaskId);
}

struct Pending {
    id: TaskId,
    deadline: Instant,
    task: IdleTask,
}

/// Idle-priority scheduler driven by the host event loop.
#[derive(Default)]
pub struct IdleQueue {
    queue: RefCell<VecDeque<Pending>>,
    next_id: Cell<u64>,
}

impl IdleQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    /// The host went idle: run the tasks queued so far. Tasks scheduled while
    /// running wait for the next idle period.
    pub fn run_idle(&self) -> usize {
        let count = self.len();
        let mut ran = 0;
        for _ in 0..count {
            // Release the borrow before running: tasks may schedule more work.
            let next = self.queue.borrow_mut().pop_front();
            let Some(pending) = next else {
                break;
            };
            (pending.task)();
            ran += 1;
        }
        ran
    }

    /// Runs tasks whose timeout expired by `now`, even though the host is busy.
    pub fn run_expired(&self, now: Instant) -> usize {
        let expired: Vec<Pending> = {
            let mut queue = self.queue.borrow_mut();
            let (due, keep): (VecDeque<Pending>, VecDeque<Pending>) =
                queue.drain(..).partition(|p| p.deadline <= now);
            *queue = keep;
            due.into()
        };
        let ran = expired.len();
        for pending in expired {
            trace!(id = pending.id.0, "Idle task timed out, running");
            (pending.task)();
        }
        ran
    }
}

impl IdleScheduler for IdleQueue {
    fn schedule(&self, timeout: Duration, task: IdleTask) -> TaskId {
        let id = TaskId(self.next_id.get());
        self.next_id.set(id.0.wrapping_add(1));
        self.queue.borrow_mut().push_back(Pending {
            id,
            deadline: Instant::now() + timeout,
            task,
        });
        id
    }

    fn cancel(&self, id: TaskId) {
        self.queue.borrow_mut().retain(|p| p.id != id);
    }
}

/// Runs each task after a fixed delay on the current `LocalSet`.
pub struct FixedDelayScheduler {
    delay: Duration,
    handles: Rc<RefCell<HashMap<TaskId, JoinHandle<()>>>>,
    next_id: Cell<u64>,
}

impl FixedDelayScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            handles: Rc::new(RefCell::new(HashMap::new())),
            next_id: Cell::new(0),
        }
    }

    pub fn pending(&self) -> usize {
        self.handles.borrow().len()
    }
}

impl Default for FixedDelayScheduler {
    fn default() -> Self {
        Self::new(FALLBACK_DELAY)
    }
}

impl IdleScheduler for FixedDelayScheduler {
    /// The delay is always shorter than any timeout, so `timeout` is unused.
    fn schedule(&self, _timeout: Duration, task: IdleTask) -> TaskId {
        let id = TaskId(self.next_id.get());
        self.next_id.set(id.0.wrapping_add(1));
        let delay = self.delay;
        let handles = Rc::clone(&self.handles);
        let handle = tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            handles.borrow_mut().remove(&id);
            task();
        });
        self.handles.borrow_mut().insert(id, handle);
        id
    }

    fn cancel(&self, id: TaskId) {
        if let Some(handle) = self.handles.borrow_mut().remove(&id) {
            handle.abort();
        }
    }
}

impl Drop for FixedDelayScheduler {
    fn drop(&mut self) {
        for (_, handle) in self.handles.borrow_mut().drain() {
            handle.abort();
        }
    }
}

/// Picks the scheduler once at startup: idle-priority when the host can
/// report idle periods, fixed-delay otherwise.
pub fn select_scheduler(idle: Option<Rc<IdleQueue>>) -> Rc<dyn IdleScheduler> {
    match idle {
        Some(queue) => queue as Rc<dyn IdleScheduler>,
        None => Rc::new(FixedDelayScheduler::default()) as Rc<dyn IdleScheduler>,
    }
}

//! Autocomplete providers and the cooperative task runner that feeds them.
//!
//! Work that may touch every loaded type never runs to completion in one go.
//! It is wrapped in a [`CooperativeTask`] that does a bounded slice per host
//! tick, publishes whatever it found so far, and checks its
//! [`CancellationToken`] between items.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

pub mod enums;
pub mod types;

pub use enums::EnumCompleter;
pub use types::TypeCompleter;

/// One autocomplete row: what is shown and what is inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub label: String,
    pub value: String,
}

impl Suggestion {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Complete,
    Cancelled,
}

/// How much work one slice may do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceBudget {
    Time(Duration),
    Items(usize),
}

/// Budget tracker handed to a task for one step
#[derive(Debug)]
pub struct Slice {
    budget: SliceBudget,
    started: Instant,
    used: usize,
}

impl Slice {
    pub fn new(budget: SliceBudget) -> Self {
        Self {
            budget,
            started: Instant::now(),
            used: 0,
        }
    }

    /// Claims one unit of work; `false` once the slice is spent
    pub fn claim(&mut self) -> bool {
        let allowed = match self.budget {
            SliceBudget::Items(n) => self.used < n,
            SliceBudget::Time(limit) => self.started.elapsed() < limit,
        };
        if allowed {
            self.used += 1;
        }
        allowed
    }
}

pub trait CooperativeTask {
    fn name(&self) -> &str;

    /// Does as much work as `slice` allows
    fn step(&mut self, slice: &mut Slice) -> TaskStatus;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

struct RunningTask {
    id: TaskId,
    token: CancellationToken,
    task: Box<dyn CooperativeTask>,
}

/// Drives every live task one slice per tick
#[derive(Default)]
pub struct TaskRunner {
    tasks: Vec<RunningTask>,
    next_id: u64,
}

impl TaskRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, task: Box<dyn CooperativeTask>, token: CancellationToken) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        debug!("Starting task {} ({:?})", task.name(), id);
        self.tasks.push(RunningTask { id, token, task });
        id
    }

    pub fn is_running(&self, id: TaskId) -> bool {
        self.tasks.iter().any(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Steps every task once. Finished and cancelled tasks are dropped.
    pub fn tick(&mut self, budget: SliceBudget) {
        self.tasks.retain_mut(|running| {
            if running.token.is_cancelled() {
                debug!("Task {} cancelled", running.task.name());
                return false;
            }
            let mut slice = Slice::new(budget);
            match running.task.step(&mut slice) {
                TaskStatus::Pending => true,
                TaskStatus::Complete => {
                    debug!("Task {} complete", running.task.name());
                    false
                }
                TaskStatus::Cancelled => {
                    debug!("Task {} cancelled", running.task.name());
                    false
                }
            }
        });
    }

    /// Runs until every task is done
    pub fn drain(&mut self, budget: SliceBudget) {
        while !self.tasks.is_empty() {
            self.tick(budget);
        }
    }
}

/// Suggestions shared between a running task and its completer
pub type SuggestionSink = Arc<parking_lot::Mutex<Vec<Suggestion>>>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Counter {
        left: usize,
        steps: Arc<parking_lot::Mutex<usize>>,
    }

    impl CooperativeTask for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn step(&mut self, slice: &mut Slice) -> TaskStatus {
            *self.steps.lock() += 1;
            while self.left > 0 {
                if !slice.claim() {
                    return TaskStatus::Pending;
                }
                self.left -= 1;
            }
            TaskStatus::Complete
        }
    }

    #[test]
    fn test_runner_slices_work() {
        let steps = Arc::new(parking_lot::Mutex::new(0));
        let mut runner = TaskRunner::new();
        let id = runner.spawn(
            Box::new(Counter {
                left: 10,
                steps: steps.clone(),
            }),
            CancellationToken::new(),
        );
        runner.tick(SliceBudget::Items(4));
        assert!(runner.is_running(id));
        runner.drain(SliceBudget::Items(4));
        assert_eq!(*steps.lock(), 3);
        assert!(runner.is_empty());
    }

    #[test]
    fn test_cancelled_task_is_dropped_before_stepping() {
        let steps = Arc::new(parking_lot::Mutex::new(0));
        let token = CancellationToken::new();
        let mut runner = TaskRunner::new();
        runner.spawn(
            Box::new(Counter {
                left: 10,
                steps: steps.clone(),
            }),
            token.clone(),
        );
        token.cancel();
        runner.tick(SliceBudget::Items(4));
        assert!(runner.is_empty());
        assert_eq!(*steps.lock(), 0);
    }
}

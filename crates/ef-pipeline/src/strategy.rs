//! Scheduling a job's tasks.
//!
//! Both strategies stop at the first failed task and check for
//! cancellation before starting each task. A task that was never started
//! stays `pending`; the executor decides what happens to it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use ef_core::config::StrategyKind;
use ef_core::{EncodingTask, Result, TaskId, TaskState};
use ef_planner::TaskGraph;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::task::{TaskOutcome, TaskRunner};

/// How a strategy run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed,
    Failed { task_id: TaskId, error: String },
    Cancelled,
}

#[async_trait]
pub trait ExecutionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run every `pending` task in `tasks`; tasks in any other state are
    /// treated as already settled.
    async fn run(
        &self,
        runner: &TaskRunner,
        tasks: Vec<EncodingTask>,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome>;
}

pub fn strategy_for(kind: StrategyKind, max_parallel_tasks: usize) -> Arc<dyn ExecutionStrategy> {
    match kind {
        StrategyKind::Sequential => Arc::new(SequentialStrategy),
        StrategyKind::Dependency => Arc::new(DependencyStrategy::new(max_parallel_tasks)),
    }
}

// ---------------------------------------------------------------------------
// SequentialStrategy
// ---------------------------------------------------------------------------

/// One task at a time, in sequence order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialStrategy;

#[async_trait]
impl ExecutionStrategy for SequentialStrategy {
    fn name(&self) -> &'static str {
        "sequential"
    }

    async fn run(
        &self,
        runner: &TaskRunner,
        mut tasks: Vec<EncodingTask>,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        tasks.sort_by_key(|t| t.sequence);

        for task in tasks.iter().filter(|t| t.state == TaskState::Pending) {
            if cancel.is_cancelled() {
                return Ok(RunOutcome::Cancelled);
            }
            match runner.run(task, cancel).await? {
                TaskOutcome::Completed => {}
                TaskOutcome::Failed(error) => {
                    return Ok(RunOutcome::Failed {
                        task_id: task.id,
                        error,
                    })
                }
                TaskOutcome::Cancelled => return Ok(RunOutcome::Cancelled),
            }
        }
        Ok(RunOutcome::Completed)
    }
}

// ---------------------------------------------------------------------------
// DependencyStrategy
// ---------------------------------------------------------------------------

/// Starts a task once all of its prerequisites completed, with at most
/// `max_parallel` tasks running at once.
///
/// After a failure or cancellation no new task starts; tasks already
/// running are awaited so none is left `processing`.
#[derive(Debug, Clone, Copy)]
pub struct DependencyStrategy {
    max_parallel: usize,
}

impl DependencyStrategy {
    pub fn new(max_parallel: usize) -> Self {
        Self {
            max_parallel: max_parallel.max(1),
        }
    }
}

impl Default for DependencyStrategy {
    fn default() -> Self {
        Self::new(2)
    }
}

#[async_trait]
impl ExecutionStrategy for DependencyStrategy {
    fn name(&self) -> &'static str {
        "dependency"
    }

    async fn run(
        &self,
        runner: &TaskRunner,
        tasks: Vec<EncodingTask>,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        let graph = TaskGraph::new(&tasks)?;
        let by_id: HashMap<TaskId, &EncodingTask> = tasks.iter().map(|t| (t.id, t)).collect();

        let mut completed: HashSet<TaskId> = tasks
            .iter()
            .filter(|t| t.state == TaskState::Completed)
            .map(|t| t.id)
            .collect();
        // Started or settled; never scheduled again.
        let mut taken: HashSet<TaskId> = tasks
            .iter()
            .filter(|t| t.state != TaskState::Pending)
            .map(|t| t.id)
            .collect();

        let mut running = FuturesUnordered::new();
        let mut outcome = RunOutcome::Completed;

        loop {
            if outcome == RunOutcome::Completed {
                if cancel.is_cancelled() {
                    outcome = RunOutcome::Cancelled;
                } else {
                    for id in graph.ready(&completed, &taken) {
                        if running.len() >= self.max_parallel {
                            break;
                        }
                        let Some(&task) = by_id.get(&id) else {
                            continue;
                        };
                        taken.insert(id);
                        tracing::debug!(task_id = %id, "Scheduling task");
                        running.push(async move { (id, runner.run(task, cancel).await) });
                    }
                }
            }

            let Some((id, result)) = running.next().await else {
                break;
            };
            match result {
                Ok(TaskOutcome::Completed) => {
                    completed.insert(id);
                }
                Ok(TaskOutcome::Failed(error)) => {
                    if outcome == RunOutcome::Completed {
                        outcome = RunOutcome::Failed { task_id: id, error };
                    }
                }
                Ok(TaskOutcome::Cancelled) => {
                    if outcome == RunOutcome::Completed {
                        outcome = RunOutcome::Cancelled;
                    }
                }
                Err(e) => {
                    // Drain the rest before reporting.
                    while running.next().await.is_some() {}
                    return Err(e);
                }
            }
        }

        Ok(outcome)
    }
}

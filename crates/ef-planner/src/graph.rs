//! Task dependency DAG.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use ef_core::{EncodingTask, Error, Result, TaskId};

/// Prerequisites of every task in one job, checked to be acyclic.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    /// Task ids in sequence order.
    order: Vec<TaskId>,
    prerequisites: BTreeMap<TaskId, BTreeSet<TaskId>>,
}

impl TaskGraph {
    /// Build the graph for `tasks`.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] when a task depends on itself, on a task
    /// outside the list, or when the dependencies form a cycle.
    pub fn new(tasks: &[EncodingTask]) -> Result<Self> {
        let mut sorted: Vec<&EncodingTask> = tasks.iter().collect();
        sorted.sort_by_key(|t| t.sequence);
        let order: Vec<TaskId> = sorted.iter().map(|t| t.id).collect();
        let known: HashSet<TaskId> = order.iter().copied().collect();

        let mut prerequisites = BTreeMap::new();
        for task in &sorted {
            let mut deps = BTreeSet::new();
            for &dep in &task.dependencies {
                if dep == task.id {
                    return Err(Error::Validation(format!("task {} depends on itself", task.id)));
                }
                if !known.contains(&dep) {
                    return Err(Error::Validation(format!(
                        "task {} depends on unknown task {dep}",
                        task.id
                    )));
                }
                deps.insert(dep);
            }
            prerequisites.insert(task.id, deps);
        }

        let graph = Self {
            order,
            prerequisites,
        };
        graph.topological_order()?;
        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn prerequisites(&self, id: TaskId) -> Option<&BTreeSet<TaskId>> {
        self.prerequisites.get(&id)
    }

    /// Kahn's algorithm, breaking ties by sequence so that a chain-free job
    /// keeps its list order.
    pub fn topological_order(&self) -> Result<Vec<TaskId>> {
        let mut remaining: BTreeMap<TaskId, usize> = self
            .prerequisites
            .iter()
            .map(|(id, deps)| (*id, deps.len()))
            .collect();

        let mut ready: VecDeque<TaskId> = self
            .order
            .iter()
            .filter(|id| remaining.get(id) == Some(&0))
            .copied()
            .collect();
        let mut sorted = Vec::with_capacity(self.order.len());

        while let Some(id) = ready.pop_front() {
            sorted.push(id);
            for candidate in &self.order {
                if !self.prerequisites[candidate].contains(&id) {
                    continue;
                }
                if let Some(count) = remaining.get_mut(candidate) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push_back(*candidate);
                    }
                }
            }
        }

        if sorted.len() != self.order.len() {
            return Err(Error::Validation("task dependencies contain a cycle".into()));
        }
        Ok(sorted)
    }

    /// Tasks not yet `done` whose prerequisites are all in `completed`,
    /// in sequence order.
    pub fn ready(&self, completed: &HashSet<TaskId>, done: &HashSet<TaskId>) -> Vec<TaskId> {
        self.order
            .iter()
            .filter(|id| !done.contains(id))
            .filter(|id| self.prerequisites[*id].iter().all(|d| completed.contains(d)))
            .copied()
            .collect()
    }
}

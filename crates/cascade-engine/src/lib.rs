//! The task dependency graph: registers tasks and their dependencies, checks acyclicity, and
//! hands the runner an execution order.
//!
//! Mirrors the typestate split used elsewhere in this workspace for graphs under construction:
//! mutation methods exist only on [`TaskCollection<Building>`]; `ordered_tasks` exists only on
//! [`TaskCollection<Built>`]. A caller cannot accidentally mutate a frozen collection because the
//! method simply isn't there to call.

use std::collections::HashMap;
use std::marker::PhantomData;

use cascade_task_id::TaskId;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("task `{0}` is already registered")]
    DuplicateTask(TaskId),
    #[error("unknown task `{0}`")]
    UnknownTask(TaskId),
    #[error("cyclic task dependency: {}", format_cycle(chain))]
    CyclicDependency { chain: Vec<TaskId> },
}

fn format_cycle(chain: &[TaskId]) -> String {
    let mut labels: Vec<String> = chain.iter().map(|id| id.to_string()).collect();
    if let Some(first) = labels.first().cloned() {
        labels.push(first);
    }
    labels.join(" -> ")
}

#[derive(Debug)]
pub struct Building;
#[derive(Debug)]
pub struct Built;

/// A task dependency graph, parameterized by construction state.
///
/// Edge `a -> b` means "`a` depends on `b`"; `b` must reach a success-like state before `a` can
/// start.
pub struct TaskCollection<S = Built> {
    marker: PhantomData<S>,
    graph: DiGraph<TaskId, ()>,
    lookup: HashMap<TaskId, NodeIndex>,
    ignore_dependency_order: bool,
}

impl TaskCollection<Building> {
    pub fn new(ignore_dependency_order: bool) -> Self {
        Self {
            marker: PhantomData,
            graph: DiGraph::new(),
            lookup: HashMap::new(),
            ignore_dependency_order,
        }
    }

    pub fn add_task(&mut self, task: TaskId) -> Result<(), EngineError> {
        if self.lookup.contains_key(&task) {
            return Err(EngineError::DuplicateTask(task));
        }
        let index = self.graph.add_node(task.clone());
        self.lookup.insert(task, index);
        Ok(())
    }

    pub fn add_dependencies(
        &mut self,
        task: &TaskId,
        dependencies: &[TaskId],
    ) -> Result<(), EngineError> {
        let &from = self.lookup.get(task).ok_or_else(|| EngineError::UnknownTask(task.clone()))?;
        for dependency in dependencies {
            let &to = self
                .lookup
                .get(dependency)
                .ok_or_else(|| EngineError::UnknownTask(dependency.clone()))?;
            self.graph.add_edge(from, to, ());
        }
        Ok(())
    }

    /// Checks acyclicity and freezes the collection. On a cycle, the error names the exact chain,
    /// innermost task first, reversed back out to the task whose edge closed the loop.
    ///
    /// When constructed with `ignore_dependency_order`, every recorded dependency edge is
    /// dropped here: the frozen collection has no edges at all, so `dependencies_of`,
    /// `dependents_of`, and scheduling order all agree that every task is independent.
    pub fn build(mut self) -> Result<TaskCollection<Built>, EngineError> {
        if let Some(chain) = find_cycle(&self.graph) {
            return Err(EngineError::CyclicDependency { chain });
        }
        if self.ignore_dependency_order {
            self.graph.clear_edges();
        }
        Ok(TaskCollection {
            marker: PhantomData,
            graph: self.graph,
            lookup: self.lookup,
            ignore_dependency_order: self.ignore_dependency_order,
        })
    }
}

impl TaskCollection<Built> {
    pub fn tasks(&self) -> impl Iterator<Item = &TaskId> {
        self.graph.node_weights()
    }

    /// Direct dependencies of `task`, in no particular order.
    pub fn dependencies_of(&self, task: &TaskId) -> Vec<&TaskId> {
        let Some(&index) = self.lookup.get(task) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(index, Direction::Outgoing)
            .map(|neighbor| &self.graph[neighbor])
            .collect()
    }

    /// Direct dependents of `task` (tasks whose edge points at it), in no particular order.
    pub fn dependents_of(&self, task: &TaskId) -> Vec<&TaskId> {
        let Some(&index) = self.lookup.get(task) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(index, Direction::Incoming)
            .map(|neighbor| &self.graph[neighbor])
            .collect()
    }

    /// Tasks sorted by descending critical-path length, ties broken by ascending task name.
    ///
    /// With `ignore_dependency_order`, `build()` already dropped every edge, so every task's
    /// critical-path length is zero here and the order collapses to lexicographic.
    pub fn ordered_tasks(&self) -> Vec<&TaskId> {
        let mut memo: HashMap<NodeIndex, usize> = HashMap::new();
        let mut ordered: Vec<(&TaskId, usize)> = self
            .graph
            .node_indices()
            .map(|index| (&self.graph[index], critical_path_length(&self.graph, index, &mut memo)))
            .collect();
        ordered.sort_by(|(name_a, length_a), (name_b, length_b)| {
            length_b.cmp(length_a).then_with(|| name_a.as_ref().cmp(name_b.as_ref()))
        });
        ordered.into_iter().map(|(task, _)| task).collect()
    }
}

/// Critical-path length of `index`: 0 if nothing depends on it, otherwise 1 + the max
/// critical-path length over its dependents (the tasks with an edge pointing at `index`).
fn critical_path_length(
    graph: &DiGraph<TaskId, ()>,
    index: NodeIndex,
    memo: &mut HashMap<NodeIndex, usize>,
) -> usize {
    if let Some(&cached) = memo.get(&index) {
        return cached;
    }
    let length = graph
        .neighbors_directed(index, Direction::Incoming)
        .map(|dependent| 1 + critical_path_length(graph, dependent, memo))
        .max()
        .unwrap_or(0);
    memo.insert(index, length);
    length
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Active,
    Done,
}

/// Hand-rolled DFS over the dependency relation, tracking an active stack so a cycle is reported
/// with the exact chain rather than a bare boolean.
fn find_cycle(graph: &DiGraph<TaskId, ()>) -> Option<Vec<TaskId>> {
    let mut state: HashMap<NodeIndex, VisitState> = HashMap::new();
    let mut stack: Vec<NodeIndex> = Vec::new();

    for start in graph.node_indices() {
        if state.contains_key(&start) {
            continue;
        }
        if let Some(chain) = visit(graph, start, &mut state, &mut stack) {
            return Some(chain);
        }
    }
    None
}

fn visit(
    graph: &DiGraph<TaskId, ()>,
    node: NodeIndex,
    state: &mut HashMap<NodeIndex, VisitState>,
    stack: &mut Vec<NodeIndex>,
) -> Option<Vec<TaskId>> {
    state.insert(node, VisitState::Active);
    stack.push(node);

    for dependency in graph.neighbors_directed(node, Direction::Outgoing) {
        match state.get(&dependency) {
            Some(VisitState::Active) => {
                let start =
                    stack.iter().position(|&n| n == dependency).expect("active node is on the stack");
                let mut chain: Vec<TaskId> = stack[start..].iter().map(|&n| graph[n].clone()).collect();
                chain.reverse();
                return Some(chain);
            }
            Some(VisitState::Done) => continue,
            None => {
                if let Some(chain) = visit(graph, dependency, state, stack) {
                    return Some(chain);
                }
            }
        }
    }

    stack.pop();
    state.insert(node, VisitState::Done);
    None
}

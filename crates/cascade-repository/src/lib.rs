//! The project graph: an immutable directed graph of project nodes with local-dependency edges,
//! plus filtered subgraph selection by `to`/`from` project sets.

mod project_id;

use std::collections::HashMap;

use cascade_paths::AbsoluteSystemPathBuf;
use petgraph::graph::{Graph, NodeIndex};
pub use project_id::ProjectId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("project `{0}` declares a dependency on unknown project `{1}`")]
    UnknownDependency(ProjectId, ProjectId),
    #[error("unknown project `{0}` in selection filter")]
    UnknownSelector(ProjectId),
}

/// A single workspace project: identity, location, and its declared scripts.
#[derive(Debug, Clone)]
pub struct Project {
    id: ProjectId,
    root: AbsoluteSystemPathBuf,
    scripts: HashMap<String, String>,
}

impl Project {
    pub fn new(id: ProjectId, root: AbsoluteSystemPathBuf, scripts: HashMap<String, String>) -> Self {
        Self { id, root, scripts }
    }

    pub fn id(&self) -> &ProjectId {
        &self.id
    }

    pub fn root(&self) -> &AbsoluteSystemPathBuf {
        &self.root
    }

    pub fn script(&self, name: &str) -> Option<&str> {
        self.scripts.get(name).map(String::as_str)
    }
}

/// Two-phase construction marker: edges and nodes accumulate on `Building`, validation happens
/// once in `build()`, and only a `Built` graph exposes read queries.
#[derive(Debug, Default)]
pub struct Building;
#[derive(Debug, Default)]
pub struct Built;

/// An immutable directed graph of projects. Edges mean "depends on"; the graph is not required
/// to be acyclic here (cycle detection is the task collection's job).
#[derive(Debug)]
pub struct ProjectGraph<S = Built> {
    marker: std::marker::PhantomData<S>,
    graph: Graph<Project, ()>,
    lookup: HashMap<ProjectId, NodeIndex>,
    pending_errors: Vec<(ProjectId, ProjectId)>,
}

impl ProjectGraph<Building> {
    pub fn new() -> Self {
        Self {
            marker: std::marker::PhantomData,
            graph: Graph::new(),
            lookup: HashMap::new(),
            pending_errors: Vec::new(),
        }
    }

    pub fn add_project(&mut self, project: Project) {
        let id = project.id().clone();
        let index = self.graph.add_node(project);
        self.lookup.insert(id, index);
    }

    /// Records a dependency edge `from` -> `to` (`from` depends on `to`). Both endpoints must
    /// already have been added via [`Self::add_project`]; unresolvable endpoints surface as a
    /// `ConfigError` from [`Self::build`].
    pub fn add_dependency(&mut self, from: &ProjectId, to: &ProjectId) {
        if let (Some(&from_idx), Some(&to_idx)) = (self.lookup.get(from), self.lookup.get(to)) {
            self.graph.add_edge(from_idx, to_idx, ());
        } else {
            self.pending_errors.push((from.clone(), to.clone()));
        }
    }

    pub fn build(self) -> Result<ProjectGraph<Built>, ConfigError> {
        if let Some((from, to)) = self.pending_errors.into_iter().next() {
            return Err(ConfigError::UnknownDependency(from, to));
        }
        Ok(ProjectGraph {
            marker: std::marker::PhantomData,
            graph: self.graph,
            lookup: self.lookup,
            pending_errors: Vec::new(),
        })
    }
}

impl Default for ProjectGraph<Building> {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectGraph<Built> {
    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.graph.node_weights()
    }

    pub fn project(&self, id: &ProjectId) -> Option<&Project> {
        self.lookup.get(id).map(|&idx| &self.graph[idx])
    }

    /// Returns the set of projects to execute: `to`'s transitive upstream closure (itself plus
    /// dependencies) unioned with `from`'s transitive downstream closure (itself plus
    /// dependents). Both empty selects the whole graph.
    pub fn select(&self, to: &[ProjectId], from: &[ProjectId]) -> Result<Vec<&Project>, ConfigError> {
        if to.is_empty() && from.is_empty() {
            return Ok(self.graph.node_weights().collect());
        }

        let to_indices = self.resolve_indices(to)?;
        let from_indices = self.resolve_indices(from)?;

        let mut selected: std::collections::HashSet<&Project> = std::collections::HashSet::new();
        if !to_indices.is_empty() {
            selected.extend(cascade_graph_utils::transitive_closure(
                &self.graph,
                to_indices,
                petgraph::Direction::Outgoing,
            ));
        }
        if !from_indices.is_empty() {
            selected.extend(cascade_graph_utils::transitive_closure(
                &self.graph,
                from_indices,
                petgraph::Direction::Incoming,
            ));
        }

        let mut result: Vec<&Project> = selected.into_iter().collect();
        result.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(result)
    }

    fn resolve_indices(&self, ids: &[ProjectId]) -> Result<Vec<NodeIndex>, ConfigError> {
        ids.iter()
            .map(|id| {
                self.lookup
                    .get(id)
                    .copied()
                    .ok_or_else(|| ConfigError::UnknownSelector(id.clone()))
            })
            .collect()
    }
}

impl Eq for Project {}
impl PartialEq for Project {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl std::hash::Hash for Project {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(name: &str) -> Project {
        Project::new(
            ProjectId::new(name),
            AbsoluteSystemPathBuf::new(format!("/repo/{name}")).unwrap(),
            HashMap::new(),
        )
    }

    fn sample_graph() -> ProjectGraph<Built> {
        // web -> ui -> core, api -> core
        let mut builder = ProjectGraph::new();
        builder.add_project(project("web"));
        builder.add_project(project("ui"));
        builder.add_project(project("core"));
        builder.add_project(project("api"));
        builder.add_dependency(&ProjectId::new("web"), &ProjectId::new("ui"));
        builder.add_dependency(&ProjectId::new("ui"), &ProjectId::new("core"));
        builder.add_dependency(&ProjectId::new("api"), &ProjectId::new("core"));
        builder.build().unwrap()
    }

    #[test]
    fn build_rejects_unknown_dependency_endpoint() {
        let mut builder = ProjectGraph::new();
        builder.add_project(project("web"));
        builder.add_dependency(&ProjectId::new("web"), &ProjectId::new("missing"));
        assert!(matches!(builder.build(), Err(ConfigError::UnknownDependency(_, _))));
    }

    #[test]
    fn empty_selectors_select_everything() {
        let graph = sample_graph();
        let selected = graph.select(&[], &[]).unwrap();
        assert_eq!(selected.len(), 4);
    }

    #[test]
    fn to_selects_transitive_upstream_closure() {
        let graph = sample_graph();
        let selected = graph.select(&[ProjectId::new("web")], &[]).unwrap();
        let ids: Vec<_> = selected.iter().map(|p| p.id().as_str()).collect();
        assert_eq!(ids, vec!["core", "ui", "web"]);
    }

    #[test]
    fn from_selects_transitive_downstream_closure() {
        let graph = sample_graph();
        let selected = graph.select(&[], &[ProjectId::new("core")]).unwrap();
        let ids: Vec<_> = selected.iter().map(|p| p.id().as_str()).collect();
        assert_eq!(ids, vec!["api", "core", "ui", "web"]);
    }

    #[test]
    fn to_and_from_union() {
        let graph = sample_graph();
        let selected = graph
            .select(&[ProjectId::new("web")], &[ProjectId::new("api")])
            .unwrap();
        let ids: Vec<_> = selected.iter().map(|p| p.id().as_str()).collect();
        assert_eq!(ids, vec!["api", "core", "ui", "web"]);
    }

    #[test]
    fn unknown_selector_is_an_error() {
        let graph = sample_graph();
        assert!(matches!(
            graph.select(&[ProjectId::new("nope")], &[]),
            Err(ConfigError::UnknownSelector(_))
        ));
    }
}

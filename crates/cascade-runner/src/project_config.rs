//! Reads a flat `cascade.json` describing a repository's projects, scripts, and local
//! dependencies. Deliberately the simplest possible stand-in for real workspace-manifest
//! discovery — just enough to point the scheduler at a graph for tests and manual runs.

use std::collections::HashMap;

use cascade_paths::AbsoluteSystemPathBuf;
use cascade_repository::{Project, ProjectGraph, ProjectId};
use cascade_task_id::TaskId;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Deserialize)]
struct RawProject {
    dir: String,
    #[serde(default)]
    scripts: HashMap<String, String>,
    #[serde(default, rename = "dependsOn")]
    depends_on: Vec<String>,
    /// Glob patterns this project's scripts are expected to produce; not part of the literal
    /// schema the interface calls out, but without it the build cache would have nothing to
    /// archive for every project in a demo run.
    #[serde(default)]
    outputs: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    projects: HashMap<String, RawProject>,
}

#[derive(Debug, Error)]
pub enum ProjectConfigError {
    #[error("failed to read {0}: {1}")]
    Io(String, String),
    #[error("failed to parse {0}: {1}")]
    Parse(String, String),
    #[error("project `{0}` has a dir that is not a valid path: {1}")]
    InvalidDir(String, String),
    #[error(transparent)]
    Graph(#[from] cascade_repository::ConfigError),
}

/// A loaded repository: the project graph plus each project's declared output globs, keyed by
/// `TaskId` once a command name is chosen.
pub struct RepositoryConfig {
    pub graph: ProjectGraph,
    output_globs: HashMap<ProjectId, Vec<String>>,
    dependencies: HashMap<ProjectId, Vec<ProjectId>>,
}

impl RepositoryConfig {
    pub fn load(
        path: &AbsoluteSystemPathBuf,
        repo_root: &AbsoluteSystemPathBuf,
    ) -> Result<Self, ProjectConfigError> {
        let contents = std::fs::read_to_string(path.as_path())
            .map_err(|e| ProjectConfigError::Io(path.to_string(), e.to_string()))?;
        let raw: RawConfig = serde_json::from_str(&contents)
            .map_err(|e| ProjectConfigError::Parse(path.to_string(), e.to_string()))?;

        let mut builder = ProjectGraph::new();
        let mut output_globs = HashMap::new();
        let mut dependencies = HashMap::new();
        for (name, raw_project) in &raw.projects {
            let id = ProjectId::new(name.clone());
            let root = repo_root.join(&raw_project.dir);
            builder.add_project(Project::new(id.clone(), root, raw_project.scripts.clone()));
            output_globs.insert(id, raw_project.outputs.clone());
        }
        for (name, raw_project) in &raw.projects {
            let from = ProjectId::new(name.clone());
            let deps: Vec<ProjectId> = raw_project.depends_on.iter().map(|d| ProjectId::new(d.clone())).collect();
            for dependency in &deps {
                builder.add_dependency(&from, dependency);
            }
            dependencies.insert(from, deps);
        }

        let graph = builder.build()?;
        Ok(Self { graph, output_globs, dependencies })
    }

    /// Output globs declared for `project`, empty if none were declared.
    pub fn output_globs(&self, project: &ProjectId) -> Vec<String> {
        self.output_globs.get(project).cloned().unwrap_or_default()
    }

    /// The direct (non-transitive) dependencies declared for `project` in `cascade.json`.
    pub fn direct_dependencies(&self, project: &ProjectId) -> Vec<ProjectId> {
        self.dependencies.get(project).cloned().unwrap_or_default()
    }
}

/// A task identifier is `<project>#<command>`; this is the one place that convention is encoded
/// for the demo CLI (the scheduler itself only ever deals in opaque `TaskId`s).
pub fn task_id(project: &ProjectId, command_name: &str) -> TaskId {
    TaskId::new(format!("{project}#{command_name}")).expect("project and command names are valid task segments")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_projects_and_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let repo_root = AbsoluteSystemPathBuf::new(dir.path().canonicalize().unwrap()).unwrap();
        let config_path = repo_root.join("cascade.json");
        std::fs::write(
            config_path.as_path(),
            r#"{
                "projects": {
                    "web": { "dir": "apps/web", "scripts": { "build": "echo web" }, "dependsOn": ["ui"] },
                    "ui": { "dir": "packages/ui", "scripts": { "build": "echo ui" }, "outputs": ["dist/**"] }
                }
            }"#,
        )
        .unwrap();

        let config = RepositoryConfig::load(&config_path, &repo_root).unwrap();
        assert_eq!(config.graph.projects().count(), 2);
        assert_eq!(config.output_globs(&ProjectId::new("ui")), vec!["dist/**".to_string()]);
        assert!(config.output_globs(&ProjectId::new("web")).is_empty());
    }

    #[test]
    fn rejects_unknown_dependency() {
        let dir = tempfile::tempdir().unwrap();
        let repo_root = AbsoluteSystemPathBuf::new(dir.path().canonicalize().unwrap()).unwrap();
        let config_path = repo_root.join("cascade.json");
        std::fs::write(
            config_path.as_path(),
            r#"{ "projects": { "web": { "dir": ".", "dependsOn": ["missing"] } } }"#,
        )
        .unwrap();

        assert!(RepositoryConfig::load(&config_path, &repo_root).is_err());
    }
}

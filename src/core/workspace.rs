//! Workspace - the explicit build context.
//!
//! A [`Workspace`] owns the project list, the layered configuration store
//! and the machine registry for one build run. It replaces process-global
//! state so independent builds (and tests) cannot cross-contaminate.
//!
//! The script collaborator talks to the workspace through a narrow
//! registration API: create projects, look them up, log. Script evaluation
//! itself happens outside the core; [`EvalContext`] tracks the
//! current-working-directory stack and the list of evaluated files for
//! diagnostics.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::language::Language;
use crate::core::machine::MachineRegistry;
use crate::core::project::{BinaryType, Project, ProjectError};
use crate::util::config::ConfigStore;

/// Error registering a project.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("a project named `{0}` is already registered")]
    DuplicateProject(String),
    #[error(transparent)]
    Project(#[from] ProjectError),
}

/// The build context for one workspace run.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    config: ConfigStore,
    machines: MachineRegistry,
    /// Projects in registration order. Registration order is the
    /// topological tie-break, so it matters.
    projects: Vec<Project>,
}

impl Workspace {
    /// Create a workspace rooted at `root` with the given configuration.
    pub fn new(root: &Path, config: ConfigStore) -> Self {
        Workspace {
            root: root.to_path_buf(),
            config,
            machines: MachineRegistry::with_builtin(),
            projects: Vec::new(),
        }
    }

    /// The workspace root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The configuration store.
    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    /// The machine registry.
    pub fn machines(&self) -> &MachineRegistry {
        &self.machines
    }

    /// Mutable machine registry, for startup registration only.
    pub fn machines_mut(&mut self) -> &mut MachineRegistry {
        &mut self.machines
    }

    /// Construct a project and register it. This is the registration hook
    /// handed to the script collaborator.
    pub fn create_project(
        &mut self,
        name: &str,
        binary_type: BinaryType,
        language: Language,
        directory: &Path,
    ) -> Result<&mut Project, WorkspaceError> {
        let project = Project::new(name, binary_type, language, directory, &self.config, &self.root)?;
        self.add_project(project)
    }

    /// Register an already-constructed project. Name collisions are
    /// rejected rather than silently shadowed.
    pub fn add_project(&mut self, project: Project) -> Result<&mut Project, WorkspaceError> {
        if self.projects.iter().any(|p| p.name == project.name) {
            return Err(WorkspaceError::DuplicateProject(project.name));
        }
        tracing::debug!("registered project `{}`", project.name);
        self.projects.push(project);
        Ok(self.projects.last_mut().unwrap())
    }

    /// Look up a project by name.
    pub fn project(&self, name: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.name == name)
    }

    /// Look up a project mutably. Scripts mutate projects until build time.
    pub fn project_mut(&mut self, name: &str) -> Option<&mut Project> {
        self.projects.iter_mut().find(|p| p.name == name)
    }

    /// All projects in registration order.
    pub fn projects(&self) -> &[Project] {
        &self.projects
    }
}

/// Tracks the current-working-directory stack while nested build scripts
/// are evaluated, plus the list of evaluated files for diagnostics.
///
/// Entering a script resolves its path against the current directory,
/// pushes the script's parent directory, and records the file; leaving pops
/// the directory again.
#[derive(Debug)]
pub struct EvalContext {
    cwd_stack: Vec<PathBuf>,
    executed_files: Vec<PathBuf>,
}

impl EvalContext {
    /// Start evaluation rooted at the workspace root.
    pub fn new(root: &Path) -> Self {
        EvalContext {
            cwd_stack: vec![root.to_path_buf()],
            executed_files: Vec::new(),
        }
    }

    /// The current working directory for path resolution.
    pub fn cwd(&self) -> &Path {
        // The stack is never empty: the root entry is permanent.
        self.cwd_stack.last().unwrap()
    }

    /// Enter a nested script: resolve its path, push its directory, record
    /// it in the executed-files list. Returns the resolved path.
    pub fn enter(&mut self, script: &Path) -> PathBuf {
        let resolved = if script.is_absolute() {
            script.to_path_buf()
        } else {
            self.cwd().join(script)
        };

        let dir = resolved
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.cwd().to_path_buf());
        self.cwd_stack.push(dir);
        self.executed_files.push(resolved.clone());
        resolved
    }

    /// Leave the current script, restoring the previous directory.
    pub fn leave(&mut self) {
        if self.cwd_stack.len() > 1 {
            self.cwd_stack.pop();
        }
    }

    /// Every file evaluated so far, in evaluation order.
    pub fn executed_files(&self) -> &[PathBuf] {
        &self.executed_files
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_workspace() -> Workspace {
        Workspace::new(Path::new("/ws"), ConfigStore::with_defaults())
    }

    #[test]
    fn test_duplicate_project_rejected() {
        let mut ws = test_workspace();
        ws.create_project("app", BinaryType::ConsoleApp, Language::C, Path::new("/ws/app"))
            .unwrap();

        let err = ws
            .create_project("app", BinaryType::StaticLib, Language::C, Path::new("/ws/app"))
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::DuplicateProject(_)));
    }

    #[test]
    fn test_registration_order_preserved() {
        let mut ws = test_workspace();
        for name in ["zeta", "alpha", "mid"] {
            ws.create_project(name, BinaryType::StaticLib, Language::C, Path::new("/ws"))
                .unwrap();
        }

        let names: Vec<_> = ws.projects().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_eval_context_cwd_stack() {
        let mut ctx = EvalContext::new(Path::new("/ws"));
        assert_eq!(ctx.cwd(), Path::new("/ws"));

        let resolved = ctx.enter(Path::new("sub/build.dd"));
        assert_eq!(resolved, PathBuf::from("/ws/sub/build.dd"));
        assert_eq!(ctx.cwd(), Path::new("/ws/sub"));

        ctx.enter(Path::new("nested/more.dd"));
        assert_eq!(ctx.cwd(), Path::new("/ws/sub/nested"));

        ctx.leave();
        assert_eq!(ctx.cwd(), Path::new("/ws/sub"));
        ctx.leave();
        ctx.leave(); // extra leave never pops the root
        assert_eq!(ctx.cwd(), Path::new("/ws"));

        assert_eq!(ctx.executed_files().len(), 2);
    }
}

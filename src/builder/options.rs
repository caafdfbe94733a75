//! Build invocation options and per-run state.

use std::collections::HashSet;

use anyhow::{bail, Result};

use crate::util::config::ConfigStore;

/// Options for one build run.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Named build configuration ("debug", "release", ...). Must be one of
    /// the names declared under `build.configs`.
    pub config: String,
    /// Print every command instead of executing anything.
    pub just_print: bool,
    /// Explicit worker count; `None` derives one from the machine.
    pub jobs: Option<usize>,
    /// Target machine tuple string; `None` builds for the host.
    pub target: Option<String>,
    /// Emit `compile_commands.json`, overriding `builder.compileCmds`.
    pub compile_commands: Option<bool>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            config: "debug".to_string(),
            just_print: false,
            jobs: None,
            target: None,
            compile_commands: None,
        }
    }
}

impl BuildOptions {
    /// Validate the named configuration against `build.configs`.
    pub fn validate(&self, config: &ConfigStore) -> Result<()> {
        let known = config.get_str_array(&["build", "configs"]);
        if !known.iter().any(|c| c == &self.config) {
            bail!(
                "unknown build configuration `{}`; declared configurations: {}",
                self.config,
                known.join(", ")
            );
        }
        if let Some(0) = self.jobs {
            bail!("--jobs must be at least 1");
        }
        Ok(())
    }

    /// Whether this run writes the compilation database.
    pub fn emit_compile_commands(&self, config: &ConfigStore) -> bool {
        self.compile_commands
            .unwrap_or_else(|| config.get_bool(&["builder", "compileCmds"]).unwrap_or(false))
    }
}

/// What happened to one project during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectOutcome {
    /// Objects compiled and/or output linked.
    Built,
    /// Everything was current; nothing ran.
    UpToDate,
}

/// Mutable state threaded through one run: which projects were rebuilt,
/// plus the run totals for the final summary line.
#[derive(Debug, Default)]
pub struct BuildState {
    rebuilt: HashSet<String>,
    pub compiled: usize,
    pub reused: usize,
    pub linked: usize,
    pub up_to_date: usize,
}

impl BuildState {
    pub fn new() -> Self {
        BuildState::default()
    }

    /// Mark a project as rebuilt this run. Dependents consult this to
    /// decide whether they must relink.
    pub fn mark_rebuilt(&mut self, project: &str) {
        self.rebuilt.insert(project.to_string());
    }

    /// Whether any of the named projects were rebuilt this run.
    pub fn any_rebuilt<'a>(&self, projects: impl IntoIterator<Item = &'a String>) -> bool {
        projects.into_iter().any(|p| self.rebuilt.contains(p))
    }

    pub fn record(&mut self, outcome: ProjectOutcome) {
        match outcome {
            ProjectOutcome::Built => self.linked += 1,
            ProjectOutcome::UpToDate => self.up_to_date += 1,
        }
    }
}

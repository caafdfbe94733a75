//! Build planning and execution.
//!
//! This module turns a populated workspace into artifacts: ordering
//! projects, deciding what is stale, constructing tool invocations and
//! running them on a bounded worker pool.

pub mod compile_commands;
pub mod depfile;
pub mod graph;
pub mod options;
pub mod orchestrator;
pub mod staleness;
pub mod toolchain;

pub use compile_commands::CompileCommandsDb;
pub use graph::{sorted_projects, GraphError};
pub use options::{BuildOptions, BuildState, ProjectOutcome};
pub use orchestrator::{build, generate_compile_commands, BuildReport};
pub use staleness::{CompilePlan, CompileReason};
pub use toolchain::{toolchain_for, Toolchain};

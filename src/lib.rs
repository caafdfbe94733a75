//! Drydock - a build orchestrator for C, C++ and D projects
//!
//! This crate provides the core library functionality for Drydock:
//! project and target modelling, incremental rebuild analysis, toolchain
//! adapters and the parallel build orchestrator.

pub mod builder;
pub mod core;
pub mod util;

pub use crate::core::{
    language::Language, machine::MachineDescriptor, machine::MachineRegistry, project::Project,
    workspace::Workspace,
};

pub use crate::builder::{build, BuildOptions, BuildReport};
pub use crate::util::config::ConfigStore;

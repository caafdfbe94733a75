//! Core data structures for Drydock.
//!
//! This module contains the foundational types used throughout Drydock:
//! - Machine and cross-compilation target descriptors
//! - Project entities and their aggregation rules
//! - Externally-resolved package dependencies
//! - The explicit workspace context

pub mod language;
pub mod machine;
pub mod manifest;
pub mod pkgdep;
pub mod project;
pub mod workspace;

pub use language::{Language, OptLevel};
pub use machine::{MachineDescriptor, MachineQuery, MachineRegistry};
pub use manifest::{load_workspace, ProjectDesc};
pub use pkgdep::{PackageQuery, PkgDep, VersionConstraint};
pub use project::{BinaryType, Project, Visibility};
pub use workspace::{EvalContext, Workspace};

//! Shared utilities

pub mod config;
pub mod fetch;
pub mod fs;
pub mod process;

pub use config::{ConfigStore, Layer};
pub use process::{ProcessBuilder, ToolOutcome};

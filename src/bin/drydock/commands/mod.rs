//! Command implementations

pub mod build;
pub mod generate;
pub mod targets;

use std::path::PathBuf;

use anyhow::{bail, Result};

/// Find the workspace root: the nearest ancestor of the current directory
/// containing `drydock.toml`.
pub fn find_workspace_root() -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    let mut dir = cwd.as_path();
    loop {
        if dir.join("drydock.toml").exists() {
            return Ok(dir.to_path_buf());
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => bail!(
                "no drydock.toml found in `{}` or any parent directory",
                cwd.display()
            ),
        }
    }
}

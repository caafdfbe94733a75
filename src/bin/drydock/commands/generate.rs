//! `drydock generate` command

use anyhow::{bail, Result};

use crate::cli::GenerateArgs;
use crate::commands::find_workspace_root;
use drydock::builder::generate_compile_commands;
use drydock::core::manifest::load_workspace;

pub fn execute(args: GenerateArgs) -> Result<()> {
    match args.generator.as_str() {
        "compile-commands" => {
            let root = find_workspace_root()?;
            let ws = load_workspace(&root)?;
            let path = generate_compile_commands(&ws, args.target.as_deref())?;
            println!("wrote {}", path.display());
            Ok(())
        }
        other => bail!("unknown generator `{}`; available: compile-commands", other),
    }
}

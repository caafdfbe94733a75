//! `drydock targets` command

use anyhow::Result;

use crate::cli::TargetsArgs;
use crate::commands::find_workspace_root;
use drydock::core::machine::MachineRegistry;
use drydock::core::manifest::load_workspace;

pub fn execute(_args: TargetsArgs) -> Result<()> {
    // Inside a workspace, list its registry (which may carry extra
    // machines); elsewhere fall back to the built-in set.
    let registry = match find_workspace_root() {
        Ok(root) => return list(load_workspace(&root)?.machines()),
        Err(_) => MachineRegistry::with_builtin(),
    };
    list(&registry)
}

fn list(registry: &MachineRegistry) -> Result<()> {
    let host = registry.host().map(|m| m.to_string());
    for machine in registry.known() {
        let tuple = machine.to_string();
        if Some(&tuple) == host.as_ref() {
            println!("{} (host)", tuple);
        } else {
            println!("{}", tuple);
        }
    }
    Ok(())
}

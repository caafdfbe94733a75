//! `drydock build` command

use anyhow::Result;

use crate::cli::BuildArgs;
use crate::commands::find_workspace_root;
use drydock::builder::{build, BuildOptions};
use drydock::core::manifest::load_workspace;

pub fn execute(args: BuildArgs) -> Result<()> {
    let root = find_workspace_root()?;
    let ws = load_workspace(&root)?;

    let options = BuildOptions {
        config: args.config,
        just_print: args.just_print,
        jobs: args.jobs,
        target: args.target,
        compile_commands: args.compile_commands.then_some(true),
    };

    let report = build(&ws, &options)?;

    if args.just_print {
        return Ok(());
    }
    if report.all_up_to_date() {
        println!("all {} project(s) up to date", report.outcomes.len());
    } else {
        println!(
            "built {} project(s): {} object(s) compiled, {} reused",
            report.outcomes.len(),
            report.compiled,
            report.reused
        );
    }
    Ok(())
}
